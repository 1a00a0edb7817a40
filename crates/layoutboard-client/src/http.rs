//! HTTP implementation of the layout service.

use std::time::Duration;

use layoutboard_core::remote::{BoxFuture, LayoutService, Raster, RemoteError, RemoteResult};
use layoutboard_core::{Action, LayoutSnapshot, Task, Viewer};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use crate::error::{ClientError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A resolved request for a mutating action.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Endpoint {
    pub method: Method,
    pub segments: Vec<String>,
    pub body: Option<Value>,
}

impl Endpoint {
    fn post(segments: &[&str], body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            segments: segments.iter().map(|s| (*s).to_string()).collect(),
            body,
        }
    }
}

/// Map an action onto the server's route table.
pub(crate) fn endpoint_for(action: &Action) -> Endpoint {
    match action {
        Action::AddItem { name, at } => Endpoint::post(
            &["api", "add_project_to_layout"],
            Some(json!({ "project_name": name, "x": at.x, "y": at.y })),
        ),
        Action::MoveItem { name, to } => Endpoint::post(
            &["api", "move_project_to_layout"],
            Some(json!({ "project_name": name, "x": to.x, "y": to.y })),
        ),
        Action::RemoveItem { name } => Endpoint {
            method: Method::DELETE,
            segments: vec!["api".into(), "remove_project_from_layout".into(), name.clone()],
            body: None,
        },
        Action::SetPriority { name, priority } => Endpoint::post(
            &["api", "project", name.as_str(), "priority"],
            Some(json!({ "priority": priority.as_str() })),
        ),
        Action::SetPause { name, reason } => Endpoint::post(
            &["api", "project", name.as_str(), "pause"],
            Some(json!({ "reason": reason.map(|r| r.as_str()) })),
        ),
        Action::SetDetails { name, details } => {
            Endpoint::post(&["api", "project", name.as_str(), "details"], Some(json!({ "details": details })))
        }
        Action::MarkTaskReady { name, task } => {
            let verb = match task {
                Task::Electrification => "electrify",
                Task::Control => "control",
            };
            Endpoint::post(&["api", "project", name.as_str(), verb], None)
        }
        Action::ResetTask { name, task } => {
            Endpoint::post(&["api", "project", name.as_str(), "reset_task", task.as_str()], None)
        }
        Action::CompleteTask { name, task } => {
            Endpoint::post(&["api", "project", name.as_str(), "complete", task.as_str()], None)
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The server uses both `{"message": ..}` and `{"error": ..}`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.or(parsed.error).filter(|m| !m.is_empty())
}

fn network(err: reqwest::Error) -> RemoteError {
    if err.is_decode() {
        RemoteError::Decode(err.to_string())
    } else {
        RemoteError::Network(err.to_string())
    }
}

/// Turn a non-success response into the matching error.
async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(RemoteError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP Error {}", status.as_u16()));
    Err(RemoteError::Status {
        code: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Login details kept for re-establishing an expired session.
#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Layout service backed by the board's HTTP API.
///
/// Keeps a cookie store so a session established by [`login`](Self::login)
/// carries over to later calls.
#[derive(Debug, Clone)]
pub struct HttpLayoutService {
    client: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl HttpLayoutService {
    pub fn new(base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(ClientError::invalid(format!("{base} cannot be used as a base URL")));
        }
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base,
            credentials: None,
        })
    }

    /// Remember login details so an expired session can be re-established.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Log in again with the stored credentials.
    pub async fn relogin(&self) -> Result<Viewer> {
        let Some(credentials) = &self.credentials else {
            return Err(ClientError::SessionExpired);
        };
        self.login(&credentials.username, &credentials.password).await
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build a URL below the base from percent-encoded path segments.
    pub(crate) fn url(&self, segments: &[String]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn api(&self, segments: &[&str]) -> Url {
        let owned: Vec<String> = segments.iter().map(|s| (*s).to_string()).collect();
        self.url(&owned)
    }

    /// Start a session. The returned viewer carries the role the server
    /// reports.
    pub async fn login(&self, username: &str, password: &str) -> Result<Viewer> {
        let response = self
            .client
            .post(self.api(&["api", "login"]))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::LoginRejected {
                message: error_message(&body).unwrap_or_else(|| format!("HTTP Error {}", status.as_u16())),
            });
        }
        let reply: LoginReply = serde_json::from_str(&body)?;
        if reply.status != "success" {
            return Err(ClientError::LoginRejected {
                message: reply.message.unwrap_or(reply.status),
            });
        }
        let name = reply.username.unwrap_or_else(|| username.to_string());
        let elevated = reply.role.as_deref() == Some("admin");
        log::info!("Logged in as {name} (role: {})", reply.role.as_deref().unwrap_or("unknown"));
        Ok(Viewer::new(name, elevated))
    }

    async fn get_layout(&self) -> RemoteResult<LayoutSnapshot> {
        let response = self
            .client
            .get(self.api(&["api", "layout_data"]))
            .send()
            .await
            .map_err(network)?;
        let body = check(response).await?.text().await.map_err(network)?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get_image(&self, path: &str) -> RemoteResult<Raster> {
        let mut url = self.api(&["api", "get_image"]);
        url.query_pairs_mut().append_pair("path", path);
        let response = self.client.get(url).send().await.map_err(network)?;
        let bytes = check(response).await?.bytes().await.map_err(network)?;
        layoutboard_render::decode_raster(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get_addable(&self) -> RemoteResult<Vec<String>> {
        let response = self
            .client
            .get(self.api(&["api", "available_projects"]))
            .send()
            .await
            .map_err(network)?;
        let body = check(response).await?.text().await.map_err(network)?;
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn send_action(&self, action: Action) -> RemoteResult<()> {
        let endpoint = endpoint_for(&action);
        let mut request = self.client.request(endpoint.method, self.url(&endpoint.segments));
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(network)?;
        check(response).await?;
        log::debug!("Persisted {} {}", action.kind(), action.target());
        Ok(())
    }
}

impl LayoutService for HttpLayoutService {
    fn fetch_layout(&self) -> BoxFuture<'_, RemoteResult<LayoutSnapshot>> {
        Box::pin(self.get_layout())
    }

    fn fetch_image(&self, path: &str) -> BoxFuture<'_, RemoteResult<Raster>> {
        let path = path.to_string();
        Box::pin(async move { self.get_image(&path).await })
    }

    fn list_addable(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        Box::pin(self.get_addable())
    }

    fn apply(&self, action: &Action) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(self.send_action(action.clone()))
    }
}
