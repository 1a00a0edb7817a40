//! Request/response contracts with the remote layout service.

mod memory;

pub use memory::MemoryLayoutService;

use crate::action::Action;
use crate::scene::LayoutSnapshot;
use kurbo::Size;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Remote call errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("Session expired")]
    Unauthorized,
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Whether the error means the session is no longer valid.
    pub fn is_session_expired(&self) -> bool {
        match self {
            RemoteError::Unauthorized => true,
            RemoteError::Status { code, .. } => *code == 401,
            RemoteError::Network(_) | RemoteError::Decode(_) => false,
        }
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A decoded RGBA8 raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// Row-major, premultiplication-free RGBA8 pixels.
    pub rgba: Arc<Vec<u8>>,
}

impl Raster {
    /// Wrap pixel data. Returns `None` if the buffer does not match the size.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (rgba.len() == expected).then(|| Self {
            width,
            height,
            rgba: Arc::new(rgba),
        })
    }

    /// Natural size in pixels.
    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Work the engine asks its host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    FetchLayout,
    FetchImage { path: String },
    ListAddable,
    Apply(Action),
}

/// Successful payload of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteReply {
    Layout(LayoutSnapshot),
    Image(Raster),
    Addable(Vec<String>),
    Done,
}

/// A completed request, handed back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub request: RemoteRequest,
    pub result: RemoteResult<RemoteReply>,
}

impl RemoteResponse {
    pub fn new(request: RemoteRequest, result: RemoteResult<RemoteReply>) -> Self {
        Self { request, result }
    }
}

/// The remote layout service.
///
/// Execution is single-threaded and cooperative, so implementations are not
/// required to be `Send`.
pub trait LayoutService {
    /// Fetch the current layout snapshot.
    fn fetch_layout(&self) -> BoxFuture<'_, RemoteResult<LayoutSnapshot>>;

    /// Fetch and decode a background raster.
    fn fetch_image(&self, path: &str) -> BoxFuture<'_, RemoteResult<Raster>>;

    /// List items that can be placed on the layout.
    fn list_addable(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>>;

    /// Persist a mutating action.
    fn apply(&self, action: &Action) -> BoxFuture<'_, RemoteResult<()>>;
}

/// Run one request against a service and package the outcome.
pub async fn execute<S>(service: &S, request: RemoteRequest) -> RemoteResponse
where
    S: LayoutService + ?Sized,
{
    let result = match &request {
        RemoteRequest::FetchLayout => service.fetch_layout().await.map(RemoteReply::Layout),
        RemoteRequest::FetchImage { path } => service.fetch_image(path).await.map(RemoteReply::Image),
        RemoteRequest::ListAddable => service.list_addable().await.map(RemoteReply::Addable),
        RemoteRequest::Apply(action) => service.apply(action).await.map(|()| RemoteReply::Done),
    };
    RemoteResponse { request, result }
}

/// Simple blocking executor for tests.
#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_classification() {
        assert!(RemoteError::Unauthorized.is_session_expired());
        assert!(RemoteError::Status { code: 401, message: String::new() }.is_session_expired());
        assert!(!RemoteError::Status { code: 500, message: "boom".into() }.is_session_expired());
        assert!(!RemoteError::Network("reset".into()).is_session_expired());
    }

    #[test]
    fn test_raster_checks_buffer_length() {
        assert!(Raster::new(2, 2, vec![0; 16]).is_some());
        assert!(Raster::new(2, 2, vec![0; 15]).is_none());
        assert_eq!(Raster::new(3, 1, vec![0; 12]).unwrap().size(), Size::new(3.0, 1.0));
    }

    #[test]
    fn test_execute_packages_request() {
        let service = MemoryLayoutService::new();
        let response = block_on(execute(&service, RemoteRequest::ListAddable));
        assert_eq!(response.request, RemoteRequest::ListAddable);
        assert_eq!(response.result, Ok(RemoteReply::Addable(Vec::new())));
    }
}
