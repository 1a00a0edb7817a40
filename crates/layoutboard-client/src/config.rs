//! Command-line arguments and the resolved client configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kurbo::Size;
use layoutboard_core::{BoardConfig, Viewer};
use url::Url;

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Parser)]
#[command(name = "layoutboard", version, about = "Headless Layoutboard client")]
pub struct Args {
    /// Base URL of the layout server.
    #[arg(long, env = "LAYOUTBOARD_URL", default_value = "http://127.0.0.1:5000/")]
    pub url: String,

    /// User name to act as.
    #[arg(long, env = "LAYOUTBOARD_USER")]
    pub user: String,

    /// Password for `/api/login`. Without it the session is assumed to exist.
    #[arg(long, env = "LAYOUTBOARD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Treat the user as elevated when no login reports a role.
    #[arg(long, env = "LAYOUTBOARD_ADMIN")]
    pub admin: bool,

    #[arg(long, default_value_t = 1280.0)]
    pub width: f64,

    #[arg(long, default_value_t = 800.0)]
    pub height: f64,

    /// Seconds between layout refreshes.
    #[arg(long)]
    pub refresh_secs: Option<u64>,

    /// JSON file with board tuning (zoom bounds, thresholds).
    #[arg(long)]
    pub board_config: Option<PathBuf>,

    /// Exit after the first successful render.
    #[arg(long)]
    pub once: bool,
}

/// Everything a session needs, validated.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub viewer: Viewer,
    pub password: Option<String>,
    pub viewport: Size,
    pub board: BoardConfig,
    pub once: bool,
}

impl ClientConfig {
    pub fn from_args(args: Args) -> Result<Self> {
        let board = match &args.board_config {
            Some(path) => BoardConfig::from_json(&std::fs::read_to_string(path)?)?,
            None => BoardConfig::default(),
        };
        Self::resolve(args, board)
    }

    fn resolve(args: Args, mut board: BoardConfig) -> Result<Self> {
        let user = args.user.trim();
        if user.is_empty() {
            return Err(ClientError::invalid("user name must not be empty"));
        }
        if !(args.width > 0.0 && args.height > 0.0) {
            return Err(ClientError::invalid(format!(
                "viewport {}x{} must be positive",
                args.width, args.height
            )));
        }
        if let Some(secs) = args.refresh_secs {
            if secs == 0 {
                return Err(ClientError::invalid("refresh interval must be at least one second"));
            }
            board.refresh_interval = Duration::from_secs(secs);
        }
        let board = board.validated()?;

        let base_url = Url::parse(&args.url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::invalid(format!("{} cannot be used as a base URL", args.url)));
        }

        Ok(Self {
            base_url,
            viewer: Viewer::new(user, args.admin),
            password: args.password.filter(|p| !p.is_empty()),
            viewport: Size::new(args.width, args.height),
            board,
            once: args.once,
        })
    }
}
