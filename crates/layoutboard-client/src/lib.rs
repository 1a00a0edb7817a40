//! Layoutboard Client Library
//!
//! HTTP implementation of the layout service and a headless session runner
//! that drives the board engine on a single-threaded runtime.

pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use config::{Args, ClientConfig};
pub use error::{ClientError, Result};
pub use http::HttpLayoutService;
pub use session::{Reauthenticate, Session, SessionSummary};
