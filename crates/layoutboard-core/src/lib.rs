//! Layoutboard Core Library
//!
//! Platform-agnostic engine for the Layoutboard project map: view transform,
//! scene model, hit-testing, overlay regions and the interaction state machine
//! with optimistic edits reconciled against a periodically refreshed remote
//! source.

pub mod action;
pub mod board;
pub mod config;
pub mod controller;
pub mod hit;
pub mod input;
pub mod optimistic;
pub mod overlay;
pub mod permission;
pub mod refresh;
pub mod remote;
pub mod scene;
pub mod view;

pub use action::Action;
pub use board::Board;
pub use config::{BoardConfig, ConfigError};
pub use controller::{ControllerError, Effect, InspectionTicket, InteractionController, InteractionFlags, Mode};
pub use hit::find_topmost;
pub use input::{MouseButton, PointerEvent};
pub use optimistic::{ItemOverride, ItemPatch, OverrideState};
pub use overlay::{OverlayDescriptor, OverlaySync, overlay_regions};
pub use permission::Viewer;
pub use refresh::{ImageCache, ImageEntry, RefreshLoop, SyncStatus};
pub use remote::{LayoutService, MemoryLayoutService, Raster, RemoteError, RemoteRequest, RemoteResponse};
pub use scene::{Background, Item, LayoutSnapshot, PauseReason, Priority, SceneModel, Task, TaskState};
pub use view::ViewTransform;
