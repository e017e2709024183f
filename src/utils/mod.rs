//! Application plumbing shared by the binary.
//!
//! ## Modules
//!
//! - [`app_data`] - Configuration file in the app data directory (XDG-compliant)
//! - [`logging`] - `tracing` subscriber setup
//! - [`progress`] - Progress bars, no-op without the `progress` feature

pub mod app_data;
pub mod logging;
pub mod progress;

pub use app_data::*;
