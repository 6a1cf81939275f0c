//! Axum HTTP surface, SSE streaming controller and request DI for running
//! taskflow workflows over HTTP (spec.md §6).

pub mod cancellation;
pub mod core;
pub mod error;
pub mod events;
pub mod progress;
pub mod rest;
pub mod settings;

pub use core::Core;
pub use error::{ApiError, ApiResult};
pub use rest::create_app;
pub use settings::Settings;
