//! HTTP request adapter
//!
//! Translates REST calls into lifecycle operations and lifecycle errors into
//! status codes. Holds no state of its own beyond a handle on the manager.

pub mod handlers;
pub mod state;

pub use handlers::{create_router, ApiError};
pub use state::AppState;
