//! HTTP surface of the distribution platform.
//!
//! `routes::build_router` returns the bare router (no tracing or CORS
//! layers) so tests can drive it in-process; `main.rs` adds the layers and
//! binds the socket.

pub mod api_types;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
