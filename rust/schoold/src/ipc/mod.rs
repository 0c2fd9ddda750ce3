mod error;
mod handlers;
mod helpers;
mod router;
mod rows;
mod types;

pub use error::bad_json;
pub use handlers::core::open_workspace;
pub use router::handle_request;
pub use types::{AppState, Request};
