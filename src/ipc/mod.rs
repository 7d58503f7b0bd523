mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::timetable::drain_events;
pub use router::handle_request;
pub use types::{AppState, Request};
