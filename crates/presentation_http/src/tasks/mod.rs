//! Background tasks for the HTTP presentation layer

mod rate_limit_cleanup;
mod session_cleanup;

pub use rate_limit_cleanup::spawn_rate_limit_cleanup_task;
pub use session_cleanup::spawn_session_cleanup_task;
