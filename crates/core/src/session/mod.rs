pub mod attendance_sink;
pub mod infrastructure;
pub mod messages;
pub mod session_logger;
pub mod session_runner;
pub mod tracking_session;
