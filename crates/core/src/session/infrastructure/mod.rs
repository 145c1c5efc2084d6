pub mod json_lines_sink;
pub mod threaded_session_runner;
