pub mod attendance_event;
pub mod detection;
pub mod presence_ledger;
pub mod presence_state;
pub mod presence_tracker;
