pub mod cookie;
pub mod recorder;
pub mod recorder_state;
