pub mod audio_file;
pub mod capture_queue;
pub mod device;
pub mod recorder_delegate;
