pub mod buffer_size;
pub mod caf_format;
pub mod format_negotiator;
