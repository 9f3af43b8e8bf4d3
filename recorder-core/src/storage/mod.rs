pub mod caf_writer;
pub mod checksum;
pub mod metadata;
