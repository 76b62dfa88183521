//! Storage layer - raw access to backing files.
//!
//! - [`BlockFile`] - Open/seek/read/write/close on one file

mod block_file;

pub use block_file::BlockFile;
