//! The text I/O boundary: instance loading and `Bin-<k>.txt` emission.

mod export;
mod import;

pub use export::{write_bin_file, write_bin_files};
pub use import::{parse_instance, read_instance, Instance};
