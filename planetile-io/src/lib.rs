//! planetile-io: Record files and tile descriptor output for planetile.
//!
//! Plane records are read from memory-mapped JSON-lines files; tile
//! descriptors are written, and read back, as CSV or JSON lines.

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{MappedFileReader, PlaneRecordReader, PlaneRecords, TileRecordReader, TileRecords};
pub use writer::{PlaneRecordWriter, TileFormat, TileRecordWriter};
