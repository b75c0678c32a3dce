//! The line-framed GDB/MI output grammar: record classification, string
//! unescaping, and attribute scanning. Nothing here performs I/O; the
//! connection layer feeds lines in.

pub mod attributes;
mod record;
mod unescape;

pub use self::record::{decode_line, Record, ResultClass, ResultRecord, StreamKind};
