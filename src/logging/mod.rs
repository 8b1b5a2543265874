//! Structured logging to stderr; scan reports go to stdout as ndjson.

mod format;

pub use format::StructuredLogger;
