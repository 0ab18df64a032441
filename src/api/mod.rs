//! Purpose: Define the stable public Rust API boundary for swisskit.
//! Exports: Core types and operations needed by the CLI and library callers.
//! Role: Public, additive-only surface over the core modules.
//! Invariants: Everything a caller needs is reachable from here.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::cancel::{CancelSource, CancelToken};
pub use crate::core::chunk::chunk;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::json_stream::{
    Decoded, Entry, JsonStream, decode_array, decode_file_to_channel, decode_file_to_collection,
};
pub use crate::core::lines::{LineOptions, LineScanner, MAX_LINE_BYTES, read_lines, stream_lines};
pub use crate::core::retry::{DEFAULT_RETRY_DELAY, RetryPolicy, retry, retry_when};
pub use crate::core::size::{SizeUnit, file_size_in};
pub use crate::core::units::{parse_duration, parse_size};
