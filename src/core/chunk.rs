//! Purpose: Split a slice into contiguous, order-preserving chunks.
//! Exports: `chunk`.
//! Invariants: Every chunk except possibly the last has exactly `size` items.
use super::error::{Error, ErrorKind};

/// Borrowing chunker; a `size` of zero is rejected before any work.
pub fn chunk<T>(items: &[T], size: usize) -> Result<Vec<&[T]>, Error> {
    if size == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("chunk size must be greater than zero")
            .with_hint("Use --size 1 or larger."));
    }
    Ok(items.chunks(size).collect())
}
