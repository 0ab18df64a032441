//! Purpose: Read text files line by line with a bounded per-line buffer.
//! Exports: `LineOptions`, `LineScanner`, `MAX_LINE_BYTES`, `read_lines`, `stream_lines`.
//! Role: Buffered and channel-streamed line readers sharing one scanner.
//! Invariants: At most `max_line_bytes + 2` bytes are buffered per line.
//! Invariants: An over-long line is a returned `TooLong` error, never a panic.
//! Invariants: Line endings (`\n`, `\r\n`) are stripped; invalid UTF-8 is replaced lossily.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use bstr::ByteSlice;
use crossbeam_channel::Sender;
use tracing::debug;

use super::cancel::{CancelToken, handoff};
use super::error::{Error, ErrorKind, io_error};

/// Default upper bound for a single line.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineOptions {
    pub max_line_bytes: usize,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            max_line_bytes: MAX_LINE_BYTES,
        }
    }
}

/// Iterator over the lines of a reader.
///
/// Yields at most one error, after which it is exhausted.
pub struct LineScanner<R> {
    reader: R,
    max_line_bytes: usize,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> LineScanner<R> {
    pub fn new(reader: R, options: LineOptions) -> Self {
        Self {
            reader,
            max_line_bytes: options.max_line_bytes,
            buf: Vec::new(),
            line_no: 0,
            done: false,
        }
    }

    /// Number of lines yielded so far.
    pub fn line_no(&self) -> u64 {
        self.line_no
    }

    fn next_line(&mut self) -> Result<Option<String>, Error> {
        self.buf.clear();
        // Room for the longest allowed line plus "\r\n".
        let limit = self.max_line_bytes as u64 + 2;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read line")
                    .with_index(self.line_no + 1)
                    .with_source(err)
            })?;
        if read == 0 {
            return Ok(None);
        }
        let content = trim_line_ending(&self.buf);
        if content.len() > self.max_line_bytes {
            return Err(Error::new(ErrorKind::TooLong)
                .with_message(format!(
                    "line exceeds {} byte limit",
                    self.max_line_bytes
                ))
                .with_index(self.line_no + 1)
                .with_hint("Raise --max-line-size to read longer lines."));
        }
        self.line_no += 1;
        Ok(Some(content.to_str_lossy().into_owned()))
    }
}

impl<R: BufRead> Iterator for LineScanner<R> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn open_scanner(path: &Path, options: LineOptions) -> Result<LineScanner<BufReader<File>>, Error> {
    let file = File::open(path).map_err(|err| io_error(err, "cannot open file", path))?;
    Ok(LineScanner::new(BufReader::new(file), options))
}

/// Read every line of `path`; any failure discards the partial result.
pub fn read_lines(path: impl AsRef<Path>, options: LineOptions) -> Result<Vec<String>, Error> {
    let path = path.as_ref();
    open_scanner(path, options)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| err.with_path(path))
}

/// Stream the lines of `path` into `tx`, returning the number of lines sent.
///
/// `tx` is consumed and closed on return, on every path.
pub fn stream_lines(
    path: impl AsRef<Path>,
    tx: Sender<String>,
    cancel: &CancelToken,
    options: LineOptions,
) -> Result<u64, Error> {
    let path = path.as_ref();
    let scanner = open_scanner(path, options)?;
    debug!(path = %path.display(), "line stream opened");
    let mut sent = 0u64;
    for line in scanner {
        let line = line.map_err(|err| err.with_path(path))?;
        handoff(&tx, line, cancel)?;
        sent += 1;
    }
    debug!(path = %path.display(), sent, "line stream finished");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::{LineOptions, LineScanner, MAX_LINE_BYTES, read_lines, stream_lines};
    use crate::core::cancel::CancelToken;
    use crate::core::error::ErrorKind;
    use std::io::{Cursor, Write};
    use std::thread;
    use tempfile::NamedTempFile;

    fn scan(input: &[u8], max_line_bytes: usize) -> Vec<Result<String, ErrorKind>> {
        LineScanner::new(Cursor::new(input.to_vec()), LineOptions { max_line_bytes })
            .map(|line| line.map_err(|err| err.kind()))
            .collect()
    }

    #[test]
    fn default_limit_is_ten_mib() {
        assert_eq!(LineOptions::default().max_line_bytes, MAX_LINE_BYTES);
        assert_eq!(MAX_LINE_BYTES, 10_485_760);
    }

    #[test]
    fn strips_lf_and_crlf_and_keeps_blank_lines() {
        let lines = scan(b"alpha\r\nbeta\n\ngamma", 64);
        assert_eq!(
            lines,
            vec![
                Ok("alpha".to_string()),
                Ok("beta".to_string()),
                Ok(String::new()),
                Ok("gamma".to_string()),
            ]
        );
    }

    #[test]
    fn line_at_limit_is_accepted() {
        assert_eq!(
            scan(b"abcd\r\nef\n", 4),
            vec![Ok("abcd".to_string()), Ok("ef".to_string())]
        );
    }

    #[test]
    fn long_line_is_an_error_and_ends_iteration() {
        let lines = scan(b"ok\nthis line is too long\nnever\n", 8);
        assert_eq!(lines, vec![Ok("ok".to_string()), Err(ErrorKind::TooLong)]);
    }

    #[test]
    fn too_long_error_carries_line_number() {
        let mut scanner = LineScanner::new(
            Cursor::new(b"a\nbb\nccccc\n".to_vec()),
            LineOptions { max_line_bytes: 3 },
        );
        assert_eq!(scanner.next().expect("line").expect("ok"), "a");
        assert_eq!(scanner.next().expect("line").expect("ok"), "bb");
        let err = scanner.next().expect("line").unwrap_err();
        assert_eq!(err.index(), Some(3));
        assert!(scanner.next().is_none());
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = scan(b"caf\xff\n", 16);
        assert_eq!(lines, vec![Ok("caf\u{fffd}".to_string())]);
    }

    #[test]
    fn read_lines_discards_partial_results() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(b"short\nmuch too long for the limit\n").expect("write");
        let err = read_lines(file.path(), LineOptions { max_line_bytes: 10 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooLong);
        assert_eq!(err.path(), Some(file.path()));

        let lines = read_lines(file.path(), LineOptions::default()).expect("lines");
        assert_eq!(lines, vec!["short", "much too long for the limit"]);
    }

    #[test]
    fn stream_lines_sends_in_order_and_closes() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(b"one\ntwo\nthree\n").expect("write");
        let (tx, rx) = crossbeam_channel::bounded(0);
        let path = file.path().to_path_buf();
        let producer = thread::spawn(move || {
            stream_lines(&path, tx, &CancelToken::never(), LineOptions::default())
        });
        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(producer.join().expect("join").expect("stream"), 3);
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn stream_lines_returns_error_instead_of_panicking() {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(b"fine\nway past the limit\n").expect("write");
        let (tx, rx) = crossbeam_channel::bounded(0);
        let path = file.path().to_path_buf();
        let producer = thread::spawn(move || {
            stream_lines(&path, tx, &CancelToken::never(), LineOptions { max_line_bytes: 6 })
        });
        let lines: Vec<String> = rx.iter().collect();
        let err = producer.join().expect("join").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooLong);
        assert_eq!(err.index(), Some(2));
        assert_eq!(lines, vec!["fine"]);
    }

    #[test]
    fn stream_lines_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (tx, rx) = crossbeam_channel::bounded::<String>(0);
        let err = stream_lines(
            dir.path().join("absent.txt"),
            tx,
            &CancelToken::never(),
            LineOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(rx.recv().is_err());
    }
}
