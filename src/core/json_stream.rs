//! Purpose: Decode a top-level JSON array one element at a time.
//! Exports: `Entry`, `Decoded`, `JsonStream`, `decode_array`, `decode_file_to_collection`,
//! `decode_file_to_channel`.
//! Role: Streaming engine plus its buffering and direct-channel consumers.
//! Invariants: Only one element is materialised at a time; the file is never read whole.
//! Invariants: Each stream ends with exactly one terminal signal: close after N values,
//! or one error entry followed by close.
//! Invariants: Element indexes in errors are 1-based and count the failing element.
//! Invariants: Once an element fails or the consumer halts, no further input is read.
use std::cell::Cell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use serde::de::{self, DeserializeOwned, DeserializeSeed, Deserializer as _, SeqAccess, Visitor};
use tracing::debug;

use super::cancel::{CancelSource, CancelToken, handoff};
use super::error::{Error, ErrorKind, io_error};

/// One unit flowing through a stream: a decoded value or the terminal error.
pub type Entry<T> = Result<T, Error>;

/// Result of a buffering decode: every element decoded before the first error.
#[derive(Debug)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub error: Option<Error>,
}

impl<T> Decoded<T> {
    pub fn into_result(self) -> Result<Vec<T>, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Opening,
    Elements,
    Element(u64),
    Closing,
}

struct DecodeState {
    phase: Phase,
    decoded: u64,
    consumer_error: Option<Error>,
}

/// Byte-level view of the input shared by `GuardedReader` and `ArrayVisitor`.
#[derive(Default)]
struct ScanState {
    stopped: Cell<bool>,
    last: Cell<Option<u8>>,
    first_since_mark: Cell<Option<u8>>,
}

impl ScanState {
    /// Start watching for the byte that follows an element; returns the last
    /// significant byte seen so far.
    fn mark(&self) -> Option<u8> {
        self.first_since_mark.set(None);
        self.last.get()
    }

    fn record(&self, byte: u8) {
        if matches!(byte, b' ' | b'\n' | b'\r' | b'\t') {
            return;
        }
        self.last.set(Some(byte));
        if self.first_since_mark.get().is_none() {
            self.first_since_mark.set(Some(byte));
        }
    }

    /// Whether the input after the marked element goes on to another element,
    /// judged by the first significant byte after it. A number element is
    /// only terminated by peeking the following byte, so a separator seen
    /// before the mark counts as well.
    fn continues_array(&self, last_at_mark: Option<u8>) -> bool {
        let next = match last_at_mark {
            Some(b',') => Some(b','),
            _ => self.first_since_mark.get(),
        };
        matches!(next, Some(byte) if byte != b']' && byte != b'}')
    }
}

/// Reads through to `inner` until the scan is stopped, then reports EOF.
struct GuardedReader<'a, R> {
    inner: R,
    scan: &'a ScanState,
}

impl<R: Read> Read for GuardedReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.scan.stopped.get() {
            return Ok(0);
        }
        let read = self.inner.read(buf)?;
        for &byte in &buf[..read] {
            self.scan.record(byte);
        }
        Ok(read)
    }
}

/// Drive `reader` through a JSON array, calling `on_value` for each element.
///
/// Returns the number of elements decoded. An `Err` from `on_value` halts the
/// stream and is returned unchanged.
pub fn decode_array<R, T, F>(reader: R, mut on_value: F) -> Result<u64, Error>
where
    R: Read,
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    let mut state = DecodeState {
        phase: Phase::Opening,
        decoded: 0,
        consumer_error: None,
    };
    let scan = ScanState::default();
    let reader = GuardedReader {
        inner: reader,
        scan: &scan,
    };
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let outcome = deserializer.deserialize_seq(ArrayVisitor {
        on_value: &mut on_value,
        state: &mut state,
        scan: &scan,
        marker: PhantomData::<fn() -> T>,
    });

    if let Some(err) = state.consumer_error.take() {
        return Err(err);
    }
    match outcome {
        Ok(()) => Ok(state.decoded),
        Err(err) => Err(match state.phase {
            Phase::Opening => Error::new(ErrorKind::Framing)
                .with_message("invalid opening delimiter")
                .with_hint("The top-level JSON value must be an array.")
                .with_source(err),
            Phase::Element(index) => Error::new(ErrorKind::Decode)
                .with_message("failed to decode element")
                .with_index(index)
                .with_source(err),
            Phase::Elements | Phase::Closing => Error::new(ErrorKind::Framing)
                .with_message("invalid closing delimiter")
                .with_index(state.decoded)
                .with_source(err),
        }),
    }
}

struct ArrayVisitor<'a, T, F> {
    on_value: &'a mut F,
    state: &'a mut DecodeState,
    scan: &'a ScanState,
    marker: PhantomData<fn() -> T>,
}

impl<'de, T, F> Visitor<'de> for ArrayVisitor<'_, T, F>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a JSON array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        loop {
            self.state.phase = Phase::Elements;
            let index = self.state.decoded + 1;
            let last_at_mark = self.scan.mark();
            let seed = ElementSeed {
                index,
                phase: &mut self.state.phase,
                marker: PhantomData::<fn() -> T>,
            };
            let next = match seq.next_element_seed(seed) {
                Ok(next) => next,
                Err(err) => {
                    // A bad separator in front of another element belongs to
                    // that element; only end of input or a stray closer is a
                    // closing-delimiter problem.
                    if self.state.phase == Phase::Elements
                        && self.scan.continues_array(last_at_mark)
                    {
                        self.state.phase = Phase::Element(index);
                    }
                    self.scan.stopped.set(true);
                    return Err(err);
                }
            };
            let Some(value) = next else {
                break;
            };
            self.state.decoded = index;
            if let Err(err) = (self.on_value)(value) {
                self.state.consumer_error = Some(err);
                self.scan.stopped.set(true);
                return Err(de::Error::custom("stream halted by consumer"));
            }
        }
        self.state.phase = Phase::Closing;
        Ok(())
    }
}

struct ElementSeed<'a, T> {
    index: u64,
    phase: &'a mut Phase,
    marker: PhantomData<fn() -> T>,
}

impl<'de, T> DeserializeSeed<'de> for ElementSeed<'_, T>
where
    T: DeserializeOwned,
{
    type Value = T;

    fn deserialize<D>(self, deserializer: D) -> Result<T, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        *self.phase = Phase::Element(self.index);
        T::deserialize(deserializer)
    }
}

fn open_reader(path: &Path) -> Result<BufReader<File>, Error> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|err| io_error(err, "cannot open file", path))
}

fn decode_file<T, F>(path: &Path, on_value: F) -> Result<u64, Error>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Result<(), Error>,
{
    let reader = open_reader(path)?;
    debug!(path = %path.display(), "json stream opened");
    let decoded = decode_array(reader, on_value).map_err(|err| match err.path() {
        Some(_) => err,
        None => err.with_path(path),
    })?;
    debug!(path = %path.display(), decoded, "json stream finished");
    Ok(decoded)
}

/// Produce `Entry` values for `path` into `tx`, ending with at most one error.
///
/// `tx` is dropped on return, which closes the channel on every path.
fn produce_entries<T>(path: &Path, tx: Sender<Entry<T>>, cancel: &CancelToken)
where
    T: DeserializeOwned,
{
    let outcome = decode_file(path, |value: T| handoff(&tx, Ok(value), cancel));
    if let Err(err) = outcome {
        if err.kind() != ErrorKind::Cancelled {
            // Fails only when the receiver is gone, and then nobody is left to tell.
            let _ = handoff(&tx, Err(err), cancel);
        }
    }
}

/// Decode the array at `path` into a `Vec`, draining on a worker thread.
///
/// The producer runs on the calling thread; the drain thread is joined before
/// the accumulated items and first error are returned.
pub fn decode_file_to_collection<T>(path: impl AsRef<Path>) -> Decoded<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let path = path.as_ref();
    let (tx, rx) = crossbeam_channel::bounded::<Entry<T>>(0);
    let drain = thread::spawn(move || {
        let mut items = Vec::new();
        for entry in rx {
            match entry {
                Ok(item) => items.push(item),
                Err(err) => {
                    return Decoded {
                        items,
                        error: Some(err),
                    };
                }
            }
        }
        Decoded { items, error: None }
    });

    produce_entries(path, tx, &CancelToken::never());

    drain.join().unwrap_or_else(|_| Decoded {
        items: Vec::new(),
        error: Some(
            Error::new(ErrorKind::Internal)
                .with_message("collector thread panicked")
                .with_path(path),
        ),
    })
}

/// Decode the array at `path` straight into a caller-owned channel.
///
/// `tx` is consumed and closed when this returns, on success and on every
/// failure path. A closed channel with an `Ok` return means the whole array
/// was delivered.
pub fn decode_file_to_channel<T>(
    path: impl AsRef<Path>,
    tx: Sender<T>,
    cancel: &CancelToken,
) -> Result<u64, Error>
where
    T: DeserializeOwned,
{
    decode_file(path.as_ref(), |value: T| handoff(&tx, value, cancel))
}

/// Handle over a producer thread that streams `Entry<T>` values.
///
/// Dropping the handle cancels the producer and waits for it to release the
/// file.
pub struct JsonStream<T> {
    path: PathBuf,
    rx: Receiver<Entry<T>>,
    cancel: CancelSource,
    producer: Option<JoinHandle<()>>,
}

impl<T> JsonStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = crossbeam_channel::bounded::<Entry<T>>(0);
        let cancel = CancelSource::new();
        let token = cancel.token();
        let producer_path = path.clone();
        let producer = thread::spawn(move || produce_entries(&producer_path, tx, &token));
        Self {
            path,
            rx,
            cancel,
            producer: Some(producer),
        }
    }
}

impl<T> JsonStream<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receiver side of the stream; closes after the terminal signal.
    pub fn watch(&self) -> &Receiver<Entry<T>> {
        &self.rx
    }

    pub fn cancel(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> Iterator for JsonStream<T> {
    type Item = Entry<T>;

    fn next(&mut self) -> Option<Entry<T>> {
        self.rx.recv().ok()
    }
}

impl<T> Drop for JsonStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(producer) = self.producer.take() {
            let _ = producer.join();
        }
    }
}
