//! Purpose: Cooperative cancellation for streaming producers.
//! Exports: `CancelSource`, `CancelToken`, `handoff`.
//! Role: Lets a consumer stop a producer that is blocked on a rendezvous send.
//! Invariants: Cancellation is one-way; once signalled it stays signalled.
//! Invariants: Dropping the `CancelSource` signals cancellation.
use crossbeam_channel::{Receiver, Sender, TryRecvError, never, select};

use super::error::{Error, ErrorKind};

/// Owner side of a cancellation signal.
///
/// The signal is the disconnection of an internal channel, so every clone of
/// the token observes it without locks.
#[derive(Debug)]
pub struct CancelSource {
    signal: Option<Sender<()>>,
    token: CancelToken,
}

/// Observer side of a cancellation signal; cheap to clone and `Send`.
#[derive(Clone, Debug)]
pub struct CancelToken {
    signal: Receiver<()>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            signal: Some(tx),
            token: CancelToken { signal: rx },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&mut self) {
        self.signal.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_none()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { signal: never() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }
}

pub(crate) fn cancelled_error() -> Error {
    Error::new(ErrorKind::Cancelled).with_message("stream cancelled")
}

/// Block until `value` is taken by the receiver or the token fires.
///
/// A disconnected receiver counts as cancellation.
pub(crate) fn handoff<T>(tx: &Sender<T>, value: T, cancel: &CancelToken) -> Result<(), Error> {
    if cancel.is_cancelled() {
        return Err(cancelled_error());
    }
    select! {
        send(tx, value) -> res => res.map_err(|_| {
            Error::new(ErrorKind::Cancelled).with_message("receiver disconnected")
        }),
        recv(cancel.signal) -> _ => Err(cancelled_error()),
    }
}
