//! Purpose: Hold top-level CLI command dispatch for `swisskit`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every spawned producer thread is joined before a command returns.
//! Invariants: Throughput statistics are logged here, never inside the library.

use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use clap::CommandFactory;
use crossbeam_channel::Receiver;
use swisskit::api::{
    CancelSource, DEFAULT_RETRY_DELAY, LineOptions, RetryPolicy, chunk, decode_file_to_channel,
    decode_file_to_collection, file_size_in, parse_duration, parse_size, read_lines, retry_when,
    stream_lines,
};
use tracing::info;

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Json { path } => {
            let start = Instant::now();
            let records = decode_file_to_collection::<Record>(&path).into_result()?;
            report_throughput("json", &path, records.len() as u64, start.elapsed());
            Ok(RunOutcome::ok())
        }
        Command::StreamJson { path, emit } => {
            let start = Instant::now();
            let (tx, rx) = crossbeam_channel::bounded::<Record>(0);
            let cancel = CancelSource::new();
            let token = cancel.token();
            let producer_path = path.clone();
            let producer =
                thread::spawn(move || decode_file_to_channel(&producer_path, tx, &token));
            let count = consume(rx, producer, cancel, |record| {
                if emit {
                    emit_line(&record)?;
                }
                Ok(())
            })?;
            report_throughput("stream-json", &path, count, start.elapsed());
            Ok(RunOutcome::ok())
        }
        Command::Lines {
            path,
            max_line_size,
        } => {
            let options = line_options(&max_line_size)?;
            let start = Instant::now();
            let lines = read_lines(&path, options)?;
            report_throughput("lines", &path, lines.len() as u64, start.elapsed());
            Ok(RunOutcome::ok())
        }
        Command::StreamLines {
            path,
            max_line_size,
            emit,
        } => {
            let options = line_options(&max_line_size)?;
            let start = Instant::now();
            let (tx, rx) = crossbeam_channel::bounded::<String>(0);
            let cancel = CancelSource::new();
            let token = cancel.token();
            let producer_path = path.clone();
            let producer =
                thread::spawn(move || stream_lines(&producer_path, tx, &token, options));
            let count = consume(rx, producer, cancel, |line| {
                if emit {
                    emit_line(&line)?;
                }
                Ok(())
            })?;
            report_throughput("stream-lines", &path, count, start.elapsed());
            Ok(RunOutcome::ok())
        }
        Command::Size {
            path,
            unit,
            retry,
            retry_delay,
        } => {
            let unit = SizeUnit::from(unit);
            let size = if retry == 0 {
                file_size_in(&path, unit)?
            } else {
                let delay = match retry_delay.as_deref() {
                    Some(value) => parse_duration(value)?,
                    None => DEFAULT_RETRY_DELAY,
                };
                let policy = RetryPolicy::new(retry.saturating_add(1), delay);
                retry_when(policy, is_transient, |_| file_size_in(&path, unit))?
            };
            emit_json(json!({
                "path": path.display().to_string(),
                "unit": unit.label(),
                "size": size,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Chunk { size, items } => {
            let size = usize::try_from(size).map_err(|_| {
                Error::new(ErrorKind::Usage)
                    .with_message("chunk size must be greater than zero")
                    .with_hint("Use --size 1 or larger.")
            })?;
            let items = if items.is_empty() {
                (1..=7).collect()
            } else {
                items
            };
            let chunks = chunk(&items, size)?;
            emit_json(json!({ "size": size, "chunks": chunks }));
            Ok(RunOutcome::ok())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "swisskit", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

/// Drain `rx` on this thread, then join the producer.
///
/// A consumer failure cancels the producer; its error wins over the
/// producer's resulting `Cancelled`.
fn consume<T, F>(
    rx: Receiver<T>,
    producer: JoinHandle<Result<u64, Error>>,
    mut cancel: CancelSource,
    mut on_item: F,
) -> Result<u64, Error>
where
    F: FnMut(T) -> Result<(), Error>,
{
    let mut count = 0u64;
    for item in rx.iter() {
        if let Err(err) = on_item(item) {
            cancel.cancel();
            let _ = join_producer(producer);
            return Err(err);
        }
        count += 1;
    }
    join_producer(producer)?;
    Ok(count)
}

fn join_producer(producer: JoinHandle<Result<u64, Error>>) -> Result<u64, Error> {
    producer.join().map_err(|_| {
        Error::new(ErrorKind::Internal).with_message("producer thread panicked")
    })?
}

fn line_options(max_line_size: &str) -> Result<LineOptions, Error> {
    let bytes = parse_size(max_line_size)?;
    let max_line_bytes = usize::try_from(bytes).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("max line size does not fit in memory")
            .with_source(err)
    })?;
    Ok(LineOptions { max_line_bytes })
}

fn is_transient(err: &Error) -> bool {
    if err.kind() != ErrorKind::Io {
        return false;
    }
    std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .is_some_and(|io_err| {
            matches!(
                io_err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            )
        })
}

fn report_throughput(command: &str, path: &Path, count: u64, elapsed: Duration) {
    let per_sec = throughput(count, elapsed);
    let elapsed_ms = elapsed.as_millis() as u64;
    info!(
        command,
        path = %path.display(),
        records = count,
        elapsed_ms,
        "{count} records fetched in {elapsed_ms}ms ({per_sec:.0} records/sec)"
    );
    emit_json(json!({
        "command": command,
        "path": path.display().to_string(),
        "records": count,
        "elapsed_ms": elapsed_ms,
        "records_per_sec": per_sec,
    }));
}

#[cfg(test)]
mod tests {
    use super::{is_transient, line_options};
    use std::io;
    use swisskit::api::{Error, ErrorKind};

    #[test]
    fn line_options_parse_suffixes() {
        assert_eq!(line_options("64K").expect("options").max_line_bytes, 65_536);
        assert_eq!(line_options("bogus").unwrap_err().kind(), ErrorKind::Usage);
    }

    #[test]
    fn only_transient_io_errors_are_retried() {
        let interrupted = Error::new(ErrorKind::Io)
            .with_source(io::Error::new(io::ErrorKind::Interrupted, "eintr"));
        assert!(is_transient(&interrupted));

        let missing = Error::new(ErrorKind::NotFound)
            .with_source(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(!is_transient(&missing));

        let other_io = Error::new(ErrorKind::Io).with_source(io::Error::other("disk on fire"));
        assert!(!is_transient(&other_io));
    }
}
