//! Purpose: `swisskit` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, initialises logging, runs commands, emits JSON on stdout.
//! Invariants: Command summaries are JSON on stdout (pretty on a TTY).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use swisskit::api::{Error, ErrorKind, SizeUnit, to_exit_code};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

/// Element shape used by the JSON commands.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
struct Record {
    name: String,
    language: String,
    id: String,
    bio: String,
    version: f32,
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `swisskit --help` for usage."));
            }
        },
    };

    init_tracing();
    command_dispatch::dispatch_command(cli.command)
}

#[derive(Parser)]
#[command(
    name = "swisskit",
    version,
    about = "Streaming file and collection utilities",
    long_about = None,
    after_help = r#"EXAMPLES
  $ swisskit json example.json
  $ swisskit stream-json example.json --emit
  $ swisskit stream-lines notes.txt --max-line-size 64M
  $ swisskit size dump.bin --unit gib --retry 3 --retry-delay 100ms
  $ swisskit chunk --size 3 1 2 3 4 5 6 7

NOTES
  - Set RUST_LOG=debug for stream lifecycle events.
  - Summaries are JSON on stdout; errors go to stderr."#,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SizeUnitCli {
    Bytes,
    Kib,
    Mib,
    Gib,
    Tib,
}

impl From<SizeUnitCli> for SizeUnit {
    fn from(value: SizeUnitCli) -> Self {
        match value {
            SizeUnitCli::Bytes => SizeUnit::Bytes,
            SizeUnitCli::Kib => SizeUnit::KiB,
            SizeUnitCli::Mib => SizeUnit::MiB,
            SizeUnitCli::Gib => SizeUnit::GiB,
            SizeUnitCli::Tib => SizeUnit::TiB,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Decode a JSON array of records into memory",
        long_about = r#"Decode a top-level JSON array of records, buffering every element.

Each element is decoded into {name, language, id, bio, version}; unknown fields
are ignored and missing fields take their defaults."#
    )]
    Json {
        #[arg(default_value = "example.json", value_hint = ValueHint::FilePath)]
        path: PathBuf,
    },
    #[command(
        name = "stream-json",
        about = "Stream a JSON array of records through a channel"
    )]
    StreamJson {
        #[arg(default_value = "example.json", value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, help = "Print each record as a JSON line")]
        emit: bool,
    },
    #[command(about = "Read a text file into memory line by line")]
    Lines {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(
            long,
            default_value = "10M",
            help = "Longest accepted line (bytes or K/M/G)"
        )]
        max_line_size: String,
    },
    #[command(
        name = "stream-lines",
        about = "Stream a text file line by line through a channel"
    )]
    StreamLines {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(
            long,
            default_value = "10M",
            help = "Longest accepted line (bytes or K/M/G)"
        )]
        max_line_size: String,
        #[arg(long, help = "Print each line as a JSON string")]
        emit: bool,
    },
    #[command(about = "Report a file's size in a binary unit")]
    Size {
        #[arg(value_hint = ValueHint::FilePath)]
        path: PathBuf,
        #[arg(long, value_enum, default_value = "mib")]
        unit: SizeUnitCli,
        #[arg(long, default_value_t = 0, help = "Retry count for transient failures")]
        retry: u32,
        #[arg(long, help = "Delay between retries (e.g. 50ms, 1s, 2m)")]
        retry_delay: Option<String>,
    },
    #[command(
        about = "Split integers into fixed-size chunks",
        after_help = r#"EXAMPLES
  $ swisskit chunk
  $ swisskit chunk --size 3 10 20 30 40"#
    )]
    Chunk {
        #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
        size: i64,
        #[arg(allow_negative_numbers = true, help = "Items to chunk (default 1..=7)")]
        items: Vec<i64>,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Elements per second, or zero when no time has elapsed.
fn throughput(count: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_line(value: &impl Serialize) -> Result<(), Error> {
    let json = serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    println!("{json}");
    Ok(())
}

fn colorize_label(label: &str, enabled: bool) -> String {
    if !enabled {
        return label.to_string();
    }
    format!("\u{1b}[31m{label}\u{1b}[0m")
}

fn emit_error(err: &Error) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, true));
        return;
    }

    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    let fallback = match err.kind() {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::NotFound => "not found",
        ErrorKind::Permission => "permission denied",
        ErrorKind::Io => "i/o error",
        ErrorKind::Framing => "invalid array framing",
        ErrorKind::Decode => "decode error",
        ErrorKind::TooLong => "line too long",
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::Exhausted => "retries exhausted",
    };
    fallback.to_string()
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = std::error::Error::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(index) = err.index() {
        inner.insert("index".to_string(), json!(index));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = vec![format!(
        "{} {}",
        colorize_label("error:", use_color),
        error_message(err)
    )];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(index) = err.index() {
        lines.push(format!("index: {index}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, Record, SizeUnitCli, error_json, error_text, throughput};
    use clap::Parser;
    use std::path::PathBuf;
    use std::time::Duration;
    use swisskit::api::{Error, ErrorKind, SizeUnit};

    #[test]
    fn json_command_defaults_to_example_file() {
        let cli = Cli::try_parse_from(["swisskit", "json"]).expect("parse");
        match cli.command {
            Command::Json { path } => assert_eq!(path, PathBuf::from("example.json")),
            _ => panic!("expected json command"),
        }
    }

    #[test]
    fn chunk_accepts_negative_size_for_later_validation() {
        let cli = Cli::try_parse_from(["swisskit", "chunk", "--size", "-2", "1", "-3"])
            .expect("parse");
        match cli.command {
            Command::Chunk { size, items } => {
                assert_eq!(size, -2);
                assert_eq!(items, vec![1, -3]);
            }
            _ => panic!("expected chunk command"),
        }
    }

    #[test]
    fn size_unit_maps_to_library_unit() {
        assert_eq!(SizeUnit::from(SizeUnitCli::Gib), SizeUnit::GiB);
        assert_eq!(SizeUnit::from(SizeUnitCli::Bytes), SizeUnit::Bytes);
    }

    #[test]
    fn record_ignores_unknown_and_defaults_missing() {
        let record: Record =
            serde_json::from_str(r#"{"name":"go","version":1.5,"stars":10}"#).expect("record");
        assert_eq!(record.name, "go");
        assert_eq!(record.version, 1.5);
        assert!(record.language.is_empty());
    }

    #[test]
    fn throughput_handles_zero_elapsed() {
        assert_eq!(throughput(10, Duration::ZERO), 0.0);
        assert_eq!(throughput(10, Duration::from_secs(2)), 5.0);
    }

    #[test]
    fn error_json_includes_index_and_causes() {
        let err = Error::new(ErrorKind::Decode)
            .with_message("failed to decode element")
            .with_index(4)
            .with_path("data.json")
            .with_source(std::io::Error::other("bad field"));
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Decode");
        assert_eq!(value["error"]["index"], 4);
        assert_eq!(value["error"]["path"], "data.json");
        assert_eq!(value["error"]["causes"][0], "bad field");

        let text = error_text(&err, false);
        assert!(text.starts_with("error: failed to decode element"));
        assert!(text.contains("index: 4"));
    }
}
