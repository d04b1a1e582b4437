#![forbid(unsafe_code)]

//! Line-driven kiosk host.
//!
//! Each input line is one [`Command`]. Most commands map directly to an
//! [`Intent`] handed to the scene; the rest inspect or export state. The
//! loop polls the session store's debouncer after every line and whenever a
//! deferred save falls due, and flushes on exit.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use allot::runtime::export::{history_to_csv, history_to_json, timestamped_filename};
use allot::runtime::scene::CashStackState;
use allot::{
    Amount, GameConfig, Intent, Mode, Point, Result, Scene, SceneOutcome, SessionStore, Size,
    StorageBackend, format_amount,
};

pub(crate) const COMMAND_HELP: &str = "\
COMMANDS:
    drop AMOUNT BUCKET     Drop one bill (e.g. 10M, 500K, 100000) on a bucket
    drop-at AMOUNT X Y     Drop one bill at a scene position
    slide BUCKET FRACTION  Move a bucket slider to FRACTION (0..1) of its range
    submit                 Record the allocation and reset (multi-user)
    cancel                 Reset the allocation without recording it
    meta ZIP [REGION...]   Attach details to the next submission ('-' for no ZIP)
    clear-history          Drop every recorded submission
    screenshot             Request a capture (single-user)
    resize W H             Lay the scene out for a new viewport
    status                 Show buckets, stacks, and remaining cash
    history                List recorded submissions
    export csv|json        Write history to the export directory
    help                   Show this list
    quit                   Save and exit";

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values.
    Csv,
    /// Pretty-printed JSON.
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Forward an intent to the scene.
    Intent(Intent),
    /// Print the board.
    Status,
    /// Print recorded submissions.
    History,
    /// Write history to a file.
    Export(ExportFormat),
    /// Print the command list.
    Help,
    /// Flush and stop.
    Quit,
}

impl Command {
    /// Parse a line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match (verb.as_str(), args.as_slice()) {
            ("drop", [amount, bucket]) => Self::Intent(Intent::DropCashOnBucket {
                denomination: parse_amount(amount)?,
                bucket: parse_index(bucket)?,
            }),
            ("drop-at", [amount, x, y]) => Self::Intent(Intent::DropCash {
                denomination: parse_amount(amount)?,
                at: Point::new(parse_float(x)?, parse_float(y)?),
            }),
            ("slide", [bucket, fraction]) => Self::Intent(Intent::Slide {
                bucket: parse_index(bucket)?,
                fraction: parse_float(fraction)?,
            }),
            ("submit", []) => Self::Intent(Intent::SubmitSession),
            ("cancel", []) => Self::Intent(Intent::CancelSession),
            ("clear-history", []) => Self::Intent(Intent::ClearHistory),
            ("meta", [zip, region @ ..]) => Self::Intent(Intent::AttachMetadata {
                region: (!region.is_empty()).then(|| region.join(" ")),
                postal_code: (*zip != "-").then(|| zip.to_string()),
            }),
            ("screenshot", []) => Self::Intent(Intent::Screenshot),
            ("resize", [w, h]) => Self::Intent(Intent::Resize {
                width: parse_float(w)?,
                height: parse_float(h)?,
            }),
            ("status", []) => Self::Status,
            ("history", []) => Self::History,
            ("export", [format]) => match format.to_ascii_lowercase().as_str() {
                "csv" => Self::Export(ExportFormat::Csv),
                "json" => Self::Export(ExportFormat::Json),
                other => return Err(format!("unknown export format: {other}")),
            },
            ("help" | "?", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => return Err(format!("unrecognised command: {line} (try 'help')")),
        };
        Ok(Some(command))
    }
}

/// Parse a dollar amount such as `10M`, `$500k`, `1,000,000`, or `250000`.
pub fn parse_amount(text: &str) -> std::result::Result<Amount, String> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    let (digits, multiplier) = match cleaned.chars().last() {
        Some('m' | 'M') => (&cleaned[..cleaned.len() - 1], 1_000_000),
        Some('k' | 'K') => (&cleaned[..cleaned.len() - 1], 1_000),
        _ => (cleaned.as_str(), 1),
    };
    digits
        .parse::<Amount>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid amount: {text}"))
}

fn parse_index(text: &str) -> std::result::Result<usize, String> {
    text.parse()
        .map_err(|_| format!("invalid bucket index: {text}"))
}

fn parse_float(text: &str) -> std::result::Result<f64, String> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid number: {text}"))
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text to show the operator.
    Text(String),
    /// Stop reading input.
    Quit,
}

/// The kiosk: one session store, one scene.
pub struct KioskApp {
    config: GameConfig,
    store: SessionStore,
    scene: Scene,
    export_dir: PathBuf,
}

impl KioskApp {
    /// Open the session and build the scene.
    pub fn new(
        config: GameConfig,
        mode: Mode,
        viewport: Size,
        backend: impl StorageBackend + 'static,
        export_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let store = SessionStore::open(&config, mode, backend)?;
        let scene = Scene::new(&config, mode, viewport, store.allocation())?;
        Ok(Self {
            config,
            store,
            scene,
            export_dir: export_dir.into(),
        })
    }

    /// The session store.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Messages for user-facing notices raised while opening the session.
    pub fn take_notice_messages(&mut self) -> Vec<String> {
        self.store
            .take_notices()
            .iter()
            .filter(|n| n.is_user_facing())
            .map(|n| n.message())
            .collect()
    }

    /// Execute one command.
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        let text = match command {
            Command::Intent(intent) => {
                let outcome = self.scene.handle(intent, &mut self.store)?;
                self.describe(&outcome)
            }
            Command::Status => self.status(),
            Command::History => self.history(),
            Command::Export(format) => {
                let path = self.export(format)?;
                format!("wrote {}", path.display())
            }
            Command::Help => COMMAND_HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    /// Poll the persistence debouncer at `now`.
    pub fn tick_at(&mut self, now: Instant) -> Result<bool> {
        Ok(self.store.tick_at(now)?)
    }

    /// Write any outstanding state.
    pub fn shutdown(&mut self) -> Result<bool> {
        Ok(self.store.flush()?)
    }

    fn describe(&self, outcome: &SceneOutcome) -> String {
        match outcome {
            SceneOutcome::Allocated { bucket, amount } => format!(
                "{} now holds {} ({} left)",
                self.bucket_name(*bucket),
                format_amount(*amount),
                format_amount(self.store.remaining_cash())
            ),
            SceneOutcome::Ignored { reason } => format!("nothing happened: {reason}"),
            SceneOutcome::Submitted { submissions } => {
                format!("Submission received. Thank you! ({submissions} recorded)")
            }
            SceneOutcome::SessionCancelled => "session cancelled".to_string(),
            SceneOutcome::HistoryCleared => "history cleared".to_string(),
            SceneOutcome::MetadataAttached => "details attached to the next submission".to_string(),
            SceneOutcome::ScreenshotRequested { filename } => {
                format!("capture requested: {filename}")
            }
            SceneOutcome::Reflowed => {
                let size = self.scene.viewport();
                format!("layout updated for {}x{}", size.width, size.height)
            }
        }
    }

    fn bucket_name(&self, index: usize) -> String {
        self.config
            .bucket_labels
            .get(index)
            .map(|l| l.replace('\n', " "))
            .unwrap_or_else(|| format!("bucket {index}"))
    }

    /// Render the board as text.
    #[must_use]
    pub fn status(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Remaining: {}",
            self.scene.remainder_text().unwrap_or_default()
        );
        for bucket in self.scene.buckets() {
            let _ = writeln!(
                out,
                "  [{}] {:<28} {:>14}",
                bucket.index,
                bucket.label.replace('\n', " "),
                bucket.amount_text
            );
        }
        let stacks: Vec<String> = self
            .scene
            .cash_stacks()
            .map(|c| {
                let state = match c.state {
                    CashStackState::Stack => "stack",
                    CashStackState::Single => "single",
                    CashStackState::Empty => "empty",
                };
                format!("{}={state}", c.denomination.label)
            })
            .collect();
        let _ = writeln!(out, "Cash: {}", stacks.join(" "));
        if let Some(endgame) = self.scene.endgame() {
            let _ = write!(
                out,
                "{}: {}",
                endgame.kind.label(),
                if endgame.visible { "ready" } else { "hidden" }
            );
        }
        out
    }

    fn history(&self) -> String {
        let records = self.store.all_history_records();
        if records.is_empty() {
            return "no submissions recorded".to_string();
        }
        let mut out = String::new();
        for (i, record) in records.iter().enumerate() {
            let amounts: Vec<String> = record.amounts().iter().map(|a| format_amount(*a)).collect();
            let _ = write!(out, "#{} {}", i + 1, amounts.join(" "));
            let meta = record.metadata();
            if let Some(zip) = &meta.postal_code {
                let _ = write!(out, " zip={zip}");
            }
            if let Some(region) = &meta.region {
                let _ = write!(out, " region={region}");
            }
            out.push('\n');
        }
        out.pop();
        out
    }

    fn export(&self, format: ExportFormat) -> Result<PathBuf> {
        let records = self.store.all_history_records();
        let body = match format {
            ExportFormat::Csv => history_to_csv(records, &self.config.bucket_labels),
            ExportFormat::Json => history_to_json(records, &self.config.bucket_labels)?,
        };
        std::fs::create_dir_all(&self.export_dir)?;
        let path = self
            .export_dir
            .join(timestamped_filename("user_history", format.extension()));
        std::fs::write(&path, body)?;
        tracing::info!(path = %path.display(), records = records.len(), "history exported");
        Ok(path)
    }

    /// Export directory.
    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }
}

/// Read commands from `input` until EOF or `quit`, writing replies to
/// `output`. Command errors are reported and the loop continues.
///
/// Input is read on a background thread so deferred saves land on time
/// while the kiosk sits idle.
pub fn run<R, W>(app: &mut KioskApp, input: R, output: W) -> Result<()>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    run_lines(app, spawn_reader(input), output)
}

/// Forward lines from `input` over a channel until EOF or a read error.
pub fn spawn_reader<R>(input: R) -> Receiver<io::Result<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("kiosk-input".into())
        .spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn input reader");
    }
    rx
}

/// Drive the kiosk from a channel of lines. A closed channel is EOF.
///
/// Between lines the loop sleeps only until the next deferred save is due.
pub fn run_lines<W: Write>(
    app: &mut KioskApp,
    lines: Receiver<io::Result<String>>,
    mut output: W,
) -> Result<()> {
    for message in app.take_notice_messages() {
        writeln!(output, "notice: {message}")?;
    }

    loop {
        let next = match app.store().time_until_persist_at(Instant::now()) {
            Some(wait) => match lines.recv_timeout(wait) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match lines.recv() {
                Ok(line) => Some(line),
                Err(_) => break,
            },
        };

        if let Some(line) = next
            && execute_line(app, &line?, &mut output)? == Some(Reply::Quit)
        {
            break;
        }

        if let Err(e) = app.tick_at(Instant::now()) {
            tracing::warn!(error = %e, "deferred save failed");
            writeln!(output, "error: {e}")?;
        }
    }

    app.shutdown()?;
    output.flush()?;
    Ok(())
}

fn execute_line<W: Write>(app: &mut KioskApp, line: &str, output: &mut W) -> Result<Option<Reply>> {
    let reply = match Command::parse(line) {
        Ok(None) => None,
        Ok(Some(command)) => match app.execute(command) {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::debug!(error = %e, "command failed");
                Some(Reply::Text(format!("error: {e}")))
            }
        },
        Err(msg) => Some(Reply::Text(format!("error: {msg}"))),
    };
    if let Some(Reply::Text(text)) = &reply {
        writeln!(output, "{text}")?;
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount("10M"), Ok(10_000_000));
        assert_eq!(parse_amount("$5m"), Ok(5_000_000));
        assert_eq!(parse_amount("100K"), Ok(100_000));
        assert_eq!(parse_amount("1,000,000"), Ok(1_000_000));
        assert_eq!(parse_amount("250000"), Ok(250_000));
        assert!(parse_amount("M").is_err());
        assert!(parse_amount("ten").is_err());
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("  "), Ok(None));
        assert_eq!(Command::parse("# comment"), Ok(None));
        assert_eq!(
            Command::parse("drop 10M 2"),
            Ok(Some(Command::Intent(Intent::DropCashOnBucket {
                denomination: 10_000_000,
                bucket: 2
            })))
        );
        assert_eq!(
            Command::parse("meta 94612 West Oakland"),
            Ok(Some(Command::Intent(Intent::AttachMetadata {
                region: Some("West Oakland".into()),
                postal_code: Some("94612".into())
            })))
        );
        assert_eq!(
            Command::parse("meta -"),
            Ok(Some(Command::Intent(Intent::AttachMetadata {
                region: None,
                postal_code: None
            })))
        );
        assert_eq!(
            Command::parse("EXPORT Json"),
            Ok(Some(Command::Export(ExportFormat::Json)))
        );
        assert!(Command::parse("drop 10M").is_err());
        assert!(Command::parse("slide 1 NaN").is_err());
        assert!(Command::parse("dance").is_err());
    }
}
