#![forbid(unsafe_code)]

//! Command-line argument parsing for the kiosk.
//!
//! Parses args manually to keep the binary lean. Supports environment
//! variable overrides via the `ALLOT_*` prefix; explicit flags win.

use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use allot::{Amount, Mode, Size};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) const HELP_TEXT: &str = "\
Allot Kiosk - participatory budget allocation

USAGE:
    allot-kiosk [OPTIONS]

OPTIONS:
    --multiuser          Shared kiosk: submissions are recorded and the board resets
    --budget=N           Total budget in dollars (default: 32000000)
    --state-file=PATH    Persist state to PATH (default: $XDG_STATE_HOME/allot/kiosk/state.json)
    --ephemeral          Keep state in memory only
    --viewport=WxH       Scene size used for layout (default: 1280x720)
    --debounce-ms=N      Quiet period before state is written (default: 300)
    --export-dir=PATH    Directory for history exports (default: .)
    --log-json           Emit logs as JSON lines on stderr
    --help, -h           Show this help message
    --version, -V        Show version

Commands are read from stdin, one per line. Type 'help' once running.

ENVIRONMENT VARIABLES:
    ALLOT_MULTIUSER       Override --multiuser (1|true)
    ALLOT_BUDGET          Override --budget
    ALLOT_STATE_FILE      Override --state-file
    ALLOT_VIEWPORT        Override --viewport
    ALLOT_DEBOUNCE_MS     Override --debounce-ms
    ALLOT_EXPORT_DIR      Override --export-dir
    ALLOT_LOG_JSON        Override --log-json (1|true)
    ALLOT_LOG             Log filter, e.g. 'allot_runtime=debug' (falls back to RUST_LOG)";

/// Where session state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChoice {
    /// Platform state directory.
    Default,
    /// Explicit file.
    File(PathBuf),
    /// In memory, lost on exit.
    Memory,
}

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Deployment mode.
    pub mode: Mode,
    /// Budget override.
    pub budget: Option<Amount>,
    /// Storage location.
    pub storage: StorageChoice,
    /// Layout viewport.
    pub viewport: Size,
    /// Persist quiet period.
    pub debounce: Option<Duration>,
    /// Export directory.
    pub export_dir: PathBuf,
    /// JSON log output.
    pub log_json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            mode: Mode::SingleUser,
            budget: None,
            storage: StorageChoice::Default,
            viewport: Size::new(1280.0, 720.0),
            debounce: None,
            export_dir: PathBuf::from("."),
            log_json: false,
        }
    }
}

/// Result of parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Run with these options.
    Run(Opts),
    /// Print help and exit.
    Help,
    /// Print version and exit.
    Version,
}

impl Opts {
    /// Parse process arguments and environment, exiting on `--help`,
    /// `--version`, or a bad value.
    pub fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();
        match Self::parse_from(&args, |key| env::var(key).ok()) {
            Ok(Parsed::Run(opts)) => opts,
            Ok(Parsed::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Parsed::Version) => {
                println!("allot-kiosk {VERSION}");
                process::exit(0);
            }
            Err(msg) => {
                eprintln!("{msg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    /// Parse `args` with `env` supplying environment variables.
    ///
    /// Environment variables take precedence over defaults but are
    /// overridden by explicit command-line flags. Malformed environment
    /// values are ignored; malformed flags are errors.
    pub fn parse_from<F>(args: &[String], env: F) -> Result<Parsed, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if env("ALLOT_MULTIUSER").is_some_and(|v| truthy(&v)) {
            opts.mode = Mode::MultiUser;
        }
        if let Some(val) = env("ALLOT_BUDGET")
            && let Ok(n) = val.parse()
        {
            opts.budget = Some(n);
        }
        if let Some(val) = env("ALLOT_STATE_FILE")
            && !val.is_empty()
        {
            opts.storage = StorageChoice::File(PathBuf::from(val));
        }
        if let Some(val) = env("ALLOT_VIEWPORT")
            && let Some(size) = parse_viewport(&val)
        {
            opts.viewport = size;
        }
        if let Some(val) = env("ALLOT_DEBOUNCE_MS")
            && let Ok(n) = val.parse()
        {
            opts.debounce = Some(Duration::from_millis(n));
        }
        if let Some(val) = env("ALLOT_EXPORT_DIR")
            && !val.is_empty()
        {
            opts.export_dir = PathBuf::from(val);
        }
        if env("ALLOT_LOG_JSON").is_some_and(|v| truthy(&v)) {
            opts.log_json = true;
        }

        // Parse command-line args (override env vars)
        for arg in args {
            match arg.as_str() {
                "--help" | "-h" => return Ok(Parsed::Help),
                "--version" | "-V" => return Ok(Parsed::Version),
                "--multiuser" => opts.mode = Mode::MultiUser,
                "--ephemeral" => opts.storage = StorageChoice::Memory,
                "--log-json" => opts.log_json = true,
                other => {
                    if let Some(val) = other.strip_prefix("--budget=") {
                        match val.parse() {
                            Ok(n) => opts.budget = Some(n),
                            Err(_) => return Err(format!("Invalid --budget value: {val}")),
                        }
                    } else if let Some(val) = other.strip_prefix("--state-file=") {
                        opts.storage = StorageChoice::File(PathBuf::from(val));
                    } else if let Some(val) = other.strip_prefix("--viewport=") {
                        match parse_viewport(val) {
                            Some(size) => opts.viewport = size,
                            None => return Err(format!("Invalid --viewport value: {val}")),
                        }
                    } else if let Some(val) = other.strip_prefix("--debounce-ms=") {
                        match val.parse() {
                            Ok(n) => opts.debounce = Some(Duration::from_millis(n)),
                            Err(_) => return Err(format!("Invalid --debounce-ms value: {val}")),
                        }
                    } else if let Some(val) = other.strip_prefix("--export-dir=") {
                        opts.export_dir = PathBuf::from(val);
                    } else {
                        return Err(format!("Unknown argument: {other}"));
                    }
                }
            }
        }

        Ok(Parsed::Run(opts))
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_viewport(value: &str) -> Option<Size> {
    let (w, h) = value.split_once(['x', 'X'])?;
    let width: f64 = w.trim().parse().ok()?;
    let height: f64 = h.trim().parse().ok()?;
    (width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0)
        .then(|| Size::new(width, height))
}
