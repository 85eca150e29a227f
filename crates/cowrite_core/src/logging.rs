//! Core logging bootstrap and safety policy.
//!
//! # Responsibility
//! - Initialize file-based rolling logs exactly once per process.
//! - Emit stable, metadata-only diagnostic events from core.
//!
//! # Invariants
//! - Logging init is idempotent for the same directory and level.
//! - Logging initialization must not panic.
//! - Re-initialization with a different directory or level is rejected.
//!
//! # See also
//! - docs/architecture/logging.md

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::PathBuf;

const LOG_FILE_BASENAME: &str = "cowrite";
const ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const ROTATE_KEEP_FILES: usize = 5;
const PANIC_PAYLOAD_MAX_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogging> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogging {
    settings: LogSettings,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LogSettings {
    level: &'static str,
    dir: PathBuf,
}

impl LogSettings {
    fn resolve(level: &str, log_dir: &str) -> Result<Self, String> {
        let level = canonical_level(level)?;

        let dir = log_dir.trim();
        if dir.is_empty() {
            return Err("log directory must not be empty".to_string());
        }
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(format!(
                "log directory must be an absolute path, got `{}`",
                dir.display()
            ));
        }

        Ok(Self { level, dir })
    }
}

/// Initializes core logging with level and directory.
///
/// # Invariants
/// - Repeated calls with the same `level` and `log_dir` are idempotent.
/// - Re-initialization with a different `level` or `log_dir` is rejected.
/// - Initialization never panics.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be
///   created.
/// - Returns an error when logger backend setup fails.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let requested = LogSettings::resolve(level, log_dir)?;

    let active = ACTIVE.get_or_try_init(|| -> Result<ActiveLogging, String> {
        let handle = start_file_logger(&requested)?;
        install_panic_hook();
        info!(
            "event=core_init module=core status=ok level={} log_dir={} version={}",
            requested.level,
            requested.dir.display(),
            env!("CARGO_PKG_VERSION")
        );
        Ok(ActiveLogging {
            settings: requested.clone(),
            _handle: handle,
        })
    })?;

    // A losing racer (or a later caller) may hold settings that differ from
    // the ones the winner installed.
    if active.settings != requested {
        return Err(format!(
            "logging already active with level={} log_dir={}; refusing to reconfigure to level={} log_dir={}",
            active.settings.level,
            active.settings.dir.display(),
            requested.level,
            requested.dir.display()
        ));
    }

    Ok(())
}

/// Returns active logging status metadata.
///
/// Returns `None` when logging has not been initialized, otherwise the
/// active `(level, log_dir)` pair.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.settings.level, active.settings.dir.clone()))
}

/// Returns the default log level for the current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_file_logger(settings: &LogSettings) -> Result<LoggerHandle, String> {
    std::fs::create_dir_all(&settings.dir).map_err(|err| {
        format!(
            "cannot create log directory `{}`: {err}",
            settings.dir.display()
        )
    })?;

    Logger::try_with_str(settings.level)
        .map_err(|err| format!("unsupported log level `{}`: {err}", settings.level))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(ROTATE_KEEP_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        // [YYYY-MM-DD HH:MM:SS.ffffff TZ] LEVEL [module] file:line: message
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("cannot start file logger: {err}"))
}

fn canonical_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unknown log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn install_panic_hook() {
    // First caller wins; every logger init path funnels through here.
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let inner = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        error!(
            "event=panic_captured module=core status=error location={location} payload={}",
            panic_payload(info)
        );
        inner(info);
    }));
}

fn panic_payload(info: &std::panic::PanicHookInfo<'_>) -> String {
    let raw = info
        .payload()
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    // Payloads may carry user-controlled text; keep the log line intact.
    single_line_capped(&raw, PANIC_PAYLOAD_MAX_CHARS)
}

fn single_line_capped(value: &str, max_chars: usize) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }

    let mut capped: String = flat.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}

#[cfg(test)]
mod tests {
    use super::{canonical_level, init_logging, logging_status, single_line_capped, LogSettings};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "cowrite-log-test-{}-{tag}-{unique}",
            std::process::id()
        ))
    }

    #[test]
    fn level_names_normalize_case_and_aliases() {
        assert_eq!(canonical_level("INFO"), Ok("info"));
        assert_eq!(canonical_level(" warning "), Ok("warn"));
        assert!(canonical_level("chatty").is_err());
    }

    #[test]
    fn settings_require_an_absolute_directory() {
        let err = LogSettings::resolve("info", "logs/dev").unwrap_err();
        assert!(err.contains("absolute"));

        let err = LogSettings::resolve("info", "   ").unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn payload_sanitizer_flattens_newlines_and_caps_length() {
        assert_eq!(single_line_capped("a\nb\rc", 32), "a b c");

        let long = "x".repeat(200);
        assert_eq!(single_line_capped(&long, 8), format!("{}...", "x".repeat(8)));
    }

    #[test]
    fn second_init_must_match_the_first() {
        let chosen = scratch_dir("active");
        let chosen_str = chosen.to_string_lossy().into_owned();

        init_logging("info", &chosen_str).unwrap();
        init_logging("info", &chosen_str).unwrap();

        let err = init_logging("debug", &chosen_str).unwrap_err();
        assert!(err.contains("refusing to reconfigure"));

        let other = scratch_dir("rejected").to_string_lossy().into_owned();
        let err = init_logging("info", &other).unwrap_err();
        assert!(err.contains("refusing to reconfigure"));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(dir, chosen);
    }
}
