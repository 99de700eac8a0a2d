//! Process-wide logging facade with pluggable backends.
//!
//! Code that wants to report something to the user-facing log calls
//! [`get_logger`] and writes through the returned [`Logger`]. The backend is
//! chosen once at startup with [`set_logger`]; until then (and in tests that
//! never register one) a [`TracingLogger`] forwards everything to `tracing`.
//!
//! Internal diagnostics keep using `tracing` macros directly. The facade is for
//! messages that belong in the editor's output channel.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, RwLock};

use tower_lsp::lsp_types::MessageType;

/// Log levels ordered by importance (RFC5424: lower is more important).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
}

impl LogLevel {
    fn rank(self) -> u8 {
        match self {
            LogLevel::Error => 1,
            LogLevel::Warn => 2,
            LogLevel::Info => 3,
            LogLevel::Verbose => 4,
            LogLevel::Debug => 5,
        }
    }

    /// Compare two levels.
    ///
    /// Negative if `self` is more important than `other`, zero if equal,
    /// positive if less important.
    pub fn compare(self, other: LogLevel) -> i8 {
        self.rank() as i8 - other.rank() as i8
    }

    /// Parse a level name, falling back to `Info` for anything unknown.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "error" | "off" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "verbose" => LogLevel::Verbose,
            "debug" | "trace" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    /// Map an LSP message type onto a facade level.
    pub fn from_message_type(message_type: MessageType) -> Self {
        if message_type == MessageType::WARNING {
            LogLevel::Warn
        } else if message_type == MessageType::INFO {
            LogLevel::Info
        } else if message_type == MessageType::LOG {
            LogLevel::Debug
        } else {
            LogLevel::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logging backend.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn set_log_level(&self, level: LogLevel);

    /// Returns true if messages at `level` are being recorded.
    fn log_level_enabled(&self, level: LogLevel) -> bool;

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn verbose(&self, message: &str) {
        self.log(LogLevel::Verbose, message);
    }

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Which registered logger to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerKind {
    /// Main logger: output channel / log file.
    Main,
    /// Secondary logger mirrored to the client's debug console.
    DebugConsole,
}

struct Loggers {
    main: Option<Arc<dyn Logger>>,
    debug_console: Option<Arc<dyn Logger>>,
}

static LOGGERS: RwLock<Loggers> = RwLock::new(Loggers {
    main: None,
    debug_console: None,
});

// Used while no logger is registered; kept alive so level changes stick.
static FALLBACK_MAIN: LazyLock<Arc<dyn Logger>> =
    LazyLock::new(|| Arc::new(TracingLogger::new(LogLevel::Debug)));
static FALLBACK_DEBUG_CONSOLE: LazyLock<Arc<dyn Logger>> =
    LazyLock::new(|| Arc::new(TracingLogger::new(LogLevel::Debug)));

/// Register (or clear, with `None`) the logger for `kind`.
///
/// The server calls this once per kind during startup. Tests may call it to
/// capture output.
pub fn set_logger(logger: Option<Arc<dyn Logger>>, kind: LoggerKind) {
    let Ok(mut loggers) = LOGGERS.write() else {
        tracing::warn!("Logger registry poisoned, keeping previous logger");
        return;
    };
    match kind {
        LoggerKind::Main => loggers.main = logger,
        LoggerKind::DebugConsole => loggers.debug_console = logger,
    }
}

/// The main logger, or a [`TracingLogger`] if none has been registered yet.
pub fn get_logger() -> Arc<dyn Logger> {
    get_logger_of(LoggerKind::Main)
}

pub fn get_logger_of(kind: LoggerKind) -> Arc<dyn Logger> {
    let registered = LOGGERS.read().ok().and_then(|loggers| match kind {
        LoggerKind::Main => loggers.main.clone(),
        LoggerKind::DebugConsole => loggers.debug_console.clone(),
    });
    registered.unwrap_or_else(|| match kind {
        LoggerKind::Main => Arc::clone(&FALLBACK_MAIN),
        LoggerKind::DebugConsole => Arc::clone(&FALLBACK_DEBUG_CONSOLE),
    })
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}

    fn set_log_level(&self, _level: LogLevel) {}

    fn log_level_enabled(&self, _level: LogLevel) -> bool {
        false
    }
}

/// Forwards to the `tracing` macros at the matching level.
#[derive(Debug)]
pub struct TracingLogger {
    level: RwLock<LogLevel>,
}

impl TracingLogger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: RwLock::new(level),
        }
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.log_level_enabled(level) {
            return;
        }
        match level {
            LogLevel::Error => tracing::error!(target: "policy_checks", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "policy_checks", "{}", message),
            LogLevel::Info => tracing::info!(target: "policy_checks", "{}", message),
            LogLevel::Verbose | LogLevel::Debug => {
                tracing::debug!(target: "policy_checks", "{}", message)
            }
        }
    }

    fn set_log_level(&self, level: LogLevel) {
        if let Ok(mut current) = self.level.write() {
            *current = level;
        }
    }

    fn log_level_enabled(&self, level: LogLevel) -> bool {
        self.level
            .read()
            .map(|current| level.compare(*current) <= 0)
            .unwrap_or(true)
    }
}

/// Default number of lines kept by [`MemoryLogger`].
const DEFAULT_MEMORY_CAPACITY: usize = 500;

/// Keeps the most recent lines in memory and forwards them to `tracing`.
///
/// Backs the "show reference log" command.
pub struct MemoryLogger {
    inner: TracingLogger,
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl MemoryLogger {
    pub fn new(level: LogLevel) -> Self {
        Self::with_capacity(level, DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(level: LogLevel, capacity: usize) -> Self {
        Self {
            inner: TracingLogger::new(level),
            capacity: capacity.max(1),
            lines: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of the retained lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.inner.log_level_enabled(level) {
            return;
        }
        self.inner.log(level, message);

        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.as_str().to_uppercase(),
            message
        );
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.capacity {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn set_log_level(&self, level: LogLevel) {
        self.inner.set_log_level(level);
    }

    fn log_level_enabled(&self, level: LogLevel) -> bool {
        self.inner.log_level_enabled(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_compare_log_level() {
        assert_eq!(LogLevel::Error.compare(LogLevel::Error), 0);
        assert!(LogLevel::Error.compare(LogLevel::Debug) < 0);
        assert!(LogLevel::Verbose.compare(LogLevel::Info) > 0);
        assert!(LogLevel::Warn.compare(LogLevel::Info) < 0);
    }

    #[test]
    fn test_from_str_loose() {
        assert_eq!(LogLevel::from_str_loose("ERROR"), LogLevel::Error);
        assert_eq!(LogLevel::from_str_loose("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from_str_loose("verbose"), LogLevel::Verbose);
        assert_eq!(LogLevel::from_str_loose("trace"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_loose("off"), LogLevel::Error);
        assert_eq!(LogLevel::from_str_loose("nonsense"), LogLevel::Info);
    }

    #[test]
    fn test_from_message_type() {
        assert_eq!(
            LogLevel::from_message_type(MessageType::ERROR),
            LogLevel::Error
        );
        assert_eq!(
            LogLevel::from_message_type(MessageType::WARNING),
            LogLevel::Warn
        );
        assert_eq!(LogLevel::from_message_type(MessageType::INFO), LogLevel::Info);
        assert_eq!(LogLevel::from_message_type(MessageType::LOG), LogLevel::Debug);
    }

    #[test]
    fn test_null_logger_never_enabled() {
        let logger = NullLogger;
        assert!(!logger.log_level_enabled(LogLevel::Error));
        logger.error("ignored");
    }

    #[test]
    fn test_tracing_logger_level_filter() {
        let logger = TracingLogger::new(LogLevel::Info);
        assert!(logger.log_level_enabled(LogLevel::Error));
        assert!(logger.log_level_enabled(LogLevel::Info));
        assert!(!logger.log_level_enabled(LogLevel::Verbose));

        logger.set_log_level(LogLevel::Debug);
        assert!(logger.log_level_enabled(LogLevel::Debug));
    }

    #[test]
    fn test_memory_logger_keeps_recent_lines() {
        let logger = MemoryLogger::with_capacity(LogLevel::Debug, 2);
        logger.info("first");
        logger.warn("second");
        logger.error("third");

        let lines = logger.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[WARN] second"));
        assert!(lines[1].ends_with("[ERROR] third"));
    }

    #[test]
    fn test_memory_logger_skips_filtered_levels() {
        let logger = MemoryLogger::new(LogLevel::Warn);
        logger.debug("hidden");
        logger.warn("shown");
        assert_eq!(logger.lines().len(), 1);
    }

    #[test]
    #[serial]
    fn test_set_and_get_logger() {
        let memory = Arc::new(MemoryLogger::new(LogLevel::Debug));
        set_logger(Some(memory.clone()), LoggerKind::Main);
        get_logger().info("through the facade");
        assert!(memory.lines().iter().any(|l| l.ends_with("through the facade")));

        set_logger(None, LoggerKind::Main);
        get_logger().info("falls back to tracing");
        assert!(!memory.lines().iter().any(|l| l.contains("falls back")));
    }

    #[test]
    #[serial]
    fn test_fallback_logger_keeps_level() {
        set_logger(None, LoggerKind::Main);
        get_logger().set_log_level(LogLevel::Error);
        assert!(!get_logger().log_level_enabled(LogLevel::Info));
        assert!(get_logger().log_level_enabled(LogLevel::Error));

        get_logger().set_log_level(LogLevel::Debug);
        assert!(get_logger().log_level_enabled(LogLevel::Debug));
    }

    #[test]
    #[serial]
    fn test_registered_logger_keeps_level() {
        set_logger(
            Some(Arc::new(TracingLogger::new(LogLevel::Warn))),
            LoggerKind::Main,
        );
        assert!(!get_logger().log_level_enabled(LogLevel::Info));
        get_logger().set_log_level(LogLevel::Verbose);
        assert!(get_logger().log_level_enabled(LogLevel::Verbose));
        set_logger(None, LoggerKind::Main);
    }

    #[test]
    #[serial]
    fn test_debug_console_logger_is_independent() {
        let console = Arc::new(MemoryLogger::new(LogLevel::Debug));
        set_logger(Some(console.clone()), LoggerKind::DebugConsole);
        get_logger().info("main only");
        get_logger_of(LoggerKind::DebugConsole).info("console");
        let lines = console.lines();
        assert!(lines.iter().any(|l| l.ends_with("console")));
        assert!(!lines.iter().any(|l| l.contains("main only")));
        set_logger(None, LoggerKind::DebugConsole);
    }
}
