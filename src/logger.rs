/// Minimum severity emitted by the client's logger.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Configures the client's logging collaborator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogConfig {
    /// Master switch; when off, log calls cost one branch and nothing else.
    pub enabled: bool,
    /// Minimum level that gets emitted.
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: LogLevel::Info,
        }
    }
}

/// Level-gated facade over `tracing`.
///
/// `tracing` subscribers filter on their own, but the configuration surface
/// promises a runtime `{enabled, level}` switch with a no-op substitute, so
/// the gate lives here rather than in the subscriber.
#[derive(Clone, Debug)]
pub(crate) struct Logger {
    config: LogConfig,
}

impl Logger {
    pub(crate) fn new(config: LogConfig) -> Self {
        Self { config }
    }

    fn allows(&self, level: LogLevel) -> bool {
        self.config.enabled && level >= self.config.level
    }

    pub(crate) fn debug(&self, context: &str, message: &str) {
        if self.allows(LogLevel::Debug) {
            tracing::debug!(target: "fetchkit", context, "{message}");
        }
    }

    pub(crate) fn info(&self, context: &str, message: &str) {
        if self.allows(LogLevel::Info) {
            tracing::info!(target: "fetchkit", context, "{message}");
        }
    }

    pub(crate) fn warn(&self, context: &str, message: &str) {
        if self.allows(LogLevel::Warn) {
            tracing::warn!(target: "fetchkit", context, "{message}");
        }
    }

    pub(crate) fn error(&self, context: &str, message: &str) {
        if self.allows(LogLevel::Error) {
            tracing::error!(target: "fetchkit", context, "{message}");
        }
    }
}
