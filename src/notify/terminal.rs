//! Terminal notifier
//!
//! Writes one line per notification to stderr or stdout, with the state
//! coloured when the terminal supports it.
//!
//! Options (`[notifiers.terminal]`): `stream = "stderr" | "stdout"` and
//! `color = true | false`.

use super::{string_option, Notifier, Payload};
use crate::domain::CheckState;
use crate::error::{ConfigError, DeliveryError};
use std::io::{self, Write};

/// Terminal/console notifier
pub struct TerminalNotifier {
    /// Use stderr instead of stdout
    use_stderr: bool,
    /// Use colors (ANSI escape codes)
    use_colors: bool,
}

impl TerminalNotifier {
    /// Create a new terminal notifier writing to stderr
    pub fn new() -> Self {
        Self {
            use_stderr: true,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier that uses stdout
    pub fn stdout() -> Self {
        Self {
            use_stderr: false,
            use_colors: Self::supports_color(),
        }
    }

    /// Create a notifier without colors
    pub fn no_color() -> Self {
        Self {
            use_stderr: true,
            use_colors: false,
        }
    }

    /// Build from a `[notifiers.terminal]` table
    pub fn from_options(options: &toml::Table) -> Result<Box<dyn Notifier>, ConfigError> {
        let mut notifier = Self::new();

        match string_option(options, "terminal", "stream")? {
            None | Some("stderr") => {}
            Some("stdout") => notifier.use_stderr = false,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "notifiers.terminal.stream".to_string(),
                    message: format!("expected 'stderr' or 'stdout', got '{}'", other),
                })
            }
        }

        match options.get("color") {
            None => {}
            Some(toml::Value::Boolean(b)) => notifier.use_colors = *b,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    key: "notifiers.terminal.color".to_string(),
                    message: "expected a boolean".to_string(),
                })
            }
        }

        Ok(Box::new(notifier))
    }

    /// Check if terminal supports colors
    fn supports_color() -> bool {
        std::env::var("TERM")
            .map(|term| term != "dumb")
            .unwrap_or(false)
    }

    fn format_payload(&self, payload: &Payload) -> String {
        format!(
            "[{}] {} {}: {} (rule {}, {} -> {})",
            payload.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.format_state(payload.state),
            payload.check_id,
            payload.summary,
            payload.rule_id,
            payload.contact_id,
            payload.address
        )
    }

    fn format_state(&self, state: CheckState) -> String {
        if !self.use_colors {
            return format!("{}", state);
        }

        let color_code = match state {
            CheckState::Ok => "\x1b[32m",             // Green
            CheckState::Warning => "\x1b[33m",        // Yellow
            CheckState::Critical => "\x1b[31m",       // Red
            CheckState::Unknown => "\x1b[35m\x1b[1m", // Bold Magenta
        };

        format!("{}{}\x1b[0m", color_code, state)
    }
}

impl Default for TerminalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&self, payload: &Payload) -> Result<(), DeliveryError> {
        let message = self.format_payload(payload);

        if self.use_stderr {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            writeln!(handle, "{}", message)?;
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", message)?;
        }

        Ok(())
    }

    fn kind(&self) -> &str {
        "terminal"
    }
}
