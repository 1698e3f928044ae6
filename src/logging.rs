//! Per-pass logging. Whether a pass logs is decided by
//! [`LoggingMode`](crate::config::LoggingMode), never by the pass itself.

use std::fmt::Display;

use crate::config::LoggingMode;

#[derive(Debug, Clone)]
pub struct PassLogger {
    pass_name: &'static str,
    function_name: String,
    enabled: bool,
}

impl PassLogger {
    pub fn new(mode: &LoggingMode, pass_name: &'static str, function_name: &str) -> Self {
        Self {
            pass_name,
            function_name: function_name.to_owned(),
            enabled: mode.is_enabled(pass_name),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn log(&self, message: impl Display) {
        if !self.enabled {
            return;
        }

        tracing::debug!(
            pass = self.pass_name,
            function = %self.function_name,
            "[{}] {message}",
            self.pass_name
        );
    }

    pub fn log_start(&self) {
        self.log(format_args!("Starting {}", self.function_name));
    }

    pub fn log_skip(&self) {
        self.log(format_args!("Skipping {}", self.function_name));
    }
}
