use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoggingError;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error` или `off`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// ANSI-цвета в консоли.
    #[serde(default = "default_true")]
    pub with_ansi: bool,
    /// Печатать target события (модуль).
    #[serde(default = "default_true")]
    pub with_target: bool,
    /// Дополнительные директивы вида `pubsub_handoff::pubsub=trace`.
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Собирает строку для `EnvFilter`: базовый уровень плюс директивы.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.directives.len());
        parts.push(self.level.to_ascii_lowercase());
        parts.extend(
            self.directives
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        );
        parts.join(",")
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        let level = self.level.to_ascii_lowercase();
        if level != "off" && tracing::Level::from_str(&level).is_err() {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        for directive in self.directives.iter().filter(|d| !d.trim().is_empty()) {
            if let Err(e) = tracing_subscriber::filter::Directive::from_str(directive.trim()) {
                return Err(LoggingError::InvalidDirective {
                    directive: directive.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
