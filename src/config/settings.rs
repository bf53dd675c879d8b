use serde::{Deserialize, Serialize};

use config::{Config, ConfigError, Environment};

use crate::logging::LoggingConfig;

/// Префикс переменных окружения по умолчанию.
pub const ENV_PREFIX: &str = "PUBSUB";

/// Что делать с сообщением, когда ограниченная очередь заполнена.
///
/// Производитель никогда не блокируется, поэтому вариантов только два:
/// выбросить самое старое или самое новое сообщение.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    DropNewest,
}

/// Настройки очереди сообщений.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Максимум сообщений в буфере. `None` означает без ограничения.
    #[serde(default)]
    pub capacity: Option<usize>,
    /// Политика переполнения, действует только при заданной `capacity`.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

/// Полная конфигурация: очередь и логирование.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QueueConfig {
    /// Ограниченная очередь с заданной политикой.
    pub fn bounded(
        capacity: usize,
        overflow_policy: OverflowPolicy,
    ) -> Self {
        Self {
            capacity: Some(capacity),
            overflow_policy,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == Some(0) {
            return Err(ConfigError::Message(
                "queue.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Загружает настройки из значений по умолчанию и переменных
    /// окружения с префиксом `PUBSUB_` (например `PUBSUB_QUEUE__CAPACITY`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix(ENV_PREFIX)
    }

    pub fn load_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            // Значения по умолчанию
            .set_default("queue.overflow_policy", "drop_oldest")?
            .set_default("logging.level", "info")?
            .add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        self.logging
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }
}
