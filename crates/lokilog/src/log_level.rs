// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log level threshold for the front end.
//!
//! Read from `LOG_LEVEL` (case-insensitive). Missing or unrecognized values
//! fall back to **INFO**.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::level_filters::LevelFilter;

pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl LogLevel {
    /// Level from `LOG_LEVEL`, or the default when unset or invalid.
    #[must_use]
    pub fn from_env() -> Self {
        env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|val| LogLevel::from_str(&val).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Invalid log level: '{s}'. Valid levels are: error, warn, info, debug, trace",
            )),
        }
    }
}

/// Lenient: invalid or non-string values become the default level.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => LogLevel::from_str(&s).unwrap_or_default(),
            _ => LogLevel::default(),
        })
    }
}
