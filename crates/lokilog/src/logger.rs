// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `tracing` front end writing formatted records to a [`FanOut`].
//!
//! Application code logs with the ordinary `tracing` macros. A [`Logger`] binds
//! them to a set of destinations: stdout, optionally a file, optionally Loki.
//!
//! ```rust,ignore
//! let guard = lokilog::logger::production_with_loki(
//!     "http://localhost:3100",
//!     Some("tenant-a"),
//!     r#"{host="localhost", job="api"}"#,
//! )?
//! .install()?;
//!
//! tracing::info!(user = 42, "signed in");
//!
//! guard.sync()?; // waits for every pending push
//! ```
//!
//! Records produced by this crate itself (push failures and the like) only go
//! to local destinations, so a broken backend does not generate more pushes
//! about its own failures.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{Dispatch, Metadata};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::SinkConfig;
use crate::errors::ConfigurationError;
use crate::factory::{build_fan_out, local_fan_out};
use crate::fan_out::{Console, FanOut};
use crate::log_level::LogLevel;
use crate::sampling::{Sampling, SamplingFilter};
use crate::sink::Sink;

/// Crates too chatty to ship, matching the HTTP stack underneath the sink.
const QUIET_TARGETS: &str = "h2=off,hyper=off,hyper_util=off,reqwest=off,rustls=off";
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Format {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human readable single-line text.
    Console,
}

/// `MakeWriter` routing each record to the fan-out.
#[derive(Clone)]
pub struct LogWriter {
    fan_out: Arc<FanOut>,
}

impl LogWriter {
    #[must_use]
    pub fn new(fan_out: Arc<FanOut>) -> Self {
        Self { fan_out }
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = RecordWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RecordWriter {
            fan_out: &self.fan_out,
            local_only: false,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        RecordWriter {
            fan_out: &self.fan_out,
            local_only: is_own_target(meta.target()),
        }
    }
}

pub struct RecordWriter<'a> {
    fan_out: &'a FanOut,
    local_only: bool,
}

impl io::Write for RecordWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.local_only {
            self.fan_out.write_local(buf)
        } else {
            Sink::write(self.fan_out, buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct LoggerBuilder {
    level: LogLevel,
    format: Format,
    sampling: Option<Sampling>,
    fan_out: FanOut,
}

impl LoggerBuilder {
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Samples repeated messages. Off unless set.
    #[must_use]
    pub fn sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = Some(sampling);
        self
    }

    #[must_use]
    pub fn destination(mut self, destination: Arc<dyn Sink>) -> Self {
        self.fan_out = self.fan_out.with(destination);
        self
    }

    #[must_use]
    pub fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn build(self) -> Result<Logger, ConfigurationError> {
        let filter = EnvFilter::try_new(format!("{QUIET_TARGETS},{}", self.level.as_ref()))?;
        let fan_out = Arc::new(self.fan_out);
        let writer = LogWriter::new(Arc::clone(&fan_out));

        let records: BoxedLayer = match self.format {
            Format::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .boxed(),
            Format::Console => fmt::layer()
                .with_writer(writer)
                .with_level(true)
                .with_target(true)
                .with_thread_names(false)
                .with_thread_ids(false)
                .boxed(),
        };
        let records = match self.sampling {
            Some(sampling) => records.with_filter(SamplingFilter::new(sampling)).boxed(),
            None => records,
        };

        let dispatch = Dispatch::new(Registry::default().with(filter).with(records));
        Ok(Logger { dispatch, fan_out })
    }
}

/// Configured front end. Use [`Logger::dispatch`] for scoped logging or
/// [`Logger::install`] to make it the process-wide default.
pub struct Logger {
    dispatch: Dispatch,
    fan_out: Arc<FanOut>,
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Drains every destination.
    pub fn sync(&self) -> io::Result<()> {
        self.fan_out.drain()
    }

    /// Installs this logger as the global default. The global can only be set
    /// once per process and is never replaced.
    pub fn install(self) -> Result<LoggerGuard, ConfigurationError> {
        tracing::dispatcher::set_global_default(self.dispatch)
            .map_err(|_| ConfigurationError::AlreadyInitialized)?;
        Ok(LoggerGuard {
            fan_out: self.fan_out,
        })
    }
}

/// Keeps the installed logger's destinations alive and drains them on drop.
#[must_use = "dropping the guard drains immediately"]
pub struct LoggerGuard {
    fan_out: Arc<FanOut>,
}

impl LoggerGuard {
    pub fn sync(&self) -> io::Result<()> {
        self.fan_out.drain()
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let _ = self.fan_out.drain();
    }
}

/// JSON to stdout, sampling repeated messages.
pub fn production() -> Result<Logger, ConfigurationError> {
    Logger::builder()
        .level(LogLevel::from_env())
        .sampling(Sampling::default())
        .destination(Arc::new(Console::Stdout))
        .build()
}

/// Human readable text to stdout, sampling repeated messages.
pub fn development() -> Result<Logger, ConfigurationError> {
    Logger::builder()
        .level(LogLevel::from_env())
        .sampling(Sampling::default())
        .format(Format::Console)
        .destination(Arc::new(Console::Stdout))
        .build()
}

/// JSON to stdout and Loki.
pub fn production_with_loki(
    endpoint: &str,
    tenant_id: Option<&str>,
    labels: &str,
) -> Result<Logger, ConfigurationError> {
    from_config(&SinkConfig::new(endpoint, tenant_id, labels))
}

/// JSON to stdout, an append-only file and Loki.
pub fn production_with_file_and_loki(
    file_path: impl AsRef<Path>,
    endpoint: &str,
    tenant_id: Option<&str>,
    labels: &str,
) -> Result<Logger, ConfigurationError> {
    from_config(&SinkConfig::new(endpoint, tenant_id, labels).with_file(file_path.as_ref()))
}

/// JSON to stdout, the configured file if any, and Loki.
pub fn from_config(config: &SinkConfig) -> Result<Logger, ConfigurationError> {
    Logger::builder()
        .level(LogLevel::from_env())
        .fan_out(build_fan_out(config)?)
        .build()
}

/// JSON to stdout and the configured file, without Loki.
pub fn local_from_config(config: &SinkConfig) -> Result<Logger, ConfigurationError> {
    Logger::builder()
        .level(LogLevel::from_env())
        .fan_out(local_fan_out(config)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tracing::{debug, error, info};

    #[derive(Default)]
    struct Memory {
        remote: bool,
        records: Mutex<Vec<String>>,
    }

    impl Sink for Memory {
        fn write(&self, buf: &[u8]) -> io::Result<usize> {
            self.records
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn drain(&self) -> io::Result<()> {
            Ok(())
        }

        fn is_remote(&self) -> bool {
            self.remote
        }
    }

    fn memory(remote: bool) -> Arc<Memory> {
        Arc::new(Memory {
            remote,
            ..Memory::default()
        })
    }

    #[test]
    fn test_json_record_per_event() {
        let sink = memory(true);
        let logger = Logger::builder().destination(sink.clone()).build().unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            info!(target: "app::auth", user = 42, "signed in");
        });

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].ends_with('\n'));
        let record: serde_json::Value = serde_json::from_str(records[0].trim_end()).unwrap();
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["fields"]["message"], "signed in");
        assert_eq!(record["fields"]["user"], 42);
        assert!(record["timestamp"].is_string());
        assert_eq!(record["target"], "app::auth");
    }

    #[test]
    fn test_level_threshold() {
        let sink = memory(false);
        let logger = Logger::builder()
            .level(LogLevel::Warn)
            .format(Format::Console)
            .destination(sink.clone())
            .build()
            .unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            debug!("hidden");
            info!("hidden too");
            error!("shown");
        });

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].contains("ERROR"));
        assert!(records[0].contains("shown"));
    }

    #[test]
    fn test_own_diagnostics_stay_local() {
        let local = memory(false);
        let remote = memory(true);
        let logger = Logger::builder()
            .destination(local.clone())
            .destination(remote.clone())
            .build()
            .unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            error!(target: "lokilog::sink", "Loki push failed, line dropped");
            info!(target: "lokilog_tee", "application record");
        });

        assert_eq!(local.records.lock().unwrap().len(), 2);
        let remote_records = remote.records.lock().unwrap();
        assert_eq!(remote_records.len(), 1);
        assert!(remote_records[0].contains("application record"));
    }

    #[test]
    fn test_http_stack_is_silenced() {
        let sink = memory(false);
        let logger = Logger::builder()
            .level(LogLevel::Trace)
            .destination(sink.clone())
            .build()
            .unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            info!(target: "hyper_util::client", "connection pooled");
            info!(target: "reqwest::connect", "connecting");
            info!(target: "app", "kept");
        });

        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sampling_suppresses_repeated_messages() {
        let sink = memory(false);
        let logger = Logger::builder()
            .sampling(Sampling::default())
            .destination(sink.clone())
            .build()
            .unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            for attempt in 0..250 {
                info!(target: "app", attempt, "cache miss");
            }
            for shard in 0..10 {
                info!(target: "app", "shard {shard} ready");
            }
        });

        let records = sink.records.lock().unwrap();
        let misses = records.iter().filter(|r| r.contains("cache miss")).count();
        assert_eq!(misses, 101);
        assert_eq!(records.len() - misses, 10);
    }

    #[test]
    fn test_no_sampling_by_default() {
        let sink = memory(false);
        let logger = Logger::builder().destination(sink.clone()).build().unwrap();

        tracing::dispatcher::with_default(logger.dispatch(), || {
            for _ in 0..250 {
                info!(target: "app", "cache miss");
            }
        });

        assert_eq!(sink.records.lock().unwrap().len(), 250);
    }

    #[test]
    fn test_is_own_target() {
        assert!(is_own_target("lokilog"));
        assert!(is_own_target("lokilog::transport"));
        assert!(!is_own_target("lokilog_tee"));
        assert!(!is_own_target("app::lokilog"));
    }

    #[test]
    fn test_production_with_file_rejects_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = production_with_file_and_loki(
            dir.path().join("missing").join("app.log"),
            "http://localhost:3100",
            None,
            r#"{job="t"}"#,
        );
        assert!(matches!(result, Err(ConfigurationError::File { .. })));
    }

    #[test]
    fn test_production_with_loki_rejects_bad_endpoint() {
        let result = production_with_loki("localhost:3100", None, r#"{job="t"}"#);
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidEndpoint { .. })
        ));
    }
}
