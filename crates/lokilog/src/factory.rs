// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Building configured sinks.

use std::sync::Arc;

use tracing::info;

use crate::config::SinkConfig;
use crate::encoder::LabelSet;
use crate::errors::ConfigurationError;
use crate::fan_out::{Console, FanOut, FileSink};
use crate::sink::{LokiSink, Sink, SinkRuntime};
use crate::transport::{HttpTransport, PushTarget, Transport};

impl LokiSink {
    /// Builds a sink with its own pooled HTTP transport, shared by every write.
    pub fn new(config: &SinkConfig) -> Result<Self, ConfigurationError> {
        let transport = HttpTransport::new(&config.transport)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds a sink delivering through `transport`.
    pub fn with_transport(
        config: &SinkConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        let target = PushTarget::new(config.push_url()?, config.tenant_id.clone());
        let runtime = SinkRuntime::current_or_owned()?;

        info!(
            endpoint = %target.endpoint,
            tenant = target.tenant_id.as_deref().unwrap_or(""),
            labels = %config.labels,
            "Loki sink initialized"
        );

        Ok(Self::from_parts(
            target,
            LabelSet::from(config.labels.as_str()),
            transport,
            runtime,
        ))
    }
}

/// Stdout, then the configured file if any, then Loki.
pub fn build_fan_out(config: &SinkConfig) -> Result<FanOut, ConfigurationError> {
    let loki = LokiSink::new(config)?;
    build_fan_out_with(config, loki)
}

/// Like [`build_fan_out`] around an already built Loki sink.
pub fn build_fan_out_with(
    config: &SinkConfig,
    loki: LokiSink,
) -> Result<FanOut, ConfigurationError> {
    Ok(local_fan_out(config)?.with(Arc::new(loki)))
}

/// Stdout plus the configured file, without any remote destination.
pub fn local_fan_out(config: &SinkConfig) -> Result<FanOut, ConfigurationError> {
    let mut fan_out = FanOut::default().with(Arc::new(Console::Stdout));
    if let Some(path) = &config.file_path {
        let file: Arc<dyn Sink> = Arc::new(FileSink::open(path)?);
        fan_out = fan_out.with(file);
    }
    Ok(fan_out)
}
