// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Construction parameters for the Loki sink and its companion destinations.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::errors::ConfigurationError;
use crate::transport::TransportConfig;

const PUSH_PATH: &str = "loki/api/v1/push";
const DEFAULT_URL: &str = "http://localhost:3100";
const DEFAULT_LABELS: &str = r#"{job="lokilog"}"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkConfig {
    /// Loki base URL, e.g. `http://loki:3100`. The push path is added on build.
    pub endpoint: String,
    /// Sent as `X-Scope-OrgID` when set and non-empty.
    pub tenant_id: Option<String>,
    /// Stream selector attached to every line, e.g. `{job="api"}`.
    pub labels: String,
    /// Optional local file receiving a copy of every line.
    pub file_path: Option<PathBuf>,
    pub transport: TransportConfig,
}

impl SinkConfig {
    #[must_use]
    pub fn new(endpoint: &str, tenant_id: Option<&str>, labels: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            labels: labels.to_string(),
            file_path: None,
            transport: TransportConfig::default(),
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Reads `LOKI_URL`, `LOKI_TENANT_ID`, `LOKI_LABELS`, `LOG_FILE`,
    /// `LOKI_TIMEOUT_SECS` and `LOKI_CHECK_STATUS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut transport = TransportConfig::default();
        if let Some(secs) = env::var("LOKI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            transport.connect_timeout = Duration::from_secs(secs);
            transport.read_timeout = Duration::from_secs(secs);
            transport.request_timeout = Duration::from_secs(secs);
        }
        transport.check_status = env::var("LOKI_CHECK_STATUS")
            .map(|val| val.eq_ignore_ascii_case("true") || val == "1")
            .unwrap_or(false);

        Self {
            endpoint: env::var("LOKI_URL").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            tenant_id: env::var("LOKI_TENANT_ID").ok().filter(|t| !t.is_empty()),
            labels: env::var("LOKI_LABELS").unwrap_or_else(|_| DEFAULT_LABELS.to_string()),
            file_path: env::var_os("LOG_FILE")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            transport,
        }
    }

    pub fn push_url(&self) -> Result<Url, ConfigurationError> {
        push_url(&self.endpoint)
    }
}

/// Turns a Loki base URL into its push URL.
///
/// Any existing path is kept as a prefix, so `http://gw/tenant-a` becomes
/// `http://gw/tenant-a/loki/api/v1/push`. A URL already ending in the push
/// path is returned unchanged.
pub fn push_url(endpoint: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    let base = url.path().trim_end_matches('/').to_string();
    if base.ends_with(&format!("/{PUSH_PATH}")) {
        url.set_path(&base);
    } else {
        url.set_path(&format!("{base}/{PUSH_PATH}"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
