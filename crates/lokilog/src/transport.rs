// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP delivery of encoded push bodies.
//!
//! A single [`HttpTransport`] owns one pooled `reqwest::Client` for the life of
//! the sink. Every push is one POST, bounded by short timeouts so a slow
//! backend cannot stall the drain barrier forever. Concurrent requests to one
//! host are capped; waiting for a slot counts against the request timeout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::encoder::EncodedBody;
use crate::errors::{ConfigurationError, TransportError};

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";
pub const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Where a push goes: the full push URL and the optional tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushTarget {
    pub endpoint: Url,
    pub tenant_id: Option<String>,
}

impl PushTarget {
    /// An empty tenant is treated as no tenant, so no scoping header is sent.
    #[must_use]
    pub fn new(endpoint: Url, tenant_id: Option<String>) -> Self {
        Self {
            endpoint,
            tenant_id: tenant_id.filter(|t| !t.is_empty()),
        }
    }
}

/// Outcome of a completed exchange. The status is informational only unless
/// the transport was built with status checking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
    pub status: StatusCode,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, target: &PushTarget, body: EncodedBody) -> Result<Ack, TransportError>;
}

/// Client settings. Defaults keep every phase of a push within a few seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub request_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Requests allowed in flight to one host at a time. Further pushes wait
    /// for a slot within `request_timeout`.
    pub max_connections_per_host: usize,
    /// Treat non-2xx responses as failures.
    pub check_status: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            tcp_keepalive: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 100,
            max_connections_per_host: 100,
            check_status: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    check_status: bool,
    request_timeout: Duration,
    max_connections_per_host: usize,
    hosts: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigurationError> {
        let client = build_client(config).map_err(ConfigurationError::Client)?;
        Ok(Self {
            client,
            check_status: config.check_status,
            request_timeout: config.request_timeout,
            max_connections_per_host: config.max_connections_per_host.max(1),
            hosts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn host_slots(&self, endpoint: &Url) -> Arc<Semaphore> {
        let host = format!(
            "{}:{}",
            endpoint.host_str().unwrap_or_default(),
            endpoint.port_or_known_default().unwrap_or_default()
        );
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            hosts
                .entry(host)
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_connections_per_host))),
        )
    }

    async fn exchange(
        &self,
        slots: &Semaphore,
        target: &PushTarget,
        body: EncodedBody,
    ) -> Result<Ack, TransportError> {
        let _slot = slots.acquire().await?;

        let mut request = self
            .client
            .post(target.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(PROTOBUF_CONTENT_TYPE))
            .body(body.into_vec());

        if let Some(tenant_id) = &target.tenant_id {
            request = request.header(TENANT_HEADER, tenant_id);
        }

        let response = request.send().await?;
        let status = response.status();

        // Read the body to the end so the connection goes back to the pool.
        let response_body = response.bytes().await?;
        debug!(
            status = status.as_u16(),
            response_bytes = response_body.len(),
            "Loki push completed"
        );

        if self.check_status && !status.is_success() {
            return Err(TransportError::Status {
                status,
                body: String::from_utf8_lossy(&response_body).into_owned(),
            });
        }

        Ok(Ack { status })
    }
}

// reqwest's connect timeout also covers the TLS handshake; the overall timeout
// bounds the wait for response headers.
fn build_client(config: &TransportConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .timeout(config.request_timeout)
        .tcp_keepalive(Some(config.tcp_keepalive))
        .pool_idle_timeout(Some(config.pool_idle_timeout))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, target: &PushTarget, body: EncodedBody) -> Result<Ack, TransportError> {
        let slots = self.host_slots(&target.endpoint);
        tokio::time::timeout(self.request_timeout, self.exchange(&slots, target, body))
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))?
    }
}
