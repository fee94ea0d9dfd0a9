// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the push pipeline and sink construction.

use std::path::PathBuf;

/// Failure while turning a log line into a push body.
///
/// Serialization into a growable buffer cannot fail, so the only reachable
/// failure is the compressor rejecting its input (e.g. oversized lines).
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("failed to compress push request: {0}")]
    Compression(#[from] snap::Error),
}

/// Failure while reading a push body back into a request.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decompress push body: {0}")]
    Decompression(#[from] snap::Error),
    #[error("failed to decode push request: {0}")]
    Protobuf(#[from] prost::DecodeError),
}

/// Transport-level failure of a single push.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push rejected with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("push did not complete within {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection slots closed: {0}")]
    SlotsClosed(#[from] tokio::sync::AcquireError),
}

/// Invalid construction parameters. Raised at setup, never per write.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("cannot open log file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to start sink runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("a global logger is already installed")]
    AlreadyInitialized,
}
