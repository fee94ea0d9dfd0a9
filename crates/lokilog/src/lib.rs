// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # lokilog
//!
//! Asynchronous log sink for Grafana Loki.
//!
//! Every write becomes its own push request: the line is wrapped in a single
//! entry of a single stream, protobuf encoded, snappy compressed and POSTed to
//! `/loki/api/v1/push` in the background. Writes return immediately;
//! [`Sink::drain`] waits for every push started so far. Delivery is best
//! effort: failures are logged and the line is dropped.
//!
//! ## Modules
//!
//! - [`encoder`]: line to compressed `PushRequest` body
//! - [`transport`]: HTTP delivery of an encoded body
//! - [`sink`]: the non-blocking [`LokiSink`] and the [`Sink`] trait
//! - [`fan_out`]: console and file destinations, and [`FanOut`]
//! - [`config`] and [`factory`]: construction from explicit values or the environment
//! - [`logger`]: `tracing` front end on top of a fan-out, with optional
//!   [`sampling`] of repeated messages

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod encoder;
pub mod errors;
pub mod factory;
pub mod fan_out;
pub mod in_flight;
pub mod log_level;
pub mod logger;
pub mod proto;
pub mod sampling;
pub mod sink;
pub mod transport;

pub use config::SinkConfig;
pub use encoder::{EncodedBody, LabelSet};
pub use errors::{ConfigurationError, DecodeError, EncodingError, TransportError};
pub use factory::{build_fan_out, build_fan_out_with, local_fan_out};
pub use fan_out::{Console, FanOut, FileSink};
pub use log_level::LogLevel;
pub use logger::{Format, Logger, LoggerGuard};
pub use sampling::Sampling;
pub use sink::{LokiSink, Sink};
pub use transport::{HttpTransport, PushTarget, Transport, TransportConfig};
