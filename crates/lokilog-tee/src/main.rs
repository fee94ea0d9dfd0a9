// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Copies stdin, line by line, to stdout, the optional `LOG_FILE` and Loki.
//!
//! Configured through `LOKI_URL`, `LOKI_TENANT_ID`, `LOKI_LABELS`,
//! `LOG_FILE`, `LOKI_TIMEOUT_SECS`, `LOKI_CHECK_STATUS` and `LOG_LEVEL`.
//! Diagnostics go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use lokilog::logger::{Format, Logger};
use lokilog::{build_fan_out, Console, LogLevel, Sink, SinkConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

#[tokio::main]
pub async fn main() -> ExitCode {
    let _guard = match Logger::builder()
        .level(LogLevel::from_env())
        .format(Format::Console)
        .destination(Arc::new(Console::Stderr))
        .build()
        .and_then(Logger::install)
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("lokilog-tee: unable to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = SinkConfig::from_env();
    let fan_out = match build_fan_out(&config) {
        Ok(fan_out) => fan_out,
        Err(e) => {
            error!("Unable to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut line = Vec::with_capacity(1024);
    let mut forwarded: u64 = 0;
    loop {
        line.clear();
        match stdin.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = fan_out.write(&line) {
                    error!("Failed to copy line: {e}");
                }
                forwarded += 1;
            }
            Err(e) => {
                error!("Failed to read stdin: {e}");
                break;
            }
        }
    }

    debug!("stdin closed, draining pending pushes");
    if let Err(e) = fan_out.drain() {
        error!("Failed to drain destinations: {e}");
        return ExitCode::FAILURE;
    }
    info!(lines = forwarded, "Done");
    ExitCode::SUCCESS
}
