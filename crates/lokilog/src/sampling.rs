// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-message sampling for the front end.
//!
//! Events are grouped by signature (level, target and message text; field
//! values are ignored). Within each tick the first `first` events of a
//! signature are kept, then every `thereafter`-th one. Counters reset when the
//! tick elapses.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::field::{Field, Visit};
use tracing::{Event, Metadata};
use tracing_subscriber::layer::{Context, Filter};

const MAX_SIGNATURES: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sampling {
    pub tick: Duration,
    pub first: u64,
    /// Zero drops everything past `first` until the next tick.
    pub thereafter: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            first: 100,
            thereafter: 100,
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    seen: u64,
}

/// Per-layer filter applying a [`Sampling`] policy.
#[derive(Debug)]
pub struct SamplingFilter {
    policy: Sampling,
    windows: Mutex<HashMap<u64, Window>>,
}

impl SamplingFilter {
    #[must_use]
    pub fn new(policy: Sampling) -> Self {
        Self {
            policy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records one event of `signature` at `now` and reports whether to keep it.
    fn sample(&self, signature: u64, now: Instant) -> bool {
        let tick = self.policy.tick;
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= MAX_SIGNATURES && !windows.contains_key(&signature) {
            windows.retain(|_, window| now.duration_since(window.started) < tick);
            if windows.len() >= MAX_SIGNATURES {
                // Untracked signatures pass through.
                return true;
            }
        }

        let window = windows.entry(signature).or_insert(Window {
            started: now,
            seen: 0,
        });
        if now.duration_since(window.started) >= tick {
            window.started = now;
            window.seen = 0;
        }
        window.seen += 1;

        let Sampling {
            first, thereafter, ..
        } = self.policy;
        window.seen <= first || (thereafter > 0 && (window.seen - first) % thereafter == 0)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        }
    }
}

fn signature(event: &Event<'_>) -> u64 {
    let metadata = event.metadata();
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);

    let mut hasher = DefaultHasher::new();
    metadata.level().as_str().hash(&mut hasher);
    metadata.target().hash(&mut hasher);
    visitor.message.hash(&mut hasher);
    hasher.finish()
}

impl<S> Filter<S> for SamplingFilter {
    fn enabled(&self, _metadata: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        self.sample(signature(event), Instant::now())
    }
}
