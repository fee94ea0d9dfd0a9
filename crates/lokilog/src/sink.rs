// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget Loki sink with a drain barrier.
//!
//! ```text
//!   write(buf) ──register──> InFlight +1
//!        │
//!        └──spawn──> encode ─> send ─> log failure ─> InFlight -1
//!
//!   drain() ──> wait until InFlight == 0
//! ```
//!
//! Every write becomes its own task: there is no queue, no batching, no retry
//! and no bound on concurrent pushes. Entries may reach Loki in any order.

use std::fmt;
use std::io;
use std::sync::Arc;

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::{error, Instrument, Span};

use crate::encoder::{encode, LabelSet};
use crate::errors::ConfigurationError;
use crate::in_flight::{InFlight, InFlightGuard};
use crate::transport::{PushTarget, Transport};

/// A destination for formatted log records.
pub trait Sink: Send + Sync {
    /// Accepts one record. Returns the number of bytes accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Blocks until everything accepted so far has been handled.
    fn drain(&self) -> io::Result<()>;

    /// Whether records are shipped off-host. Remote destinations do not
    /// receive this crate's own diagnostics.
    fn is_remote(&self) -> bool {
        false
    }
}

/// Runtime the push tasks are spawned on.
#[derive(Clone, Debug)]
pub(crate) enum SinkRuntime {
    Shared(Handle),
    Owned(Arc<OwnedRuntime>),
}

impl SinkRuntime {
    /// The multi-thread runtime current at construction time, or a dedicated
    /// one. A current-thread runtime is never reused: a blocking drain would
    /// park the only thread able to run the pushes.
    pub(crate) fn current_or_owned() -> Result<Self, ConfigurationError> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                Ok(Self::Shared(handle))
            }
            _ => Ok(Self::Owned(Arc::new(OwnedRuntime::start()?))),
        }
    }

    #[cfg(test)]
    fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    fn handle(&self) -> &Handle {
        match self {
            Self::Shared(handle) => handle,
            Self::Owned(owned) => owned.handle(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct OwnedRuntime {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl OwnedRuntime {
    const WORKER_THREADS: usize = 2;

    fn start() -> Result<Self, ConfigurationError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(Self::WORKER_THREADS)
            .thread_name("lokilog-push")
            .enable_all()
            .build()
            .map_err(ConfigurationError::Runtime)?;
        let handle = runtime.handle().clone();
        Ok(Self {
            runtime: Some(runtime),
            handle,
        })
    }

    fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        // Dropping a runtime inside an async context panics. Pending pushes are
        // cancelled and reported.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// One dispatched line. Holds the in-flight registration, so the slot is
/// released only after a cancelled push has been reported.
struct PendingPush {
    line_bytes: usize,
    completed: bool,
    _guard: InFlightGuard,
}

impl Drop for PendingPush {
    fn drop(&mut self) {
        // Dropped unfinished: the runtime shut down before or during the push.
        if !self.completed {
            error!(
                line_bytes = self.line_bytes,
                "Loki push cancelled, line dropped"
            );
        }
    }
}

struct Shared {
    target: PushTarget,
    labels: LabelSet,
    transport: Arc<dyn Transport>,
    in_flight: Arc<InFlight>,
}

impl Shared {
    async fn push(&self, line: &[u8]) {
        let body = match encode(&self.labels, line) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, line_bytes = line.len(), "Failed to encode log line, line dropped");
                return;
            }
        };

        if let Err(e) = self.transport.send(&self.target, body).await {
            error!(
                error = %e,
                endpoint = %self.target.endpoint,
                "Loki push failed, line dropped"
            );
        }
    }
}

/// Asynchronous sink pushing each written line to Loki as its own request.
///
/// Cloning is cheap and clones share the transport and the in-flight counter.
#[derive(Clone)]
pub struct LokiSink {
    shared: Arc<Shared>,
    runtime: SinkRuntime,
}

impl LokiSink {
    pub(crate) fn from_parts(
        target: PushTarget,
        labels: LabelSet,
        transport: Arc<dyn Transport>,
        runtime: SinkRuntime,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                target,
                labels,
                transport,
                in_flight: InFlight::new(),
            }),
            runtime,
        }
    }

    #[must_use]
    pub fn target(&self) -> &PushTarget {
        &self.shared.target
    }

    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.shared.labels
    }

    /// Pushes dispatched and not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    /// Hands `line` off for delivery and returns without waiting on the
    /// network. Always reports the whole line as accepted.
    pub fn push_line(&self, line: &[u8]) -> usize {
        // Registered here, on the caller's side, so a drain started after this
        // returns is guaranteed to wait for the push.
        let pending = PendingPush {
            line_bytes: line.len(),
            completed: false,
            _guard: self.shared.in_flight.register(),
        };
        let shared = Arc::clone(&self.shared);
        let accepted = line.len();
        let line = line.to_vec();

        self.runtime.handle().spawn(
            async move {
                let mut pending = pending;
                shared.push(&line).await;
                pending.completed = true;
            }
            .instrument(Span::current()),
        );

        accepted
    }

    /// Waits until every push dispatched before the call has completed.
    pub async fn drain_async(&self) {
        self.shared.in_flight.wait_async().await;
    }

    /// Blocking form of [`LokiSink::drain_async`].
    ///
    /// On a multi-thread runtime worker the wait goes through
    /// `block_in_place`. On a current-thread runtime the pushes run on the
    /// sink's own runtime, so the wait parks only the caller. There is no
    /// timeout: a push that never completes blocks forever, so the transport
    /// timeouts must stay finite.
    pub fn drain_blocking(&self) {
        let in_flight = &self.shared.in_flight;
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| in_flight.wait());
            }
            _ => in_flight.wait(),
        }
    }
}

impl fmt::Debug for LokiSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LokiSink")
            .field("target", &self.shared.target)
            .field("labels", &self.shared.labels)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl Sink for LokiSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.push_line(buf))
    }

    fn drain(&self) -> io::Result<()> {
        self.drain_blocking();
        Ok(())
    }

    fn is_remote(&self) -> bool {
        true
    }
}
