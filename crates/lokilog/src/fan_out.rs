// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Local destinations and the fan-out writer that mirrors records to several
//! sinks at once.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::ConfigurationError;
use crate::sink::Sink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Console {
    Stdout,
    Stderr,
}

impl Sink for Console {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout => io::stdout().lock().write_all(buf)?,
            Self::Stderr => io::stderr().lock().write_all(buf)?,
        }
        Ok(buf.len())
    }

    fn drain(&self) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().flush(),
            Self::Stderr => io::stderr().flush(),
        }
    }
}

/// Append-only log file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Opens `path` for appending, creating it (mode 0644 on Unix) if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options
            .open(&path)
            .map_err(|source| ConfigurationError::File {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn drain(&self) -> io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.flush()?;
        file.sync_data()
    }
}

/// Mirrors every record to all destinations.
///
/// A failing destination does not stop the others; the first error is
/// reported once every destination has been tried.
#[derive(Clone, Default)]
pub struct FanOut {
    destinations: Vec<Arc<dyn Sink>>,
}

impl FanOut {
    #[must_use]
    pub fn new(destinations: Vec<Arc<dyn Sink>>) -> Self {
        Self { destinations }
    }

    #[must_use]
    pub fn with(mut self, destination: Arc<dyn Sink>) -> Self {
        self.destinations.push(destination);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Writes to local destinations only.
    pub fn write_local(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_filtered(buf, |destination| !destination.is_remote())
    }

    fn write_filtered(
        &self,
        buf: &[u8],
        include: impl Fn(&dyn Sink) -> bool,
    ) -> io::Result<usize> {
        let mut first_error = None;
        for destination in &self.destinations {
            if !include(destination.as_ref()) {
                continue;
            }
            if let Err(e) = destination.write(buf) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(buf.len()),
        }
    }
}

impl Sink for FanOut {
    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.write_filtered(buf, |_| true)
    }

    fn drain(&self) -> io::Result<()> {
        let mut first_error = None;
        for destination in &self.destinations {
            if let Err(e) = destination.drain() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn is_remote(&self) -> bool {
        self.destinations.iter().any(|d| d.is_remote())
    }
}
