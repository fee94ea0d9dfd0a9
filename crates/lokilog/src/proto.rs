// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Loki `logproto` push messages.
//!
//! Field numbers follow `pkg/logproto/logproto.proto` and `push.proto`:
//!
//! ```text
//! message PushRequest { repeated Stream streams = 1; }
//! message Stream      { string labels = 1; repeated Entry entries = 2; }
//! message Entry       { google.protobuf.Timestamp timestamp = 1; string line = 2; }
//! ```
//!
//! `line` is declared as bytes here. Both are length-delimited on the wire, and
//! bytes keeps lines that are not valid UTF-8 intact.

use prost_types::Timestamp;

#[derive(Clone, PartialEq, prost::Message)]
pub struct PushRequest {
    #[prost(message, repeated, tag = "1")]
    pub streams: Vec<Stream>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Stream {
    #[prost(string, tag = "1")]
    pub labels: String,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<Entry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Entry {
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<Timestamp>,
    #[prost(bytes = "vec", tag = "2")]
    pub line: Vec<u8>,
}

impl Entry {
    /// Entry timestamp as nanoseconds since the Unix epoch, `None` when unset
    /// or outside the `i64` range.
    #[must_use]
    pub fn timestamp_nanos(&self) -> Option<i64> {
        let ts = self.timestamp.as_ref()?;
        ts.seconds
            .checked_mul(1_000_000_000)?
            .checked_add(i64::from(ts.nanos))
    }
}
