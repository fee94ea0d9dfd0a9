// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Push body encoding: entry -> stream -> request -> protobuf -> snappy.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use prost::Message;

use crate::errors::{DecodeError, EncodingError};
use crate::proto::{Entry, PushRequest, Stream};

/// Stream selector shared by every entry a sink emits, e.g. `{job="api"}`.
///
/// The string is opaque to this crate and never changes once built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LabelSet(Arc<str>);

impl LabelSet {
    #[must_use]
    pub fn new(labels: &str) -> Self {
        Self(Arc::from(labels))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LabelSet {
    fn from(labels: &str) -> Self {
        Self::new(labels)
    }
}

impl From<String> for LabelSet {
    fn from(labels: String) -> Self {
        Self(Arc::from(labels))
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snappy-compressed protobuf `PushRequest`, ready to POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedBody(Vec<u8>);

impl EncodedBody {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encodes one line as a single-entry, single-stream push body stamped with
/// the current time.
///
/// The stamp is taken here, when the push is attempted, not when the line was
/// handed to the sink. Under dispatch delay the two differ.
pub fn encode(labels: &LabelSet, line: &[u8]) -> Result<EncodedBody, EncodingError> {
    encode_at(labels, line, SystemTime::now())
}

/// Same as [`encode`] with an explicit entry timestamp.
pub fn encode_at(
    labels: &LabelSet,
    line: &[u8],
    at: SystemTime,
) -> Result<EncodedBody, EncodingError> {
    let request = PushRequest {
        streams: vec![Stream {
            labels: labels.as_str().to_owned(),
            entries: vec![Entry {
                timestamp: Some(at.into()),
                line: line.to_vec(),
            }],
        }],
    };

    let serialized = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new().compress_vec(&serialized)?;
    Ok(EncodedBody(compressed))
}

/// Reverses [`encode`]: snappy block decompression then protobuf decoding.
pub fn decode(body: &[u8]) -> Result<PushRequest, DecodeError> {
    let serialized = snap::raw::Decoder::new().decompress_vec(body)?;
    Ok(PushRequest::decode(serialized.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn labels() -> LabelSet {
        LabelSet::new(r#"{host="localhost", job="test"}"#)
    }

    #[test]
    fn test_encode_produces_single_stream_single_entry() {
        let body = encode(&labels(), b"hello").expect("encode failed");
        let request = decode(body.as_bytes()).expect("decode failed");

        assert_eq!(request.streams.len(), 1);
        let stream = &request.streams[0];
        assert_eq!(stream.labels, labels().as_str());
        assert_eq!(stream.entries.len(), 1);
        assert_eq!(stream.entries[0].line, b"hello");
        assert!(stream.entries[0].timestamp.is_some());
    }

    #[test]
    fn test_line_round_trips_byte_exact() {
        let line = [0xff, 0x00, b'\n', 0xc3, 0x28, b'{', b'"'];
        let body = encode(&labels(), &line).expect("encode failed");
        let request = decode(body.as_bytes()).expect("decode failed");
        assert_eq!(request.streams[0].entries[0].line, line);
    }

    #[test]
    fn test_empty_line_is_encoded() {
        let body = encode(&labels(), b"").expect("encode failed");
        let request = decode(body.as_bytes()).expect("decode failed");
        assert_eq!(request.streams[0].entries.len(), 1);
        assert!(request.streams[0].entries[0].line.is_empty());
    }

    #[test]
    fn test_same_instant_gives_identical_bodies() {
        let at = UNIX_EPOCH + Duration::from_nanos(1_702_400_000_123_456_789);
        let first = encode_at(&labels(), b"same", at).unwrap();
        let second = encode_at(&labels(), b"same", at).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_bodies_differ_only_in_timestamp() {
        let early = UNIX_EPOCH + Duration::from_secs(1_000);
        let late = UNIX_EPOCH + Duration::from_secs(2_000) + Duration::from_nanos(7);

        let mut first = decode(encode_at(&labels(), b"same", early).unwrap().as_bytes()).unwrap();
        let mut second = decode(encode_at(&labels(), b"same", late).unwrap().as_bytes()).unwrap();
        assert_ne!(first, second);

        first.streams[0].entries[0].timestamp = None;
        second.streams[0].entries[0].timestamp = None;
        assert_eq!(first, second);
    }

    #[test]
    fn test_timestamp_is_nanoseconds_since_epoch() {
        let at = UNIX_EPOCH + Duration::from_nanos(1_702_400_000_123_456_789);
        let request = decode(encode_at(&labels(), b"x", at).unwrap().as_bytes()).unwrap();
        assert_eq!(
            request.streams[0].entries[0].timestamp_nanos(),
            Some(1_702_400_000_123_456_789)
        );
    }

    #[test]
    fn test_encode_stamps_current_time() {
        let before = SystemTime::now();
        let request = decode(encode(&labels(), b"now").unwrap().as_bytes()).unwrap();
        let after = SystemTime::now();

        let nanos = request.streams[0].entries[0].timestamp_nanos().unwrap();
        let as_nanos = |t: SystemTime| t.duration_since(UNIX_EPOCH).unwrap().as_nanos() as i64;
        assert!(nanos >= as_nanos(before));
        assert!(nanos <= as_nanos(after));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"definitely not snappy"),
            Err(DecodeError::Decompression(_))
        ));

        let not_protobuf = snap::raw::Encoder::new()
            .compress_vec(&[0xff, 0xff, 0xff])
            .unwrap();
        assert!(matches!(
            decode(&not_protobuf),
            Err(DecodeError::Protobuf(_))
        ));
    }

    #[test]
    fn test_label_set_is_opaque() {
        let raw = "not even a selector";
        assert_eq!(LabelSet::from(raw).as_str(), raw);
        assert_eq!(LabelSet::from(raw.to_string()).to_string(), raw);
    }
}
