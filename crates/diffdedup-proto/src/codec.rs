//! JSON-lines and length-prefixed CBOR encodings.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

/// Largest CBOR frame body accepted (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_LEN: usize = 4;

/// Serialize an event to a single JSON line, without the trailing newline.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn to_json_line<T: Serialize>(event: &T) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// Parse one JSON line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns error if the line is not a valid event.
pub fn from_json_line<T: DeserializeOwned>(line: &str) -> Result<Option<T>, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| CodecError::Deserialize(e.to_string()))
}

/// Serialize an event to CBOR bytes.
///
/// # Errors
///
/// Returns error if serialization fails.
pub fn to_cbor<T: Serialize>(event: &T) -> Result<Vec<u8>, CodecError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(event, &mut bytes).map_err(|e| CodecError::Serialize(e.to_string()))?;
    Ok(bytes)
}

/// Deserialize an event from CBOR bytes.
///
/// # Errors
///
/// Returns error if deserialization fails.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
}

/// Write one length-prefixed frame.
///
/// # Errors
///
/// Returns error if the body exceeds [`MAX_FRAME_LEN`] or the write fails.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), CodecError> {
    if body.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        len: body.len(),
        max: MAX_FRAME_LEN,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `None` on a clean end of stream, i.e. before any header byte.
///
/// # Errors
///
/// Returns error if the stream ends inside a frame, the announced length is
/// too large, or the read fails.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, CodecError> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    if filled < HEADER_LEN {
        return Err(CodecError::Truncated {
            expected: HEADER_LEN,
            got: filled,
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = Vec::with_capacity(len);
    reader.by_ref().take(len as u64).read_to_end(&mut body)?;
    if body.len() < len {
        return Err(CodecError::Truncated {
            expected: len,
            got: body.len(),
        });
    }
    Ok(Some(body))
}

/// Encode an event as CBOR and write it as one frame.
///
/// # Errors
///
/// Returns error if encoding or writing fails.
pub fn write_cbor_frame<W: Write, T: Serialize>(
    writer: &mut W,
    event: &T,
) -> Result<(), CodecError> {
    write_frame(writer, &to_cbor(event)?)
}

/// Read one frame and decode it as a CBOR event.
///
/// # Errors
///
/// Returns error if reading or decoding fails.
pub fn read_cbor_frame<R: Read, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<T>, CodecError> {
    read_frame(reader)?.map(|body| from_cbor(&body)).transpose()
}

/// Errors for event encoding and framing.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// Deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialize(String),
    /// Frame body is larger than allowed
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced or actual body length
        len: usize,
        /// Limit in effect
        max: usize,
    },
    /// Stream ended inside a frame
    #[error("truncated frame: expected {expected} bytes, got {got}")]
    Truncated {
        /// Bytes the frame needed
        expected: usize,
        /// Bytes actually read
        got: usize,
    },
    /// Underlying I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WireInput, WireOutput};
    use serde_json::json;

    #[test]
    fn json_line_uses_event_tag() {
        let op = WireOutput::Update {
            id: 2,
            data: json!({"group": "a"}),
        };
        let line = to_json_line(&op).unwrap();
        assert_eq!(line, r#"{"event":"update","id":2,"data":{"group":"a"}}"#);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert!(from_json_line::<WireInput>("   ").unwrap().is_none());
        assert!(from_json_line::<WireInput>("").unwrap().is_none());
    }

    #[test]
    fn malformed_line_is_an_error() {
        let err = from_json_line::<WireInput>(r#"{"event":"upsert","id":0}"#).unwrap_err();
        assert!(matches!(err, CodecError::Deserialize(_)));
    }

    #[test]
    fn cbor_keeps_sort_index() {
        let op = WireInput::Insert {
            id: 4,
            data: json!({"group": "b", "n": 1.5}),
            sort_index: Some(-7),
        };
        let decoded: WireInput = from_cbor(&to_cbor(&op).unwrap()).unwrap();
        assert_eq!(decoded, op);
    }

    #[test]
    fn frames_stream_until_clean_eof() {
        let mut buf = Vec::new();
        write_cbor_frame(&mut buf, &WireOutput::Delete { id: 1 }).unwrap();
        write_cbor_frame(&mut buf, &WireOutput::Delete { id: 2 }).unwrap();

        let mut reader = buf.as_slice();
        let first: Option<WireOutput> = read_cbor_frame(&mut reader).unwrap();
        let second: Option<WireOutput> = read_cbor_frame(&mut reader).unwrap();
        let end: Option<WireOutput> = read_cbor_frame(&mut reader).unwrap();

        assert_eq!(first, Some(WireOutput::Delete { id: 1 }));
        assert_eq!(second, Some(WireOutput::Delete { id: 2 }));
        assert_eq!(end, None);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[1, 2, 3, 4, 5]).unwrap();

        let err = read_frame(&mut &buf[..7]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Truncated {
                expected: 5,
                got: 3
            }
        ));

        let err = read_frame(&mut &buf[..2]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Truncated {
                expected: 4,
                got: 2
            }
        ));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let header = u32::MAX.to_be_bytes();
        let err = read_frame(&mut &header[..]).unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge { .. }));
    }
}
