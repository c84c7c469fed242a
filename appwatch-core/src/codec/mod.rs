//! Wire codec for the change stream.
//!
//! ```text
//! ┌──────────┬──────────┬──────────────────────── Add only ─────────────────────────┐
//! │ tag  u16 │ pid  u32 │ name_len u32 │ name (UTF-16LE, NUL) │ icon_len u32 │ icon │
//! │ BE       │ LE       │ BE           │ name_len bytes       │ BE           │      │
//! └──────────┴──────────┴──────────────┴──────────────────────┴──────────────┴──────┘
//! ```
//!
//! There is no umbrella length prefix: the decoder learns the size of an
//! `Add` from its embedded length fields. The pid is always written
//! little-endian, whatever the host byte order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::AppWatchError;
use crate::model::{ApplicationRecord, ChangeEvent, ChangeKind};

/// tag (2) + pid (4).
pub const CHANGE_HEADER_SIZE: usize = 6;
/// Size of each length prefix in an `Add`.
pub const LENGTH_PREFIX_SIZE: usize = 4;
/// Largest name field, in bytes, either side accepts.
pub const MAX_NAME_SIZE: usize = 64 * 1024;
/// Icons at or above this size are sent as "no icon"; the client rejects them.
pub const MAX_ICON_SIZE: usize = 1024 * 1024;

/// Codec for [`ChangeEvent`]s.
///
/// The server only encodes; the decoder exists for clients and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeCodec;

impl ChangeCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Encode one event into the byte chunks to write, in order.
///
/// Every event yields the 6-byte header. An `Add` additionally yields the
/// name length, the name, the icon length and, when non-empty, the icon.
pub fn encode_chunks(event: &ChangeEvent) -> Result<Vec<Bytes>, AppWatchError> {
    let mut chunks = Vec::with_capacity(5);
    chunks.push(encode_header(event));

    if let ChangeEvent::Add { record, icon, .. } = event {
        let name = encode_name(&record.name)?;
        chunks.push(Bytes::copy_from_slice(&(name.len() as u32).to_be_bytes()));
        chunks.push(name);

        match icon.as_deref() {
            Some(bytes) if bytes.len() >= MAX_ICON_SIZE => {
                warn!(
                    pid = record.pid,
                    size = bytes.len(),
                    "icon too large for the client; sending none"
                );
                chunks.push(Bytes::from_static(&[0; LENGTH_PREFIX_SIZE]));
            }
            Some(bytes) if !bytes.is_empty() => {
                chunks.push(Bytes::copy_from_slice(&(bytes.len() as u32).to_be_bytes()));
                chunks.push(Bytes::copy_from_slice(bytes));
            }
            _ => chunks.push(Bytes::from_static(&[0; LENGTH_PREFIX_SIZE])),
        }
    }

    Ok(chunks)
}

fn encode_header(event: &ChangeEvent) -> Bytes {
    let mut header = BytesMut::with_capacity(CHANGE_HEADER_SIZE);
    header.put_u16(event.kind() as u16);
    header.put_u32_le(event.pid());
    header.freeze()
}

/// UTF-16LE code units plus a terminating NUL.
fn encode_name(name: &str) -> Result<Bytes, AppWatchError> {
    let units = name.encode_utf16().count() + 1;
    let size = units * 2;
    if size > MAX_NAME_SIZE {
        return Err(AppWatchError::NameCopy);
    }

    let mut buf = BytesMut::with_capacity(size);
    for unit in name.encode_utf16().chain(std::iter::once(0)) {
        buf.put_u16_le(unit);
    }
    Ok(buf.freeze())
}

impl tokio_util::codec::Encoder<ChangeEvent> for ChangeCodec {
    type Error = AppWatchError;

    fn encode(&mut self, item: ChangeEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let chunks = encode_chunks(&item)?;
        dst.reserve(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            dst.extend_from_slice(&chunk);
        }
        Ok(())
    }
}

impl tokio_util::codec::Decoder for ChangeCodec {
    type Item = ChangeEvent;
    type Error = AppWatchError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < CHANGE_HEADER_SIZE {
            return Ok(None);
        }

        let kind = ChangeKind::try_from(u16::from_be_bytes([src[0], src[1]]))?;
        let pid = u32::from_le_bytes([src[2], src[3], src[4], src[5]]);

        let event = match kind {
            ChangeKind::Remove => ChangeEvent::Remove { pid },
            ChangeKind::FocusChanged => ChangeEvent::FocusChanged { pid },
            ChangeKind::Heartbeat => ChangeEvent::Heartbeat,
            ChangeKind::Add => return decode_add(src, pid),
        };

        src.advance(CHANGE_HEADER_SIZE);
        Ok(Some(event))
    }
}

/// Decode an `Add` once all of its variable-length fields have arrived.
fn decode_add(src: &mut BytesMut, pid: u32) -> Result<Option<ChangeEvent>, AppWatchError> {
    let name_at = CHANGE_HEADER_SIZE + LENGTH_PREFIX_SIZE;
    let Some(name_len) = peek_length(src, CHANGE_HEADER_SIZE) else {
        return Ok(None);
    };
    if name_len > MAX_NAME_SIZE {
        return Err(AppWatchError::PayloadTooLarge {
            size: name_len,
            max: MAX_NAME_SIZE,
        });
    }
    if name_len % 2 != 0 {
        return Err(AppWatchError::ProtocolViolation("odd UTF-16 name length"));
    }

    let icon_len_at = name_at + name_len;
    let Some(icon_len) = peek_length(src, icon_len_at) else {
        src.reserve(icon_len_at + LENGTH_PREFIX_SIZE - src.len());
        return Ok(None);
    };
    if icon_len >= MAX_ICON_SIZE {
        return Err(AppWatchError::PayloadTooLarge {
            size: icon_len,
            max: MAX_ICON_SIZE,
        });
    }

    let total = icon_len_at + LENGTH_PREFIX_SIZE + icon_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let mut frame = src.split_to(total);
    frame.advance(name_at);
    let name_bytes = frame.split_to(name_len);
    frame.advance(LENGTH_PREFIX_SIZE);

    let units: Vec<u16> = name_bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let name = String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string();
    let icon = (icon_len > 0).then(|| frame.to_vec());

    Ok(Some(ChangeEvent::Add {
        pid,
        record: ApplicationRecord {
            pid,
            name,
            exec_path: Default::default(),
        },
        icon,
    }))
}

fn peek_length(src: &BytesMut, at: usize) -> Option<usize> {
    let bytes = src.get(at..at + LENGTH_PREFIX_SIZE)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
}

// ── Tests ────────────────────────────────────────────────────────
