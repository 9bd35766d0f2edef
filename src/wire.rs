//! Fixed, versioned, little-endian pack format for shipping messages between
//! ranks.
//!
//! A *pack* holds every message a rank currently has:
//!
//! ```text
//! PackHdr { version, reserved, count, max_len }
//! count × ( WireLen, payload[len] )
//! ```
//!
//! and each payload is one message:
//!
//! ```text
//! WireLen text | WireLen tag | WireLen file | WireMsgFixed | n_ranks × WireRank
//! ```
//!
//! Every length is checked against what is left of its enclosing frame, so a
//! pack either decodes completely or is rejected with a [`PackError`]. An empty
//! buffer is a valid pack with no messages.

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, Bytes, BytesMut};
use itertools::Itertools;
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::lumberjack_error::PackError;
use crate::message::{Level, Message};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// All multi-byte integers in these structs are **little-endian** on the wire.
/// We store them pre-LE with `.to_le()` and decode with `.from_le()`.

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct PackHdr {
    pub version_le: u16,
    pub reserved_le: u16, // keep zero
    pub count_le: u32,    // number of framed messages
    pub max_len_le: u32,  // largest payload, a sizing hint for receivers
}

impl PackHdr {
    pub fn new(count: usize, max_len: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            reserved_le: 0,
            count_le: (count as u32).to_le(),
            max_len_le: (max_len as u32).to_le(),
        }
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
    pub fn max_len(&self) -> usize {
        u32::from_le(self.max_len_le) as usize
    }
}

/// Length prefix for a payload or a string field.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireLen {
    pub n_le: u32,
}

impl WireLen {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// Fixed-width tail of a message payload.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireMsgFixed {
    pub line_le: u32,
    pub level_le: u32,
    pub rank_count_le: u64,
    pub n_ranks_le: u32,
    pub _pad: u32, // explicit padding to 8-byte alignment
}

/// A tracked rank. NOTE: ranks are u32 (never usize) on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireRank {
    pub rank_le: u32,
}

const_assert_eq!(size_of::<PackHdr>(), 12);
const_assert_eq!(size_of::<WireLen>(), 4);
const_assert_eq!(size_of::<WireMsgFixed>(), 24);
const_assert_eq!(size_of::<WireRank>(), 4);

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(bytemuck::bytes_of(&WireLen::new(s.len())));
    buf.extend_from_slice(s.as_bytes());
}

/// Serialize one message into its payload bytes.
pub fn encode_message(message: &Message) -> Vec<u8> {
    let ranks = message.ranks();
    let mut buf = Vec::with_capacity(
        3 * size_of::<WireLen>()
            + message.text().len()
            + message.tag().len()
            + message.file_name().len()
            + size_of::<WireMsgFixed>()
            + ranks.len() * size_of::<WireRank>(),
    );
    put_str(&mut buf, message.text());
    put_str(&mut buf, message.tag());
    put_str(&mut buf, message.file_name());
    let fixed = WireMsgFixed {
        line_le: message.line_number().to_le(),
        level_le: (message.level().index() as u32).to_le(),
        rank_count_le: (message.rank_count() as u64).to_le(),
        n_ranks_le: (ranks.len() as u32).to_le(),
        _pad: 0,
    };
    buf.extend_from_slice(bytemuck::bytes_of(&fixed));
    for &rank in ranks {
        let w = WireRank {
            rank_le: (rank as u32).to_le(),
        };
        buf.extend_from_slice(bytemuck::bytes_of(&w));
    }
    buf
}

/// Serialize `messages` into one pack. No messages yields an empty buffer.
pub fn encode_messages(messages: &[Message]) -> Bytes {
    if messages.is_empty() {
        return Bytes::new();
    }
    let payloads: Vec<Vec<u8>> = messages.iter().map(encode_message).collect();
    let max_len = payloads.iter().map(Vec::len).max().unwrap_or(0);
    let total: usize = payloads
        .iter()
        .map(|p| size_of::<WireLen>() + p.len())
        .sum();

    let mut out = BytesMut::with_capacity(size_of::<PackHdr>() + total);
    out.put_slice(bytemuck::bytes_of(&PackHdr::new(payloads.len(), max_len)));
    for payload in &payloads {
        out.put_slice(bytemuck::bytes_of(&WireLen::new(payload.len())));
        out.put_slice(payload);
    }
    out.freeze()
}

/// Bounds-checked reader over one frame.
struct Cursor<'a> {
    buf: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        if n > self.buf.len() {
            return Err(PackError::Truncated {
                needed: n,
                available: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read<T: Pod>(&mut self) -> Result<T, PackError> {
        let raw = self.take(size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    fn read_str(&mut self) -> Result<String, PackError> {
        let len = self.read::<WireLen>()?.get();
        let raw = self.take(len)?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| PackError::InvalidUtf8)
    }

    fn finish(self) -> Result<(), PackError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(PackError::TrailingBytes(n)),
        }
    }
}

/// Decode one message payload; the payload must be consumed exactly.
pub fn decode_message(payload: &[u8]) -> Result<Message, PackError> {
    let mut cur = Cursor::new(payload);
    let text = cur.read_str()?;
    let tag = cur.read_str()?;
    let file_name = cur.read_str()?;
    let fixed = cur.read::<WireMsgFixed>()?;

    let raw_level = u32::from_le(fixed.level_le);
    let level = Level::from_index(raw_level).ok_or(PackError::InvalidLevel(raw_level))?;
    let rank_count = u64::from_le(fixed.rank_count_le);
    let n_ranks = u32::from_le(fixed.n_ranks_le) as usize;

    let rank_bytes = n_ranks
        .checked_mul(size_of::<WireRank>())
        .ok_or(PackError::Truncated {
            needed: usize::MAX,
            available: cur.remaining(),
        })?;
    let raw_ranks = cur.take(rank_bytes)?;
    let ranks: Vec<usize> = raw_ranks
        .chunks_exact(size_of::<WireRank>())
        .map(|c| u32::from_le(bytemuck::pod_read_unaligned::<WireRank>(c).rank_le) as usize)
        .collect();
    cur.finish()?;

    let inconsistent = PackError::InconsistentRanks {
        count: rank_count,
        tracked: ranks.len(),
    };
    let count = usize::try_from(rank_count).map_err(|_| inconsistent.clone())?;
    if ranks.is_empty() || count < ranks.len() || !ranks.iter().all_unique() {
        return Err(inconsistent);
    }

    Ok(Message::from_parts(
        text,
        tag,
        file_name,
        u32::from_le(fixed.line_le),
        level,
        count,
        ranks,
    ))
}

/// Decode a whole pack produced by [`encode_messages`].
///
/// Either every framed message decodes and the frames span the buffer
/// exactly, or the pack is rejected and nothing is returned.
pub fn decode_messages(pack: &[u8]) -> Result<Vec<Message>, PackError> {
    if pack.is_empty() {
        return Ok(Vec::new());
    }
    let mut cur = Cursor::new(pack);
    let hdr = cur.read::<PackHdr>()?;
    if hdr.version() != WIRE_VERSION {
        return Err(PackError::BadVersion(hdr.version()));
    }
    let count = hdr.count();
    let max_len = hdr.max_len();

    let mut out = Vec::with_capacity(count.min(cur.remaining() / size_of::<WireLen>()));
    for found in 0..count {
        if cur.remaining() == 0 {
            return Err(PackError::CountMismatch {
                declared: count,
                found,
            });
        }
        let len = cur.read::<WireLen>()?.get();
        if len > max_len {
            return Err(PackError::LengthExceedsMax { len, max: max_len });
        }
        out.push(decode_message(cur.take(len)?)?);
    }
    cur.finish()?;
    Ok(out)
}
