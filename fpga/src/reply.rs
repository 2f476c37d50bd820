//! Replies sent back by the FPGA over its byte stream.
//!
//! Every reply is a frame: `u32` little-endian length (header included), `u32`
//! little-endian reply kind, then the kind's fields back to back. The field
//! layout of each kind lives in a [`Registry`].

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Length of the `(length, kind)` frame header.
pub const HEADER_LEN: usize = 8;

/// How a field's raw bytes are shown.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decoder {
    /// bytes in wire order, as lowercase hex
    Hex,
    /// `v<major>.<minor>.<patch>` from bytes 2, 1, 0
    Version,
    /// little-endian packed ASCII, most significant character first
    Ascii,
}

impl Decoder {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Decoder::Hex => hex::encode(bytes),
            Decoder::Version => match bytes {
                [patch, minor, major, ..] => format!("v{}.{}.{}", major, minor, patch),
                _ => hex::encode(bytes),
            },
            Decoder::Ascii => {
                let reversed: Vec<u8> = bytes.iter().rev().copied().collect();
                String::from_utf8_lossy(&reversed)
                    .trim_end_matches('\0')
                    .to_string()
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub width: usize,
    pub decoder: Decoder,
}

const fn field(name: &'static str, width: usize, decoder: Decoder) -> Field {
    Field {
        name,
        width,
        decoder,
    }
}

/// Layout of one reply kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReplyKind {
    pub code: u32,
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl ReplyKind {
    /// Bytes taken by the fields.
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(|field| field.width).sum()
    }
}

pub const RESET_FPGA_RPL: ReplyKind = ReplyKind {
    code: 0x8000_0000,
    name: "RESET_FPGA_RPL",
    fields: &[],
};

pub const FPGA_STATUS_RPL: ReplyKind = ReplyKind {
    code: 0x8000_0001,
    name: "FPGA_STATUS_RPL",
    fields: &[
        field("version", 4, Decoder::Version),
        field("build_date", 8, Decoder::Ascii),
        field("build_host", 8, Decoder::Ascii),
        field("cmd_cap", 8, Decoder::Hex),
        field("fpga_state", 1, Decoder::Hex),
    ],
};

pub const FPGA_IGNORE_RPL: ReplyKind = ReplyKind {
    code: 0x8000_0002,
    name: "FPGA_IGNORE_RPL",
    fields: &[field("ignored_header", 8, Decoder::Hex)],
};

pub const VERIFY_SECP256K1_SIG_RPL: ReplyKind = ReplyKind {
    code: 0x8000_0101,
    name: "VERIFY_SECP256K1_SIG_RPL",
    fields: &[
        field("index", 8, Decoder::Hex),
        field("bm", 1, Decoder::Hex),
        field("cycle_cnt", 2, Decoder::Hex),
    ],
};

pub const BLS12_381_INTERRUPT_RPL: ReplyKind = ReplyKind {
    code: 0x8000_0200,
    name: "BLS12_381_INTERRUPT_RPL",
    fields: &[
        field("index", 4, Decoder::Hex),
        field("data_type", 1, Decoder::Hex),
        field("padding", 3, Decoder::Hex),
    ],
};

/// Kinds understood by the current bitstream.
pub const STANDARD: [ReplyKind; 5] = [
    RESET_FPGA_RPL,
    FPGA_STATUS_RPL,
    FPGA_IGNORE_RPL,
    VERIFY_SECP256K1_SIG_RPL,
    BLS12_381_INTERRUPT_RPL,
];

/// Reply kind code → field layout.
#[derive(Clone, Debug)]
pub struct Registry {
    kinds: BTreeMap<u32, ReplyKind>,
}

impl Registry {
    /// Fails if two kinds share a code: one code with two layouts is ambiguous.
    pub fn new(kinds: impl IntoIterator<Item = ReplyKind>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for kind in kinds {
            if let Some(first) = map.insert(kind.code, kind) {
                return Err(Error::DuplicateReplyKind {
                    code: kind.code,
                    first: first.name,
                    second: kind.name,
                });
            }
        }
        Ok(Self { kinds: map })
    }

    pub fn standard() -> Result<Self> {
        Self::new(STANDARD)
    }

    pub fn get(&self, code: u32) -> Result<&ReplyKind> {
        self.kinds.get(&code).ok_or(Error::UnknownReply(code))
    }

    /// Decode one frame's fields in layout order.
    pub fn decode(&self, frame: &Frame<'_>) -> Result<Reply> {
        let kind = self.get(frame.code())?;
        let payload = frame.payload();
        if payload.len() < kind.payload_len() {
            return Err(Error::FieldOverrun {
                kind: kind.name,
                needed: kind.payload_len(),
                available: payload.len(),
            });
        }

        let mut offset = 0;
        let fields = kind
            .fields
            .iter()
            .map(|field| {
                let bytes = &payload[offset..offset + field.width];
                offset += field.width;
                (field.name, field.decoder.decode(bytes))
            })
            .collect();

        Ok(Reply {
            kind: kind.name,
            fields,
        })
    }
}

/// A decoded reply.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    pub kind: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl core::fmt::Display for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.kind)?;
        for (name, value) in &self.fields {
            write!(f, "\n  {}: {}", name, value)?;
        }
        Ok(())
    }
}

/// One length-prefixed frame, header included.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn code(&self) -> u32 {
        read_u32(&self.bytes[4..HEADER_LEN])
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[HEADER_LEN..]
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

/// Frames of a received buffer, front to back.
///
/// Cloning restarts from the clone's position. After the first malformed frame
/// the iterator yields that error once and then ends.
#[derive(Clone, Debug)]
pub struct Frames<'a> {
    rest: &'a [u8],
}

pub fn frames(buffer: &[u8]) -> Frames<'_> {
    Frames { rest: buffer }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let rest = core::mem::take(&mut self.rest);
        if rest.len() < HEADER_LEN {
            return Some(Err(Error::TruncatedFrame {
                needed: HEADER_LEN,
                available: rest.len(),
            }));
        }

        let length = read_u32(rest);
        let len = length as usize;
        if len < HEADER_LEN {
            return Some(Err(Error::BadFrameLength(length)));
        }
        if len > rest.len() {
            return Some(Err(Error::TruncatedFrame {
                needed: len,
                available: rest.len(),
            }));
        }

        let (bytes, tail) = rest.split_at(len);
        self.rest = tail;
        Some(Ok(Frame { bytes }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(kind: u32, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((HEADER_LEN + payload.len()) as u32).to_le_bytes());
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn splits_back_to_back_frames() {
        let mut buffer = frame(RESET_FPGA_RPL.code, &[]);
        buffer.extend(frame(FPGA_IGNORE_RPL.code, &[1, 2, 3, 4, 5, 6, 7, 8]));
        buffer.extend(frame(RESET_FPGA_RPL.code, &[]));

        let split: Vec<_> = frames(&buffer).collect::<Result<_>>().unwrap();
        assert_eq!(split.len(), 3);
        assert_eq!(split[1].code(), FPGA_IGNORE_RPL.code);
        assert_eq!(split[1].payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn frames_restart_from_a_clone() {
        let mut buffer = frame(RESET_FPGA_RPL.code, &[]);
        buffer.extend(frame(FPGA_IGNORE_RPL.code, &[0; 8]));

        let mut iter = frames(&buffer);
        let saved = iter.clone();
        assert_eq!(iter.by_ref().count(), 2);
        assert!(iter.next().is_none());
        assert_eq!(saved.count(), 2);
    }

    #[test]
    fn truncated_tail_is_reported_once() {
        let mut buffer = frame(RESET_FPGA_RPL.code, &[]);
        buffer.extend_from_slice(&[16, 0, 0, 0, 1, 0, 0, 0x80, 0xaa]);

        let mut iter = frames(&buffer);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(Error::TruncatedFrame {
                needed: 16,
                available: 9
            }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn zero_length_does_not_loop() {
        let buffer = [0u8; 12];
        let results: Vec<_> = frames(&buffer).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::BadFrameLength(0))));
    }

    #[test]
    fn decodes_status_reply() {
        let registry = Registry::standard().unwrap();
        let mut payload = vec![3, 2, 1, 0];
        payload.extend(b"91026102".iter().rev());
        payload.extend(b"zcashpc\0".iter().rev());
        payload.extend([0x0f, 0, 0, 0, 0, 0, 0, 0]);
        payload.push(0);
        let buffer = frame(FPGA_STATUS_RPL.code, &payload);

        let frame = frames(&buffer).next().unwrap().unwrap();
        let reply = registry.decode(&frame).unwrap();
        assert_eq!(reply.kind, "FPGA_STATUS_RPL");
        assert_eq!(
            reply.fields,
            vec![
                ("version", "v1.2.3".to_string()),
                ("build_date", "91026102".to_string()),
                ("build_host", "zcashpc".to_string()),
                ("cmd_cap", "0f00000000000000".to_string()),
                ("fpga_state", "00".to_string()),
            ]
        );
    }

    #[test]
    fn short_payload_is_an_overrun() {
        let registry = Registry::standard().unwrap();
        let buffer = frame(VERIFY_SECP256K1_SIG_RPL.code, &[0; 10]);
        let frame = frames(&buffer).next().unwrap().unwrap();
        assert!(matches!(
            registry.decode(&frame),
            Err(Error::FieldOverrun {
                needed: 11,
                available: 10,
                ..
            })
        ));
    }

    #[test]
    fn unknown_kind() {
        let registry = Registry::standard().unwrap();
        let buffer = frame(0x8000_0999, &[]);
        let frame = frames(&buffer).next().unwrap().unwrap();
        assert!(matches!(
            registry.decode(&frame),
            Err(Error::UnknownReply(0x8000_0999))
        ));
    }

    #[test]
    fn code_reuse_is_rejected() {
        // the status reply as it was laid out before fpga_state was added
        const OLD_STATUS: ReplyKind = ReplyKind {
            code: 0x8000_0001,
            name: "FPGA_STATUS_RPL_V0",
            fields: &[
                field("version", 4, Decoder::Version),
                field("build_date", 8, Decoder::Ascii),
                field("build_host", 8, Decoder::Ascii),
                field("cmd_cap", 8, Decoder::Hex),
            ],
        };
        let kinds = STANDARD.iter().copied().chain([OLD_STATUS]);
        assert!(matches!(
            Registry::new(kinds),
            Err(Error::DuplicateReplyKind {
                code: 0x8000_0001,
                first: "FPGA_STATUS_RPL",
                second: "FPGA_STATUS_RPL_V0",
            })
        ));
    }
}
