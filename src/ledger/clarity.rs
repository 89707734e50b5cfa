//! Minimal Clarity value codec for read-only call results and call arguments.
//!
//! Values arrive hex-encoded in the consensus serialization: one type-prefix
//! byte followed by a type-specific payload, integers big-endian.

use crate::error::{AppError, Result};

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_BUFFER: u8 = 0x02;
const TYPE_TRUE: u8 = 0x03;
const TYPE_FALSE: u8 = 0x04;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;
const TYPE_NONE: u8 = 0x09;
const TYPE_SOME: u8 = 0x0a;
const TYPE_LIST: u8 = 0x0b;
const TYPE_STRING_ASCII: u8 = 0x0d;

const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    Int(i128),
    UInt(u128),
    Bool(bool),
    Buffer(Vec<u8>),
    StringAscii(String),
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    OptionalNone,
    OptionalSome(Box<ClarityValue>),
    List(Vec<ClarityValue>),
}

impl ClarityValue {
    /// Unwrap an `(ok ..)` response. Plain values pass through, `(err ..)`
    /// becomes a ledger error.
    pub fn into_ok(self) -> Result<ClarityValue> {
        match self {
            ClarityValue::ResponseOk(inner) => Ok(*inner),
            ClarityValue::ResponseErr(inner) => Err(AppError::LedgerRpc(format!(
                "contract returned err: {:?}",
                inner
            ))),
            other => Ok(other),
        }
    }

    pub fn as_uint(&self) -> Result<u128> {
        match self {
            ClarityValue::UInt(v) => Ok(*v),
            ClarityValue::Int(v) if *v >= 0 => Ok(*v as u128),
            other => Err(AppError::Decode(format!("expected uint, got {:?}", other))),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            ClarityValue::Bool(v) => Ok(*v),
            other => Err(AppError::Decode(format!("expected bool, got {:?}", other))),
        }
    }

    pub fn as_uint_list(&self) -> Result<Vec<u128>> {
        match self {
            ClarityValue::List(items) => items.iter().map(ClarityValue::as_uint).collect(),
            other => Err(AppError::Decode(format!("expected list, got {:?}", other))),
        }
    }
}

/// Encode a `uint` argument as `0x01` + 16 big-endian bytes, hex prefixed.
pub fn encode_uint(value: u128) -> String {
    format!("0x{}", hex::encode(encode_uint_bytes(value)))
}

pub fn decode_hex(raw: &str) -> Result<ClarityValue> {
    let trimmed = raw.trim().trim_start_matches("0x");
    let bytes = hex::decode(trimmed)
        .map_err(|e| AppError::Decode(format!("invalid clarity hex: {}", e)))?;
    let mut reader = Reader { bytes: &bytes, pos: 0 };
    let value = reader.read_value(0)?;
    if reader.pos != bytes.len() {
        return Err(AppError::Decode(format!(
            "trailing {} bytes after clarity value",
            bytes.len() - reader.pos
        )));
    }
    Ok(value)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| AppError::Decode("unexpected end of clarity value".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u128(&mut self) -> Result<u128> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(self.take(16)?);
        Ok(u128::from_be_bytes(buf))
    }

    fn read_value(&mut self, depth: usize) -> Result<ClarityValue> {
        if depth > MAX_DEPTH {
            return Err(AppError::Decode("clarity value nested too deeply".to_string()));
        }
        let prefix = self.read_u8()?;
        let value = match prefix {
            TYPE_INT => ClarityValue::Int(self.read_u128()? as i128),
            TYPE_UINT => ClarityValue::UInt(self.read_u128()?),
            TYPE_BUFFER => {
                let len = self.read_u32()? as usize;
                ClarityValue::Buffer(self.take(len)?.to_vec())
            }
            TYPE_TRUE => ClarityValue::Bool(true),
            TYPE_FALSE => ClarityValue::Bool(false),
            TYPE_RESPONSE_OK => ClarityValue::ResponseOk(Box::new(self.read_value(depth + 1)?)),
            TYPE_RESPONSE_ERR => ClarityValue::ResponseErr(Box::new(self.read_value(depth + 1)?)),
            TYPE_NONE => ClarityValue::OptionalNone,
            TYPE_SOME => ClarityValue::OptionalSome(Box::new(self.read_value(depth + 1)?)),
            TYPE_LIST => {
                let len = self.read_u32()? as usize;
                // every element needs at least its prefix byte
                if len > self.bytes.len() - self.pos {
                    return Err(AppError::Decode(format!("list length {} exceeds input", len)));
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                ClarityValue::List(items)
            }
            TYPE_STRING_ASCII => {
                let len = self.read_u32()? as usize;
                let raw = self.take(len)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| AppError::Decode(format!("invalid ascii string: {}", e)))?;
                ClarityValue::StringAscii(text.to_string())
            }
            other => {
                return Err(AppError::Decode(format!(
                    "unsupported clarity type prefix 0x{:02x}",
                    other
                )))
            }
        };
        Ok(value)
    }
}

pub(crate) fn encode_uint_bytes(value: u128) -> Vec<u8> {
    let mut bytes = vec![TYPE_UINT];
    bytes.extend_from_slice(&value.to_be_bytes());
    bytes
}
