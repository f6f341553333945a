//! Compact protocol.
//!
//! Header: protocol id `0x82`, `version | type << 5`, varint seq id, varint
//! name length + name. Integers are zigzag varints, doubles little-endian,
//! field ids delta-encoded in the field header and bools folded into it.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::error::CodecError;
use crate::protocol::message::Message;
use crate::protocol::reader::{method_name, Reader};
use crate::protocol::types::{MessageHeader, MessageType, TType};
use crate::protocol::value::{ListValue, MapValue, Struct, Value};

const PROTOCOL_ID: u8 = 0x82;
const VERSION: u8 = 1;
const VERSION_MASK: u8 = 0x1f;
const TYPE_SHIFT: u8 = 5;

const VARINT32_MAX: usize = 5;
const VARINT64_MAX: usize = 10;

const CT_BOOL_TRUE: u8 = 1;
const CT_BOOL_FALSE: u8 = 2;

fn compact_id(ttype: TType) -> u8 {
    match ttype {
        TType::Stop => 0,
        TType::Bool => CT_BOOL_TRUE,
        TType::Byte => 3,
        TType::I16 => 4,
        TType::I32 => 5,
        TType::I64 => 6,
        TType::Double => 7,
        TType::String => 8,
        TType::List => 9,
        TType::Set => 10,
        TType::Map => 11,
        TType::Struct => 12,
    }
}

fn from_compact_id(raw: u8) -> Result<TType, CodecError> {
    match raw {
        0 => Ok(TType::Stop),
        CT_BOOL_TRUE | CT_BOOL_FALSE => Ok(TType::Bool),
        3 => Ok(TType::Byte),
        4 => Ok(TType::I16),
        5 => Ok(TType::I32),
        6 => Ok(TType::I64),
        7 => Ok(TType::Double),
        8 => Ok(TType::String),
        9 => Ok(TType::List),
        10 => Ok(TType::Set),
        11 => Ok(TType::Map),
        12 => Ok(TType::Struct),
        other => Err(CodecError::InvalidType(other)),
    }
}

fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

pub(crate) fn decode(input: &[u8]) -> Result<Message, CodecError> {
    let mut r = Reader::new(input);

    let protocol_id = r.u8()?;
    if protocol_id != PROTOCOL_ID {
        return Err(CodecError::BadProtocolId(protocol_id));
    }
    let version_and_type = r.u8()?;
    if version_and_type & VERSION_MASK != VERSION {
        return Err(CodecError::BadVersion(u32::from(version_and_type & VERSION_MASK)));
    }
    let message_type = MessageType::from_u8(version_and_type >> TYPE_SHIFT)?;
    let sequence_id = read_varint32(&mut r)? as i32;
    let len = read_varint32(&mut r)?;
    let len = r.checked_size(i64::from(len))?;
    let name = method_name(r.take(len)?)?;

    let body = read_struct(&mut r)?;
    r.finish()?;

    Ok(Message {
        header: MessageHeader {
            name,
            message_type,
            sequence_id,
        },
        body,
    })
}

pub(crate) fn encode(message: &Message) -> Bytes {
    let mut out = BytesMut::with_capacity(64);
    let header = &message.header;
    out.put_u8(PROTOCOL_ID);
    out.put_u8(VERSION | (header.message_type.as_u8() << TYPE_SHIFT));
    write_varint(&mut out, u64::from(header.sequence_id as u32));
    write_binary(&mut out, header.name.as_bytes());
    write_struct(&mut out, &message.body);
    out.freeze()
}

fn read_varint32(r: &mut Reader<'_>) -> Result<u32, CodecError> {
    let v = r.varint(VARINT32_MAX)?;
    u32::try_from(v).map_err(|_| CodecError::VarintOverflow)
}

fn read_struct(r: &mut Reader<'_>) -> Result<Struct, CodecError> {
    r.enter()?;
    let mut s = Struct::new();
    let mut last_id: i16 = 0;
    loop {
        let header = r.u8()?;
        if header == 0 {
            break;
        }
        let raw_type = header & 0x0f;
        let delta = header >> 4;
        let id = if delta == 0 {
            unzigzag32(read_varint32(r)?) as i16
        } else {
            last_id.wrapping_add(i16::from(delta))
        };
        last_id = id;

        let value = match raw_type {
            CT_BOOL_TRUE => Value::Bool(true),
            CT_BOOL_FALSE => Value::Bool(false),
            _ => {
                let ttype = from_compact_id(raw_type)?;
                read_value(r, ttype)?
            }
        };
        s.push(id, value);
    }
    r.leave();
    Ok(s)
}

fn read_value(r: &mut Reader<'_>, ttype: TType) -> Result<Value, CodecError> {
    let value = match ttype {
        TType::Stop => return Err(CodecError::InvalidType(0)),
        TType::Bool => Value::Bool(r.u8()? == CT_BOOL_TRUE),
        TType::Byte => Value::Byte(r.u8()? as i8),
        TType::I16 => Value::I16(unzigzag32(read_varint32(r)?) as i16),
        TType::I32 => Value::I32(unzigzag32(read_varint32(r)?)),
        TType::I64 => Value::I64(unzigzag64(r.varint(VARINT64_MAX)?)),
        TType::Double => Value::Double(r.f64_le()?),
        TType::String => {
            let len = read_varint32(r)?;
            let len = r.checked_size(i64::from(len))?;
            Value::Binary(Bytes::copy_from_slice(r.take(len)?))
        }
        TType::Struct => Value::Struct(read_struct(r)?),
        TType::Map => {
            let size = read_varint32(r)?;
            let size = r.checked_size(i64::from(size))?;
            let (key_type, value_type) = if size == 0 {
                (TType::Stop, TType::Stop)
            } else {
                let kv = r.u8()?;
                (from_compact_id(kv >> 4)?, from_compact_id(kv & 0x0f)?)
            };
            r.enter()?;
            let mut entries = Vec::with_capacity(size);
            for _ in 0..size {
                let k = read_value(r, key_type)?;
                let v = read_value(r, value_type)?;
                entries.push((k, v));
            }
            r.leave();
            Value::Map(MapValue::new(key_type, value_type, entries))
        }
        TType::Set | TType::List => {
            let size_and_type = r.u8()?;
            let elem_type = from_compact_id(size_and_type & 0x0f)?;
            let short_size = size_and_type >> 4;
            let size = if short_size == 0x0f {
                i64::from(read_varint32(r)?)
            } else {
                i64::from(short_size)
            };
            let size = r.checked_size(size)?;
            r.enter()?;
            let mut items = Vec::with_capacity(size);
            for _ in 0..size {
                items.push(read_value(r, elem_type)?);
            }
            r.leave();
            let list = ListValue::new(elem_type, items);
            if ttype == TType::Set {
                Value::Set(list)
            } else {
                Value::List(list)
            }
        }
    };
    Ok(value)
}

fn write_varint(out: &mut BytesMut, mut n: u64) {
    while n >= 0x80 {
        out.put_u8((n as u8 & 0x7f) | 0x80);
        n >>= 7;
    }
    out.put_u8(n as u8);
}

fn write_binary(out: &mut BytesMut, bytes: &[u8]) {
    write_varint(out, bytes.len() as u64);
    out.put_slice(bytes);
}

fn write_struct(out: &mut BytesMut, s: &Struct) {
    let mut last_id: i16 = 0;
    for field in s.fields() {
        let ctype = match &field.value {
            Value::Bool(true) => CT_BOOL_TRUE,
            Value::Bool(false) => CT_BOOL_FALSE,
            other => compact_id(other.ttype()),
        };
        let delta = i32::from(field.id) - i32::from(last_id);
        if field.id > last_id && delta <= 15 {
            out.put_u8(((delta as u8) << 4) | ctype);
        } else {
            out.put_u8(ctype);
            write_varint(out, u64::from(zigzag32(i32::from(field.id))));
        }
        last_id = field.id;

        if !matches!(field.value, Value::Bool(_)) {
            write_value(out, &field.value);
        }
    }
    out.put_u8(0);
}

fn write_value(out: &mut BytesMut, value: &Value) {
    match value {
        Value::Bool(v) => out.put_u8(if *v { CT_BOOL_TRUE } else { CT_BOOL_FALSE }),
        Value::Byte(v) => out.put_i8(*v),
        Value::I16(v) => write_varint(out, u64::from(zigzag32(i32::from(*v)))),
        Value::I32(v) => write_varint(out, u64::from(zigzag32(*v))),
        Value::I64(v) => write_varint(out, zigzag64(*v)),
        Value::Double(v) => out.put_f64_le(*v),
        Value::Binary(b) => write_binary(out, b),
        Value::Struct(s) => write_struct(out, s),
        Value::Map(m) => {
            if m.entries.is_empty() {
                out.put_u8(0);
            } else {
                write_varint(out, m.entries.len() as u64);
                out.put_u8((compact_id(m.key_type) << 4) | compact_id(m.value_type));
                for (k, v) in &m.entries {
                    write_value(out, k);
                    write_value(out, v);
                }
            }
        }
        Value::Set(l) | Value::List(l) => {
            let elem = compact_id(l.elem_type);
            let size = l.items.len();
            if size <= 14 {
                out.put_u8(((size as u8) << 4) | elem);
            } else {
                out.put_u8(0xf0 | elem);
                write_varint(out, size as u64);
            }
            for item in &l.items {
                write_value(out, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `hello("Trustin")` as written by a stock compact-protocol client.
    const HELLO_CALL: &[u8] = &[
        0x82, 0x21, // protocol id, version 1 | CALL << 5
        0x01, // seq id
        0x05, b'h', b'e', b'l', b'l', b'o', // name
        0x18, // field 1 (delta 1), binary
        0x07, b'T', b'r', b'u', b's', b't', b'i', b'n', //
        0x00, // stop
    ];

    #[test]
    fn decodes_known_call_bytes() {
        let message = decode(HELLO_CALL).unwrap();
        assert_eq!(message.header.name, "hello");
        assert_eq!(message.header.message_type, MessageType::Call);
        assert_eq!(message.header.sequence_id, 1);
        assert_eq!(message.body.field(1).and_then(Value::as_str), Some("Trustin"));
        assert_eq!(&encode(&message)[..], HELLO_CALL);
    }

    #[test]
    fn zigzag_matches_reference_values() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(i32::MIN), u32::MAX);
        assert_eq!(unzigzag32(zigzag32(-123_456)), -123_456);
        assert_eq!(unzigzag64(zigzag64(i64::MIN)), i64::MIN);
    }

    #[test]
    fn long_field_deltas_and_bools_round_trip() {
        let message = Message {
            header: MessageHeader::new("m", MessageType::Call, -5),
            body: Struct::new()
                .with(3, Value::Bool(true))
                .with(40, Value::Bool(false))
                .with(2, Value::I16(-7))
                .with(
                    41,
                    Value::List(ListValue::new(
                        TType::Bool,
                        (0..20).map(|i| Value::Bool(i % 2 == 0)).collect(),
                    )),
                ),
        };
        let bytes = encode(&message);
        // field 3: delta 3, bool true folded into the header
        assert_eq!(bytes[9], 0x31);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn rejects_bad_protocol_id() {
        let mut bytes = HELLO_CALL.to_vec();
        bytes[0] = 0x80;
        assert_eq!(decode(&bytes), Err(CodecError::BadProtocolId(0x80)));
    }

    #[test]
    fn rejects_overlong_varint() {
        let mut bytes = HELLO_CALL[..2].to_vec();
        bytes.extend_from_slice(&[0xff; 6]);
        assert_eq!(decode(&bytes), Err(CodecError::VarintOverflow));
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(decode(&HELLO_CALL[..HELLO_CALL.len() - 1]).is_err());
        assert!(decode(&HELLO_CALL[..4]).is_err());
    }
}
