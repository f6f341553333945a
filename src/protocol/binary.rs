//! Strict binary protocol.
//!
//! Header: `i32 (0x8001_0000 | type)`, `i32 len + name`, `i32 seq id`.
//! Integers are big-endian and fixed-width; strings and collections carry
//! `i32` length prefixes.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::error::CodecError;
use crate::protocol::message::Message;
use crate::protocol::reader::{method_name, Reader};
use crate::protocol::types::{MessageHeader, MessageType, TType};
use crate::protocol::value::{ListValue, MapValue, Struct, Value};

const VERSION_MASK: u32 = 0xffff_0000;
const VERSION_1: u32 = 0x8001_0000;

pub(crate) fn decode(input: &[u8]) -> Result<Message, CodecError> {
    let mut r = Reader::new(input);

    let version = r.i32_be()?;
    if version >= 0 {
        return Err(CodecError::Unversioned);
    }
    let version = version as u32;
    if version & VERSION_MASK != VERSION_1 {
        return Err(CodecError::BadVersion(version));
    }
    let message_type = MessageType::from_u8((version & 0xff) as u8)?;

    let len = r.i32_be()?;
    let len = r.checked_size(i64::from(len))?;
    let name = method_name(r.take(len)?)?;
    let sequence_id = r.i32_be()?;

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
    out.put_u32(VERSION_1 | u32::from(header.message_type.as_u8()));
    write_binary(&mut out, header.name.as_bytes());
    out.put_i32(header.sequence_id);
    write_struct(&mut out, &message.body);
    out.freeze()
}

fn read_struct(r: &mut Reader<'_>) -> Result<Struct, CodecError> {
    r.enter()?;
    let mut s = Struct::new();
    loop {
        let raw = r.u8()?;
        let ttype = TType::from_binary_id(raw)?;
        if ttype == TType::Stop {
            break;
        }
        let id = r.i16_be()?;
        let value = read_value(r, ttype)?;
        s.push(id, value);
    }
    r.leave();
    Ok(s)
}

fn read_value(r: &mut Reader<'_>, ttype: TType) -> Result<Value, CodecError> {
    let value = match ttype {
        TType::Stop => return Err(CodecError::InvalidType(0)),
        TType::Bool => Value::Bool(r.u8()? != 0),
        TType::Byte => Value::Byte(r.u8()? as i8),
        TType::I16 => Value::I16(r.i16_be()?),
        TType::I32 => Value::I32(r.i32_be()?),
        TType::I64 => Value::I64(r.i64_be()?),
        TType::Double => Value::Double(r.f64_be()?),
        TType::String => {
            let len = r.i32_be()?;
            let len = r.checked_size(i64::from(len))?;
            Value::Binary(Bytes::copy_from_slice(r.take(len)?))
        }
        TType::Struct => Value::Struct(read_struct(r)?),
        TType::Map => {
            let key_type = TType::from_binary_id(r.u8()?)?;
            let value_type = TType::from_binary_id(r.u8()?)?;
            let size = r.i32_be()?;
            let size = r.checked_size(i64::from(size))?;
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
            let elem_type = TType::from_binary_id(r.u8()?)?;
            let size = r.i32_be()?;
            let size = r.checked_size(i64::from(size))?;
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

fn write_binary(out: &mut BytesMut, bytes: &[u8]) {
    out.put_i32(bytes.len() as i32);
    out.put_slice(bytes);
}

fn write_struct(out: &mut BytesMut, s: &Struct) {
    for field in s.fields() {
        out.put_u8(field.value.ttype().binary_id());
        out.put_i16(field.id);
        write_value(out, &field.value);
    }
    out.put_u8(TType::Stop.binary_id());
}

fn write_value(out: &mut BytesMut, value: &Value) {
    match value {
        Value::Bool(v) => out.put_u8(u8::from(*v)),
        Value::Byte(v) => out.put_i8(*v),
        Value::I16(v) => out.put_i16(*v),
        Value::I32(v) => out.put_i32(*v),
        Value::I64(v) => out.put_i64(*v),
        Value::Double(v) => out.put_f64(*v),
        Value::Binary(b) => write_binary(out, b),
        Value::Struct(s) => write_struct(out, s),
        Value::Map(m) => {
            out.put_u8(m.key_type.binary_id());
            out.put_u8(m.value_type.binary_id());
            out.put_i32(m.entries.len() as i32);
            for (k, v) in &m.entries {
                write_value(out, k);
                write_value(out, v);
            }
        }
        Value::Set(l) | Value::List(l) => {
            out.put_u8(l.elem_type.binary_id());
            out.put_i32(l.items.len() as i32);
            for item in &l.items {
                write_value(out, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `hello("Trustin")` as written by a stock binary-protocol client.
    const HELLO_CALL: &[u8] = &[
        0x80, 0x01, 0x00, 0x01, // version | CALL
        0x00, 0x00, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o', // name
        0x00, 0x00, 0x00, 0x01, // seq id
        0x0b, 0x00, 0x01, // field 1: string
        0x00, 0x00, 0x00, 0x07, b'T', b'r', b'u', b's', b't', b'i', b'n', //
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
    fn rejects_unversioned_header() {
        let mut bytes = HELLO_CALL.to_vec();
        bytes[0] = 0x00;
        assert_eq!(decode(&bytes), Err(CodecError::Unversioned));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = HELLO_CALL.to_vec();
        bytes[1] = 0x02;
        assert!(matches!(decode(&bytes), Err(CodecError::BadVersion(_))));
    }

    #[test]
    fn rejects_truncated_input() {
        for cut in [0, 3, 10, 20, HELLO_CALL.len() - 1] {
            assert!(
                matches!(
                    decode(&HELLO_CALL[..cut]),
                    Err(CodecError::Truncated { .. } | CodecError::SizeExceedsInput { .. })
                ),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = HELLO_CALL.to_vec();
        bytes.push(0);
        assert_eq!(decode(&bytes), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn rejects_oversized_string_length() {
        let mut bytes = HELLO_CALL.to_vec();
        // field 1 string length
        bytes[20..24].copy_from_slice(&1000i32.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(CodecError::SizeExceedsInput { .. })));
    }

    #[test]
    fn rejects_unknown_field_type() {
        let mut bytes = HELLO_CALL.to_vec();
        bytes[17] = 0x07;
        assert_eq!(decode(&bytes), Err(CodecError::InvalidType(7)));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut bytes = HELLO_CALL[..17].to_vec();
        for _ in 0..100 {
            bytes.extend_from_slice(&[0x0c, 0x00, 0x01]);
        }
        assert_eq!(decode(&bytes), Err(CodecError::DepthLimit(crate::protocol::MAX_DEPTH)));
    }
}
