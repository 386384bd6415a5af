use crate::messages::{kind, BatchEnvelope, ENVELOPE_TAG};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use colbind_core::error::ColbindError;
use colbind_core::types::{BindingRow, ScalarValue};

/// Size of the tag byte plus the payload length field.
pub const FRAME_HEADER_LEN: usize = 5;

pub fn encode_envelope(envelope: &BatchEnvelope) -> Result<Bytes, ColbindError> {
    let mut payload = BytesMut::new();
    put_str(&mut payload, &envelope.table)?;
    put_str(&mut payload, &envelope.shard)?;
    put_str(&mut payload, &envelope.sql)?;
    payload.put_u32(len_u32(envelope.rows.len(), "row count")?);
    for row in &envelope.rows {
        let count = u16::try_from(row.values.len())
            .map_err(|_| malformed(format!("row has {} values, limit is {}", row.values.len(), u16::MAX)))?;
        payload.put_u16(count);
        for value in &row.values {
            put_value(&mut payload, value)?;
        }
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u8(ENVELOPE_TAG);
    buf.put_u32(len_u32(payload.len(), "payload")?);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

/// Decodes one complete frame. Anything short of a fully consistent frame is
/// rejected; there is no partial result.
pub fn decode_envelope(frame: &[u8]) -> Result<BatchEnvelope, ColbindError> {
    let mut buf = frame;
    need(&buf, FRAME_HEADER_LEN, "frame header")?;
    let tag = buf.get_u8();
    if tag != ENVELOPE_TAG {
        return Err(malformed(format!("unexpected tag 0x{tag:02x}")));
    }
    let declared = buf.get_u32() as usize;
    if declared != buf.remaining() {
        return Err(malformed(format!(
            "payload length {declared} does not match {} available bytes",
            buf.remaining()
        )));
    }
    decode_payload(buf)
}

pub(crate) fn decode_payload(mut buf: &[u8]) -> Result<BatchEnvelope, ColbindError> {
    let table = get_str(&mut buf, "table")?;
    let shard = get_str(&mut buf, "shard")?;
    let sql = get_str(&mut buf, "sql")?;
    need(&buf, 4, "row count")?;
    let row_count = buf.get_u32() as usize;

    // Each row takes at least its two-byte value count.
    if row_count > buf.remaining() / 2 {
        return Err(malformed(format!("row count {row_count} exceeds payload")));
    }
    let mut rows = Vec::with_capacity(row_count);
    for row in 0..row_count {
        need(&buf, 2, "value count")?;
        let count = buf.get_u16() as usize;
        let mut values = Vec::with_capacity(count.min(buf.remaining()));
        for _ in 0..count {
            values.push(get_value(&mut buf).map_err(|err| match err {
                ColbindError::MalformedEnvelope(reason) => malformed(format!("row {row}: {reason}")),
                other => other,
            })?);
        }
        rows.push(BindingRow::new(values));
    }
    if buf.has_remaining() {
        return Err(malformed(format!("{} trailing bytes", buf.remaining())));
    }
    Ok(BatchEnvelope {
        table,
        shard,
        sql,
        rows,
    })
}

fn put_value(buf: &mut BytesMut, value: &ScalarValue) -> Result<(), ColbindError> {
    match value {
        ScalarValue::Null => buf.put_u8(kind::NULL),
        ScalarValue::Int(v) => {
            buf.put_u8(kind::INT);
            buf.put_i64(*v);
        }
        ScalarValue::UInt(v) => {
            buf.put_u8(kind::UINT);
            buf.put_u64(*v);
        }
        ScalarValue::Float(v) => {
            buf.put_u8(kind::FLOAT);
            buf.put_f64(*v);
        }
        ScalarValue::String(bytes) => {
            buf.put_u8(kind::STRING);
            buf.put_u32(len_u32(bytes.len(), "string value")?);
            buf.extend_from_slice(bytes);
        }
        ScalarValue::Timestamp(millis) => {
            buf.put_u8(kind::TIMESTAMP);
            buf.put_i64(*millis);
        }
    }
    Ok(())
}

fn get_value(buf: &mut &[u8]) -> Result<ScalarValue, ColbindError> {
    need(buf, 1, "value kind")?;
    let value = match buf.get_u8() {
        kind::NULL => ScalarValue::Null,
        kind::INT => {
            need(buf, 8, "int value")?;
            ScalarValue::Int(buf.get_i64())
        }
        kind::UINT => {
            need(buf, 8, "uint value")?;
            ScalarValue::UInt(buf.get_u64())
        }
        kind::FLOAT => {
            need(buf, 8, "float value")?;
            ScalarValue::Float(buf.get_f64())
        }
        kind::STRING => ScalarValue::String(get_bytes(buf, "string value")?),
        kind::TIMESTAMP => {
            need(buf, 8, "timestamp value")?;
            ScalarValue::Timestamp(buf.get_i64())
        }
        other => return Err(malformed(format!("unknown value kind {other}"))),
    };
    Ok(value)
}

fn put_str(buf: &mut BytesMut, value: &str) -> Result<(), ColbindError> {
    buf.put_u32(len_u32(value.len(), "string")?);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn get_str(buf: &mut &[u8], what: &str) -> Result<String, ColbindError> {
    let bytes = get_bytes(buf, what)?;
    String::from_utf8(bytes).map_err(|_| malformed(format!("{what} is not valid UTF-8")))
}

fn get_bytes(buf: &mut &[u8], what: &str) -> Result<Vec<u8>, ColbindError> {
    need(buf, 4, what)?;
    let len = buf.get_u32() as usize;
    need(buf, len, what)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn need(buf: &[u8], len: usize, what: &str) -> Result<(), ColbindError> {
    if buf.len() < len {
        return Err(malformed(format!(
            "truncated {what}: need {len} bytes, have {}",
            buf.len()
        )));
    }
    Ok(())
}

fn len_u32(len: usize, what: &str) -> Result<u32, ColbindError> {
    u32::try_from(len).map_err(|_| malformed(format!("{what} of {len} bytes is too large")))
}

fn malformed(reason: String) -> ColbindError {
    ColbindError::MalformedEnvelope(reason)
}
