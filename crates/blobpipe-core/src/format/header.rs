use crate::error::BlobPipeError;
use crate::types::Result;

const FIELD_TYPE: u64 = 1;
const FIELD_DATASIZE: u64 = 3;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_START_GROUP: u64 = 3;
const WIRE_END_GROUP: u64 = 4;
const WIRE_FIXED32: u64 = 5;

/// The tagged-field message framing each blob: its type string and the size
/// of the payload that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    pub blob_type: String,
    pub datasize: u64,
}

impl BlobHeader {
    pub fn new(blob_type: impl Into<String>, datasize: u64) -> Self {
        Self {
            blob_type: blob_type.into(),
            datasize,
        }
    }

    /// Decodes a BlobHeader message.
    ///
    /// Fields other than `type` (1) and `datasize` (3) are skipped according
    /// to their wire type. A missing or zero datasize is rejected, as is a
    /// datasize outside the int32 range. A missing type decodes as the empty
    /// string and is left for the caller to match against the expected type.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let mut blob_type = String::new();
        let mut datasize = 0u64;

        while pos < data.len() {
            let key = decode_varint(data, &mut pos)?;
            let field = key >> 3;
            let wire = key & 0x07;
            if field == 0 {
                return Err(BlobPipeError::MalformedHeader("field number zero"));
            }

            match (field, wire) {
                (FIELD_TYPE, WIRE_LEN) => {
                    let bytes = decode_len_delimited(data, &mut pos)?;
                    blob_type = std::str::from_utf8(bytes)
                        .map_err(|_| BlobPipeError::MalformedHeader("type is not valid UTF-8"))?
                        .to_string();
                }
                (FIELD_DATASIZE, WIRE_VARINT) => {
                    datasize = decode_varint(data, &mut pos)?;
                }
                (_, WIRE_VARINT) => {
                    decode_varint(data, &mut pos)?;
                }
                (_, WIRE_FIXED64) => skip_bytes(data, &mut pos, 8)?,
                (_, WIRE_LEN) => {
                    decode_len_delimited(data, &mut pos)?;
                }
                (_, WIRE_FIXED32) => skip_bytes(data, &mut pos, 4)?,
                (_, WIRE_START_GROUP | WIRE_END_GROUP) => {
                    return Err(BlobPipeError::MalformedHeader(
                        "group wire types are not supported",
                    ));
                }
                _ => return Err(BlobPipeError::MalformedHeader("unknown wire type")),
            }
        }

        if datasize == 0 {
            return Err(BlobPipeError::DatasizeMissing);
        }
        if datasize > i32::MAX as u64 {
            return Err(BlobPipeError::MalformedHeader("datasize out of int32 range"));
        }

        Ok(Self {
            blob_type,
            datasize,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.blob_type.len() + 12);
        buf.push((FIELD_TYPE << 3 | WIRE_LEN) as u8);
        encode_varint(&mut buf, self.blob_type.len() as u64);
        buf.extend_from_slice(self.blob_type.as_bytes());
        buf.push((FIELD_DATASIZE << 3 | WIRE_VARINT) as u8);
        encode_varint(&mut buf, self.datasize);
        buf
    }
}

fn decode_varint(data: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or(BlobPipeError::MalformedHeader("truncated varint"))?;
        *pos += 1;
        if shift == 63 && byte > 1 {
            return Err(BlobPipeError::MalformedHeader("varint overflows 64 bits"));
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(BlobPipeError::MalformedHeader("varint overflows 64 bits"));
        }
    }
}

fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn decode_len_delimited<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let len = decode_varint(data, pos)?;
    let len = usize::try_from(len)
        .map_err(|_| BlobPipeError::MalformedHeader("length-delimited field too long"))?;
    let end = pos
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or(BlobPipeError::MalformedHeader(
            "truncated length-delimited field",
        ))?;
    let bytes = &data[*pos..end];
    *pos = end;
    Ok(bytes)
}

fn skip_bytes(data: &[u8], pos: &mut usize, count: usize) -> Result<()> {
    let end = pos
        .checked_add(count)
        .filter(|&end| end <= data.len())
        .ok_or(BlobPipeError::MalformedHeader("truncated fixed-width field"))?;
    *pos = end;
    Ok(())
}
