//! Argument and result encodings for the remote-file methods.
//!
//! Arguments are length-prefixed sub-fields in the connection's byte order:
//! strings as a `u16` length followed by UTF-8 bytes, handles as `u32`,
//! sizes and offsets as `u64`. Every result starts with a status byte —
//! `0` for success followed by the method-specific body, `1` for failure
//! followed by a `u16`-prefixed message.

use filewire_envelope::ByteOrder;

use crate::error::{FileError, Result};
use crate::picker::ContentInfo;

/// Status byte of a successful result.
pub const STATUS_OK: u8 = 0;

/// Status byte of a failed result.
pub const STATUS_ERROR: u8 = 1;

/// Sequential reader over a method's argument bytes.
pub struct ArgReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> ArgReader<'a> {
    pub fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.len() - self.pos < n {
            return Err(FileError::TruncatedArguments {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        let value = self
            .order
            .read_u16(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(value)
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        let value = self
            .order
            .read_u32(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(value)
    }

    pub fn u64(&mut self) -> Result<u64> {
        self.need(8)?;
        let value = self
            .order
            .read_u64(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(value)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// A `u16`-length-prefixed UTF-8 string.
    pub fn str_u16(&mut self) -> Result<&'a str> {
        let len = self.u16()? as usize;
        let bytes = self.bytes(len)?;
        Ok(std::str::from_utf8(bytes)?)
    }

    /// All remaining bytes.
    pub fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

/// Sequential writer producing a method's argument or result bytes.
pub struct ArgWriter {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl ArgWriter {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&self.order.write_u16(value));
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&self.order.write_u32(value));
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&self.order.write_u64(value));
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// A `u16`-length-prefixed UTF-8 string.
    pub fn str_u16(&mut self, value: &str) -> &mut Self {
        self.u16(value.len() as u16);
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Success result with no body.
pub fn ok_empty() -> Vec<u8> {
    vec![STATUS_OK]
}

/// Success result carrying a file handle.
pub fn ok_handle(handle: u32, order: ByteOrder) -> Vec<u8> {
    let mut writer = ArgWriter::new(order);
    writer.u8(STATUS_OK).u32(handle);
    writer.into_vec()
}

/// Success result carrying a 64-bit value (offset or count).
pub fn ok_u64(value: u64, order: ByteOrder) -> Vec<u8> {
    let mut writer = ArgWriter::new(order);
    writer.u8(STATUS_OK).u64(value);
    writer.into_vec()
}

/// Success result carrying raw data.
pub fn ok_bytes(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + data.len());
    buf.push(STATUS_OK);
    buf.extend_from_slice(data);
    buf
}

/// Failure result carrying a message.
pub fn err_message(message: &str, order: ByteOrder) -> Vec<u8> {
    let mut writer = ArgWriter::new(order);
    writer.u8(STATUS_ERROR).str_u16(message);
    writer.into_vec()
}

/// Strip the status byte of a result, surfacing error results as
/// [`FileError::Remote`].
pub fn decode_status(result: &[u8], order: ByteOrder) -> Result<&[u8]> {
    let mut reader = ArgReader::new(result, order);
    match reader.u8()? {
        STATUS_OK => Ok(reader.rest()),
        _ => {
            let mut reader = ArgReader::new(reader.rest(), order);
            Err(FileError::Remote(reader.str_u16()?.to_string()))
        }
    }
}

/// Encode a picker result as a select-file success body.
pub fn encode_content_info(info: &ContentInfo, order: ByteOrder) -> Vec<u8> {
    let mut writer = ArgWriter::new(order);
    writer
        .u8(STATUS_OK)
        .str_u16(&info.uri)
        .str_u16(&info.display_name)
        .str_u16(&info.mime_type)
        .u64(info.size);
    writer.into_vec()
}

/// Decode a select-file result.
pub fn decode_content_info(result: &[u8], order: ByteOrder) -> Result<ContentInfo> {
    let body = decode_status(result, order)?;
    let mut reader = ArgReader::new(body, order);
    Ok(ContentInfo {
        uri: reader.str_u16()?.to_string(),
        display_name: reader.str_u16()?.to_string(),
        mime_type: reader.str_u16()?.to_string(),
        size: reader.u64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_and_writer_roundtrip() {
        for order in [ByteOrder::Big, ByteOrder::Little] {
            let mut writer = ArgWriter::new(order);
            writer
                .u8(9)
                .u16(300)
                .u32(70_000)
                .u64(5_000_000_000)
                .str_u16("path/to/file")
                .bytes(b"tail");
            let buf = writer.into_vec();

            let mut reader = ArgReader::new(&buf, order);
            assert_eq!(reader.u8().unwrap(), 9);
            assert_eq!(reader.u16().unwrap(), 300);
            assert_eq!(reader.u32().unwrap(), 70_000);
            assert_eq!(reader.u64().unwrap(), 5_000_000_000);
            assert_eq!(reader.str_u16().unwrap(), "path/to/file");
            assert_eq!(reader.rest(), b"tail");
        }
    }

    #[test]
    fn truncated_read_reports_expected_length() {
        let mut reader = ArgReader::new(&[0x01, 0x02], ByteOrder::Big);
        let err = reader.u32().unwrap_err();
        assert!(matches!(
            err,
            FileError::TruncatedArguments {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn string_must_be_utf8() {
        let mut writer = ArgWriter::new(ByteOrder::Big);
        writer.u16(2).bytes(&[0xFF, 0xFE]);
        let buf = writer.into_vec();

        let mut reader = ArgReader::new(&buf, ByteOrder::Big);
        assert!(matches!(
            reader.str_u16().unwrap_err(),
            FileError::InvalidString(_)
        ));
    }

    #[test]
    fn status_decoding() {
        let order = ByteOrder::Big;

        assert_eq!(decode_status(&ok_bytes(b"data"), order).unwrap(), b"data");
        assert!(decode_status(&ok_empty(), order).unwrap().is_empty());

        let err = decode_status(&err_message("nope", order), order).unwrap_err();
        assert!(matches!(err, FileError::Remote(message) if message == "nope"));
    }

    #[test]
    fn handle_and_u64_results() {
        let order = ByteOrder::Little;

        let body = decode_status(&ok_handle(42, order), order).unwrap();
        assert_eq!(ArgReader::new(body, order).u32().unwrap(), 42);

        let body = decode_status(&ok_u64(1 << 40, order), order).unwrap();
        assert_eq!(ArgReader::new(body, order).u64().unwrap(), 1 << 40);
    }

    #[test]
    fn content_info_roundtrip() {
        let info = ContentInfo {
            uri: "content://downloads/document/1000000008".to_string(),
            display_name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 123_456,
        };

        for order in [ByteOrder::Big, ByteOrder::Little] {
            let encoded = encode_content_info(&info, order);
            assert_eq!(decode_content_info(&encoded, order).unwrap(), info);
        }
    }
}
