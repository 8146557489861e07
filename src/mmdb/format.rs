//! MaxMind DB format constants and data section encoding.

/// Marker preceding the metadata map.
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Zero bytes between the search tree and the data section.
pub const DATA_SECTION_SEPARATOR_SIZE: usize = 16;

pub const BINARY_FORMAT_MAJOR_VERSION: u16 = 2;
pub const BINARY_FORMAT_MINOR_VERSION: u16 = 0;

/// Database type understood by sing-box style consumers.
pub const DATABASE_TYPE: &str = "sing-geoip";

/// Data section field types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Utf8String = 2,
    Uint16 = 5,
    Uint32 = 6,
    Map = 7,
    Uint64 = 9,
    Array = 11,
}

/// Encoder for data section values.
#[derive(Debug, Default)]
pub struct DataEncoder {
    buffer: Vec<u8>,
}

impl DataEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length, which is the offset of the next value.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn string(&mut self, value: &str) {
        self.control(DataType::Utf8String, value.len());
        self.buffer.extend_from_slice(value.as_bytes());
    }

    pub fn uint16(&mut self, value: u16) {
        self.uint(DataType::Uint16, u64::from(value));
    }

    pub fn uint32(&mut self, value: u32) {
        self.uint(DataType::Uint32, u64::from(value));
    }

    pub fn uint64(&mut self, value: u64) {
        self.uint(DataType::Uint64, value);
    }

    /// Start a map; the caller writes `len` key/value pairs next.
    pub fn map_header(&mut self, len: usize) {
        self.control(DataType::Map, len);
    }

    /// Start an array; the caller writes `len` values next.
    pub fn array_header(&mut self, len: usize) {
        self.control(DataType::Array, len);
    }

    /// Unsigned integers are stored big-endian with leading zero bytes dropped.
    fn uint(&mut self, data_type: DataType, value: u64) {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let significant = &bytes[skip..];
        self.control(data_type, significant.len());
        self.buffer.extend_from_slice(significant);
    }

    /// Write the control byte, the extended type byte and the size bytes.
    fn control(&mut self, data_type: DataType, size: usize) {
        let type_id = data_type as u8;
        let type_bits = if type_id <= 7 { type_id << 5 } else { 0 };

        let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
            (size as u8, Vec::new())
        } else if size < 29 + 256 {
            (29, vec![(size - 29) as u8])
        } else if size < 285 + 65_536 {
            (30, ((size - 285) as u16).to_be_bytes().to_vec())
        } else {
            (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
        };

        self.buffer.push(type_bits | size_bits);
        if type_id > 7 {
            self.buffer.push(type_id - 7);
        }
        self.buffer.extend_from_slice(&extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_string() {
        let mut enc = DataEncoder::new();
        enc.string("ru");
        assert_eq!(enc.into_bytes(), vec![0x42, b'r', b'u']);
    }

    #[test]
    fn test_long_string_size_bytes() {
        let mut enc = DataEncoder::new();
        enc.string(&"a".repeat(100));
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x40 | 29);
        assert_eq!(bytes[1], 71);
        assert_eq!(bytes.len(), 2 + 100);

        let mut enc = DataEncoder::new();
        enc.string(&"a".repeat(300));
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x40 | 30);
        assert_eq!(&bytes[1..3], &[0, 15]);
    }

    #[test]
    fn test_uints() {
        let mut enc = DataEncoder::new();
        enc.uint16(0);
        enc.uint32(0x0102);
        enc.uint64(1);
        assert_eq!(
            enc.into_bytes(),
            vec![0xA0, 0xC2, 0x01, 0x02, 0x01, 0x02, 0x01]
        );
    }

    #[test]
    fn test_extended_headers() {
        let mut enc = DataEncoder::new();
        enc.array_header(1);
        enc.map_header(2);
        assert_eq!(enc.into_bytes(), vec![0x01, 0x04, 0xE2]);
    }
}
