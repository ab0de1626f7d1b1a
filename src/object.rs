//! Object code record
//!
//! ```text
//!  H                            T                          E
//!  48 NAME.. 00 SEG_LEN(2)      54 START(2) BODY..         45 ENTRY(2)
//! ```
//! Words are little-endian.

pub const HEADER: u8 = 0x48;
pub const TEXT: u8 = 0x54;
pub const END: u8 = 0x45;

#[derive(Debug, Clone)]
pub struct ObjectCode<'a> {
    pub segment_name: &'a str,
    pub segment_length: u16,
    pub start_address: u16,
    pub body: &'a [u8],
    pub entry_point: u16,
}

impl ObjectCode<'_> {
    pub fn to_bytes(&self) -> Vec<u8> {
        let name = self.segment_name.as_bytes();
        let mut out = Vec::with_capacity(name.len() + self.body.len() + 10);
        out.push(HEADER);
        out.extend_from_slice(name);
        out.push(0);
        out.extend_from_slice(&self.segment_length.to_le_bytes());
        out.push(TEXT);
        out.extend_from_slice(&self.start_address.to_le_bytes());
        out.extend_from_slice(self.body);
        out.push(END);
        out.extend_from_slice(&self.entry_point.to_le_bytes());
        out
    }
}

/// Each byte as unpadded binary digits, concatenated.
pub fn render(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:b}")).collect()
}
