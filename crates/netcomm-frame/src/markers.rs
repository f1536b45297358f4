//! Wire delimiters and tag bytes.
//!
//! Length and value tags carry their payload width in the low nibble
//! (`0x14` is a 4-byte length, `0x38` an 8-byte integer).

/// Start of header.
pub const SOH: u8 = 0x01;

/// Start of text.
pub const STX: u8 = 0x02;

/// End of text.
pub const ETX: u8 = 0x03;

/// End of transmission.
pub const EOT: u8 = 0x04;

/// Outer text length, 1/2/4-byte field.
pub const OTL_1: u8 = 0x11;
pub const OTL_2: u8 = 0x12;
pub const OTL_4: u8 = 0x14;

/// Signed big-endian integers.
pub const INT_8: u8 = 0x31;
pub const INT_16: u8 = 0x32;
pub const INT_32: u8 = 0x34;
pub const INT_64: u8 = 0x38;

/// IEEE-754 big-endian floats.
pub const FLOAT_32: u8 = 0x54;
pub const FLOAT_64: u8 = 0x58;

/// One byte, zero is false.
pub const BOOLEAN: u8 = 0x71;

/// UTF-8 text with a 1/2/4-byte length field.
pub const TEXT_1: u8 = 0x91;
pub const TEXT_2: u8 = 0x92;
pub const TEXT_4: u8 = 0x94;

/// Raw bytes with a 1/2/4-byte length field.
pub const BYTES_1: u8 = 0xB1;
pub const BYTES_2: u8 = 0xB2;
pub const BYTES_4: u8 = 0xB4;

/// Returns a human-readable name for a tag or delimiter byte.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        SOH => "SOH",
        STX => "STX",
        ETX => "ETX",
        EOT => "EOT",
        OTL_1 | OTL_2 | OTL_4 => "OTL",
        INT_8 | INT_16 | INT_32 | INT_64 => "INTEGER",
        FLOAT_32 | FLOAT_64 => "FLOAT",
        BOOLEAN => "BOOLEAN",
        TEXT_1 | TEXT_2 | TEXT_4 => "TEXT",
        BYTES_1 | BYTES_2 | BYTES_4 => "BYTES",
        _ => "UNKNOWN",
    }
}

/// Width of the length field selected by an OTL tag, if `tag` is one.
pub fn length_field_width(tag: u8) -> Option<usize> {
    match tag {
        OTL_1 | OTL_2 | OTL_4 => Some(usize::from(tag & 0x0F)),
        _ => None,
    }
}

/// Pick the 1/2/4-byte length field for `len`, returning `(tag, width)`.
///
/// `base` is the tag family with a zero low nibble (`0x10`, `0x90`, `0xB0`).
/// Widths switch at the signed maximum of the narrower field.
pub(crate) fn length_tag(base: u8, len: usize) -> (u8, usize) {
    if len <= i8::MAX as usize {
        (base | 1, 1)
    } else if len <= i16::MAX as usize {
        (base | 2, 2)
    } else {
        (base | 4, 4)
    }
}

/// Read a signed big-endian length field of 1, 2 or 4 bytes.
pub(crate) fn read_signed_be(field: &[u8]) -> Option<i64> {
    match *field {
        [a] => Some(i64::from(a as i8)),
        [a, b] => Some(i64::from(i16::from_be_bytes([a, b]))),
        [a, b, c, d] => Some(i64::from(i32::from_be_bytes([a, b, c, d]))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_tag_switches_at_signed_maxima() {
        assert_eq!(length_tag(0x90, 0), (TEXT_1, 1));
        assert_eq!(length_tag(0x90, 127), (TEXT_1, 1));
        assert_eq!(length_tag(0x90, 128), (TEXT_2, 2));
        assert_eq!(length_tag(0xB0, 32767), (BYTES_2, 2));
        assert_eq!(length_tag(0xB0, 32768), (BYTES_4, 4));
        assert_eq!(length_tag(0x10, 5), (OTL_1, 1));
    }

    #[test]
    fn read_signed_be_widths() {
        assert_eq!(read_signed_be(&[0x7F]), Some(127));
        assert_eq!(read_signed_be(&[0xFF]), Some(-1));
        assert_eq!(read_signed_be(&[0x00, 0x80]), Some(128));
        assert_eq!(read_signed_be(&[0x00, 0x00, 0x80, 0x00]), Some(32768));
        assert_eq!(read_signed_be(&[0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn length_field_width_only_for_otl_tags() {
        assert_eq!(length_field_width(OTL_1), Some(1));
        assert_eq!(length_field_width(OTL_2), Some(2));
        assert_eq!(length_field_width(OTL_4), Some(4));
        assert_eq!(length_field_width(0x13), None);
        assert_eq!(length_field_width(TEXT_1), None);
    }

    #[test]
    fn tag_names() {
        assert_eq!(tag_name(INT_16), "INTEGER");
        assert_eq!(tag_name(BYTES_4), "BYTES");
        assert_eq!(tag_name(0xEE), "UNKNOWN");
    }
}
