//! Minimal protobuf tag/wire-type walker for MEXC's binary push frames.
//!
//! MEXC's `PushDataV3ApiWrapper` envelope carries a channel name, a symbol,
//! and one of several payload submessages (depth, deals, ticker...) keyed by
//! field number. Rather than compiling the full `.proto` descriptor this
//! walks the wire format directly and only extracts the handful of fields
//! the core needs (spec.md §4.2: "no generated descriptor is required").
//! Unknown fields are skipped, never an error.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_tag(tag: u64) -> Option<Self> {
        match tag & 0b111 {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Field<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> Field<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Field::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Field::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> Option<u64> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = *data.get(*pos)?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None;
        }
    }
}

/// Walks one level of a protobuf message, calling `on_field` with the field
/// number and decoded payload for every field it can parse. Stops (without
/// erroring) at the first byte it can't interpret, since a truncated or
/// unknown-future-version frame should drop gracefully rather than panic.
pub fn walk_fields<'a>(data: &'a [u8], mut on_field: impl FnMut(u64, Field<'a>)) {
    let mut pos = 0usize;
    while pos < data.len() {
        let tag = match read_varint(data, &mut pos) {
            Some(t) => t,
            None => return,
        };
        let field_number = tag >> 3;
        let wire_type = match WireType::from_tag(tag) {
            Some(w) => w,
            None => return,
        };
        match wire_type {
            WireType::Varint => match read_varint(data, &mut pos) {
                Some(v) => on_field(field_number, Field::Varint(v)),
                None => return,
            },
            WireType::Fixed64 => {
                if pos + 8 > data.len() {
                    return;
                }
                let bytes: [u8; 8] = data[pos..pos + 8].try_into().unwrap();
                on_field(field_number, Field::Fixed64(u64::from_le_bytes(bytes)));
                pos += 8;
            }
            WireType::Fixed32 => {
                if pos + 4 > data.len() {
                    return;
                }
                let bytes: [u8; 4] = data[pos..pos + 4].try_into().unwrap();
                on_field(field_number, Field::Fixed32(u32::from_le_bytes(bytes)));
                pos += 4;
            }
            WireType::LengthDelimited => {
                let len = match read_varint(data, &mut pos) {
                    Some(l) => l as usize,
                    None => return,
                };
                if pos + len > data.len() {
                    return;
                }
                on_field(field_number, Field::Bytes(&data[pos..pos + len]));
                pos += len;
            }
        }
    }
}

/// Looks up the first occurrence of `field_number` at the top level.
pub fn find_field<'a>(data: &'a [u8], field_number: u64) -> Option<Field<'a>> {
    let mut found = None;
    walk_fields(data, |n, f| {
        if n == field_number && found.is_none() {
            found = Some(f);
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_tag(field_number: u64, wire_type: u64) -> u8 {
        ((field_number << 3) | wire_type) as u8
    }

    fn encode_string_field(field_number: u64, s: &str) -> Vec<u8> {
        let mut buf = vec![encode_tag(field_number, 2)];
        buf.push(s.len() as u8);
        buf.extend_from_slice(s.as_bytes());
        buf
    }

    #[test]
    fn extracts_channel_and_symbol_strings() {
        let mut data = encode_string_field(1, "push.depth");
        data.extend(encode_string_field(3, "XRPUSDT"));
        assert_eq!(find_field(&data, 1).unwrap().as_str(), Some("push.depth"));
        assert_eq!(find_field(&data, 3).unwrap().as_str(), Some("XRPUSDT"));
    }

    #[test]
    fn unknown_fields_are_skipped_not_fatal() {
        let mut data = vec![encode_tag(99, 0), 0x05]; // unknown varint field
        data.extend(encode_string_field(1, "push.deal"));
        assert_eq!(find_field(&data, 1).unwrap().as_str(), Some("push.deal"));
    }

    #[test]
    fn truncated_frame_stops_cleanly() {
        let data = vec![encode_tag(1, 2), 0xff]; // length byte claims more than exists
        let mut seen = 0;
        walk_fields(&data, |_, _| seen += 1);
        assert_eq!(seen, 0);
    }
}
