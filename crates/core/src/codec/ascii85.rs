//! ASCII85 and ASCIIHex stream decoders.

use crate::error::Result;

/// Decodes ASCII85 data.
///
/// Accepts an optional `<~` prefix, `z` groups, interleaved whitespace and
/// a missing `~>` end marker.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut filled = 0;

    for &byte in data {
        match byte {
            b'z' if filled == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte;
                filled += 1;
                if filled == 5 {
                    result.extend_from_slice(&group_value(&group).to_be_bytes());
                    filled = 0;
                }
            }
            _ => {}
        }
    }

    if filled > 1 {
        let mut padded = [b'u'; 5];
        padded[..filled].copy_from_slice(&group[..filled]);
        let bytes = group_value(&padded).to_be_bytes();
        result.extend_from_slice(&bytes[..filled - 1]);
    }

    Ok(result)
}

fn group_value(group: &[u8; 5]) -> u32 {
    let value = group
        .iter()
        .fold(0u64, |acc, &b| acc * 85 + u64::from(b - b'!'));
    value as u32
}

/// Decodes ASCIIHex data up to the `>` end marker.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if let Some(nibble) = hex_nibble(byte) {
            match pending.take() {
                Some(high) => result.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    Ok(result)
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asciihex_decode_expected() {
        let data = b"48656c6c6f 20776f726c64>";
        assert_eq!(asciihexdecode(data).unwrap(), b"Hello world");
    }

    #[test]
    fn asciihex_odd_digit() {
        assert_eq!(asciihexdecode(b"7>").unwrap(), vec![0x70]);
    }

    #[test]
    fn ascii85_decode_expected() {
        let data = b"<~87cURD]i,\"Ebo7~>";
        assert_eq!(ascii85decode(data).unwrap(), b"Hello World");
    }

    #[test]
    fn ascii85_z_group() {
        assert_eq!(ascii85decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }
}
