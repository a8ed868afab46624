//! LZW stream decoder using the weezl crate.

use weezl::{BitOrder, decode::Decoder};

use crate::error::{PdfError, Result};

/// Decodes LZW data (MSB first, 8-bit).
///
/// `EarlyChange` 1 (the default) widens codes one code early, as TIFF
/// does; 0 widens them at the GIF boundary. Corrupt input returns whatever
/// decoded before the error, and an error only when nothing decoded.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i64) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::new(BitOrder::Msb, 8)
    } else {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let status = decoder.into_vec(&mut output).decode(data).status;
    if let Err(err) = status
        && output.is_empty()
    {
        return Err(PdfError::decode("LZWDecode", err.to_string()));
    }
    Ok(output)
}
