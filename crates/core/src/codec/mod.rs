//! Stream filter collaborator.
//!
//! The core never decodes on its own; it hands raw bytes, a filter name and
//! the filter's parameter dictionary to a [`StreamDecoder`]. The default
//! [`FlateDecoder`] covers the filters needed to read document structure:
//! - `FlateDecode` and `LZWDecode`, with PNG and TIFF predictors
//! - `ASCIIHexDecode` and `ASCII85Decode`

pub mod ascii85;
pub mod lzw;
pub mod predictor;

use std::io::Read;

use crate::error::{PdfError, Result};
use crate::model::object::{Dictionary, Stream, Value};

pub use ascii85::{ascii85decode, asciihexdecode};
pub use lzw::lzwdecode_with_earlychange;
pub use predictor::apply_predictor;

/// Decodes one filter stage.
pub trait StreamDecoder: Send + Sync {
    fn decode(&self, raw: &[u8], filter: &str, params: Option<&Dictionary>) -> Result<Vec<u8>>;
}

/// Default decoder built on flate2 and weezl.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, raw: &[u8], filter: &str, params: Option<&Dictionary>) -> Result<Vec<u8>> {
        match canonical_filter_name(filter) {
            "FlateDecode" => {
                let inflated = inflate(raw).ok_or_else(|| {
                    PdfError::decode("FlateDecode", "zlib data could not be inflated")
                })?;
                apply_predictor(inflated, params)
            }
            "LZWDecode" => {
                let early_change = param_int(params, "EarlyChange").unwrap_or(1);
                let expanded = lzwdecode_with_earlychange(raw, early_change)?;
                apply_predictor(expanded, params)
            }
            "ASCIIHexDecode" => asciihexdecode(raw),
            "ASCII85Decode" => ascii85decode(raw),
            other => Err(PdfError::decode(other, "unsupported filter")),
        }
    }
}

/// Returns the raw bytes for every filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDecoder;

impl StreamDecoder for PassthroughDecoder {
    fn decode(&self, raw: &[u8], _filter: &str, _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }
}

/// Expands the abbreviations used by inline images.
pub fn canonical_filter_name(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

pub(crate) fn param_int(params: Option<&Dictionary>, key: &str) -> Option<i64> {
    params?.get(key)?.as_int().ok()
}

/// Lists `(filter, params)` pairs of a stream dictionary in decode order.
///
/// `resolve` dereferences indirect filter entries.
pub fn filter_chain(
    dict: &Dictionary,
    resolve: &dyn Fn(&Value) -> Value,
) -> Vec<(String, Option<Dictionary>)> {
    let filters = match dict.get("Filter").or_else(|| dict.get("F")).map(resolve) {
        Some(Value::Name(name)) => vec![name.to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match resolve(item) {
                Value::Name(name) => Some(name.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let params: Vec<Option<Dictionary>> =
        match dict.get("DecodeParms").or_else(|| dict.get("DP")).map(resolve) {
            Some(Value::Dictionary(d)) => vec![Some(d)],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match resolve(item) {
                    Value::Dictionary(d) => Some(d),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

    filters
        .into_iter()
        .enumerate()
        .map(|(i, f)| (f, params.get(i).cloned().flatten()))
        .collect()
}

/// Runs every filter of a stream through `decoder`.
pub fn decode_stream(
    stream: &Stream,
    decoder: &dyn StreamDecoder,
    resolve: &dyn Fn(&Value) -> Value,
) -> Result<Vec<u8>> {
    let chain = filter_chain(&stream.dict, resolve);
    let mut data = stream.raw_data().to_vec();
    for (filter, params) in &chain {
        data = decoder.decode(&data, filter, params.as_ref())?;
    }
    Ok(data)
}

/// Inflates zlib data, keeping what decodes before a corrupt tail.
fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    if decoder.read_to_end(&mut out).is_ok() {
        return Some(out);
    }
    let partial = inflate_corrupted(data);
    (!partial.is_empty()).then_some(partial)
}

fn inflate_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        out.extend_from_slice(&buf[..produced]);
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}
