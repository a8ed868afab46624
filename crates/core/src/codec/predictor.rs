//! PNG and TIFF predictors for Flate and LZW output.

use super::param_int;
use crate::error::Result;
use crate::model::object::Dictionary;

/// Undoes the predictor named in `params`, if any.
pub fn apply_predictor(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let predictor = param_int(params, "Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }
    let columns = param_int(params, "Columns").unwrap_or(1).max(1) as usize;
    let colors = param_int(params, "Colors").unwrap_or(1).max(1) as usize;
    let bits = param_int(params, "BitsPerComponent").unwrap_or(8).max(1) as usize;

    if predictor == 2 {
        Ok(apply_tiff_predictor(data, columns, colors, bits))
    } else {
        Ok(apply_png_predictor(&data, columns, colors, bits))
    }
}

/// Reverses PNG row filters. Each row starts with a filter-type byte.
pub fn apply_png_predictor(
    data: &[u8],
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Vec<u8> {
    let row_bytes = (colors * columns * bits_per_component).div_ceil(8);
    let bpp = (colors * bits_per_component / 8).max(1);
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    for row in data.chunks_exact(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];

        for i in 0..row_bytes {
            let left = if i >= bpp { current_row[i - bpp] } else { 0 };
            let above = prev_row[i];
            let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let predicted = match filter_type {
                1 => left,
                2 => above,
                3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                4 => paeth_predictor(left, above, upper_left),
                // 0 and unknown filter types copy the row.
                _ => 0,
            };
            current_row[i] = row_data[i].wrapping_add(predicted);
        }

        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    result
}

/// Reverses TIFF predictor 2 (horizontal differencing) for 8-bit samples.
pub fn apply_tiff_predictor(
    mut data: Vec<u8>,
    columns: usize,
    colors: usize,
    bits_per_component: usize,
) -> Vec<u8> {
    if bits_per_component != 8 {
        tracing::debug!(bits_per_component, "TIFF predictor left as-is");
        return data;
    }
    let row_bytes = columns * colors;
    for row in data.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    data
}

const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}
