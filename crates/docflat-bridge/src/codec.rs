// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire codec — tensors cross the native boundary as base64 strings of
// little-endian f32 values.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use docflat_core::Tensor;
use docflat_core::error::{DocflatError, Result};

const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Base64 of `values` as little-endian f32.
pub fn encode_f32(values: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(values.len() * F32_BYTES);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decode a base64 f32 buffer that must hold exactly `expected_len` values.
pub fn decode_f32(encoded: &str, expected_len: usize) -> Result<Vec<f32>> {
    // Android's Base64.DEFAULT wraps lines; tolerate the whitespace.
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| DocflatError::NativeBridge(format!("invalid base64 buffer: {e}")))?;

    let expected_bytes = expected_len.checked_mul(F32_BYTES).ok_or_else(|| {
        DocflatError::NativeBridge(format!("{expected_len} f32 values do not fit in memory"))
    })?;
    if bytes.len() != expected_bytes {
        return Err(DocflatError::NativeBridge(format!(
            "buffer holds {} bytes, expected {expected_bytes} ({expected_len} f32 values)",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

pub fn encode_tensor(tensor: &Tensor) -> String {
    encode_f32(tensor.as_slice())
}

/// Decode a planar tensor of the declared shape.
pub fn decode_tensor(encoded: &str, width: usize, height: usize, channels: usize) -> Result<Tensor> {
    let len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            DocflatError::NativeBridge(format!(
                "tensor shape {width}x{height}x{channels} is too large"
            ))
        })?;
    let values = decode_f32(encoded, len)?;
    Tensor::new(width, height, channels, values)
}
