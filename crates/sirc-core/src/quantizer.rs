//! Quantizer & Morton Codec (C1).
//!
//! Reduces a full embedding to `D` dims, quantizes each to `B` bits, and
//! interleaves the bits MSB-first into a single `D*B`-bit Morton (Z-order)
//! key. Z-order preserves locality well enough that a contiguous hex-range
//! cursor scan is a useful semantic prefilter — exactly what the Index
//! Store indexes on.

use crate::model::{QuantParams, Reduction};

/// Degenerate-range padding, per spec.md §3.
const EPSILON: f64 = 1e-6;

fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Project a full-length embedding down to `d` dims using `reduction`.
pub fn reduce(embedding: &[f32], d: usize, reduction: Reduction) -> Vec<f64> {
    if embedding.is_empty() || d == 0 {
        return vec![0.0; d];
    }
    match reduction {
        Reduction::First => (0..d)
            .map(|i| embedding.get(i).copied().map(|v| v as f64).unwrap_or(0.0))
            .map(sanitize)
            .collect(),
        Reduction::BlockAvg => {
            let chunk = embedding.len().div_ceil(d).max(1);
            (0..d)
                .map(|i| {
                    let start = i * chunk;
                    if start >= embedding.len() {
                        return 0.0;
                    }
                    let end = (start + chunk).min(embedding.len());
                    let slice = &embedding[start..end];
                    if slice.is_empty() {
                        return 0.0;
                    }
                    let sum: f64 = slice.iter().map(|&v| sanitize(v as f64)).sum();
                    sum / slice.len() as f64
                })
                .collect()
        }
    }
}

/// Compute per-project quantization bounds from one or more sample
/// embeddings. Degenerate dims (`max - min < EPSILON`) are widened to
/// `mins[i] + EPSILON`.
pub fn compute_quant_params(
    samples: &[Vec<f32>],
    d: usize,
    b: u32,
    reduction: Reduction,
) -> QuantParams {
    assert!(!samples.is_empty(), "compute_quant_params requires at least one sample");

    let reduced: Vec<Vec<f64>> = samples.iter().map(|s| reduce(s, d, reduction)).collect();

    let mut mins = vec![f64::INFINITY; d];
    let mut maxs = vec![f64::NEG_INFINITY; d];
    for row in &reduced {
        for i in 0..d {
            mins[i] = mins[i].min(row[i]);
            maxs[i] = maxs[i].max(row[i]);
        }
    }

    for i in 0..d {
        if !(maxs[i] > mins[i] + EPSILON) {
            maxs[i] = mins[i] + EPSILON;
        }
    }

    QuantParams { d, b, mins, maxs, reduction }
}

/// Quantize a reduced, normalised value in `[0, 1]` to an integer in
/// `[0, 2^b - 1]`.
fn quantize_dim(value: f64, min: f64, max: f64, b: u32) -> u64 {
    let norm = ((value - min) / (max - min)).clamp(0.0, 1.0);
    let max_q = (1u64 << b) - 1;
    (norm * max_q as f64).floor() as u64
}

/// Quantize a full embedding into its per-dim integer codes, `[0, 2^b - 1]`.
pub fn quantize(embedding: &[f32], params: &QuantParams) -> Vec<u64> {
    let reduced = reduce(embedding, params.d, params.reduction);
    (0..params.d)
        .map(|i| quantize_dim(reduced[i], params.mins[i], params.maxs[i], params.b))
        .collect()
}

/// Interleave per-dim quantized codes MSB-first into the canonical Z-order
/// integer's bit sequence, left-padded with zero bits up to `padded_bits`
/// (a multiple of 4) so the result lines up on hex-nibble boundaries.
fn interleave_bits(codes: &[u64], b: u32, padded_bits: usize) -> Vec<u8> {
    let total_bits = codes.len() * b as usize;
    let offset = padded_bits - total_bits;
    let mut bits = vec![0u8; padded_bits];
    let mut pos = offset;

    for bit in (0..b).rev() {
        for &code in codes {
            bits[pos] = ((code >> bit) & 1) as u8;
            pos += 1;
        }
    }

    bits
}

/// Render interleaved bits as a lowercase hex string, zero-padded to
/// `ceil(D*B/4)` hex characters so lexicographic comparison matches
/// numeric comparison.
pub fn morton_key(embedding: &[f32], params: &QuantParams) -> String {
    let codes = quantize(embedding, params);
    let total_bits = params.d * params.b as usize;
    let hex_width = total_bits.div_ceil(4);
    let padded_bits = hex_width * 4;
    let bits = interleave_bits(&codes, params.b, padded_bits);

    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(hex_width);
    for chunk in bits.chunks(4) {
        let mut v = 0u8;
        for &bit in chunk {
            v = (v << 1) | bit;
        }
        out.push(DIGITS[v as usize] as char);
    }
    out
}
