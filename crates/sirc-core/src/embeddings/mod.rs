//! The embedding/summarisation model is an injectable, out-of-scope
//! capability (spec.md §1). This module defines the seam: the
//! [`EmbeddingProvider`] trait, a deterministic mock implementation for
//! tests and `AiMode::Mock`, cosine similarity, and the little-endian
//! IEEE-754/base64 byte-packing used to move embeddings through
//! text-based storage (spec.md §6).

#[cfg(feature = "embeddings")]
mod local;

#[cfg(feature = "embeddings")]
pub use local::FastEmbedProvider;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Errors surfaced by an [`EmbeddingProvider`]. Callers treat every variant
/// as a suspension-point failure that degrades gracefully (spec.md §7) —
/// never as a reason to abort an import or a search.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("model initialization failed: {0}")]
    ModelInit(String),
    #[error("embedding generation failed: {0}")]
    EmbeddingFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// The single seam to the (out-of-scope) embedding model.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one piece of text. Implementations should truncate overlong
    /// input rather than error.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch; default implementation just loops. Providers with
    /// native batching should override this.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Output dimensionality, when known ahead of any call.
    fn dimensions(&self) -> usize;
}

/// Deterministic, dependency-free embedding provider: hashes overlapping
/// word shingles into a fixed-width vector. Used for `AiMode::Mock`, for
/// unit/integration tests, and as the crate's default when no real
/// provider is configured. Never touches the network.
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(512)
    }
}

impl EmbeddingProvider for MockEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
        }
        let mut vector = vec![0.0f32; self.dims];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dims;
            let sign = if (h >> 63) & 1 == 1 { -1.0 } else { 1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Cosine similarity, `0.0` on a dimension mismatch or zero vector.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

/// Pack an embedding as little-endian IEEE-754 bytes, base64-encoded — the
/// storage/transport encoding spec.md §6 prescribes for the interaction log.
pub fn encode_embedding(vector: &[f32]) -> String {
    use base64::Engine;
    let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Inverse of [`encode_embedding`]. Returns `None` on malformed input
/// (non-base64, or a byte length not a multiple of 4).
pub fn decode_embedding(encoded: &str) -> Option<Vec<f32>> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
