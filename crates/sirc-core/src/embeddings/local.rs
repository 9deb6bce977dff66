//! Local, ONNX-based embedding inference via `fastembed`.
//!
//! Optional (`embeddings` feature): the crate works with the
//! [`super::MockEmbeddingProvider`] alone, but callers who want a real
//! local model (no network calls — matches the "no network dependency"
//! purpose statement) can use [`FastEmbedProvider`] instead.

use std::sync::{Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EmbeddingError, EmbeddingProvider};

/// Output dimensionality after Matryoshka truncation.
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Maximum text length before truncation.
const MAX_TEXT_LENGTH: usize = 8192;

static MODEL: OnceLock<Result<Mutex<TextEmbedding>, String>> = OnceLock::new();

fn cache_dir() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("SIRC_EMBEDDING_CACHE") {
        return std::path::PathBuf::from(path);
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "sirc", "core") {
        return proj_dirs.cache_dir().join("fastembed");
    }
    std::path::PathBuf::from(".sirc_embedding_cache")
}

fn get_model() -> Result<std::sync::MutexGuard<'static, TextEmbedding>, EmbeddingError> {
    let result = MODEL.get_or_init(|| {
        let dir = cache_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("failed to create embedding cache dir {:?}: {}", dir, e);
        }
        let options = InitOptions::new(EmbeddingModel::NomicEmbedTextV15)
            .with_show_download_progress(true)
            .with_cache_dir(dir);
        TextEmbedding::try_new(options)
            .map(Mutex::new)
            .map_err(|e| format!("failed to initialize embedding model: {e}"))
    });

    match result {
        Ok(model) => model
            .lock()
            .map_err(|e| EmbeddingError::ModelInit(format!("lock poisoned: {e}"))),
        Err(err) => Err(EmbeddingError::ModelInit(err.clone())),
    }
}

/// Matryoshka-truncate to [`EMBEDDING_DIMENSIONS`] and L2-normalize. The
/// first N dims of the full embedding ARE a valid N-dim embedding.
fn matryoshka_truncate(mut vector: Vec<f32>) -> Vec<f32> {
    if vector.len() > EMBEDDING_DIMENSIONS {
        vector.truncate(EMBEDDING_DIMENSIONS);
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

/// A local-inference [`EmbeddingProvider`] backed by `nomic-embed-text-v1.5`.
pub struct FastEmbedProvider;

impl FastEmbedProvider {
    pub fn new() -> Result<Self, EmbeddingError> {
        get_model()?; // force init, surface any error eagerly
        Ok(Self)
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text is empty".to_string()));
        }
        let mut model = get_model()?;
        let truncated = if text.len() > MAX_TEXT_LENGTH {
            &text[..MAX_TEXT_LENGTH]
        } else {
            text
        };
        let embeddings = model
            .embed(vec![truncated], None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))?;
        embeddings
            .into_iter()
            .next()
            .map(matryoshka_truncate)
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("no embedding generated".to_string()))
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }
}
