//! Text-to-vector embedding interface.
//!
//! Embedding computation happens outside this process — the store only
//! consumes vectors. [`EmbeddingProvider`] is the seam: the `remote` provider
//! calls a local HTTP endpoint; `none` disables the semantic tier entirely.
//! A provider failure surfaces as [`EngramError::EmbeddingUnavailable`] and
//! recall degrades to the remaining tiers instead of failing the call.

pub mod remote;

use crate::error::Result;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for obtaining embedding vectors for text.
///
/// Implementations produce L2-normalized vectors of exactly [`EMBEDDING_DIM`]
/// dimensions. All methods are synchronous — callers in async contexts should
/// use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Returns `None` for the `"none"` provider — search then runs keyword,
/// fuzzy, and graph tiers only.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Option<Box<dyn EmbeddingProvider>>> {
    match config.provider.as_str() {
        "remote" => {
            let provider = remote::RemoteEmbeddingProvider::new(config)?;
            Ok(Some(Box::new(provider)))
        }
        "none" => Ok(None),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: remote, none"),
    }
}

/// L2-normalize a vector in place. Zero vectors are left unchanged.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
