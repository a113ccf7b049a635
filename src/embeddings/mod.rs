// Embedding gateway
// The only capability the core needs from an embedding provider: turn a
// batch of texts into fixed-dimension vectors, in order.

pub mod openai;

pub use openai::OpenAiEmbedder;

use crate::Result;

/// Capability interface over an external embedding provider.
///
/// `embed` is batched and order-preserving: the vector at position `i`
/// corresponds to `texts[i]`. Provider outages, auth failures and rate
/// limits surface as `MenuError::EmbeddingUnavailable`; callers decide
/// whether to retry.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Cheap reachability probe for health reporting.
    fn ping(&self) -> Result<()>;
}

impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for &T {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }

    #[inline]
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    #[inline]
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }
}
