use crate::ProviderResult;
use async_trait::async_trait;

/// Turns query text into a vector in the same space as the corpus embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn provider_name(&self) -> &str;
}

/// Deterministic feature-hashing embedder for offline use and tests.
///
/// Each lowercase alphanumeric token lands in one bucket with a hashed sign;
/// the result is L2-normalised. Texts sharing tokens score high under cosine
/// similarity, which is all the semantic path needs in local setups.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn same_text_same_vector() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Refund window is 30 days").await.unwrap();
        let b = embedder.embed("refund WINDOW is 30 days").await.unwrap();
        assert_eq!(a, b);
        assert_relative_eq!(cosine(&a, &a), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn overlapping_texts_are_closer() {
        let embedder = HashingEmbedder::new(256);
        let q = embedder.embed_sync("refund window days");
        let near = embedder.embed_sync("the refund window is 30 days");
        let far = embedder.embed_sync("pump maintenance schedule");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn text_without_tokens_is_zero() {
        let embedder = HashingEmbedder::new(8);
        assert!(embedder.embed_sync("?!").iter().all(|v| *v == 0.0));
        assert_eq!(embedder.dimension(), 8);
    }
}
