//! Per-page semantic index
//!
//! Exact nearest-neighbor search over fingerprint embeddings. Pages carry a
//! few dozen interactive elements, so a linear scan under squared Euclidean
//! distance is both exact and fast enough.

use crate::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use crate::fingerprint::ElementDescriptor;

#[derive(Debug, Clone)]
pub struct SemanticIndex {
    descriptors: Vec<ElementDescriptor>,
    // vectors[i] is the embedding of descriptors[i].description
    vectors: Vec<Embedding>,
    dimension: usize,
}

impl SemanticIndex {
    /// Embed all descriptions in one batch and index them.
    ///
    /// Returns `Ok(None)` for an empty descriptor set: there is nothing to
    /// search and no request is made.
    pub async fn build<P: EmbeddingProvider + ?Sized>(
        descriptors: Vec<ElementDescriptor>,
        provider: &P,
    ) -> Result<Option<Self>, EmbeddingError> {
        if descriptors.is_empty() {
            return Ok(None);
        }

        let texts: Vec<String> = descriptors.iter().map(|d| d.description.clone()).collect();
        let vectors = provider.embed_batch(&texts).await?;
        Self::from_parts(descriptors, vectors).map(Some)
    }

    /// Pair descriptors with precomputed vectors.
    ///
    /// An index always holds at least one entry, so a query with `k >= 1`
    /// always yields a candidate.
    pub fn from_parts(
        descriptors: Vec<ElementDescriptor>,
        vectors: Vec<Embedding>,
    ) -> Result<Self, EmbeddingError> {
        if descriptors.is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "an index needs at least one descriptor".to_string(),
            ));
        }
        if vectors.len() != descriptors.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: descriptors.len(),
                actual: vectors.len(),
            });
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(EmbeddingError::Decode(
                "embedding vectors must not be empty".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(EmbeddingError::Decode(format!(
                "embedding {} has dimension {}, expected {}",
                bad,
                vectors[bad].len(),
                dimension
            )));
        }

        Ok(Self {
            descriptors,
            vectors,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn descriptors(&self) -> &[ElementDescriptor] {
        &self.descriptors
    }

    /// Up to `k` `(position, squared distance)` pairs, closest first. Equal
    /// distances keep insertion order, so the earliest element wins ties.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|v| squared_distance(v, query))
            .enumerate()
            .collect();

        // stable sort
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }

    /// Embed `text` once and return the `k` closest descriptors.
    pub async fn query<P: EmbeddingProvider + ?Sized>(
        &self,
        text: &str,
        k: usize,
        provider: &P,
    ) -> Result<Vec<&ElementDescriptor>, EmbeddingError> {
        let vector = provider.embed(text).await?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::Decode(format!(
                "query embedding has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        Ok(self
            .nearest(&vector, k)
            .into_iter()
            .map(|(position, _)| &self.descriptors[position])
            .collect())
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
