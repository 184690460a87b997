use async_trait::async_trait;
use dashmap::DashMap;
use index::{Embedder, IndexError, IndexResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// In-process cache for query embeddings and generated answers.
pub struct Cache {
    embeddings: DashMap<String, Vec<f32>>,
    answers: DashMap<String, String>,
    max_entries: usize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            embeddings: DashMap::new(),
            answers: DashMap::new(),
            max_entries,
        }
    }

    pub fn set_embedding(&self, text: &str, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        evict_if_full(&self.embeddings, self.max_entries);
        self.embeddings.insert(hash_text(text), embedding);
    }

    pub fn get_embedding(&self, text: &str) -> Option<Vec<f32>> {
        self.embeddings.get(&hash_text(text)).map(|r| r.value().clone())
    }

    /// Answers are keyed by the exact context and question that produced them
    pub fn set_answer(&self, context: &str, query: &str, answer: String) {
        if self.max_entries == 0 {
            return;
        }
        evict_if_full(&self.answers, self.max_entries);
        self.answers.insert(answer_key(context, query), answer);
    }

    pub fn get_answer(&self, context: &str, query: &str) -> Option<String> {
        self.answers.get(&answer_key(context, query)).map(|r| r.value().clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            embeddings_cached: self.embeddings.len(),
            answers_cached: self.answers.len(),
        }
    }

    pub fn clear(&self) {
        self.embeddings.clear();
        self.answers.clear();
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub embeddings_cached: usize,
    pub answers_cached: usize,
}

// Simple eviction: drop 25% of entries when full
fn evict_if_full<V>(map: &DashMap<String, V>, max_entries: usize) {
    if map.len() < max_entries {
        return;
    }
    let to_remove: Vec<_> = map
        .iter()
        .take((max_entries / 4).max(1))
        .map(|r| r.key().clone())
        .collect();
    for key in to_remove {
        map.remove(&key);
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn answer_key(context: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(context.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

/// Embedder decorator that serves repeated texts from the cache.
pub struct CachingEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Arc<Cache>,
}

impl CachingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Embedder for CachingEmbedder {
    async fn embed(&self, texts: &[String]) -> IndexResult<Vec<Vec<f32>>> {
        let mut vectors: Vec<Option<Vec<f32>>> = texts.iter().map(|t| self.cache.get_embedding(t)).collect();

        let misses: Vec<String> = texts
            .iter()
            .zip(&vectors)
            .filter(|(_, cached)| cached.is_none())
            .map(|(text, _)| text.clone())
            .collect();
        debug!(hits = texts.len() - misses.len(), misses = misses.len(), "Embedding cache lookup");

        if !misses.is_empty() {
            let fresh = self.inner.embed(&misses).await?;
            if fresh.len() != misses.len() {
                return Err(IndexError::backend(
                    "embedding",
                    format!("expected {} vectors, got {}", misses.len(), fresh.len()),
                ));
            }
            let mut fresh = fresh.into_iter();
            for (slot, text) in vectors.iter_mut().zip(texts) {
                if slot.is_some() {
                    continue;
                }
                if let Some(vector) = fresh.next() {
                    self.cache.set_embedding(text, vector.clone());
                    *slot = Some(vector);
                }
            }
        }

        Ok(vectors.into_iter().flatten().collect())
    }
}
