//! Exact in-memory vector index.

use crate::chunking::Chunk;
use serde::{Deserialize, Serialize};

/// Similarity measure used to rank chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity (higher is closer).
    #[default]
    Cosine,
    /// Euclidean distance, reported as its negation so higher is closer.
    L2,
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl DistanceMetric {
    /// Score `b` against `a`; higher is more similar.
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::L2 => -l2_distance(a, b),
        }
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Euclidean distance; mismatched lengths are infinitely far apart.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// A chunk returned from a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Brute-force index over every stored vector.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    metric: DistanceMetric,
    entries: Vec<(Chunk, Vec<f32>)>,
}

impl FlatIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            entries: Vec::new(),
        }
    }

    /// Append an entry. Insertion order breaks score ties.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) {
        self.entries.push((chunk, vector));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Length of the stored vectors, `None` while empty.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|(_, v)| v.len())
    }

    /// Vector stored for the entry at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.entries.get(position).map(|(_, v)| v.as_slice())
    }

    /// The `limit` closest entries, best first.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, (_, vector))| (pos, self.metric.score(query, vector)))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(pos, score)| SearchResult {
                chunk: self.entries[pos].0.clone(),
                score,
            })
            .collect()
    }
}
