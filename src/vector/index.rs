use crate::vector::simd;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Distance metric fixed per collection at creation time.
///
/// `Euclidean` is the default. Mixing metrics silently changes result
/// ordering, so the manifest records the metric and reopening a collection
/// with a different configured metric is rejected.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Metric> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Some(Metric::Euclidean),
            "cosine" => Some(Metric::Cosine),
            _ => None,
        }
    }

    /// Distance between two equal-length vectors. Euclidean reports the
    /// actual L2 distance; cosine reports `1 - cos(a, b)`, with zero-norm
    /// vectors pinned to 1.0 so they rank as unrelated rather than NaN.
    pub fn distance(&self, a: &[f32], b: &[f32], simd_enabled: bool) -> f32 {
        match self {
            Metric::Euclidean => simd::l2_sq(a, b, simd_enabled).sqrt(),
            Metric::Cosine => {
                let (dot, norm_a, norm_b) = simd::dot_and_norms(a, b, simd_enabled);
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
                }
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Cosine => write!(f, "cosine"),
        }
    }
}

/// Exact k-NN index over the collection's vectors.
///
/// Exhaustive scan, O(n·d) per query. The map keys mirror the record store's
/// identifier set exactly; the store is responsible for keeping them in sync
/// and for dimensionality checks, so `insert`/`remove` assume valid input.
pub struct FlatIndex {
    metric: Metric,
    simd_enabled: bool,
    parallel_scan: bool,
    parallel_scan_min: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl FlatIndex {
    pub fn new(
        metric: Metric,
        simd_enabled: bool,
        parallel_scan: bool,
        parallel_scan_min: usize,
    ) -> Self {
        Self {
            metric,
            simd_enabled,
            parallel_scan,
            parallel_scan_min: parallel_scan_min.max(2),
            vectors: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Insert or replace the entry for `id`.
    pub fn insert(&mut self, id: String, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    pub fn remove(&mut self, id: &str) {
        self.vectors.remove(id);
    }

    /// Returns up to `k` hits ordered by ascending distance, ties broken by
    /// identifier ascending. The parallel and serial paths score every entry
    /// and sort with the same total order, so they agree exactly.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if k == 0 || self.vectors.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(String, f32)> =
            if self.parallel_scan && self.vectors.len() >= self.parallel_scan_min {
                self.vectors
                    .par_iter()
                    .map(|(id, vector)| {
                        (
                            id.clone(),
                            self.metric.distance(vector, query, self.simd_enabled),
                        )
                    })
                    .collect()
            } else {
                self.vectors
                    .iter()
                    .map(|(id, vector)| {
                        (
                            id.clone(),
                            self.metric.distance(vector, query, self.simd_enabled),
                        )
                    })
                    .collect()
            };
        scored.sort_by(compare_hits_asc);
        scored.truncate(k);
        scored
    }
}

fn compare_hits_asc(a: &(String, f32), b: &(String, f32)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(metric: Metric, entries: &[(&str, &[f32])]) -> FlatIndex {
        let mut index = FlatIndex::new(metric, true, false, 4);
        for (id, v) in entries {
            index.insert(id.to_string(), v.to_vec());
        }
        index
    }

    #[test]
    fn euclidean_orders_by_distance() {
        let index = index_with(
            Metric::Euclidean,
            &[
                ("a", &[1.0, 0.0]),
                ("b", &[0.0, 1.0]),
                ("c", &[1.0, 1.0]),
            ],
        );
        let hits = index.search(&[1.0, 0.0], 3);
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].1.abs() < 1e-6);
        assert!((hits[1].1 - 1.0).abs() < 1e-6);
        assert!((hits[2].1 - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn ties_break_by_identifier() {
        let index = index_with(
            Metric::Euclidean,
            &[
                ("z", &[0.0, 1.0]),
                ("a", &[0.0, 1.0]),
                ("m", &[0.0, 1.0]),
            ],
        );
        let hits = index.search(&[0.0, 0.0], 3);
        let ids: Vec<&str> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn cosine_zero_norm_is_pinned() {
        let index = index_with(Metric::Cosine, &[("zero", &[0.0, 0.0])]);
        let hits = index.search(&[1.0, 0.0], 1);
        assert_eq!(hits[0].1, 1.0);
    }

    #[test]
    fn k_larger_than_len_returns_all() {
        let index = index_with(Metric::Euclidean, &[("a", &[1.0]), ("b", &[2.0])]);
        assert_eq!(index.search(&[0.0], 10).len(), 2);
    }
}
