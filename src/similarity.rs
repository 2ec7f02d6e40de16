//! Similarity primitives used by dedup, consolidation, and search.
//!
//! All functions are pure and stateless. [`jaccard`] and [`fuzzy_ratio`] work
//! on text (the dedup gate), [`cosine`] on embedding vectors (the semantic
//! tier). The L2 conversions bridge to sqlite-vec, whose KNN scans return
//! Euclidean distance over unit vectors.

use std::collections::HashSet;

/// Token-set Jaccard similarity over lowercased whitespace tokens.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let la = a.to_lowercase();
    let lb = b.to_lowercase();
    let wa: HashSet<&str> = la.split_whitespace().collect();
    let wb: HashSet<&str> = lb.split_whitespace().collect();
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let intersection = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    intersection as f64 / union as f64
}

/// Character-sequence similarity ratio in `[0.0, 1.0]`.
///
/// Computes `2 * M / (len(a) + len(b))` where `M` is the total length of the
/// matching blocks found by recursively locating the longest common
/// substring. Case-insensitive. Identical strings score 1.0.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let ca: Vec<char> = a.to_lowercase().chars().collect();
    let cb: Vec<char> = b.to_lowercase().chars().collect();
    if ca.is_empty() && cb.is_empty() {
        return 1.0;
    }
    if ca.is_empty() || cb.is_empty() {
        return 0.0;
    }
    let matches = matching_chars(&ca, &cb);
    2.0 * matches as f64 / (ca.len() + cb.len()) as f64
}

/// Total matched characters: longest common block, then recurse on both sides.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (ai, bi, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..ai], &b[..bi]) + matching_chars(&a[ai + len..], &b[bi + len..])
}

/// Longest common substring via rolling DP row. Returns (start_a, start_b, len).
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut cur = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                cur[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = cur;
    }
    best
}

/// Cosine similarity between two vectors. Zero for mismatched or zero-norm input.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Convert a cosine-similarity threshold to the equivalent L2 distance bound
/// for unit vectors: `d = sqrt(2 * (1 - cos))`.
pub fn cosine_threshold_to_l2(cosine_threshold: f64) -> f64 {
    (2.0 * (1.0 - cosine_threshold)).max(0.0).sqrt()
}

/// Recover cosine similarity from an L2 distance between unit vectors.
pub fn l2_to_cosine(distance: f64) -> f64 {
    1.0 - distance * distance / 2.0
}
