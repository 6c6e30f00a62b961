// Exact cosine-similarity ranking.
// Every query is scored against every embedding, so cost grows linearly with
// the number of records.

use crate::{RagError, Result};

/// Added to the norm product so all-zero vectors score 0 instead of NaN
pub const SIMILARITY_EPSILON: f32 = 1e-10;

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// `dot(a, b) / (|a| * |b| + ε)`; callers guarantee equal lengths
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b) / norm(a).mul_add(norm(b), SIMILARITY_EPSILON)
}

/// Rank `embeddings` against `query`, returning `(position, score)` pairs
/// for the best `top_k`, highest score first. Equal scores keep their
/// original order.
#[inline]
pub fn rank<'a, I>(query: &[f32], embeddings: I, top_k: usize) -> Result<Vec<(usize, f32)>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let query_norm = norm(query);

    let mut scored = Vec::new();
    for (position, embedding) in embeddings.into_iter().enumerate() {
        if embedding.len() != query.len() {
            return Err(RagError::DimensionMismatch {
                expected: embedding.len(),
                actual: query.len(),
            });
        }
        let score = dot(query, embedding) / query_norm.mul_add(norm(embedding), SIMILARITY_EPSILON);
        scored.push((position, score));
    }

    // sort_by is stable, which gives the insertion-order tie-break
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    Ok(scored)
}
