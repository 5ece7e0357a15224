use candle_core::Tensor;
use rayon::prelude::*;

use crate::{
    embedding::matrix_to_tensor,
    embedding_db::EmbeddingDb,
    error::Result,
};

/// A passage with its MaxSim score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage_id: u64,
    pub score: f32,
}

/// Score passages against a query embedding with ColBERT MaxSim.
///
/// Embeddings are read in one transaction, then scored in parallel.
/// Passages without a stored embedding are skipped. The result is sorted by
/// score, highest first; ties keep passage order.
pub fn score_passages(
    query_embedding: &Tensor,
    passage_ids: &[u64],
    embedding_db: &EmbeddingDb,
) -> Result<Vec<ScoredPassage>> {
    let matrices = embedding_db.batch_load(passage_ids)?;

    let mut scored: Vec<ScoredPassage> = matrices
        .par_iter()
        .filter_map(|(passage_id, matrix)| {
            let doc = matrix_to_tensor(matrix.as_ref()?).ok()?;
            let score = maxsim(query_embedding, &doc)
                .inspect_err(|e| {
                    tracing::warn!(passage_id, "skipping passage: {e}");
                })
                .ok()?;
            Some(ScoredPassage {
                passage_id: *passage_id,
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(scored)
}

/// MaxSim between a `[Q, D]` query and a `[T, D]` document: for each query
/// token take its best dot product over document tokens, then sum.
pub fn maxsim(query_embedding: &Tensor, doc_embedding: &Tensor) -> Result<f32> {
    let sim = query_embedding.matmul(&doc_embedding.t()?)?;
    Ok(sim.max(1)?.sum_all()?.to_scalar::<f32>()?)
}
