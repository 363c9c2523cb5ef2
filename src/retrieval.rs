use crate::chunking::TextChunk;
use crate::embeddings::Embedding;
use anyhow::{bail, Result};

/// A retrieved chunk together with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedContext {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Cosine similarity between two vectors.
///
/// A zero vector has similarity 0.0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        bail!(
            "Embedding dimensions do not match: {} vs {}",
            a.len(),
            b.len()
        );
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a * norm_b))
}

/// Return the `k` candidates most similar to the query, best first.
///
/// `candidates[i]` must be the embedding of `contexts[i]`. When `k` exceeds
/// the number of candidates, every candidate is returned.
pub fn top_k(
    query: &Embedding,
    candidates: &[Embedding],
    contexts: &[TextChunk],
    k: usize,
) -> Result<Vec<RankedContext>> {
    if candidates.len() != contexts.len() {
        bail!(
            "Got {} embeddings for {} contexts",
            candidates.len(),
            contexts.len()
        );
    }

    let scores = candidates
        .iter()
        .map(|candidate| cosine_similarity(&query.values, &candidate.values))
        .collect::<Result<Vec<f32>>>()?;

    // Ascending, then take from the end
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let take = k.min(order.len());
    let ranked = order[order.len() - take..]
        .iter()
        .rev()
        .map(|&idx| RankedContext {
            chunk: contexts[idx].clone(),
            score: scores[idx],
        })
        .collect();

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<TextChunk> {
        (0..n)
            .map(|index| TextChunk {
                text: format!("chunk {}", index),
                index,
            })
            .collect()
    }

    fn candidates() -> Vec<Embedding> {
        vec![
            Embedding::new(vec![1.0, 0.0, 0.0]),
            Embedding::new(vec![0.0, 1.0, 0.0]),
            Embedding::new(vec![0.7, 0.7, 0.0]),
            Embedding::new(vec![-1.0, 0.0, 0.0]),
            Embedding::new(vec![0.2, 0.1, 0.9]),
        ]
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap().abs() < 1e-6);
        assert!((cosine_similarity(&[2.0, 0.0], &[-1.0, 0.0]).unwrap() + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_identical_vector_ranks_first() {
        let candidates = candidates();
        let query = candidates[4].clone();

        let ranked = top_k(&query, &candidates, &chunks(5), 5).unwrap();

        assert_eq!(ranked[0].chunk.index, 4);
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_results_sorted_descending() {
        let query = Embedding::new(vec![0.9, 0.3, 0.1]);

        let ranked = top_k(&query, &candidates(), &chunks(5), 5).unwrap();

        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked.last().unwrap().chunk.index, 3);
    }

    #[test]
    fn test_result_length() {
        let query = Embedding::new(vec![1.0, 1.0, 0.0]);

        assert_eq!(top_k(&query, &candidates(), &chunks(5), 2).unwrap().len(), 2);
        assert_eq!(top_k(&query, &candidates(), &chunks(5), 10).unwrap().len(), 5);
        assert!(top_k(&query, &candidates(), &chunks(5), 0).unwrap().is_empty());
    }

    #[test]
    fn test_top_two() {
        let query = Embedding::new(vec![1.0, 0.1, 0.0]);

        let ranked = top_k(&query, &candidates(), &chunks(5), 2).unwrap();

        assert_eq!(ranked[0].chunk.index, 0);
        assert_eq!(ranked[1].chunk.index, 2);
    }

    #[test]
    fn test_misaligned_index_is_an_error() {
        let query = Embedding::new(vec![1.0, 0.0, 0.0]);

        assert!(top_k(&query, &candidates(), &chunks(4), 2).is_err());
    }
}
