//! Similarity retrieval over the fitted corpus.
//!
//! Cosine similarity against every corpus row, multi-criteria filtering,
//! and a two-pass diversity selection that spreads exemplars across
//! categories before falling back to raw similarity rank.

use std::sync::Arc;
use tracing::{debug, warn};

use scribe_common::{Article, PipelineError};

use crate::corpus::CorpusStore;
use crate::embedder::Embedder;

/// One ranked retrieval hit; created per query, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub article: Article,
    /// Cosine similarity in [-1, 1]
    pub similarity: f32,
    /// 1 = best
    pub rank: usize,
}

/// Filters applied before ranking.
#[derive(Debug, Clone)]
pub struct SearchFilters {
    pub min_similarity: f32,
    pub category: Option<String>,
    /// Inclusive (min_words, max_words) bounds
    pub word_count_range: Option<(usize, usize)>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            min_similarity: 0.1,
            category: None,
            word_count_range: None,
        }
    }
}

pub struct SimilarityRetriever {
    store: Arc<CorpusStore>,
    embedder: Arc<Embedder>,
}

impl SimilarityRetriever {
    pub fn new(store: Arc<CorpusStore>, embedder: Arc<Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Top-k articles most similar to the query under the given filters.
    /// Sorted by similarity descending, ties broken by corpus index. An
    /// empty result is a valid outcome, not an error.
    pub async fn find_similar(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        let corpus = self.store.snapshot();
        if !corpus.is_fitted() {
            warn!("Similarity query against unfitted corpus; returning no results");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut candidates: Vec<(usize, f32)> = Vec::new();
        for (i, row) in corpus.embeddings.iter().enumerate() {
            let similarity = cosine_similarity(&query_embedding, row);
            if similarity < filters.min_similarity {
                continue;
            }

            let article = &corpus.articles[i];
            if let Some(category) = &filters.category {
                if &article.category != category {
                    continue;
                }
            }
            if let Some((min_words, max_words)) = filters.word_count_range {
                if article.word_count < min_words || article.word_count > max_words {
                    continue;
                }
            }

            candidates.push((i, similarity));
        }

        // Similarity descending; corpus index breaks ties deterministically.
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(top_k);

        let results: Vec<RetrievalResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(rank, (i, similarity))| RetrievalResult {
                article: corpus.articles[i].clone(),
                similarity,
                rank: rank + 1,
            })
            .collect();

        debug!("Similarity query matched {} articles", results.len());
        Ok(results)
    }

    /// Exemplars spread across categories: a 3n candidate pool is reduced by
    /// taking the best-ranked article from each not-yet-seen category, then
    /// topping up by similarity order. Ranks are rewritten to 1..=n.
    pub async fn get_diverse_examples(
        &self,
        query: &str,
        num_examples: usize,
        ensure_diversity: bool,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        let candidates = self
            .find_similar(query, num_examples * 3, &SearchFilters::default())
            .await?;

        if !ensure_diversity {
            let mut selected = candidates;
            selected.truncate(num_examples);
            rerank(&mut selected);
            return Ok(selected);
        }

        let mut selected: Vec<RetrievalResult> = Vec::new();
        let mut used_categories: Vec<String> = Vec::new();

        // First pass: one article per category, best-ranked first.
        for candidate in &candidates {
            if selected.len() >= num_examples {
                break;
            }
            if !used_categories.contains(&candidate.article.category) {
                used_categories.push(candidate.article.category.clone());
                selected.push(candidate.clone());
            }
        }

        // Second pass: fill remaining slots by similarity order.
        if selected.len() < num_examples {
            for candidate in &candidates {
                if selected.len() >= num_examples {
                    break;
                }
                if !selected.iter().any(|s| s.article.id == candidate.article.id) {
                    selected.push(candidate.clone());
                }
            }
        }

        rerank(&mut selected);
        debug!(
            "Selected {} diverse exemplars from categories {:?}",
            selected.len(),
            selected
                .iter()
                .map(|r| r.article.category.as_str())
                .collect::<Vec<_>>()
        );
        Ok(selected)
    }

    /// Keyword search is purely semantic: the keywords join into one query
    /// string and flow through `find_similar`.
    pub async fn search_by_keywords(
        &self,
        keywords: &[String],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult>, PipelineError> {
        let query = keywords.join(" ");
        self.find_similar(&query, top_k, &SearchFilters::default())
            .await
    }
}

fn rerank(results: &mut [RetrievalResult]) {
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}

/// Cosine similarity; zero for mismatched widths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
