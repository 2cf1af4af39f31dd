//! Corpus store: reference articles plus their embedding matrix.
//!
//! Articles load once from a JSON file; `fit` computes one embedding per
//! article (or restores a persisted artifact) and swaps the whole corpus in
//! behind an `Arc`, so concurrent readers never observe a half-built matrix.
//! Invariant: row i of the matrix always corresponds to article i.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use scribe_common::{Article, PipelineError};

use crate::embedder::Embedder;

/// Embedding artifact format version; bumped on layout changes.
const ARTIFACT_VERSION: u32 = 1;

/// An immutable, fitted (or not yet fitted) corpus snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub articles: Vec<Article>,
    /// Row i corresponds to articles[i]; empty until fitted.
    pub embeddings: Vec<Vec<f32>>,
    pub dimension: usize,
}

impl Corpus {
    pub fn is_fitted(&self) -> bool {
        !self.articles.is_empty() && self.embeddings.len() == self.articles.len()
    }
}

/// Persisted embedding cache: articles, matrix and the compatibility gates.
#[derive(Serialize, Deserialize)]
struct EmbeddingArtifact {
    version: u32,
    model: String,
    dimension: usize,
    articles: Vec<Article>,
    embeddings: Vec<Vec<f32>>,
}

/// Per-category corpus statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: usize,
    pub total_words: usize,
    pub avg_words: usize,
}

/// Shared, swappable corpus holder.
pub struct CorpusStore {
    inner: RwLock<Arc<Corpus>>,
    cache_path: PathBuf,
}

impl CorpusStore {
    pub fn new(cache_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(Corpus::default())),
            cache_path: cache_path.into(),
        }
    }

    /// Load reference articles from a JSON array file. Optional fields get
    /// defaults: word_count from a whitespace split of content, a numbered
    /// title, "Unknown" category. Returns the article count.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<usize, PipelineError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            PipelineError::CorpusLoad(format!("{}: {}", path.display(), e))
        })?;
        let mut articles: Vec<Article> = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::CorpusLoad(format!("malformed corpus file: {}", e)))?;

        for (i, article) in articles.iter_mut().enumerate() {
            article.id = i;
            if article.title.is_empty() {
                article.title = format!("Article {}", i + 1);
            }
            if article.category.is_empty() {
                article.category = "Unknown".to_string();
            }
            if article.word_count == 0 {
                article.word_count = article.content.split_whitespace().count();
            }
            if article.author.is_empty() {
                article.author = "Editorial Team".to_string();
            }
            if article.source.is_empty() {
                article.source = "reference_library".to_string();
            }
        }

        let count = articles.len();
        let total_words: usize = articles.iter().map(|a| a.word_count).sum();
        info!("Loaded {} reference articles ({} words)", count, total_words);

        let corpus = Corpus {
            articles,
            embeddings: Vec::new(),
            dimension: 0,
        };
        *self.inner.write().unwrap() = Arc::new(corpus);
        Ok(count)
    }

    /// Compute (or restore) the embedding matrix for the loaded articles.
    ///
    /// A persisted artifact is reused when its version, embedding model and
    /// article count still match; a dimension conflict with the active
    /// embedder is an error rather than a silent recompute, since it means
    /// the configuration disagrees with the artifact.
    pub async fn fit(
        &self,
        embedder: &Embedder,
        force_recompute: bool,
    ) -> Result<(), PipelineError> {
        let current = self.snapshot();
        if current.articles.is_empty() {
            return Err(PipelineError::CorpusLoad(
                "no articles loaded; call load() first".to_string(),
            ));
        }

        if !force_recompute && self.cache_path.exists() {
            match self.load_artifact(embedder, &current.articles) {
                Ok(corpus) => {
                    info!(
                        "Restored embedding cache: {} articles, dimension {}",
                        corpus.articles.len(),
                        corpus.dimension
                    );
                    *self.inner.write().unwrap() = Arc::new(corpus);
                    return Ok(());
                }
                Err(e @ PipelineError::EmbeddingDimensionMismatch { .. }) => return Err(e),
                Err(e) => {
                    warn!("Embedding cache unusable ({}); recomputing", e);
                }
            }
        }

        info!("Computing embeddings for {} articles", current.articles.len());
        let texts: Vec<&str> = current.articles.iter().map(|a| a.content.as_str()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != current.articles.len() {
            return Err(PipelineError::Embedding(format!(
                "embedder produced {} rows for {} articles",
                embeddings.len(),
                current.articles.len()
            )));
        }

        let corpus = Corpus {
            articles: current.articles.clone(),
            embeddings,
            dimension: embedder.dimension(),
        };

        if let Err(e) = self.save_artifact(&corpus, embedder.model_id()) {
            warn!("Failed to persist embedding cache: {}", e);
        }

        *self.inner.write().unwrap() = Arc::new(corpus);
        Ok(())
    }

    /// Current corpus snapshot; cheap, and stable for the caller's lifetime
    /// even if a refit swaps the store underneath.
    pub fn snapshot(&self) -> Arc<Corpus> {
        Arc::clone(&self.inner.read().unwrap())
    }

    pub fn is_fitted(&self) -> bool {
        self.snapshot().is_fitted()
    }

    pub fn article_count(&self) -> usize {
        self.snapshot().articles.len()
    }

    /// Per-category counts and word totals, sorted by category name.
    pub fn category_stats(&self) -> Vec<CategoryStats> {
        let corpus = self.snapshot();
        let mut stats: Vec<CategoryStats> = Vec::new();

        for article in &corpus.articles {
            match stats.iter_mut().find(|s| s.category == article.category) {
                Some(entry) => {
                    entry.count += 1;
                    entry.total_words += article.word_count;
                }
                None => stats.push(CategoryStats {
                    category: article.category.clone(),
                    count: 1,
                    total_words: article.word_count,
                    avg_words: 0,
                }),
            }
        }

        for entry in &mut stats {
            entry.avg_words = entry.total_words / entry.count;
        }
        stats.sort_by(|a, b| a.category.cmp(&b.category));
        stats
    }

    /// All articles from one category, in corpus order.
    pub fn articles_in_category(&self, category: &str, limit: Option<usize>) -> Vec<Article> {
        let corpus = self.snapshot();
        let iter = corpus
            .articles
            .iter()
            .filter(|a| a.category == category)
            .cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Swap in a prebuilt corpus directly; test fixtures only.
    #[cfg(test)]
    pub(crate) fn install_for_tests(&self, corpus: Corpus) {
        *self.inner.write().unwrap() = Arc::new(corpus);
    }

    fn save_artifact(&self, corpus: &Corpus, model: &str) -> Result<(), PipelineError> {
        if let Some(parent) = self.cache_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let artifact = EmbeddingArtifact {
            version: ARTIFACT_VERSION,
            model: model.to_string(),
            dimension: corpus.dimension,
            articles: corpus.articles.clone(),
            embeddings: corpus.embeddings.clone(),
        };
        let bytes = bincode::serialize(&artifact)
            .map_err(|e| PipelineError::Persist(e.to_string()))?;
        fs::write(&self.cache_path, bytes)?;
        info!("Saved embedding cache to {}", self.cache_path.display());
        Ok(())
    }

    fn load_artifact(
        &self,
        embedder: &Embedder,
        loaded_articles: &[Article],
    ) -> Result<Corpus, PipelineError> {
        let bytes = fs::read(&self.cache_path)?;
        let artifact: EmbeddingArtifact = bincode::deserialize(&bytes)
            .map_err(|e| PipelineError::Persist(format!("corrupt embedding cache: {}", e)))?;

        if artifact.version != ARTIFACT_VERSION {
            return Err(PipelineError::CacheVersionMismatch {
                expected: ARTIFACT_VERSION,
                found: artifact.version,
            });
        }
        if artifact.model != embedder.model_id() {
            return Err(PipelineError::Persist(format!(
                "embedding model changed: cache has '{}', active is '{}'",
                artifact.model,
                embedder.model_id()
            )));
        }
        if artifact.articles.len() != loaded_articles.len() {
            return Err(PipelineError::Persist(format!(
                "corpus changed: cache has {} articles, loaded {}",
                artifact.articles.len(),
                loaded_articles.len()
            )));
        }
        if artifact.dimension != embedder.dimension() {
            return Err(PipelineError::EmbeddingDimensionMismatch {
                expected: embedder.dimension(),
                found: artifact.dimension,
            });
        }
        if artifact.embeddings.len() != artifact.articles.len() {
            return Err(PipelineError::Persist(
                "corrupt embedding cache: row count disagrees with article count".to_string(),
            ));
        }

        Ok(Corpus {
            articles: artifact.articles,
            embeddings: artifact.embeddings,
            dimension: artifact.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;

    fn corpus_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("articles.json");
        let raw = r#"[
            {"title": "The Future of Retail", "content": "retail commerce stores digital shoppers experience", "category": "Futurist"},
            {"title": "Data-Driven Marketing", "content": "marketing campaigns analytics data customers brands", "category": "Marketing"},
            {"content": "technology cloud platforms adoption enterprise teams"}
        ]"#;
        fs::write(&path, raw).unwrap();
        path
    }

    #[test]
    fn test_load_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        let count = store.load(corpus_file(&dir)).unwrap();
        assert_eq!(count, 3);

        let corpus = store.snapshot();
        assert_eq!(corpus.articles[0].id, 0);
        assert_eq!(corpus.articles[2].title, "Article 3");
        assert_eq!(corpus.articles[2].category, "Unknown");
        assert_eq!(corpus.articles[0].word_count, 6);
        assert_eq!(corpus.articles[2].author, "Editorial Team");
        assert!(!corpus.is_fitted());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        let err = store.load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, PipelineError::CorpusLoad(_)));
    }

    #[test]
    fn test_load_malformed_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        let err = store.load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::CorpusLoad(_)));
    }

    #[tokio::test]
    async fn test_fit_row_count_matches_article_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        store.load(corpus_file(&dir)).unwrap();

        let embedder = Embedder::Hash(HashEmbedder::new(64));
        store.fit(&embedder, false).await.unwrap();

        let corpus = store.snapshot();
        assert!(corpus.is_fitted());
        assert_eq!(corpus.embeddings.len(), corpus.articles.len());
        assert_eq!(corpus.dimension, 64);
    }

    #[tokio::test]
    async fn test_fit_without_load_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        let embedder = Embedder::Hash(HashEmbedder::new(64));
        let err = store.fit(&embedder, false).await.unwrap_err();
        assert!(matches!(err, PipelineError::CorpusLoad(_)));
    }

    #[tokio::test]
    async fn test_fit_restores_persisted_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("emb.bin");
        let corpus_path = corpus_file(&dir);
        let embedder = Embedder::Hash(HashEmbedder::new(64));

        let store = CorpusStore::new(&cache);
        store.load(&corpus_path).unwrap();
        store.fit(&embedder, false).await.unwrap();
        let original = store.snapshot();

        // A fresh store restores from the artifact instead of recomputing.
        let restored_store = CorpusStore::new(&cache);
        restored_store.load(&corpus_path).unwrap();
        restored_store.fit(&embedder, false).await.unwrap();
        let restored = restored_store.snapshot();

        assert_eq!(restored.embeddings, original.embeddings);
        assert_eq!(restored.articles, original.articles);
    }

    #[tokio::test]
    async fn test_fit_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("emb.bin");
        let corpus_path = corpus_file(&dir);

        let store = CorpusStore::new(&cache);
        store.load(&corpus_path).unwrap();
        store
            .fit(&Embedder::Hash(HashEmbedder::new(64)), false)
            .await
            .unwrap();

        // Same model id, different configured width: configuration conflict.
        let store2 = CorpusStore::new(&cache);
        store2.load(&corpus_path).unwrap();
        let err = store2
            .fit(&Embedder::Hash(HashEmbedder::new(128)), false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmbeddingDimensionMismatch {
                expected: 128,
                found: 64
            }
        ));

        // Forcing a recompute resolves it.
        store2
            .fit(&Embedder::Hash(HashEmbedder::new(128)), true)
            .await
            .unwrap();
        assert_eq!(store2.snapshot().dimension, 128);
    }

    #[tokio::test]
    async fn test_stale_artifact_version_triggers_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("emb.bin");

        // An artifact from a hypothetical older format version
        let stale = EmbeddingArtifact {
            version: 99,
            model: "feature-hash-v1".to_string(),
            dimension: 3,
            articles: vec![],
            embeddings: vec![],
        };
        fs::write(&cache, bincode::serialize(&stale).unwrap()).unwrap();

        let store = CorpusStore::new(&cache);
        store.load(corpus_file(&dir)).unwrap();
        store
            .fit(&Embedder::Hash(HashEmbedder::new(64)), false)
            .await
            .unwrap();
        // Recomputed with the live embedder, not the stale artifact
        assert_eq!(store.snapshot().dimension, 64);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_triggers_recompute() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("emb.bin");
        fs::write(&cache, b"not a valid artifact").unwrap();

        let store = CorpusStore::new(&cache);
        store.load(corpus_file(&dir)).unwrap();
        store
            .fit(&Embedder::Hash(HashEmbedder::new(64)), false)
            .await
            .unwrap();
        assert!(store.is_fitted());
    }

    #[test]
    fn test_category_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        store.load(corpus_file(&dir)).unwrap();

        let stats = store.category_stats();
        assert_eq!(stats.len(), 3);
        // Sorted by name
        assert_eq!(stats[0].category, "Futurist");
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].avg_words, 6);
    }

    #[test]
    fn test_articles_in_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = CorpusStore::new(dir.path().join("emb.bin"));
        store.load(corpus_file(&dir)).unwrap();

        let marketing = store.articles_in_category("Marketing", None);
        assert_eq!(marketing.len(), 1);
        assert_eq!(marketing[0].title, "Data-Driven Marketing");
        assert!(store.articles_in_category("Nope", None).is_empty());
    }
}
