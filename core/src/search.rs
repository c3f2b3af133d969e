use crate::error::Result;
use crate::index::{DocId, DocumentEntry, TermEntry};
use crate::store::{IndexStore, IndexView};
use crate::tokenizer::tokenize;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Result count used when the caller does not ask for one.
pub const DEFAULT_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub id: DocId,
    pub file_url: String,
    #[serde(rename = "alt")]
    pub alt_text: String,
    #[serde(rename = "caption")]
    pub caption_text: String,
    pub page_url: String,
    #[serde(rename = "domain")]
    pub domain_name: String,
    pub format: String,
    pub snippet: String,
    pub score: f64,
}

impl ScoredResult {
    fn new(doc: DocumentEntry, score: f64) -> Self {
        Self {
            id: doc.id,
            file_url: doc.file_url,
            alt_text: doc.alt_text,
            caption_text: doc.caption_text,
            page_url: doc.page_url,
            domain_name: doc.domain_name,
            format: doc.format,
            snippet: doc.snippet,
            score,
        }
    }
}

/// Contribution of one posting: sub-linear TF times IDF.
pub fn term_score(tf: u32, idf: f64) -> f64 {
    (1.0 + (tf as f64).ln()) * idf
}

/// Sum the TF-IDF contributions of every posting, per document.
pub fn accumulate_scores(entries: &[TermEntry]) -> HashMap<DocId, f64> {
    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for entry in entries {
        for posting in &entry.postings {
            *scores.entry(posting.doc_id.clone()).or_insert(0.0) += term_score(posting.tf, entry.idf);
        }
    }
    scores
}

/// Order by descending score, ties by ascending id.
pub fn rank(scores: HashMap<DocId, f64>) -> Vec<(DocId, f64)> {
    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Request-scoped TF-IDF query scorer over a published index.
pub struct Searcher<S> {
    store: Arc<S>,
}

impl<S> Clone for Searcher<S> {
    fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: IndexStore> Searcher<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    /// Top `limit` documents for `query`, best first.
    ///
    /// Candidates whose metadata is missing are dropped and the next ranked candidates
    /// are resolved in their place, so up to `limit` results come back whenever enough
    /// scored documents have metadata.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredResult>> {
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let Some(view) = self.store.view()? else {
            return Ok(Vec::new());
        };

        let terms: Vec<String> = terms.into_iter().collect();
        let entries = view.term_entries(&terms)?;
        let scores = accumulate_scores(&entries);
        if scores.is_empty() {
            return Ok(Vec::new());
        }
        let ranked = rank(scores);

        let mut results = Vec::with_capacity(limit.min(ranked.len()));
        for batch in ranked.chunks(limit) {
            let ids: Vec<DocId> = batch.iter().map(|(id, _)| id.clone()).collect();
            let mut docs = view.documents(&ids)?;
            if docs.len() < ids.len() {
                tracing::debug!(missing = ids.len() - docs.len(), "scored documents without metadata");
            }
            for (id, score) in batch {
                if let Some(doc) = docs.remove(id) {
                    results.push(ScoredResult::new(doc, *score));
                    if results.len() == limit {
                        return Ok(results);
                    }
                }
            }
        }
        Ok(results)
    }
}
