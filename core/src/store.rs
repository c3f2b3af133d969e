//! Store boundaries of the engine.
//!
//! [`RecordSource`] is the bulk read of source records consumed by the index build.
//! [`IndexStore`] publishes a [`BuiltIndex`] atomically and hands out [`IndexView`]s,
//! each pinned to one published index so a query never mixes two builds.

use crate::error::Result;
use crate::index::{BuiltIndex, DocId, DocumentEntry, SkippedRecord, SourceRecord, TermEntry};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

pub type RecordResult = std::result::Result<SourceRecord, SkippedRecord>;

pub trait RecordSource {
    /// Read every source record. An outer error means the store could not be read at all;
    /// inner errors are individual records that could not be decoded.
    fn read_records(&self) -> Result<Vec<RecordResult>>;
}

pub trait IndexStore: Send + Sync {
    type View: IndexView;

    /// Replace the document table and inverted index wholesale.
    fn replace_index(&self, index: &BuiltIndex) -> Result<IndexMeta>;

    /// A read view of the currently published index, or `None` if nothing was ever built.
    fn view(&self) -> Result<Option<Self::View>>;

    fn meta(&self) -> Result<Option<IndexMeta>>;
}

pub trait IndexView {
    /// Term entries for the given terms. Terms missing from the vocabulary are left out.
    fn term_entries(&self, terms: &[String]) -> Result<Vec<TermEntry>>;

    /// Document entries for the given ids. Unknown ids are left out.
    fn documents(&self, ids: &[DocId]) -> Result<HashMap<DocId, DocumentEntry>>;
}

/// Describes one published build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub generation: u64,
    pub num_documents: u64,
    pub num_terms: u64,
    pub built_at: String,
}

impl IndexMeta {
    pub fn for_index(generation: u64, index: &BuiltIndex) -> Self {
        Self {
            generation,
            num_documents: index.num_documents() as u64,
            num_terms: index.num_terms() as u64,
            built_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        }
    }
}

#[derive(Debug)]
pub struct MemoryIndex {
    meta: IndexMeta,
    documents: HashMap<DocId, DocumentEntry>,
    terms: HashMap<String, TermEntry>,
}

/// In-process store. Publishing swaps an `Arc`, so views keep reading the index they started with.
#[derive(Default)]
pub struct MemoryStore {
    records: Vec<SourceRecord>,
    current: RwLock<Option<Arc<MemoryIndex>>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_records(records: Vec<SourceRecord>) -> Self {
        Self { records, current: RwLock::new(None) }
    }
}

impl RecordSource for MemoryStore {
    fn read_records(&self) -> Result<Vec<RecordResult>> {
        Ok(self.records.iter().cloned().map(Ok).collect())
    }
}

impl IndexStore for MemoryStore {
    type View = Arc<MemoryIndex>;

    fn replace_index(&self, index: &BuiltIndex) -> Result<IndexMeta> {
        let generation = self.current.read().as_ref().map_or(1, |c| c.meta.generation + 1);
        let meta = IndexMeta::for_index(generation, index);
        let next = MemoryIndex {
            meta: meta.clone(),
            documents: index.documents.iter().map(|d| (d.id.clone(), d.clone())).collect(),
            terms: index.terms.iter().map(|t| (t.term.clone(), t.clone())).collect(),
        };
        *self.current.write() = Some(Arc::new(next));
        Ok(meta)
    }

    fn view(&self) -> Result<Option<Self::View>> {
        Ok(self.current.read().clone())
    }

    fn meta(&self) -> Result<Option<IndexMeta>> {
        Ok(self.current.read().as_ref().map(|c| c.meta.clone()))
    }
}

impl IndexView for Arc<MemoryIndex> {
    fn term_entries(&self, terms: &[String]) -> Result<Vec<TermEntry>> {
        Ok(terms.iter().filter_map(|t| self.terms.get(t).cloned()).collect())
    }

    fn documents(&self, ids: &[DocId]) -> Result<HashMap<DocId, DocumentEntry>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.documents.get(id).map(|d| (id.clone(), d.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_index;

    fn index_of(captions: &[(&str, &str)]) -> BuiltIndex {
        let records = captions
            .iter()
            .map(|(id, caption)| Ok(SourceRecord { id: (*id).into(), caption_text: (*caption).into(), ..Default::default() }));
        build_index(records).unwrap().index
    }

    #[test]
    fn views_are_pinned_to_one_generation() {
        let store = MemoryStore::new();
        assert!(store.view().unwrap().is_none());

        store.replace_index(&index_of(&[("a", "old harbor")])).unwrap();
        let old_view = store.view().unwrap().unwrap();

        let meta = store.replace_index(&index_of(&[("b", "new harbor")])).unwrap();
        assert_eq!(meta.generation, 2);

        let terms = vec!["harbor".to_string()];
        let old = old_view.term_entries(&terms).unwrap();
        assert_eq!(old[0].postings[0].doc_id.as_str(), "a");
        let new = store.view().unwrap().unwrap().term_entries(&terms).unwrap();
        assert_eq!(new[0].postings[0].doc_id.as_str(), "b");
        assert!(store.view().unwrap().unwrap().documents(&["a".into()]).unwrap().is_empty());
    }
}
