//! Text search over image records: tokenization, inverted index construction
//! with IDF weighting, and TF-IDF top-k retrieval.

pub mod error;
pub mod index;
pub mod persist;
pub mod search;
pub mod source;
pub mod store;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::{
    build_index, AddOutcome, BuildReport, BuiltIndex, DocId, DocumentEntry, IndexBuilder, Posting, SkippedRecord,
    SourceRecord, TermEntry,
};
pub use persist::SledStore;
pub use search::{ScoredResult, Searcher, DEFAULT_LIMIT};
pub use source::JsonSource;
pub use store::{IndexMeta, IndexStore, IndexView, MemoryStore, RecordSource};
