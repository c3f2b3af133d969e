use crate::error::{Error, Result};
use crate::tokenizer::{filename_of, filename_words, tokenize, tokenize_url};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Longest page-URL prefix used as a display snippet.
const SNIPPET_URL_CHARS: usize = 300;

/// Canonical document identifier. Store adapters convert their native id forms into this.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for DocId {
    fn from(s: String) -> Self { Self(s) }
}

/// An image record as read from the source store. Missing text fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: DocId,
    pub file_url: String,
    pub alt_text: String,
    pub caption_text: String,
    pub page_url: String,
    pub domain_name: String,
    pub format: String,
}

/// Per-image metadata row of the document table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub id: DocId,
    /// Number of index tokens the record produced.
    pub length: u64,
    pub snippet: String,
    pub file_url: String,
    pub alt_text: String,
    pub caption_text: String,
    pub page_url: String,
    pub domain_name: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Occurrences of the term in the document, always >= 1.
    pub tf: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub idf: f64,
    pub postings: Vec<Posting>, // sorted by doc_id
}

impl TermEntry {
    pub fn df(&self) -> usize { self.postings.len() }
}

/// Output of one full build: the document table and the inverted index.
#[derive(Debug, Clone, Default)]
pub struct BuiltIndex {
    pub documents: Vec<DocumentEntry>,
    pub terms: Vec<TermEntry>,
}

impl BuiltIndex {
    pub fn num_documents(&self) -> usize { self.documents.len() }
    pub fn num_terms(&self) -> usize { self.terms.len() }
}

/// A source record that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Where the record came from: an id, or `file:line` for file sources.
    pub locator: String,
    pub reason: String,
}

impl SkippedRecord {
    pub fn new(locator: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self { locator: locator.into(), reason: reason.to_string() }
    }
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.locator, self.reason)
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub index: BuiltIndex,
    pub records_seen: usize,
    /// Records that produced no index terms.
    pub excluded: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// What happened to a record handed to [`IndexBuilder::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Indexed,
    NoSignal,
    Duplicate,
}

/// `ln(N / (1 + df))`.
pub fn idf(num_docs: usize, df: usize) -> f64 {
    (num_docs as f64 / (1.0 + df as f64)).ln()
}

/// All index terms for a record: combined field text, then page URL and file URL tokens.
pub fn record_tokens(record: &SourceRecord) -> Vec<String> {
    let filename = filename_of(&record.file_url);
    let filename = filename_words(&filename);
    let combined = [
        record.alt_text.as_str(),
        record.caption_text.as_str(),
        filename.as_str(),
        record.page_url.as_str(),
        record.domain_name.as_str(),
        record.format.as_str(),
    ]
    .iter()
    .filter(|s| !s.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join(" ");

    let mut tokens = tokenize(&combined);
    tokens.extend(tokenize_url(&record.page_url));
    tokens.extend(tokenize_url(&record.file_url));
    tokens
}

/// Display snippet: caption, else alt text, else filename, else a truncated page URL.
pub fn snippet_for(record: &SourceRecord) -> String {
    if !record.caption_text.is_empty() {
        return record.caption_text.clone();
    }
    if !record.alt_text.is_empty() {
        return record.alt_text.clone();
    }
    let filename = filename_of(&record.file_url);
    if !filename.is_empty() {
        return filename;
    }
    record.page_url.chars().take(SNIPPET_URL_CHARS).collect()
}

/// Accumulates documents and raw term frequencies for a full rebuild.
#[derive(Default)]
pub struct IndexBuilder {
    documents: Vec<DocumentEntry>,
    postings: HashMap<String, Vec<Posting>>,
    seen_ids: HashSet<DocId>,
    records_seen: usize,
    excluded: usize,
    skipped: Vec<SkippedRecord>,
}

impl IndexBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, record: SourceRecord) -> AddOutcome {
        self.records_seen += 1;
        if self.seen_ids.contains(&record.id) {
            self.skipped.push(SkippedRecord::new(record.id.as_str(), "duplicate record id"));
            return AddOutcome::Duplicate;
        }
        self.seen_ids.insert(record.id.clone());

        let tokens = record_tokens(&record);
        if tokens.is_empty() {
            self.excluded += 1;
            return AddOutcome::NoSignal;
        }

        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *tf_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for (term, tf) in tf_counts {
            self.postings.entry(term).or_default().push(Posting { doc_id: record.id.clone(), tf });
        }

        let snippet = snippet_for(&record);
        let SourceRecord { id, file_url, alt_text, caption_text, page_url, domain_name, format } = record;
        self.documents.push(DocumentEntry {
            id,
            length: tokens.len() as u64,
            snippet,
            file_url,
            alt_text,
            caption_text,
            page_url,
            domain_name,
            format,
        });
        AddOutcome::Indexed
    }

    /// Record a source record that failed before it could be added.
    pub fn skip(&mut self, skipped: SkippedRecord) {
        self.records_seen += 1;
        self.skipped.push(skipped);
    }

    /// Compute IDF weights and emit the tables. Fails with [`Error::EmptyCorpus`] if no
    /// record produced a term.
    pub fn finish(self) -> Result<BuildReport> {
        let num_docs = self.documents.len();
        if num_docs == 0 {
            return Err(Error::EmptyCorpus);
        }

        let mut terms: Vec<TermEntry> = self
            .postings
            .into_iter()
            .map(|(term, mut postings)| {
                postings.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
                TermEntry { idf: idf(num_docs, postings.len()), term, postings }
            })
            .collect();
        terms.sort_by(|a, b| a.term.cmp(&b.term));

        Ok(BuildReport {
            index: BuiltIndex { documents: self.documents, terms },
            records_seen: self.records_seen,
            excluded: self.excluded,
            skipped: self.skipped,
        })
    }
}

/// Build the document table and inverted index from every source record.
pub fn build_index<I>(records: I) -> Result<BuildReport>
where
    I: IntoIterator<Item = std::result::Result<SourceRecord, SkippedRecord>>,
{
    let mut builder = IndexBuilder::new();
    let mut duplicates = 0usize;
    for record in records {
        match record {
            Ok(record) => {
                if builder.add(record) == AddOutcome::Duplicate {
                    duplicates += 1;
                }
            }
            Err(skipped) => builder.skip(skipped),
        }
    }
    if duplicates > 0 {
        tracing::debug!(duplicates, "duplicate record ids skipped");
    }
    builder.finish()
}
