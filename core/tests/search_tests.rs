use imgsearch_core::store::RecordResult;
use imgsearch_core::{
    build_index, BuiltIndex, DocId, DocumentEntry, Error, IndexMeta, IndexStore, IndexView, JsonSource, MemoryStore,
    RecordSource, Searcher, SledStore, SourceRecord, TermEntry,
};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn record(id: &str, caption: &str) -> SourceRecord {
    SourceRecord { id: id.into(), caption_text: caption.into(), ..Default::default() }
}

fn corpus() -> Vec<SourceRecord> {
    vec![
        record("a", "red sports car"),
        record("b", "blue car for sale"),
        record("c", "red bicycle"),
        record("d", "green tree"),
        record("e", "yellow flower field"),
    ]
}

fn indexed_store(records: Vec<SourceRecord>) -> Arc<MemoryStore> {
    let store = MemoryStore::with_records(records);
    let report = build_index(store.read_records().unwrap()).unwrap();
    store.replace_index(&report.index).unwrap();
    Arc::new(store)
}

fn ids(results: &[imgsearch_core::ScoredResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

#[test]
fn documents_matching_more_terms_rank_first() {
    let searcher = Searcher::new(indexed_store(corpus()));
    let results = searcher.search("red car", 25).unwrap();
    assert_eq!(ids(&results), vec!["a", "b", "c"]);
    assert!(results[0].score > results[1].score);
    assert_eq!(results[1].score, results[2].score);
    assert_eq!(results[0].caption_text, "red sports car");
    assert_eq!(results[0].snippet, "red sports car");
}

#[test]
fn results_are_sorted_and_bounded_by_limit() {
    let searcher = Searcher::new(indexed_store(corpus()));
    for limit in 0..5 {
        let results = searcher.search("red car bicycle flower", limit).unwrap();
        assert!(results.len() <= limit);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
    assert_eq!(searcher.search("red car bicycle flower", 100).unwrap().len(), 4);
}

#[test]
fn queries_without_known_terms_return_nothing() {
    let searcher = Searcher::new(indexed_store(corpus()));
    assert!(searcher.search("zebra", 25).unwrap().is_empty());
    assert!(searcher.search("the and of", 25).unwrap().is_empty());
    assert_eq!(searcher.search("red zebra", 25).unwrap(), searcher.search("red", 25).unwrap());
}

#[test]
fn repeated_query_terms_count_once() {
    let searcher = Searcher::new(indexed_store(corpus()));
    assert_eq!(searcher.search("red red RED", 25).unwrap(), searcher.search("red", 25).unwrap());
}

#[test]
fn score_of_two_term_query_is_sum_of_single_term_scores() {
    let searcher = Searcher::new(indexed_store(corpus()));
    let score = |q: &str| searcher.search(q, 25).unwrap().into_iter().find(|r| r.id.as_str() == "a").unwrap().score;
    assert!((score("red car") - (score("red") + score("car"))).abs() < 1e-12);
}

#[test]
fn three_record_corpus_scores_shared_terms_at_zero() {
    let searcher = Searcher::new(indexed_store(vec![
        record("a", "red sports car"),
        record("b", "blue car for sale"),
        record("c", "red bicycle"),
    ]));
    // red and car each appear in 2 of 3 records: ln(3 / (1 + 2)) = 0
    let results = searcher.search("red car", 25).unwrap();
    assert_eq!(ids(&results), vec!["a", "b", "c"]);
    assert!(results.iter().all(|r| r.score == 0.0));

    let results = searcher.search("red sports car", 25).unwrap();
    assert_eq!(ids(&results), vec!["a", "b", "c"]);
    assert!(results[0].score > 0.0);
}

/// Serves a published index whose document table lacks some ids, as a store that lost
/// metadata rows would.
struct HidingStore {
    inner: MemoryStore,
    hidden: Vec<DocId>,
}

struct HidingView {
    inner: <MemoryStore as IndexStore>::View,
    hidden: Vec<DocId>,
}

impl IndexStore for HidingStore {
    type View = HidingView;

    fn replace_index(&self, index: &BuiltIndex) -> imgsearch_core::Result<IndexMeta> {
        self.inner.replace_index(index)
    }

    fn view(&self) -> imgsearch_core::Result<Option<HidingView>> {
        Ok(self.inner.view()?.map(|inner| HidingView { inner, hidden: self.hidden.clone() }))
    }

    fn meta(&self) -> imgsearch_core::Result<Option<IndexMeta>> {
        self.inner.meta()
    }
}

impl IndexView for HidingView {
    fn term_entries(&self, terms: &[String]) -> imgsearch_core::Result<Vec<TermEntry>> {
        self.inner.term_entries(terms)
    }

    fn documents(&self, ids: &[DocId]) -> imgsearch_core::Result<HashMap<DocId, DocumentEntry>> {
        let mut found = self.inner.documents(ids)?;
        for id in &self.hidden {
            found.remove(id);
        }
        Ok(found)
    }
}

#[test]
fn missing_metadata_is_skipped_and_later_candidates_fill_in() {
    let store = HidingStore { inner: MemoryStore::new(), hidden: vec![DocId::from("a")] };
    let records: Vec<RecordResult> = corpus().into_iter().map(Ok).collect();
    store.replace_index(&build_index(records).unwrap().index).unwrap();
    let searcher = Searcher::new(Arc::new(store));
    let results = searcher.search("red car", 2).unwrap();
    assert_eq!(ids(&results), vec!["b", "c"]);
}

#[test]
fn records_without_terms_are_never_indexed() {
    let mut records = corpus();
    records.push(SourceRecord { id: "noise".into(), alt_text: "image of a jpg".into(), ..Default::default() });
    let store = indexed_store(records);
    let view = store.view().unwrap().unwrap();
    assert!(view.documents(&["noise".into()]).unwrap().is_empty());
    assert_eq!(store.meta().unwrap().unwrap().num_documents, 5);
}

#[test]
fn failed_build_keeps_previous_index() {
    let store = indexed_store(corpus());
    let empty = build_index(vec![Ok(record("z", "of the"))]);
    assert!(matches!(empty, Err(Error::EmptyCorpus)));
    let searcher = Searcher::new(store);
    assert_eq!(searcher.search("bicycle", 25).unwrap().len(), 1);
}

#[test]
fn search_before_any_build_is_empty() {
    let searcher = Searcher::new(Arc::new(MemoryStore::new()));
    assert!(searcher.search("red car", 25).unwrap().is_empty());
}

struct CountingStore {
    inner: MemoryStore,
    views: AtomicUsize,
}

impl IndexStore for CountingStore {
    type View = <MemoryStore as IndexStore>::View;

    fn replace_index(&self, index: &BuiltIndex) -> imgsearch_core::Result<IndexMeta> {
        self.inner.replace_index(index)
    }

    fn view(&self) -> imgsearch_core::Result<Option<Self::View>> {
        self.views.fetch_add(1, Ordering::SeqCst);
        self.inner.view()
    }

    fn meta(&self) -> imgsearch_core::Result<Option<IndexMeta>> {
        self.inner.meta()
    }
}

#[test]
fn empty_query_does_not_touch_the_store() {
    let store = Arc::new(CountingStore { inner: MemoryStore::new(), views: AtomicUsize::new(0) });
    let records: Vec<RecordResult> = corpus().into_iter().map(Ok).collect();
    store.replace_index(&build_index(records).unwrap().index).unwrap();

    let searcher = Searcher::new(Arc::clone(&store));
    assert!(searcher.search("", 25).unwrap().is_empty());
    assert!(searcher.search("a an to", 25).unwrap().is_empty());
    assert_eq!(store.views.load(Ordering::SeqCst), 0);

    searcher.search("red", 25).unwrap();
    assert_eq!(store.views.load(Ordering::SeqCst), 1);
}

#[test]
fn json_export_to_sled_index_to_results() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("crawl.jsonl");
    fs::write(
        &input,
        concat!(
            r#"{"_id": {"$oid": "6650a1"}, "file_url": "https://img.example.com/cars/red-sports-car.jpg", "alt_text": "Red sports car", "page_url": "https://example.com/garage", "domain_name": "example.com", "format": "jpg"}"#, "\n",
            r#"{"_id": {"$oid": "6650a2"}, "image_url": "https://img.example.com/bikes/red_bicycle.png", "caption": "A red bicycle", "format": "png"}"#, "\n",
            r#"{"_id": {"$oid": "6650a3"}, "file_url": "https://img.example.com/trees/oak.webp", "caption_text": "Old oak tree"}"#, "\n",
            r#"{"id": "plain-1", "caption_text": "Snowy mountain ridge"}"#, "\n",
            r#"{"_id": 5, "file_url": "https://img.example.com/x/flowers.gif", "alt_text": 12}"#, "\n",
        ),
    )
    .unwrap();

    let store = SledStore::open(dir.path().join("store")).unwrap();
    let imported: Vec<SourceRecord> = JsonSource::new(&input).read_records().unwrap().into_iter().filter_map(Result::ok).collect();
    store.put_records(&imported).unwrap();

    let report = build_index(store.read_records().unwrap()).unwrap();
    assert_eq!(report.index.num_documents(), 4);
    store.replace_index(&report.index).unwrap();

    let searcher = Searcher::new(Arc::new(store));
    let results = searcher.search("red car", 10).unwrap();
    assert_eq!(results[0].id.as_str(), "6650a1");
    assert_eq!(results[0].alt_text, "Red sports car");
    assert_eq!(results[0].snippet, "Red sports car");
    assert_eq!(ids(&results), vec!["6650a1", "6650a2"]);
    assert_eq!(results[1].snippet, "A red bicycle");
}
