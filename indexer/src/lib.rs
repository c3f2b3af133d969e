use anyhow::{Context, Result};
use imgsearch_core::{build_index, IndexMeta, IndexStore, JsonSource, RecordSource, SledStore, SourceRecord};

/// Rebuild the index from `source` and publish it. Fails without touching the published
/// index when the records yield nothing indexable.
pub fn build<S: IndexStore>(store: &S, source: &impl RecordSource) -> Result<IndexMeta> {
    tracing::info!("reading source records");
    let records = source.read_records().context("reading source records")?;
    tracing::info!(records = records.len(), "building index");

    let report = build_index(records).context("building index; the published index was left unchanged")?;
    for skipped in &report.skipped {
        tracing::warn!(record = %skipped.locator, reason = %skipped.reason, "skipped record");
    }
    tracing::info!(
        records_seen = report.records_seen,
        indexed = report.index.num_documents(),
        excluded = report.excluded,
        skipped = report.skipped.len(),
        terms = report.index.num_terms(),
        "index built"
    );

    let meta = store.replace_index(&report.index).context("publishing index")?;
    tracing::info!(generation = meta.generation, built_at = %meta.built_at, "index build complete");
    Ok(meta)
}

/// Load records from a JSON/JSONL file or directory into the store. Returns the number written.
pub fn import(store: &SledStore, input: &str) -> Result<usize> {
    let results = JsonSource::new(input).read_records().with_context(|| format!("reading {input}"))?;
    let mut records: Vec<SourceRecord> = Vec::with_capacity(results.len());
    let mut skipped = 0usize;
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(s) => {
                skipped += 1;
                tracing::warn!(record = %s.locator, reason = %s.reason, "skipped record");
            }
        }
    }
    let written = store.put_records(&records)?;
    tracing::info!(written, skipped, total = store.num_records()?, "import complete");
    Ok(written)
}

pub fn stats(store: &SledStore) -> Result<String> {
    let records = store.num_records()?;
    Ok(match store.meta()? {
        Some(meta) => format!(
            "records={} generation={} documents={} terms={} built_at={}",
            records, meta.generation, meta.num_documents, meta.num_terms, meta.built_at
        ),
        None => format!("records={records} no index published"),
    })
}
