//! Sled-backed document store.
//!
//! Layout under the store root:
//! - `records/`: sled db with the `image_files` tree, source records as JSON keyed by id
//! - `gen-<N>/`: sled db holding one published build, trees `documents` and `terms`
//! - `meta.json`: the [`IndexMeta`] of the published build
//!
//! sled locks a database for one process, so every build gets its own database and is
//! published by renaming a fresh `meta.json` into place. A query process only opens the
//! generation `meta.json` names and never the records db, so the indexer can build while
//! a server keeps answering from the previous generation. The active generation and its
//! predecessor are kept on disk.

use crate::error::{Error, Result};
use crate::index::{BuiltIndex, DocId, DocumentEntry, SourceRecord, TermEntry};
use crate::source::decode_record_bytes;
use crate::store::{IndexMeta, IndexStore, IndexView, RecordResult, RecordSource};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const SOURCE_TREE: &str = "image_files";
const DOCUMENTS_TREE: &str = "documents";
const TERMS_TREE: &str = "terms";
const GENERATION_PREFIX: &str = "gen-";
const WRITE_BATCH: usize = 1000;

struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn records(&self) -> PathBuf { self.root.join("records") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn meta_tmp(&self) -> PathBuf { self.root.join("meta.json.tmp") }
    fn generation(&self, generation: u64) -> PathBuf {
        self.root.join(format!("{GENERATION_PREFIX}{generation}"))
    }
}

pub struct SledStore {
    paths: StorePaths,
    records: Mutex<Option<sled::Db>>,
    // Handle on the generation queries are currently served from.
    active: RwLock<Option<(u64, sled::Db)>>,
}

impl SledStore {
    /// Open a store rooted at `root`, creating the directory if needed. No database is
    /// opened until records or an index are accessed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let paths = StorePaths::new(root);
        fs::create_dir_all(&paths.root)?;
        Ok(Self { paths, records: Mutex::new(None), active: RwLock::new(None) })
    }

    fn records_db(&self) -> Result<sled::Db> {
        let mut guard = self.records.lock();
        if let Some(db) = guard.as_ref() {
            return Ok(db.clone());
        }
        let db = sled::open(self.paths.records())?;
        *guard = Some(db.clone());
        Ok(db)
    }

    fn source_tree(&self) -> Result<sled::Tree> {
        Ok(self.records_db()?.open_tree(SOURCE_TREE)?)
    }

    /// Upsert source records by id. Returns the number written.
    pub fn put_records<'a, I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a SourceRecord>,
    {
        let tree = self.source_tree()?;
        let mut written = 0;
        for record in records {
            tree.insert(record.id.as_str().as_bytes(), serde_json::to_vec(record)?)?;
            written += 1;
        }
        tree.flush()?;
        Ok(written)
    }

    pub fn num_records(&self) -> Result<usize> {
        Ok(self.source_tree()?.len())
    }

    /// Generations present on disk, published or not.
    pub fn stored_generations(&self) -> Result<Vec<u64>> {
        let mut gens = Vec::new();
        for entry in fs::read_dir(&self.paths.root)? {
            let name = entry?.file_name();
            if let Some(generation) = name
                .to_str()
                .and_then(|n| n.strip_prefix(GENERATION_PREFIX))
                .and_then(|g| g.parse().ok())
            {
                gens.push(generation);
            }
        }
        gens.sort_unstable();
        Ok(gens)
    }

    /// Handle on a published generation, reusing the cached one when it matches.
    fn generation_db(&self, generation: u64) -> Result<sled::Db> {
        if let Some((cached, db)) = self.active.read().as_ref() {
            if *cached == generation {
                return Ok(db.clone());
            }
        }
        let mut guard = self.active.write();
        if let Some((cached, db)) = guard.as_ref() {
            if *cached == generation {
                return Ok(db.clone());
            }
        }
        let dir = self.paths.generation(generation);
        if !dir.is_dir() {
            return Err(Error::MissingGeneration(generation));
        }
        let db = sled::open(dir)?;
        tracing::debug!(generation, "opened index generation");
        *guard = Some((generation, db.clone()));
        Ok(db)
    }

    fn write_meta(&self, meta: &IndexMeta) -> Result<()> {
        let tmp = self.paths.meta_tmp();
        let mut f = File::create(&tmp)?;
        f.write_all(&serde_json::to_vec_pretty(meta)?)?;
        f.sync_all()?;
        fs::rename(tmp, self.paths.meta())?;
        Ok(())
    }

    /// Remove every generation other than the active one and its predecessor.
    fn prune(&self, active: u64) -> Result<()> {
        for generation in self.stored_generations()? {
            if generation == active || generation + 1 == active {
                continue;
            }
            tracing::debug!(generation, "removing stale index generation");
            fs::remove_dir_all(self.paths.generation(generation))?;
        }
        Ok(())
    }
}

fn write_batched<I>(tree: &sled::Tree, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Result<(Vec<u8>, Vec<u8>)>>,
{
    let mut batch = sled::Batch::default();
    let mut pending = 0;
    for entry in entries {
        let (key, value) = entry?;
        batch.insert(key, value);
        pending += 1;
        if pending == WRITE_BATCH {
            tree.apply_batch(std::mem::take(&mut batch))?;
            pending = 0;
        }
    }
    if pending > 0 {
        tree.apply_batch(batch)?;
    }
    Ok(())
}

impl RecordSource for SledStore {
    fn read_records(&self) -> Result<Vec<RecordResult>> {
        let tree = self.source_tree()?;
        let mut out = Vec::with_capacity(tree.len());
        for item in tree.iter() {
            let (key, value) = item?;
            let locator = String::from_utf8_lossy(&key).into_owned();
            out.push(decode_record_bytes(&locator, &value));
        }
        Ok(out)
    }
}

impl IndexStore for SledStore {
    type View = SledView;

    fn replace_index(&self, index: &BuiltIndex) -> Result<IndexMeta> {
        let active = self.meta()?.map_or(0, |m| m.generation);
        // numbered past anything on disk so no reader can have the new directory open
        let newest = self.stored_generations()?.last().copied().unwrap_or(0);
        let generation = active.max(newest) + 1;

        {
            let db = sled::open(self.paths.generation(generation))?;
            write_batched(
                &db.open_tree(DOCUMENTS_TREE)?,
                index.documents.iter().map(|d| -> Result<(Vec<u8>, Vec<u8>)> {
                    Ok((d.id.as_str().as_bytes().to_vec(), bincode::serialize(d)?))
                }),
            )?;
            write_batched(
                &db.open_tree(TERMS_TREE)?,
                index.terms.iter().map(|t| -> Result<(Vec<u8>, Vec<u8>)> {
                    Ok((t.term.as_bytes().to_vec(), bincode::serialize(t)?))
                }),
            )?;
            db.flush()?;
        }

        let meta = IndexMeta::for_index(generation, index);
        self.write_meta(&meta)?;
        tracing::info!(generation, num_documents = meta.num_documents, num_terms = meta.num_terms, "published index generation");

        if let Err(e) = self.prune(generation) {
            tracing::warn!(generation, error = %e, "index published but stale generations could not be removed");
        }
        Ok(meta)
    }

    fn view(&self) -> Result<Option<SledView>> {
        let Some(meta) = self.meta()? else { return Ok(None) };
        let db = self.generation_db(meta.generation)?;
        Ok(Some(SledView {
            documents: db.open_tree(DOCUMENTS_TREE)?,
            terms: db.open_tree(TERMS_TREE)?,
        }))
    }

    fn meta(&self) -> Result<Option<IndexMeta>> {
        match fs::read(self.paths.meta()) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read view over one published generation. It keeps that generation's database open
/// even after a newer one is published.
pub struct SledView {
    documents: sled::Tree,
    terms: sled::Tree,
}

impl IndexView for SledView {
    fn term_entries(&self, terms: &[String]) -> Result<Vec<TermEntry>> {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(bytes) = self.terms.get(term.as_bytes())? {
                out.push(bincode::deserialize(&bytes)?);
            }
        }
        Ok(out)
    }

    fn documents(&self, ids: &[DocId]) -> Result<HashMap<DocId, DocumentEntry>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(bytes) = self.documents.get(id.as_str().as_bytes())? {
                out.insert(id.clone(), bincode::deserialize(&bytes)?);
            }
        }
        Ok(out)
    }
}
