//! Source record adapters. This is the only place where native record ids
//! (strings, integers, `{"$oid": ...}`) are turned into [`DocId`]s.

use crate::error::{Error, Result};
use crate::index::{DocId, SkippedRecord, SourceRecord};
use crate::store::{RecordResult, RecordSource};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A record as exported by the crawler, accepting the older field names too.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "_id")]
    id: Value,
    #[serde(default, alias = "image_url")]
    file_url: Option<String>,
    #[serde(default, alias = "alt")]
    alt_text: Option<String>,
    #[serde(default, alias = "caption")]
    caption_text: Option<String>,
    #[serde(default, alias = "parent_url")]
    page_url: Option<String>,
    #[serde(default, alias = "site_name")]
    domain_name: Option<String>,
    #[serde(default, alias = "image_type")]
    format: Option<String>,
}

impl RawRecord {
    fn into_record(self) -> std::result::Result<SourceRecord, String> {
        Ok(SourceRecord {
            id: canonical_id(&self.id)?,
            file_url: self.file_url.unwrap_or_default(),
            alt_text: self.alt_text.unwrap_or_default(),
            caption_text: self.caption_text.unwrap_or_default(),
            page_url: self.page_url.unwrap_or_default(),
            domain_name: self.domain_name.unwrap_or_default(),
            format: self.format.unwrap_or_default(),
        })
    }
}

/// Convert a native id value into a [`DocId`].
pub fn canonical_id(value: &Value) -> std::result::Result<DocId, String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(DocId::new(s.trim())),
        Value::Number(n) => Ok(DocId::new(n.to_string())),
        Value::Object(obj) => match obj.get("$oid") {
            Some(Value::String(oid)) if !oid.is_empty() => Ok(DocId::new(oid.as_str())),
            _ => Err("object id without a `$oid` string".to_string()),
        },
        other => Err(format!("unsupported id value `{other}`")),
    }
}

/// Decode one JSON value into a source record, or describe why it is unusable.
pub fn decode_record(locator: &str, value: Value) -> RecordResult {
    let raw: RawRecord = serde_json::from_value(value).map_err(|e| SkippedRecord::new(locator, e))?;
    raw.into_record().map_err(|reason| SkippedRecord::new(locator, reason))
}

/// Decode a record from raw JSON bytes.
pub fn decode_record_bytes(locator: &str, bytes: &[u8]) -> RecordResult {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| SkippedRecord::new(locator, e))?;
    decode_record(locator, value)
}

/// Reads `.json` and `.jsonl` exports from a file or a directory tree.
pub struct JsonSource {
    root: PathBuf,
}

impl JsonSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        if !self.root.is_dir() {
            return Err(Error::InputNotFound(self.root.clone()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let path = entry?.into_path();
            if path.is_file() && matches!(path.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl RecordSource for JsonSource {
    fn read_records(&self) -> Result<Vec<RecordResult>> {
        let mut out = Vec::new();
        for file in self.files()? {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file, &mut out)?;
            } else {
                read_json(&file, &mut out)?;
            }
        }
        Ok(out)
    }
}

fn read_jsonl(file: &Path, out: &mut Vec<RecordResult>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    // Split on raw bytes so a line that is not UTF-8 is skipped rather than ending the read.
    for (n, line) in reader.split(b'\n').enumerate() {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) { continue; }
        let locator = format!("{}:{}", file.display(), n + 1);
        out.push(decode_record_bytes(&locator, &line));
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<RecordResult>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: Value = match serde_json::from_reader(reader) {
        Ok(v) => v,
        Err(e) => {
            out.push(Err(SkippedRecord::new(file.display().to_string(), e)));
            return Ok(());
        }
    };
    match json {
        Value::Array(arr) => {
            for (i, v) in arr.into_iter().enumerate() {
                let locator = format!("{}[{}]", file.display(), i);
                out.push(decode_record(&locator, v));
            }
        }
        obj @ Value::Object(_) => out.push(decode_record(&file.display().to_string(), obj)),
        _ => out.push(Err(SkippedRecord::new(file.display().to_string(), "expected an object or an array of objects"))),
    }
    Ok(())
}
