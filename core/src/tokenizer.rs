use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[a-z0-9]+").expect("valid regex");
    static ref PATH_SPLIT_RE: Regex = Regex::new(r"[/\-._]+").expect("valid regex");
    static ref HOST_SPLIT_RE: Regex = Regex::new(r"[.\-]+").expect("valid regex");
    static ref FILENAME_SEP_RE: Regex = Regex::new(r"[-_]+").expect("valid regex");
    pub static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "the","is","in","at","of","a","an","and","or","to","for","on","with","by",
            "this","that","it","as","are","was","were","be","from","which","into",
            "about","can","will","has","have","had","you","your","we","they","their",
            "our","not",
            // image domain noise
            "image","jpg","jpeg","png","gif","webp",
        ];
        words.iter().copied().collect()
    };
}

/// Tokens this long or shorter are dropped.
const SHORT_TOKEN_LEN: usize = 2;

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Tokenize text into index terms: lowercase, split into ASCII alphanumeric runs,
/// drop short tokens and stopwords. Order and multiplicity are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| t.len() > SHORT_TOKEN_LEN && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Tokenize the path segments, filename and hostname of a URL.
///
/// Filenames such as `red-car_2023.jpg` are split on `/ - . _` before the regular
/// tokenizer runs. Strings that are not absolute URLs are treated as a bare path.
pub fn tokenize_url(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let (path, host) = match Url::parse(raw) {
        Ok(url) => (decode(url.path()), url.host_str().unwrap_or("").to_string()),
        Err(_) => (decode(strip_query(raw)), String::new()),
    };

    let mut parts: Vec<&str> = PATH_SPLIT_RE.split(&path).filter(|p| !p.is_empty()).collect();
    parts.extend(HOST_SPLIT_RE.split(&host).filter(|p| !p.is_empty()));
    tokenize(&parts.join(" "))
}

/// Last path segment of a file URL, as written in the URL.
///
/// The raw text is sliced rather than parsed so spaces and non-ASCII characters are
/// not percent-encoded on the way through.
pub fn filename_of(file_url: &str) -> String {
    let without_query = strip_query(file_url);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => without_query,
    };
    path.rsplit('/').next().unwrap_or("").to_string()
}

/// Filename with runs of `-` and `_` replaced by a single space.
pub fn filename_words(filename: &str) -> String {
    FILENAME_SEP_RE.replace_all(filename, " ").into_owned()
}

fn strip_query(raw: &str) -> &str {
    raw.split(['?', '#']).next().unwrap_or("")
}

fn decode(path: &str) -> String {
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}
