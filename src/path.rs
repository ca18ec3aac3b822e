//! Path normalization and query-string parsing.

use std::borrow::Cow;
use std::collections::HashMap;

/// Normalizes a path to its canonical form: a guaranteed leading slash and no
/// trailing slash, except for the root path itself. Empty input is the root.
///
/// Total and idempotent — normalizing an already-normalized path is a no-op.
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return "/".to_owned();
    }
    let mut path = if input.starts_with('/') {
        input.to_owned()
    } else {
        format!("/{input}")
    };
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Parses the query portion of a `path[?query]` URL into a flat map.
///
/// Everything after the first `?` is split on `&`, each pair on its first
/// `=`. Keys and values are percent-decoded (kept raw if decoding fails). A
/// pair with no `=` maps to the empty string; duplicate keys keep the last
/// value; empty chunks are skipped.
pub fn parse_query(url: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some((_, raw)) = url.split_once('?') else {
        return out;
    };
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(decode(key), decode(value));
    }
    out
}

fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_owned())
}

/// Splits a normalized path into matcher segments. The root path is the
/// single empty segment.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    if path == "/" {
        vec![""]
    } else {
        path.split('/').skip(1).collect()
    }
}
