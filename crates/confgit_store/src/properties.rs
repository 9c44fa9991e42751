//! Properties text codec.
//!
//! Configuration files and attribute files are stored as line-oriented
//! `key = value` text. Parsing is forgiving (comments, blank lines, `:`
//! separators); formatting is canonical (sorted keys, ` = ` separator) so
//! that repeated writes of the same map produce identical bytes and clean
//! diffs.

use std::collections::BTreeMap;

/// Filename suffix of files that contribute structured configurations.
pub const PROPERTIES_SUFFIX: &str = ".properties";

/// Parses properties text into a sorted key/value map.
///
/// Lines starting with `#` or `!` are comments. Keys and values are
/// trimmed. The first `=` (or, failing that, the first `:`) separates key
/// from value; a line without a separator maps the whole line to an empty
/// value. Invalid UTF-8 is replaced, never an error.
pub fn parse_properties(contents: &[u8]) -> BTreeMap<String, String> {
    let text = String::from_utf8_lossy(contents);
    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.split_once('=').or_else(|| line.split_once(':')) {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, ""),
        };
        if key.is_empty() {
            continue;
        }
        map.insert(key.to_string(), value.to_string());
    }
    map
}

/// Formats a key/value map as canonical properties text.
pub fn format_properties(map: &BTreeMap<String, String>) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out.into_bytes()
}

/// The structured-configuration name of a file path, when the file
/// contributes one: the path minus the properties suffix.
pub fn configuration_name(path: &str) -> Option<&str> {
    path.strip_suffix(PROPERTIES_SUFFIX)
        .filter(|name| !name.is_empty())
}
