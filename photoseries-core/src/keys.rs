//! Object key layout.
//!
//! Every object of a series lives under `<series uuid>_<sanitized title>/`,
//! so a whole series can be listed and removed by its uuid prefix.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::KeyError;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9.]+").expect("static regex"));

static KEY_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})_([A-Za-z0-9.-]+)/([A-Za-z0-9.-]+)$",
    )
    .expect("static regex")
});

/// Components recovered from an object key. Name and file are in sanitized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub series_uuid: String,
    pub series_name: String,
    pub file_name: String,
}

/// Build the object key for a file of a series.
pub fn object_key(series_uuid: &str, series_name: &str, file_name: &str) -> String {
    format!(
        "{series_uuid}_{}/{}",
        sanitize(series_name),
        sanitize(file_name)
    )
}

/// Parse a key produced by [`object_key`].
pub fn parse_object_key(key: &str) -> Result<ParsedKey, KeyError> {
    let captures = KEY_SHAPE
        .captures(key)
        .ok_or_else(|| KeyError::Malformed(key.to_string()))?;

    Ok(ParsedKey {
        series_uuid: captures[1].to_string(),
        series_name: captures[2].to_string(),
        file_name: captures[3].to_string(),
    })
}

/// Common prefix of every object belonging to a series.
pub fn series_prefix(series_uuid: &str) -> String {
    format!("{series_uuid}_")
}

/// Replace each run of characters outside `[A-Za-z0-9.]` with a single hyphen.
pub fn sanitize(s: &str) -> String {
    DISALLOWED.replace_all(s, "-").into_owned()
}
