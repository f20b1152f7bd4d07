//! `KEY=VALUE` environment files.
//!
//! One assignment per line; blank lines and `#` comments are ignored, lines
//! without `=` are skipped. Later files override earlier ones; the caller
//! decides what to do about unreadable files.

use std::collections::HashMap;
use std::io;
use std::path::Path;

pub(crate) fn parse(path: &Path) -> io::Result<HashMap<String, String>> {
    let data = std::fs::read_to_string(path)?;
    let mut vars = HashMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(vars)
}
