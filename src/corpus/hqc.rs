//! High Quality Counseling plain-text transcripts
//!
//! Files (any extension, often none) hold lines such as `T:\tHello` or
//! `C: Hi`. Lines in any other shape are ignored.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::{Dataset, Pair, Role, Turn, file_name, file_stem, list_files, make_pairs};
use crate::Result;

static TURN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([TC])\s*:\s*(.*)$").expect("valid regex"));

/// Sorted transcript files of an HQC directory
///
/// # Errors
///
/// Returns error if the directory cannot be read
pub fn transcript_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, |_| true)
}

/// Load pairs from every file of an HQC directory
///
/// # Errors
///
/// Returns error if the directory or a file cannot be read
pub fn load_pairs(dir: &Path) -> Result<Vec<Pair>> {
    let files = transcript_files(dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "HQC directory has no transcript files");
    }

    let mut pairs = Vec::new();
    for path in &files {
        let bytes = std::fs::read(path)?;
        let turns = parse_transcript(&String::from_utf8_lossy(&bytes));
        tracing::debug!(file = %path.display(), turns = turns.len(), "parsed HQC transcript");
        pairs.extend(make_pairs(
            &turns,
            &Dataset::Hqc,
            &file_stem(path),
            &file_name(path),
        ));
    }

    Ok(pairs)
}

/// Parse transcript text into turns
#[must_use]
pub fn parse_transcript(content: &str) -> Vec<Turn> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(raw: &str) -> Option<Turn> {
    let line = raw.trim().replace('\t', " ");
    if line.is_empty() {
        return None;
    }

    let caps = TURN_LINE.captures(&line)?;
    let role = match &caps[1] {
        "C" => Role::Client,
        _ => Role::Therapist,
    };
    Turn::new(role, &caps[2])
}
