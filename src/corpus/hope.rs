//! HOPE tabular transcripts
//!
//! Each `.csv` file is one session with `ID`, `Type` and `Utterance`
//! columns. `Type` is `P` for the patient (client) and `T` for the
//! therapist; any other code is dropped. IDs look like `97_0`, where the
//! part before the first underscore is the session id.

use std::path::{Path, PathBuf};

use super::{Dataset, Pair, Role, Turn, clean_text, file_name, file_stem, list_files, make_pairs};
use crate::{Error, Result};

const ID_COLUMN: &str = "ID";
const ROLE_COLUMN: &str = "Type";
const UTTERANCE_COLUMN: &str = "Utterance";

/// Sorted `.csv` files of a HOPE directory
///
/// # Errors
///
/// Returns error if the directory cannot be read
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_files(dir, |p| p.extension().is_some_and(|ext| ext == "csv"))
}

/// Load pairs from every CSV file of a HOPE directory
///
/// # Errors
///
/// Returns error if the directory has no CSV files or any file lacks the
/// required columns
pub fn load_pairs(dir: &Path) -> Result<Vec<Pair>> {
    let files = csv_files(dir)?;
    if files.is_empty() {
        return Err(Error::CorpusMissing(dir.to_path_buf()));
    }

    let mut pairs = Vec::new();
    for path in &files {
        let parsed = parse_file(path)?;
        tracing::debug!(
            file = %path.display(),
            session_id = %parsed.session_id,
            turns = parsed.turns.len(),
            "parsed HOPE transcript"
        );
        pairs.extend(make_pairs(
            &parsed.turns,
            &Dataset::Hope,
            &parsed.session_id,
            &file_name(path),
        ));
    }

    Ok(pairs)
}

/// Turns and session id of one transcript
#[derive(Debug)]
pub struct ParsedTranscript {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

/// Parse one HOPE CSV file
///
/// # Errors
///
/// Returns error if the file cannot be read or lacks a required column
pub fn parse_file(path: &Path) -> Result<ParsedTranscript> {
    let name = file_name(path);
    let ingest_error = |message: String| Error::Ingest {
        file: name.clone(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| ingest_error(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ingest_error(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let column = |wanted: &str| headers.iter().position(|h| h == wanted);
    let (Some(id_col), Some(role_col), Some(utt_col)) =
        (column(ID_COLUMN), column(ROLE_COLUMN), column(UTTERANCE_COLUMN))
    else {
        return Err(ingest_error(format!(
            "expected columns {ID_COLUMN}, {ROLE_COLUMN}, {UTTERANCE_COLUMN}; found [{}]",
            headers.join(", ")
        )));
    };

    let mut session_id = None;
    let mut turns = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ingest_error(e.to_string()))?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        // Session id comes from the first data row, whatever its role
        if session_id.is_none() {
            session_id = Some(session_from_id(&clean_text(field(id_col))));
        }

        let Some(role) = parse_role(field(role_col)) else {
            continue;
        };
        if let Some(turn) = Turn::new(role, field(utt_col)) {
            turns.push(turn);
        }
    }

    Ok(ParsedTranscript {
        session_id: session_id.unwrap_or_else(|| file_stem(path)),
        turns,
    })
}

/// Map a HOPE role code to a speaker
fn parse_role(code: &str) -> Option<Role> {
    match clean_text(code).to_uppercase().as_str() {
        "P" => Some(Role::Client),
        "T" => Some(Role::Therapist),
        _ => None,
    }
}

/// `"97_0"` -> `"97"`
fn session_from_id(id: &str) -> String {
    id.split('_').next().unwrap_or_default().to_string()
}
