//! Final summary marker parsing
//!
//! The final generative answer carries three sections introduced, in order,
//! by `Résumé :`, `Points clés :` and `Score global :`.

use crate::types::ParseError;

pub const SYNOPSIS_MARKER: &str = "Résumé :";
pub const KEY_POINTS_MARKER: &str = "Points clés :";
pub const GLOBAL_SCORE_MARKER: &str = "Score global :";

/// Trimmed sections of a final summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSummary {
    pub synopsis: String,
    pub key_points: String,
    pub global_score: String,
}

/// Split a final summary into its three sections
///
/// Every marker must appear exactly once, in order, and every section must
/// be non-empty after trimming.
pub fn parse_final_summary(text: &str) -> Result<ParsedSummary, ParseError> {
    let mut positions = [0usize; 3];
    for (slot, marker) in [SYNOPSIS_MARKER, KEY_POINTS_MARKER, GLOBAL_SCORE_MARKER]
        .into_iter()
        .enumerate()
    {
        let mut found = text.match_indices(marker).map(|(index, _)| index);
        positions[slot] = found.next().ok_or(ParseError::MissingMarker(marker))?;
        if found.next().is_some() {
            return Err(ParseError::DuplicateMarker(marker));
        }
    }

    let [synopsis_at, key_points_at, score_at] = positions;
    if key_points_at < synopsis_at {
        return Err(ParseError::OutOfOrder(KEY_POINTS_MARKER));
    }
    if score_at < key_points_at {
        return Err(ParseError::OutOfOrder(GLOBAL_SCORE_MARKER));
    }

    // Anything before the synopsis marker is preamble
    let synopsis = &text[synopsis_at + SYNOPSIS_MARKER.len()..key_points_at];
    let key_points = &text[key_points_at + KEY_POINTS_MARKER.len()..score_at];
    let score = &text[score_at + GLOBAL_SCORE_MARKER.len()..];

    Ok(ParsedSummary {
        synopsis: non_empty(synopsis, SYNOPSIS_MARKER)?,
        key_points: non_empty(key_points, KEY_POINTS_MARKER)?,
        global_score: non_empty(score, GLOBAL_SCORE_MARKER)?,
    })
}

fn non_empty(section: &str, marker: &'static str) -> Result<String, ParseError> {
    let trimmed = section.trim();
    if trimmed.is_empty() {
        Err(ParseError::EmptySection(marker))
    } else {
        Ok(trimmed.to_string())
    }
}
