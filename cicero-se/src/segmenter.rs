//! Speech segmentation
//!
//! Turns resolved speaker markers into the speeches between them: the text
//! after marker *i* up to the start of marker *i+1* (or the end of the
//! session for the last marker) belongs to speaker *i*.

use tracing::debug;

use crate::types::{SpeakerMatch, SpeechSegment};

/// Segment a whole document
pub fn segment(matches: &[SpeakerMatch], text: &str) -> Vec<SpeechSegment> {
    segment_until(matches, text, text.len())
}

/// Segment with the last speech ending at `document_end`
///
/// `matches` must be non-overlapping and ordered by position. A segment
/// with an empty raw span is dropped; one whose text is only whitespace is
/// kept with empty text. Ordinals count kept segments from 1.
pub fn segment_until(matches: &[SpeakerMatch], text: &str, document_end: usize) -> Vec<SpeechSegment> {
    let document_end = document_end.min(text.len());
    let mut segments = Vec::with_capacity(matches.len());
    let mut dropped = 0usize;

    for (i, current) in matches.iter().enumerate() {
        let boundary = matches
            .get(i + 1)
            .map(|next| next.start)
            .unwrap_or(document_end);

        if boundary <= current.end {
            dropped += 1;
            continue;
        }

        let ordinal = segments.len() as u32 + 1;
        segments.push(SpeechSegment {
            speaker: current.clone(),
            text: text[current.end..boundary].trim().to_string(),
            start: current.end,
            end: boundary,
            ordinal,
        });
    }

    debug!(
        "Segmentation: {} markers → {} segments ({} empty spans dropped)",
        matches.len(),
        segments.len(),
        dropped
    );

    segments
}
