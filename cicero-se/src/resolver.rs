//! Conflict resolution between overlapping speaker matches
//!
//! Several rules may claim the same stretch of text. Matches whose spans
//! intersect form a group; each group keeps exactly one match.

use std::cmp::Ordering;

use tracing::debug;

use crate::patterns::MAX_PATTERN_VERSION;
use crate::types::SpeakerMatch;

/// Matched text shorter than this (after trimming) halves the confidence
const MIN_MATCH_CHARS: usize = 3;

/// Largest share a rule version adds to the base confidence
const VERSION_BONUS: f64 = 0.2;

/// Confidence of a match in [0, 1]
///
/// Base 1.0, halved for very short matched text, raised by up to 20% in
/// proportion to the rule version, then divided by 1.2.
pub fn confidence(matched_text: &str, version: u32) -> f64 {
    let mut base = 1.0;
    if matched_text.trim().chars().count() < MIN_MATCH_CHARS {
        base *= 0.5;
    }

    let share = f64::from(version.min(MAX_PATTERN_VERSION)) / f64::from(MAX_PATTERN_VERSION);
    base * (1.0 + VERSION_BONUS * share) / (1.0 + VERSION_BONUS)
}

/// Picks one match per group of overlapping matches
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Non-overlapping, position-ordered subset of `matches`
    ///
    /// # Algorithm
    /// 1. Sort ascending by start (then end)
    /// 2. Walk once; a match joins the current group while it starts before
    ///    the group's furthest end, and the group span grows to cover it
    /// 3. Each group keeps its best match: highest confidence, then longer
    ///    speaker name in characters, then earlier position
    pub fn resolve(&self, mut matches: Vec<SpeakerMatch>) -> Vec<SpeakerMatch> {
        if matches.len() < 2 {
            return matches;
        }

        matches.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
        let total = matches.len();

        let mut resolved: Vec<SpeakerMatch> = Vec::new();
        let mut iter = matches.into_iter();
        let Some(first) = iter.next() else {
            return resolved;
        };

        let mut best = first;
        let mut group_end = best.end;

        for next in iter {
            if next.start < group_end {
                group_end = group_end.max(next.end);
                if is_better(&next, &best) {
                    debug!(
                        kept = %next.speaker_name,
                        kept_rule = next.rule_id,
                        dropped = %best.speaker_name,
                        dropped_rule = best.rule_id,
                        "Overlapping speaker matches"
                    );
                    best = next;
                }
            } else {
                resolved.push(best);
                group_end = next.end;
                best = next;
            }
        }
        resolved.push(best);

        debug!(
            "Conflict resolution: {} matches → {} kept",
            total,
            resolved.len()
        );

        resolved
    }
}

/// Strictly better; ties keep the earlier match
fn is_better(candidate: &SpeakerMatch, current: &SpeakerMatch) -> bool {
    match candidate.confidence.partial_cmp(&current.confidence) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) => false,
        _ => candidate.name_chars() > current.name_chars(),
    }
}
