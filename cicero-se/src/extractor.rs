//! Match extraction
//!
//! Runs every rule of a compiled pattern over the session part of a
//! document and merges the candidates into one position-ordered list.
//! Overlapping candidates are left for the conflict resolver.

use regex::Captures;
use tracing::debug;

use crate::patterns::{CompiledPattern, CompiledRule};
use crate::resolver::confidence;
use crate::types::SpeakerMatch;

/// Find all speaker markers of `pattern` in `text`
///
/// **Algorithm:**
/// 1. Restrict the search to the session range (offsets stay absolute)
/// 2. Apply each rule left to right; a candidate whose `name` is blank or
///    starts with an introducing word is discarded
/// 3. After a match the search resumes at the start of the line holding
///    the speech body, so a marker directly below another one is found
/// 4. Sort by start, then end, then rule order
///
/// Zero matches is an empty list, not an error.
pub fn extract(text: &str, pattern: &CompiledPattern) -> Vec<SpeakerMatch> {
    let region = pattern.session_range(text);
    let bounded = &text[..region.end];

    let mut candidates: Vec<(usize, SpeakerMatch)> = Vec::new();

    for (rule_index, rule) in pattern.rules.iter().enumerate() {
        let mut pos = region.start;
        let mut found = 0usize;
        let mut discarded = 0usize;

        while pos <= bounded.len() {
            let Some(caps) = rule.regex.captures_at(bounded, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };

            let marker_end = caps.name("lead").map(|m| m.start()).unwrap_or(whole.end());
            pos = resume_position(bounded, whole.start(), whole.end(), marker_end);

            match build_match(&caps, rule, text, whole.start(), marker_end) {
                Some(m) => {
                    found += 1;
                    candidates.push((rule_index, m));
                }
                None => discarded += 1,
            }
        }

        debug!(
            pattern_id = pattern.pattern_id,
            rule_id = rule.id,
            found,
            discarded,
            "Rule applied"
        );
    }

    candidates.sort_by(|(rule_a, a), (rule_b, b)| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then(rule_a.cmp(rule_b))
    });

    candidates.into_iter().map(|(_, m)| m).collect()
}

fn build_match(
    caps: &Captures<'_>,
    rule: &CompiledRule,
    text: &str,
    start: usize,
    end: usize,
) -> Option<SpeakerMatch> {
    let name = caps.name("name")?.as_str().trim();
    if name.is_empty() {
        return None;
    }
    if rule.is_excluded_name(name) {
        debug!(rule_id = rule.id, name, "Discarding introducing line");
        return None;
    }

    Some(SpeakerMatch {
        speaker_name: name.to_string(),
        region: optional_group(caps, "region"),
        affiliation: optional_group(caps, "affiliation"),
        role: optional_group(caps, "role"),
        start,
        end,
        rule_id: rule.id,
        confidence: confidence(&text[start..end], rule.version),
    })
}

fn optional_group(caps: &Captures<'_>, group: &str) -> Option<String> {
    caps.name(group)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Start of the line holding the body when it lies after the marker start,
/// otherwise the end of the match (always past `match_start`)
fn resume_position(text: &str, match_start: usize, match_end: usize, marker_end: usize) -> usize {
    if let Some(newline) = text[..marker_end].rfind('\n') {
        if newline + 1 > match_start {
            return newline + 1;
        }
    }

    if match_end > match_start {
        match_end
    } else {
        let step = text[match_start..].chars().next().map_or(1, char::len_utf8);
        match_start + step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{bundestag, hearing, PatternVariant, StructuralPattern};

    fn plenary() -> CompiledPattern {
        PatternVariant::BundestagPlenary.compile().unwrap()
    }

    fn hearing_pattern() -> CompiledPattern {
        PatternVariant::BundestagHearing.compile().unwrap()
    }

    #[test]
    fn test_hearing_lines() {
        let text = "Smith: Hello.\nJones: Goodbye.";
        let matches = extract(text, &hearing_pattern());

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].speaker_name, "Smith");
        assert_eq!((matches[0].start, matches[0].end), (0, 6));
        assert_eq!(matches[1].speaker_name, "Jones");
        assert_eq!(matches[1].start, 14);
        assert_eq!(matches[1].rule_id, hearing::COLON_RULE_ID);
    }

    #[test]
    fn test_no_markers_is_empty() {
        let matches = extract("just some prose without any marker", &hearing_pattern());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_marker_end_is_start_of_body() {
        let text = "\nBeginn: 9.00 Uhr\nAnna Schmidt (SPD):\n  Vielen Dank.";
        let matches = extract(text, &plenary());

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.affiliation.as_deref(), Some("SPD"));
        assert_eq!(&text[m.end..], "Vielen Dank.");
    }

    #[test]
    fn test_introducing_lines_are_discarded() {
        let text = "Herr Karl Meier:\nSie haben recht.\nAnna Schmidt (SPD):\nDanke.";
        let matches = extract(text, &plenary());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].speaker_name, "Anna Schmidt");
    }

    #[test]
    fn test_consecutive_marker_lines_are_both_found() {
        let text = "Anna Schmidt (SPD):\nKarl Meier (FDP):\nDanke.";
        let matches = extract(text, &plenary());

        let names: Vec<_> = matches.iter().map(|m| m.speaker_name.as_str()).collect();
        assert_eq!(names, vec!["Anna Schmidt", "Karl Meier"]);
    }

    #[test]
    fn test_chair_line_yields_both_rules_in_rule_order() {
        let text = "Präsident Wolfgang Schäuble:\nDie Sitzung ist eröffnet.";
        let matches = extract(text, &plenary());

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].start, matches[1].start);
        assert_eq!(matches[0].end, matches[1].end);
        assert_eq!(matches[0].rule_id, bundestag::SPEAKER_RULE_ID);
        assert_eq!(matches[1].rule_id, bundestag::CHAIR_RULE_ID);
        assert_eq!(matches[1].speaker_name, "Wolfgang Schäuble");
        assert_eq!(matches[1].role.as_deref(), Some("Präsident"));
    }

    #[test]
    fn test_markers_outside_session_are_ignored() {
        let text = "Inhalt:\nAnna Schmidt (SPD):\nTagesordnung\nBeginn: 9.00 Uhr\nKarl Meier (FDP):\nRede.\n(Schluss: 10.00 Uhr)\nOtto Weber (AfD):\nAnlage";
        let matches = extract(text, &plenary());

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].speaker_name, "Karl Meier");
    }

    #[test]
    fn test_resume_position_makes_progress() {
        assert_eq!(resume_position("ab:\nCd", 0, 5, 4), 4);
        assert_eq!(resume_position("Smith: x", 0, 6, 6), 6);
        assert_eq!(resume_position("äb", 0, 0, 0), 2);
    }
}
