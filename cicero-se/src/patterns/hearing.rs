//! German Bundestag committee hearings
//!
//! Hearing transcripts use a loose "Name: text" layout: a line opens with a
//! capitalised name of up to five words, optionally followed by a party or
//! organisation in brackets, then a colon. The speech starts right after
//! the colon.

use super::{compile_rules, rule_versions, CompiledPattern, PatternMetadata, RuleSource};
use crate::error::RegistryError;
use crate::types::PatternKey;
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};

pub const PATTERN_ID: &str = "bundestag-hearing";
pub const COLON_RULE_ID: &str = "colon-marker";

const COLON_RULE: RuleSource = RuleSource {
    id: COLON_RULE_ID,
    version: 1,
    regex: r"(?mx)
        ^[\x20\t\x{a0}]*
        (?P<name>\p{Lu}[\p{L}.'-]*(?:[\x20\x{a0}]+\p{Lu}[\p{L}.'-]*){0,4})
        (?:[\x20\x{a0}]*\([\x20\x{a0}]*(?P<affiliation>[^()\n]+?)[\x20\x{a0}]*\))?
        [\x20\x{a0}]*:
    ",
    excluded_leading_words: &[],
};

const RULES: &[RuleSource] = &[COLON_RULE];

pub fn metadata() -> PatternMetadata {
    PatternMetadata {
        id: PATTERN_ID,
        key: PatternKey {
            country: CountryCode::Germany,
            institution: InstitutionKind::Parliament,
            language: Language::German,
            protocol_kind: ProtocolKind::Hearing,
        },
        description: "Committee hearing: 'Name: text' lines",
        rules: rule_versions(RULES),
        has_session_bounds: false,
    }
}

pub fn compile() -> Result<CompiledPattern, RegistryError> {
    compile_rules(PATTERN_ID, RULES, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_marker_captures() {
        let pattern = compile().unwrap();
        let re = &pattern.rules[0].regex;

        let caps = re.captures("Prof. Dr. Anna Schmidt (Universität Bonn): Danke.").unwrap();
        assert_eq!(&caps["name"], "Prof. Dr. Anna Schmidt");
        assert_eq!(&caps["affiliation"], "Universität Bonn");

        let caps = re.captures("Smith: Hello.").unwrap();
        assert_eq!(&caps["name"], "Smith");
        assert_eq!(caps.get(0).unwrap().end(), "Smith:".len());
    }

    #[test]
    fn test_colon_marker_is_line_anchored() {
        let pattern = compile().unwrap();
        let re = &pattern.rules[0].regex;

        assert!(re.captures("und dann sagte Smith: nein").is_none());
        // More than five capitalised words is prose, not a name
        assert!(re.captures("Eins Zwei Drei Vier Fünf Sechs: x").is_none());
    }
}
