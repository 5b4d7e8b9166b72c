//! German Bundestag plenary protocols
//!
//! Speaker markers occupy a line of their own and end with a colon; the
//! speech starts on the next line with a capital letter:
//!
//! ```text
//! Dr. Anna Schmidt (Berlin) (CDU/CSU):
//! Herr Präsident! Meine Damen und Herren! ...
//!
//! Karl von der Heide, Bundesminister der Finanzen:
//! Vielen Dank. ...
//!
//! Vizepräsidentin Petra Pau:
//! Das Wort hat nun ...
//! ```
//!
//! Two rules run side by side. `bundestag-speaker` recognises members,
//! ministers and guests; `bundestag-chair` recognises the presiding
//! officer and records the title as role. A chair line also satisfies the
//! speaker rule (the title reads like a first name); the chair rule's
//! higher version makes it win the conflict.

use super::{compile_rules, rule_versions, CompiledPattern, PatternMetadata, RuleSource};
use crate::error::RegistryError;
use crate::types::PatternKey;
use cicero_common::types::{CountryCode, InstitutionKind, Language, ProtocolKind};

pub const PATTERN_ID: &str = "bundestag-plenary";
pub const SPEAKER_RULE_ID: &str = "bundestag-speaker";
pub const CHAIR_RULE_ID: &str = "bundestag-chair";

/// Session opening line, e.g. "Beginn: 9.00 Uhr"
pub const SESSION_START: &str = r"\nBeginn: \d{1,2}\.\d{2} Uhr";

/// Session closing line, e.g. "(Schluss: 17.42 Uhr)"
pub const SESSION_END: &str = r"\n\(Schluss: \d{1,2}\.\d{2} Uhr\)";

/// Words that open a line like a name but introduce someone else
const INTRODUCING_WORDS: &[&str] = &[
    "Kolleg",
    "Kollege",
    "Kollegen",
    "Kollegin",
    "Herr",
    "Frau",
    "Abgeordnet",
    "Abgeordnete",
    "Abgeordneten",
    "Antwort",
    "Frage",
    "Der",
    "Die",
    "Das",
    "Liebe",
    "Lieber",
];

// First name(s), then a surname optionally preceded by a name particle.
macro_rules! person_name {
    () => {
        r"
        (?P<name>
            \p{Lu}\p{Ll}+
            (?:[-\x20\x{a0}](?:\p{Lu}\p{Ll}+|\p{Lu}\.))*
            [\x20\x{a0}]+
            (?:
                \p{Lu}\p{Ll}+
              | (?:von\x20und\x20zu|de\x20la|von|van|der|de|zu|di|del|da|dos|das)
                (?:[\x20\x{a0}]+(?:der|den|dem))?
                [\x20\x{a0}]+\p{Lu}\p{Ll}+
            )
            (?:[-\x20\x{a0}]\p{Lu}\p{Ll}+)*
        )
        "
    };
}

// Colon ends the line; the body starts with a capital on the next line.
macro_rules! marker_end {
    () => {
        r"
        [\x20\t\x{a0}]*:[\x20\t\x{a0}]*\r?\n[\x20\t\x{a0}]*
        (?P<lead>\p{Lu})
        "
    };
}

const SPEAKER_RULE: RuleSource = RuleSource {
    id: SPEAKER_RULE_ID,
    version: 2,
    regex: concat!(
        r"(?mx)
        ^[\x20\t\x{a0}]*
        # academic titles: Dr. / Prof. Dr. / Dr. rer. nat.
        (?:(?:Dr\.|Prof\.|\p{Lu}\p{Ll}*\.)[\x20\x{a0}]?(?:\p{L}*\.[\x20\x{a0}]?){0,2})*
        ",
        person_name!(),
        r"
        # a single bracket is the party, two brackets are region then party
        (?:
            [\x20\x{a0}]*
            (?:\([\x20\x{a0}]*(?P<region>[^()\n]+?)[\x20\x{a0}]*\)[\x20\x{a0}]*)?
            \([\x20\x{a0}]*(?P<affiliation>[^()\n]+?)[\x20\x{a0}]*\)
        )?
        # office after a comma, up to ten words
        (?:,[\x20\x{a0}]+(?P<role>\p{Lu}[^\s:]*(?:[\x20\x{a0}]+[^\s:]+){0,9}))?
        ",
        marker_end!()
    ),
    excluded_leading_words: INTRODUCING_WORDS,
};

const CHAIR_RULE: RuleSource = RuleSource {
    id: CHAIR_RULE_ID,
    version: 3,
    regex: concat!(
        r"(?mx)
        ^[\x20\t\x{a0}]*
        (?P<role>(?:Präsident|Alterspräsident|Vizepräsident)(?:in)?)
        [\x20\t\x{a0}]+
        (?:(?:Dr\.|Prof\.)[\x20\x{a0}]?)*
        ",
        person_name!(),
        marker_end!()
    ),
    excluded_leading_words: &[],
};

const RULES: &[RuleSource] = &[SPEAKER_RULE, CHAIR_RULE];

pub fn metadata() -> PatternMetadata {
    PatternMetadata {
        id: PATTERN_ID,
        key: PatternKey {
            country: CountryCode::Germany,
            institution: InstitutionKind::Parliament,
            language: Language::German,
            protocol_kind: ProtocolKind::Plenary,
        },
        description: "Bundestag plenary session: members, ministers and presiding officers",
        rules: rule_versions(RULES),
        has_session_bounds: true,
    }
}

pub fn compile() -> Result<CompiledPattern, RegistryError> {
    compile_rules(PATTERN_ID, RULES, Some((SESSION_START, SESSION_END)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> regex::Regex {
        compile()
            .unwrap()
            .rules
            .into_iter()
            .find(|r| r.id == id)
            .unwrap()
            .regex
    }

    #[test]
    fn test_speaker_with_title_region_and_party() {
        let text = "Dr. Anna Schmidt (Berlin) (CDU/CSU):\nHerr Präsident! Meine Damen und Herren!";
        let caps = rule(SPEAKER_RULE_ID).captures(text).unwrap();

        assert_eq!(&caps["name"], "Anna Schmidt");
        assert_eq!(&caps["region"], "Berlin");
        assert_eq!(&caps["affiliation"], "CDU/CSU");
        assert!(caps.name("role").is_none());
        assert_eq!(caps.name("lead").unwrap().as_str(), "H");
    }

    #[test]
    fn test_single_bracket_is_affiliation() {
        let text = "Katrin Göring-Eckardt (BÜNDNIS 90/DIE GRÜNEN):\nVielen Dank.";
        let caps = rule(SPEAKER_RULE_ID).captures(text).unwrap();

        assert_eq!(&caps["name"], "Katrin Göring-Eckardt");
        assert!(caps.name("region").is_none());
        assert_eq!(&caps["affiliation"], "BÜNDNIS 90/DIE GRÜNEN");
    }

    #[test]
    fn test_name_particle_and_role() {
        let text = "Karl von der Heide, Bundesminister der Finanzen:\nVielen Dank.";
        let caps = rule(SPEAKER_RULE_ID).captures(text).unwrap();

        assert_eq!(&caps["name"], "Karl von der Heide");
        assert_eq!(&caps["role"], "Bundesminister der Finanzen");
    }

    #[test]
    fn test_marker_requires_body_on_next_line() {
        let re = rule(SPEAKER_RULE_ID);
        assert!(re.captures("Anna Schmidt (SPD): Das ist inline.").is_none());
        assert!(re.captures("Anna Schmidt (SPD):\nkleingeschrieben").is_none());
        // Single word is not a name
        assert!(re.captures("Schmidt:\nText").is_none());
    }

    #[test]
    fn test_chair_rule_records_title_as_role() {
        let text = "Vizepräsidentin Petra Pau:\nDas Wort hat die Kollegin.";
        let caps = rule(CHAIR_RULE_ID).captures(text).unwrap();

        assert_eq!(&caps["name"], "Petra Pau");
        assert_eq!(&caps["role"], "Vizepräsidentin");
    }

    #[test]
    fn test_metadata_lists_rules_in_order() {
        let meta = metadata();
        assert_eq!(meta.rules, vec![(SPEAKER_RULE_ID, 2), (CHAIR_RULE_ID, 3)]);
        assert!(meta.has_session_bounds);
        assert_eq!(meta.key.protocol_kind, ProtocolKind::Plenary);
    }
}
