//! Shared domain enumerations
//!
//! These values identify the legislative context of a protocol and are the
//! key space of the extraction pattern registry. Each enum has a stable
//! storage string (`as_str`) used in the database and a case-insensitive
//! `FromStr` accepting either that string or the variant's upper-case name,
//! so `GERMANY`, `Germany` and `germany` all parse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

macro_rules! storage_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $stored:literal, $upper:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $stored)] $variant ),+
        }

        impl $name {
            /// All variants in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable storage representation
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $stored),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $(
                    if wanted.eq_ignore_ascii_case($stored) || wanted.eq_ignore_ascii_case($upper) {
                        return Ok($name::$variant);
                    }
                )+
                Err(Error::InvalidInput(format!("unknown {}: '{}'", $what, s)))
            }
        }
    };
}

storage_enum! {
    /// Country whose legislature produced a protocol
    CountryCode, "country" {
        Germany => "Germany", "GERMANY",
        France => "France", "FRANCE",
    }
}

storage_enum! {
    /// Kind of legislative institution
    InstitutionKind, "institution kind" {
        Parliament => "Parliament", "PARLIAMENT",
        FederalAssembly => "Federal Assembly", "FEDERAL_ASSEMBLY",
    }
}

storage_enum! {
    /// Kind of protocol document
    ProtocolKind, "protocol kind" {
        /// Full plenary session
        Plenary => "Plenary", "PLENARY",
        /// Committee or expert hearing
        Hearing => "Hearing", "HEARING",
    }
}

storage_enum! {
    /// Language of a protocol and of the speech texts extracted from it
    Language, "language" {
        German => "de", "DE",
        French => "fr", "FR",
        English => "en", "EN",
    }
}

storage_enum! {
    Gender, "gender" {
        Male => "Male", "MALE",
        Female => "Female", "FEMALE",
        Other => "Other", "OTHER",
    }
}
