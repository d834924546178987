//! Instrument identity database
//!
//! Maps the reply to `ID?` / `*IDN?` onto a [`Dialect`]. Matching is a
//! case-insensitive substring search over an ordered table; where families
//! overlap the more specific pattern is listed first (`HP8566` before `HP856`).

use crate::dialect::{Dialect, Family};

/// One identity pattern
#[derive(Debug, Clone, Copy)]
struct IdentityPattern {
    /// Substring to look for, upper case
    needle: &'static str,
    /// Dialect selected when the needle is found
    dialect: Dialect,
}

const fn pat(needle: &'static str, dialect: Dialect) -> IdentityPattern {
    IdentityPattern { needle, dialect }
}

// Replies to the legacy `ID?` query, e.g. "HP8566B", "ID TEK/494AP,V2.1", "R3261A"
static LEGACY_PATTERNS: &[IdentityPattern] = &[
    pat("TEK/49", Dialect::Tek490),
    pat("TEK/275", Dialect::Tek490),
    pat("TEK/271", Dialect::Tek2710),
    pat("TEK/278", Dialect::Tek2780),
    pat("HP8566", Dialect::Hp8566),
    pat("HP8568", Dialect::Hp8566),
    pat("HP8569", Dialect::Hp8569b),
    pat("HP856", Dialect::Hp8560),
    pat("HP859", Dialect::Hp8590),
    pat("HP70", Dialect::Hp70000),
    pat("3585", Dialect::Hp3585),
    pat("HP3588", Dialect::Hp358x),
    pat("HP3589", Dialect::Hp358x),
    pat("R3261", Dialect::AdvantestR3261),
    pat("R3361", Dialect::AdvantestR3261),
    pat("R3265", Dialect::AdvantestR3265),
    pat("R3271", Dialect::AdvantestR3265),
    pat("R3465", Dialect::AdvantestR3265),
    pat("R3264", Dialect::AdvantestR3267),
    pat("R3267", Dialect::AdvantestR3267),
    pat("R3273", Dialect::AdvantestR3267),
];

// Replies to `*IDN?`, e.g. "Rohde&Schwarz,FSU-26,200012/026,3.40"
static IEEE488_PATTERNS: &[IdentityPattern] = &[
    pat(",MS8604", Dialect::AnritsuMs8604a),
    pat(",MS265", Dialect::AnritsuMs265x),
    pat(",MS266", Dialect::AnritsuMs266x),
    pat(",FSE", Dialect::RsFse),
    pat(",FSU", Dialect::RsFsu),
    pat(",FSQ", Dialect::RsFsu),
    pat(",FSP", Dialect::RsFsp),
    pat(",E4406", Dialect::AgilentE4406a),
    pat(",N99", Dialect::AgilentN9900),
];

/// Database of known instrument identities
pub struct InstrumentDatabase;

impl InstrumentDatabase {
    /// Identify a dialect from the reply to the family's identity query
    ///
    /// All families that share the identity grammar are searched, so an HP
    /// selection still recognises a Tektronix reply to `ID?`. An unmatched
    /// `*IDN?` reply from the SCPI family falls back to generic SCPI.
    pub fn identify(family: Family, id: &str) -> Option<Dialect> {
        let id = id.trim().to_ascii_uppercase();
        let table = match family.identity_query()? {
            "ID?" => LEGACY_PATTERNS,
            _ => IEEE488_PATTERNS,
        };

        let found = table
            .iter()
            .find(|p| id.contains(p.needle))
            .map(|p| p.dialect);

        match (found, family) {
            (Some(dialect), _) => Some(dialect),
            (None, Family::Scpi) => Some(Dialect::Scpi),
            (None, _) => None,
        }
    }
}
