use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// Business line of the retailer. Menu numbers 1-5 map to these in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKey {
    AguaPotable,
    AguaResidual,
    Bombeo,
    Analisis,
    Piscinas,
}

/// Aliases matched against normalized text, longest first so that
/// "agua potable e industrial" wins over "potable".
const LINE_ALIASES: &[(&str, LineKey)] = &[
    ("agua potable e industrial", LineKey::AguaPotable),
    ("medicion y control", LineKey::Analisis),
    ("aguas residuales", LineKey::AguaResidual),
    ("analisis de agua", LineKey::Analisis),
    ("agua residual", LineKey::AguaResidual),
    ("agua potable", LineKey::AguaPotable),
    ("industrial", LineKey::AguaPotable),
    ("residual", LineKey::AguaResidual),
    ("piscinas", LineKey::Piscinas),
    ("analisis", LineKey::Analisis),
    ("medicion", LineKey::Analisis),
    ("potable", LineKey::AguaPotable),
    ("piscina", LineKey::Piscinas),
    ("bombeo", LineKey::Bombeo),
    ("bombas", LineKey::Bombeo),
    ("control", LineKey::Analisis),
];

impl LineKey {
    pub const ALL: [LineKey; 5] =
        [Self::AguaPotable, Self::AguaResidual, Self::Bombeo, Self::Analisis, Self::Piscinas];

    /// Canonical hint string, as stored in sessions and appended to search phrases.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AguaPotable => "agua potable",
            Self::AguaResidual => "agua residual",
            Self::Bombeo => "bombeo",
            Self::Analisis => "analisis",
            Self::Piscinas => "piscinas",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AguaPotable => "Agua Potable e Industrial",
            Self::AguaResidual => "Agua Residual",
            Self::Bombeo => "Bombeo",
            Self::Analisis => "Analisis de agua / Medicion y Control",
            Self::Piscinas => "Piscinas",
        }
    }

    pub fn menu_number(self) -> u8 {
        match self {
            Self::AguaPotable => 1,
            Self::AguaResidual => 2,
            Self::Bombeo => 3,
            Self::Analisis => 4,
            Self::Piscinas => 5,
        }
    }

    pub fn from_menu_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|line| line.menu_number() == number)
    }

    /// Key into the consultative question bank.
    pub fn question_key(self) -> &'static str {
        match self {
            Self::AguaPotable => "agua_potable",
            Self::AguaResidual => "agua_residual",
            Self::Bombeo => "bombeo",
            Self::Analisis => "analisis",
            Self::Piscinas => "piscinas",
        }
    }

    /// First line whose alias appears anywhere in `text`.
    pub fn detect(text: &str) -> Option<Self> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        let padded = format!(" {normalized} ");
        LINE_ALIASES
            .iter()
            .find(|(alias, _)| padded.contains(&format!(" {alias} ")))
            .map(|(_, line)| *line)
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownLine(pub String);

impl fmt::Display for UnknownLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown business line `{}`", self.0)
    }
}

impl std::error::Error for UnknownLine {}

impl FromStr for LineKey {
    type Err = UnknownLine;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(&value.replace('_', " "));
        Self::ALL
            .into_iter()
            .find(|line| line.as_str() == normalized)
            .or_else(|| Self::detect(&normalized))
            .ok_or_else(|| UnknownLine(value.to_string()))
    }
}
