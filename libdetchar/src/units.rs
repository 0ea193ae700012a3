//! Minimal physical units for detector data.
//!
//! A [Unit] is a product of symbols raised to integer powers. Only enough algebra to
//! derive spectral units (multiplication, division, powers) is supported; no scale
//! conversion is attempted, so `mV` and `V` are distinct symbols.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::UnitError;

/// Symbols understood without a prefix
const BASE_SYMBOLS: [&str; 31] = [
    "m", "s", "g", "A", "K", "mol", "cd", "Hz", "V", "W", "J", "N", "Pa", "T", "ohm", "C",
    "F", "H", "S", "Wb", "ct", "count", "strain", "rad", "deg", "sr", "dB", "bit", "byte",
    "G", "Mpc",
];

/// SI prefixes accepted in front of a base symbol
const PREFIXES: [char; 10] = ['Y', 'Z', 'E', 'P', 'T', 'G', 'M', 'k', 'm', 'n'];
const EXTRA_PREFIXES: [char; 4] = ['u', 'p', 'f', 'c'];

const DIMENSIONLESS: &str = "dimensionless";

fn is_known_symbol(symbol: &str) -> bool {
    if BASE_SYMBOLS.contains(&symbol) {
        return true;
    }
    let mut chars = symbol.chars();
    match chars.next() {
        Some(p) if PREFIXES.contains(&p) || EXTRA_PREFIXES.contains(&p) => {
            BASE_SYMBOLS.contains(&chars.as_str())
        }
        _ => false,
    }
}

/// A physical unit.
///
/// Units that contain symbols we do not recognize are kept verbatim as
/// `Unrecognized`; they can be displayed and compared but not divided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Known(BTreeMap<String, i32>),
    Unrecognized(String),
}

impl Default for Unit {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl Unit {
    pub fn dimensionless() -> Self {
        Self::Known(BTreeMap::new())
    }

    pub fn hertz() -> Self {
        Self::symbol("Hz")
    }

    /// Inverse frequency, the fallback unit of a spectral density
    pub fn per_hertz() -> Self {
        Self::hertz().powi(-1)
    }

    fn symbol(symbol: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(symbol.to_string(), 1);
        Self::Known(map)
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn is_dimensionless(&self) -> bool {
        matches!(self, Self::Known(map) if map.is_empty())
    }

    /// Raise a unit to an integer power. Unrecognized units are returned unchanged.
    pub fn powi(&self, power: i32) -> Self {
        match self {
            Self::Known(map) => Self::Known(
                map.iter()
                    .map(|(s, p)| (s.clone(), p * power))
                    .filter(|(_, p)| *p != 0)
                    .collect(),
            ),
            Self::Unrecognized(_) => self.clone(),
        }
    }

    pub fn try_mul(&self, other: &Unit) -> Result<Unit, UnitError> {
        match (self, other) {
            (Self::Known(lhs), Self::Known(rhs)) => {
                let mut out = lhs.clone();
                for (symbol, power) in rhs {
                    *out.entry(symbol.clone()).or_insert(0) += power;
                }
                out.retain(|_, p| *p != 0);
                Ok(Self::Known(out))
            }
            (Self::Unrecognized(raw), _) | (_, Self::Unrecognized(raw)) => {
                Err(UnitError::Undefined(raw.clone()))
            }
        }
    }

    pub fn try_div(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.try_mul(&other.powi(-1))
    }
}

fn parse_term(term: &str) -> Result<Option<(String, i32)>, UnitError> {
    let (symbol, power) = match term.split_once('^') {
        Some((s, p)) => (
            s,
            p.trim_matches(&['(', ')'][..])
                .parse::<i32>()
                .map_err(|_| UnitError::BadExponent(term.to_string()))?,
        ),
        None => {
            // Trailing digits are an exponent, e.g. m2
            let digits = term
                .char_indices()
                .find(|(_, c)| c.is_ascii_digit() || *c == '-')
                .map(|(i, _)| i);
            match digits {
                Some(0) => (term, 1),
                Some(i) => (
                    &term[..i],
                    term[i..]
                        .parse::<i32>()
                        .map_err(|_| UnitError::BadExponent(term.to_string()))?,
                ),
                None => (term, 1),
            }
        }
    };
    if symbol == "1" || symbol == DIMENSIONLESS {
        return Ok(None);
    }
    if is_known_symbol(symbol) {
        Ok(Some((symbol.to_string(), power)))
    } else {
        Err(UnitError::Undefined(symbol.to_string()))
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    /// Parse a unit string such as `m`, `V / Hz`, `m^2 / s` or `1 / Hz`.
    ///
    /// Unknown symbols produce `Unit::Unrecognized` rather than an error; only
    /// structurally broken strings fail.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(UnitError::Empty);
        }

        let mut map: BTreeMap<String, i32> = BTreeMap::new();
        let mut sign = 1;
        let spaced = trimmed.replace('/', " / ").replace('*', " ");
        for token in spaced.split_whitespace() {
            if token == "/" {
                sign = -1;
                continue;
            }
            match parse_term(token) {
                Ok(Some((symbol, power))) => *map.entry(symbol).or_insert(0) += sign * power,
                Ok(None) => (),
                Err(UnitError::Undefined(_)) => return Ok(Self::Unrecognized(trimmed.to_string())),
                Err(e) => return Err(e),
            }
        }
        map.retain(|_, p| *p != 0);
        Ok(Self::Known(map))
    }
}

impl TryFrom<String> for Unit {
    type Error = UnitError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Unit> for String {
    fn from(value: Unit) -> Self {
        value.to_string()
    }
}

fn format_terms<'a>(terms: impl Iterator<Item = (&'a String, i32)>) -> String {
    terms
        .map(|(s, p)| {
            if p == 1 {
                s.clone()
            } else {
                format!("{s}^{p}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(raw) => write!(f, "{raw}"),
            Self::Known(map) if map.is_empty() => write!(f, "{DIMENSIONLESS}"),
            Self::Known(map) => {
                let numerator = format_terms(map.iter().filter(|(_, p)| **p > 0).map(|(s, p)| (s, *p)));
                let denominator =
                    format_terms(map.iter().filter(|(_, p)| **p < 0).map(|(s, p)| (s, -*p)));
                match (numerator.is_empty(), denominator.is_empty()) {
                    (false, true) => write!(f, "{numerator}"),
                    (true, false) => write!(f, "1 / {denominator}"),
                    _ => write!(f, "{numerator} / {denominator}"),
                }
            }
        }
    }
}

/// Outcome of deriving a unit that may not be computable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedUnit {
    Exact(Unit),
    Fallback(Unit),
}

impl DerivedUnit {
    pub fn unit(&self) -> &Unit {
        match self {
            Self::Exact(u) | Self::Fallback(u) => u,
        }
    }

    pub fn into_unit(self) -> Unit {
        match self {
            Self::Exact(u) | Self::Fallback(u) => u,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Unit of a spectral density of a series in `unit`: `unit / Hz`, or `1 / Hz` if that
/// division is undefined.
pub fn spectral_density_unit(unit: &Unit) -> DerivedUnit {
    match unit.try_div(&Unit::hertz()) {
        Ok(u) => DerivedUnit::Exact(u),
        Err(e) => {
            log::warn!("Could not derive spectral unit ({e}); falling back to 1 / Hz");
            DerivedUnit::Fallback(Unit::per_hertz())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let unit: Unit = "m^2 / s".parse().unwrap();
        assert_eq!(unit.to_string(), "m^2 / s");
        let unit: Unit = "1/Hz".parse().unwrap();
        assert_eq!(unit, Unit::per_hertz());
        assert_eq!(unit.to_string(), "1 / Hz");
        let unit: Unit = "mV".parse().unwrap();
        assert!(unit.is_recognized());
        assert!("dimensionless".parse::<Unit>().unwrap().is_dimensionless());
    }

    #[test]
    fn test_unrecognized_is_kept() {
        let unit: Unit = "furlong".parse().unwrap();
        assert_eq!(unit, Unit::Unrecognized(String::from("furlong")));
        assert_eq!(unit.to_string(), "furlong");
    }

    #[test]
    fn test_spectral_unit() {
        let strain: Unit = "strain".parse().unwrap();
        let derived = spectral_density_unit(&strain);
        assert!(!derived.is_fallback());
        assert_eq!(derived.unit().to_string(), "strain / Hz");

        let hz_unit = spectral_density_unit(&Unit::hertz());
        assert!(hz_unit.unit().is_dimensionless());

        let weird = spectral_density_unit(&Unit::Unrecognized(String::from("furlong")));
        assert!(weird.is_fallback());
        assert_eq!(weird.into_unit(), Unit::per_hertz());
    }

    #[test]
    fn test_bad_exponent() {
        assert!(matches!(
            "m^x".parse::<Unit>(),
            Err(UnitError::BadExponent(_))
        ));
        assert_eq!("".parse::<Unit>(), Err(UnitError::Empty));
    }
}
