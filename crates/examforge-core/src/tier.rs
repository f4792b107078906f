//! Proficiency tiers 1..=6.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One of six ordered proficiency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tier(u8);

impl Tier {
    pub const MIN: Tier = Tier(1);
    pub const MAX: Tier = Tier(6);
    /// Number of tiers.
    pub const COUNT: usize = 6;

    /// Create a tier, returning `None` outside 1..=6.
    pub fn new(level: u8) -> Option<Self> {
        (1..=6).contains(&level).then_some(Tier(level))
    }

    /// Create a tier from an arbitrary integer, falling back to tier 1 when
    /// it is out of range.
    pub fn or_lowest(level: i64) -> Self {
        u8::try_from(level)
            .ok()
            .and_then(Tier::new)
            .unwrap_or(Tier::MIN)
    }

    /// Parse leniently: the first digit run in `s` ("HSK4", "4", "level 4")
    /// names the tier. Anything unusable yields tier 1.
    pub fn parse_lenient(s: &str) -> Self {
        first_number(s).map(Tier::or_lowest).unwrap_or(Tier::MIN)
    }

    /// The numeric level, 1..=6.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based index for tier-indexed arrays.
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// Tier for a zero-based index.
    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Tier::new)
    }

    /// All tiers in ascending order.
    pub fn all() -> impl Iterator<Item = Tier> {
        (1..=6).map(Tier)
    }

    /// Playback rate offset (percent) used for listening material.
    pub fn speech_rate_percent(self) -> i8 {
        match self.0 {
            1 => -50,
            2 => -40,
            3 => -25,
            4 => -15,
            5 => -5,
            _ => 0,
        }
    }
}

fn first_number(s: &str) -> Option<i64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HSK{}", self.0)
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("HSK")
            .or_else(|| trimmed.strip_prefix("hsk"))
            .unwrap_or(trimmed)
            .trim_start_matches(['_', '-', ' ']);
        digits
            .parse::<u8>()
            .ok()
            .and_then(Tier::new)
            .ok_or_else(|| ConfigError::InvalidTier(s.to_string()))
    }
}

impl TryFrom<u8> for Tier {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::new(value).ok_or_else(|| ConfigError::InvalidTier(value.to_string()))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse() {
        assert_eq!("HSK3".parse::<Tier>().unwrap().get(), 3);
        assert_eq!("4".parse::<Tier>().unwrap().get(), 4);
        assert_eq!("hsk_6".parse::<Tier>().unwrap().get(), 6);
        assert!("HSK7".parse::<Tier>().is_err());
        assert!("zero".parse::<Tier>().is_err());
    }

    #[test]
    fn lenient_parse_falls_back_to_lowest() {
        assert_eq!(Tier::parse_lenient("level 5").get(), 5);
        assert_eq!(Tier::parse_lenient("HSK9"), Tier::MIN);
        assert_eq!(Tier::parse_lenient("beginner"), Tier::MIN);
        assert_eq!(Tier::or_lowest(-2), Tier::MIN);
    }

    #[test]
    fn index_roundtrip_and_display() {
        for tier in Tier::all() {
            assert_eq!(Tier::from_index(tier.index()), Some(tier));
        }
        assert_eq!(Tier::all().count(), Tier::COUNT);
        assert_eq!(Tier::new(2).unwrap().to_string(), "HSK2");
        assert_eq!(Tier::from_index(6), None);
    }

    #[test]
    fn speech_rate_speeds_up_with_tier() {
        assert_eq!(Tier::MIN.speech_rate_percent(), -50);
        assert_eq!(Tier::MAX.speech_rate_percent(), 0);
    }

    #[test]
    fn serde_as_integer() {
        let tier: Tier = serde_json::from_str("3").unwrap();
        assert_eq!(tier.get(), 3);
        assert_eq!(serde_json::to_string(&tier).unwrap(), "3");
        assert!(serde_json::from_str::<Tier>("0").is_err());
    }
}
