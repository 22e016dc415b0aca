use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rating pools lichess publishes a distribution chart for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum PerfType {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    UltraBullet,
    Crazyhouse,
    Chess960,
    KingOfTheHill,
    ThreeCheck,
    Antichess,
    Atomic,
    Horde,
    RacingKings,
}

impl PerfType {
    pub const ALL: [PerfType; 13] = [
        PerfType::Bullet,
        PerfType::Blitz,
        PerfType::Rapid,
        PerfType::Classical,
        PerfType::UltraBullet,
        PerfType::Crazyhouse,
        PerfType::Chess960,
        PerfType::KingOfTheHill,
        PerfType::ThreeCheck,
        PerfType::Antichess,
        PerfType::Atomic,
        PerfType::Horde,
        PerfType::RacingKings,
    ];

    /// Name used by lichess in urls and by us in document ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            PerfType::Bullet => "bullet",
            PerfType::Blitz => "blitz",
            PerfType::Rapid => "rapid",
            PerfType::Classical => "classical",
            PerfType::UltraBullet => "ultraBullet",
            PerfType::Crazyhouse => "crazyhouse",
            PerfType::Chess960 => "chess960",
            PerfType::KingOfTheHill => "kingOfTheHill",
            PerfType::ThreeCheck => "threeCheck",
            PerfType::Antichess => "antichess",
            PerfType::Atomic => "atomic",
            PerfType::Horde => "horde",
            PerfType::RacingKings => "racingKings",
        }
    }
}

impl fmt::Display for PerfType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownPerfType(pub String);

impl fmt::Display for UnknownPerfType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown perf type `{}`", self.0)
    }
}

impl std::error::Error for UnknownPerfType {}

impl FromStr for PerfType {
    type Err = UnknownPerfType;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        PerfType::ALL
            .iter()
            .find(|perf| perf.as_str().eq_ignore_ascii_case(name.trim()))
            .copied()
            .ok_or_else(|| UnknownPerfType(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_serde() {
        for perf in PerfType::ALL {
            let json = serde_json::to_string(&perf).unwrap();

            assert_eq!(json, format!("\"{}\"", perf.as_str()));
            assert_eq!(perf.as_str().parse::<PerfType>(), Ok(perf));
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("KINGOFTHEHILL".parse(), Ok(PerfType::KingOfTheHill));
        assert_eq!(" ultrabullet ".parse(), Ok(PerfType::UltraBullet));
        assert_eq!(
            "clasical".parse::<PerfType>(),
            Err(UnknownPerfType("clasical".to_string()))
        );
    }
}
