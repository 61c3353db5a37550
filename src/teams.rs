use std::fmt;

use serde::{Serialize, Serializer};

use crate::inning::Half;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TeamError {
    #[error("cannot convert team name: {0}")]
    Unknown(String),
    #[error("team code out of range: {0}")]
    Code(u8),
}

/// The twelve NPB clubs. Discriminants are the integer codes used in the feature files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Team {
    Hiroshima = 1,
    Chunichi = 2,
    Hanshin = 3,
    Kyojin = 4,
    DeNA = 5,
    Yakuruto = 6,
    Lotte = 7,
    Rakuten = 8,
    Nichihamu = 9,
    Orix = 10,
    Softbank = 11,
    Seibu = 12,
}

impl Team {
    pub const ALL: [Team; 12] = [
        Team::Hiroshima,
        Team::Chunichi,
        Team::Hanshin,
        Team::Kyojin,
        Team::DeNA,
        Team::Yakuruto,
        Team::Lotte,
        Team::Rakuten,
        Team::Nichihamu,
        Team::Orix,
        Team::Softbank,
        Team::Seibu,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, TeamError> {
        Team::ALL
            .iter()
            .copied()
            .find(|t| t.code() == code)
            .ok_or(TeamError::Code(code))
    }

    /// Short club name as printed in the game info table.
    pub const fn name(self) -> &'static str {
        match self {
            Team::Hiroshima => "広島",
            Team::Chunichi => "中日",
            Team::Hanshin => "阪神",
            Team::Kyojin => "巨人",
            Team::DeNA => "DeNA",
            Team::Yakuruto => "ヤクルト",
            Team::Lotte => "ロッテ",
            Team::Rakuten => "楽天",
            Team::Nichihamu => "日本ハム",
            Team::Orix => "オリックス",
            Team::Softbank => "ソフトバンク",
            Team::Seibu => "西武",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, TeamError> {
        let name = name.trim();
        Team::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .ok_or_else(|| TeamError::Unknown(name.to_string()))
    }

    /// The fielding side pitches: the home club in the top half, the visitors in the bottom.
    pub fn pitcher_team(top_team: &str, bottom_team: &str, half: Half) -> Result<Self, TeamError> {
        match half {
            Half::Top => Team::from_name(bottom_team),
            Half::Bottom => Team::from_name(top_team),
        }
    }

    pub fn batter_team(top_team: &str, bottom_team: &str, half: Half) -> Result<Self, TeamError> {
        match half {
            Half::Top => Team::from_name(top_team),
            Half::Bottom => Team::from_name(bottom_team),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for Team {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitcher_team_is_the_fielding_side() {
        assert_eq!(
            Team::pitcher_team("中日", "阪神", Half::Top),
            Ok(Team::Hanshin)
        );
        assert_eq!(
            Team::pitcher_team("中日", "阪神", Half::Bottom),
            Ok(Team::Chunichi)
        );
        assert!(Team::pitcher_team("中日", "マリナーズ", Half::Top).is_err());
        assert!(Team::pitcher_team("ヤンキース", "阪神", Half::Bottom).is_err());
    }

    #[test]
    fn batter_team_is_the_batting_side() {
        assert_eq!(
            Team::batter_team("中日", "阪神", Half::Top),
            Ok(Team::Chunichi)
        );
        assert_eq!(
            Team::batter_team("中日", "阪神", Half::Bottom),
            Ok(Team::Hanshin)
        );
        assert_eq!(
            Team::batter_team("中日", "マリナーズ", Half::Bottom),
            Err(TeamError::Unknown("マリナーズ".to_string()))
        );
        assert!(Team::batter_team("ヤンキース", "阪神", Half::Top).is_err());
    }

    #[test]
    fn codes_round_trip_and_order_by_code() {
        for t in Team::ALL {
            assert_eq!(Team::from_code(t.code()), Ok(t));
            assert_eq!(Team::from_name(t.name()), Ok(t));
        }
        assert_eq!(Team::from_code(13), Err(TeamError::Code(13)));
        assert!(Team::Hiroshima < Team::Seibu);
        assert_eq!(Team::Softbank.to_string(), "11");
    }
}
