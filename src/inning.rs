use std::fmt;
use std::str::FromStr;

const INNING_MARK: char = '回';
const TOP_MARK: &str = "表";
const BOTTOM_MARK: &str = "裏";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InningError {
    #[error("inning format is invalid: {0}")]
    Format(String),
    #[error("inning number is invalid: {0}")]
    Number(String),
    #[error("inning half is invalid: {0}")]
    Half(String),
}

/// Which side is batting. The visiting club bats in the top half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    pub const fn is_bottom(self) -> u8 {
        match self {
            Half::Top => 0,
            Half::Bottom => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Inning {
    pub no: u32,
    pub half: Half,
}

impl Inning {
    /// Parse labels like `1回表` or `11回裏`.
    pub fn parse(raw: &str) -> Result<Self, InningError> {
        let mut parts = raw.split(INNING_MARK);
        let (Some(no_raw), Some(half_raw), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(InningError::Format(raw.to_string()));
        };

        let no = no_raw
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| InningError::Number(raw.to_string()))?;

        let half = match half_raw {
            TOP_MARK => Half::Top,
            BOTTOM_MARK => Half::Bottom,
            _ => return Err(InningError::Half(raw.to_string())),
        };

        Ok(Self { no, half })
    }
}

impl FromStr for Inning {
    type Err = InningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Inning::parse(s)
    }
}

impl fmt::Display for Inning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let half = match self.half {
            Half::Top => TOP_MARK,
            Half::Bottom => BOTTOM_MARK,
        };
        write!(f, "{}{}{}", self.no, INNING_MARK, half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_number_and_half() {
        let cases = [
            ("1回表", 1, Half::Top),
            ("1回裏", 1, Half::Bottom),
            ("11回表", 11, Half::Top),
            ("11回裏", 11, Half::Bottom),
        ];
        for (raw, no, half) in cases {
            let got = Inning::parse(raw).expect("valid inning");
            assert_eq!(got, Inning { no, half });
            assert_eq!(got.to_string(), raw);
        }
        assert_eq!(Inning::parse("3回裏").unwrap().half.is_bottom(), 1);
    }

    #[test]
    fn rejects_malformed_labels() {
        for raw in ["1回", "回表", "回裏", "1表", "一回表", "二回裏", "0回表", "1回表回"] {
            assert!(Inning::parse(raw).is_err(), "{raw} should be rejected");
        }
        assert_eq!(
            Inning::parse("1表"),
            Err(InningError::Format("1表".to_string()))
        );
        assert_eq!(
            Inning::parse("1回"),
            Err(InningError::Half("1回".to_string()))
        );
    }
}
