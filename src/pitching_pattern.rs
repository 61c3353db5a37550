use std::collections::BTreeMap;

use serde::Serialize;

use crate::inning::Inning;

/// Placeholder for pitch counts that have no row, and for cells with no value.
pub const NO_RECORD: &str = "__NO_DATA__";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("at-bat has no pitches")]
    Empty,
    #[error("pitches from different at-bats mixed on `{0}`")]
    Mixed(&'static str),
}

/// Identifies one plate appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtBatKey {
    pub game_id: i64,
    pub inning: Inning,
    pub pitcher_id: u32,
    pub batter_id: u32,
    pub outs: u8,
}

#[derive(Debug, Clone)]
pub struct PitchEvent {
    pub key: AtBatKey,
    pub total_pitching_count: u32,
    pub ball_position_label: Option<String>,
    pub pitch_type: Option<String>,
    pub ball_xy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PitchPatterns {
    pub ball_position_label: String,
    pub pitch_type: String,
    pub ball_xy: String,
}

/// Grid coordinate label, e.g. `(11, "D") -> "11D"`.
pub fn ball_xy(ball_x: i64, ball_y: &str) -> String {
    format!("{ball_x}{}", ball_y.trim())
}

/// Encode one at-bat as space-separated sequences ordered by `totalPitchingCount`.
///
/// Counts run from 1 to the largest count seen; missing counts become [`NO_RECORD`]. When a
/// count repeats the later pitch wins.
pub fn extract_patterns(pitches: &[PitchEvent]) -> Result<PitchPatterns, PatternError> {
    let first = pitches.first().ok_or(PatternError::Empty)?;
    for p in &pitches[1..] {
        check_same_at_bat(&first.key, &p.key)?;
    }

    let max_count = pitches
        .iter()
        .map(|p| p.total_pitching_count)
        .max()
        .unwrap_or(0);

    let by_count: BTreeMap<u32, &PitchEvent> = pitches
        .iter()
        .map(|p| (p.total_pitching_count, p))
        .collect();

    Ok(PitchPatterns {
        ball_position_label: sequence(&by_count, max_count, |p| p.ball_position_label.as_deref()),
        pitch_type: sequence(&by_count, max_count, |p| p.pitch_type.as_deref()),
        ball_xy: sequence(&by_count, max_count, |p| p.ball_xy.as_deref()),
    })
}

fn sequence<F>(by_count: &BTreeMap<u32, &PitchEvent>, max_count: u32, field: F) -> String
where
    F: for<'a> Fn(&'a PitchEvent) -> Option<&'a str>,
{
    (1..=max_count)
        .map(|i| {
            by_count
                .get(&i)
                .and_then(|p| field(*p))
                .filter(|v| !v.is_empty())
                .unwrap_or(NO_RECORD)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_same_at_bat(a: &AtBatKey, b: &AtBatKey) -> Result<(), PatternError> {
    if a.game_id != b.game_id {
        return Err(PatternError::Mixed("gameID"));
    }
    if a.inning != b.inning {
        return Err(PatternError::Mixed("inning"));
    }
    if a.pitcher_id != b.pitcher_id {
        return Err(PatternError::Mixed("pitcherID"));
    }
    if a.batter_id != b.batter_id {
        return Err(PatternError::Mixed("batterID"));
    }
    if a.outs != b.outs {
        return Err(PatternError::Mixed("O"));
    }
    Ok(())
}

pub fn patterns_by_at_bat(
    pitches: &[PitchEvent],
) -> Result<BTreeMap<AtBatKey, PitchPatterns>, PatternError> {
    let mut groups: BTreeMap<AtBatKey, Vec<PitchEvent>> = BTreeMap::new();
    for p in pitches {
        groups.entry(p.key).or_default().push(p.clone());
    }

    groups
        .into_iter()
        .map(|(key, at_bat)| Ok((key, extract_patterns(&at_bat)?)))
        .collect()
}
