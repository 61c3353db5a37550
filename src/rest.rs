use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;

const SECS_PER_DAY: f64 = 86_400.0;

/// Days between each appearance and the same player's previous game.
///
/// `appearances` holds `(player_id, game_start)` per row. Rows from the same game share a start
/// time, so every pitch of a game reports the gap to the player's previous game. A player's first
/// game yields `None`.
pub fn days_since_last_appearance<I: Ord + Copy>(
    appearances: &[(I, NaiveDateTime)],
) -> Vec<Option<f64>> {
    let mut starts: BTreeMap<I, BTreeSet<NaiveDateTime>> = BTreeMap::new();
    for (id, start) in appearances {
        starts.entry(*id).or_default().insert(*start);
    }

    appearances
        .iter()
        .map(|(id, start)| {
            let prev = starts.get(id)?.range(..*start).next_back()?;
            Some((*start - *prev).num_seconds() as f64 / SECS_PER_DAY)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 7, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn first_game_has_no_rest() {
        let got = days_since_last_appearance(&[(1u32, at(1, 18)), (1u32, at(1, 18))]);
        assert_eq!(got, vec![None, None]);
    }

    #[test]
    fn gap_uses_previous_distinct_game() {
        let rows = [
            (1u32, at(3, 18)),
            (2u32, at(1, 14)),
            (1u32, at(1, 18)),
            (1u32, at(3, 18)),
            (2u32, at(2, 18)),
            (1u32, at(7, 12)),
        ];
        let got = days_since_last_appearance(&rows);
        assert_eq!(got[0], Some(2.0));
        assert_eq!(got[1], None);
        assert_eq!(got[2], None);
        assert_eq!(got[3], Some(2.0));
        assert_eq!(got[4], Some(28.0 / 24.0));
        assert_eq!(got[5], Some(3.75));
    }
}
