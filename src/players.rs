use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

/// Players who appeared for two clubs during the season. Each keeps one id across both.
pub const TRANSFERRED_PLAYERS: [&str; 3] = ["ＤＪ．ジョンソン", "澤村 拓一", "小林 慶祐"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerIdentity<T> {
    pub player_id: u32,
    pub player: String,
    pub team: T,
}

/// Assign one id per distinct (player, team) pair.
///
/// Pairs are sorted by `(team, player)` and numbered from zero in that order. Afterwards every
/// row whose name is in `aliases` takes the smallest id found among rows with that name. Aliases
/// that match nothing are skipped.
pub fn assign_ids<T, A>(
    pitchers: &[(String, T)],
    batters: &[(String, T)],
    aliases: &[A],
) -> Vec<PlayerIdentity<T>>
where
    T: Ord + Clone,
    A: AsRef<str>,
{
    let unique: BTreeSet<(T, &str)> = pitchers
        .iter()
        .chain(batters)
        .map(|(player, team)| (team.clone(), player.as_str()))
        .collect();

    let mut out: Vec<PlayerIdentity<T>> = unique
        .into_iter()
        .enumerate()
        .map(|(rank, (team, player))| PlayerIdentity {
            player_id: rank as u32,
            player: player.to_string(),
            team,
        })
        .collect();

    for alias in aliases {
        let alias = alias.as_ref();
        let Some(one_id) = out
            .iter()
            .filter(|r| r.player == alias)
            .map(|r| r.player_id)
            .min()
        else {
            debug!(alias, "alias not present; skipped");
            continue;
        };
        for r in out.iter_mut().filter(|r| r.player == alias) {
            r.player_id = one_id;
        }
    }

    out
}

/// Resolved identities plus a `(team, player) -> id` index for joins.
#[derive(Debug, Clone)]
pub struct PlayerRegistry<T> {
    rows: Vec<PlayerIdentity<T>>,
    index: BTreeMap<T, BTreeMap<String, u32>>,
}

impl<T: Ord + Clone> PlayerRegistry<T> {
    pub fn build<A: AsRef<str>>(
        pitchers: &[(String, T)],
        batters: &[(String, T)],
        aliases: &[A],
    ) -> Self {
        let rows = assign_ids(pitchers, batters, aliases);
        let mut index: BTreeMap<T, BTreeMap<String, u32>> = BTreeMap::new();
        for r in &rows {
            index
                .entry(r.team.clone())
                .or_default()
                .insert(r.player.clone(), r.player_id);
        }
        Self { rows, index }
    }

    pub fn id_of(&self, player: &str, team: &T) -> Option<u32> {
        self.index.get(team)?.get(player).copied()
    }

    pub fn rows(&self) -> &[PlayerIdentity<T>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn distinct_ids(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.player_id)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdPopulations<I> {
    pub train_only: Vec<I>,
    pub test_only: Vec<I>,
    pub shared: Vec<I>,
}

impl<I> IdPopulations<I> {
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.train_only.len(), self.test_only.len(), self.shared.len())
    }
}

/// Split the union of two id collections into train-only, test-only and shared ids.
/// Every output is ascending and duplicate-free.
pub fn compare_populations<I: Ord + Clone>(train: &[I], test: &[I]) -> IdPopulations<I> {
    let train: BTreeSet<&I> = train.iter().collect();
    let test: BTreeSet<&I> = test.iter().collect();

    IdPopulations {
        train_only: train.difference(&test).map(|&i| i.clone()).collect(),
        test_only: test.difference(&train).map(|&i| i.clone()).collect(),
        shared: train.intersection(&test).map(|&i| i.clone()).collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Hand {
    Right,
    Left,
}

impl Hand {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "L" => Some(Hand::Left),
            "R" => Some(Hand::Right),
            _ => None,
        }
    }

    /// Feature encoding: left = 1, right = 0.
    pub const fn flag(self) -> u8 {
        match self {
            Hand::Left => 1,
            Hand::Right => 0,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "L",
            Hand::Right => "R",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct HandTally {
    left: usize,
    right: usize,
}

impl HandTally {
    fn add(&mut self, hand: Option<Hand>) {
        match hand {
            Some(Hand::Left) => self.left += 1,
            Some(Hand::Right) => self.right += 1,
            None => {}
        }
    }

    // Ties go to Left.
    fn mode(self) -> Option<Hand> {
        if self.left == 0 && self.right == 0 {
            None
        } else if self.left >= self.right {
            Some(Hand::Left)
        } else {
            Some(Hand::Right)
        }
    }

    fn distinct(self) -> usize {
        usize::from(self.left > 0) + usize::from(self.right > 0)
    }
}

fn tally_by_id<I: Ord + Copy>(records: impl Iterator<Item = (I, Option<Hand>)>) -> BTreeMap<I, HandTally> {
    let mut out: BTreeMap<I, HandTally> = BTreeMap::new();
    for (id, hand) in records {
        out.entry(id).or_default().add(hand);
    }
    out
}

/// Throwing hand per pitch. Missing values take the pitcher's most frequent recorded hand.
pub fn impute_pitcher_hands<I>(records: &[(I, Option<Hand>)]) -> Vec<Hand>
where
    I: Ord + Copy + fmt::Debug,
{
    let tallies = tally_by_id(records.iter().copied());

    let mut never_recorded: BTreeSet<I> = BTreeSet::new();
    let out = records
        .iter()
        .map(|&(id, hand)| {
            hand.unwrap_or_else(|| {
                match tallies.get(&id).and_then(|t| t.mode()) {
                    Some(h) => h,
                    None => {
                        never_recorded.insert(id);
                        Hand::Right
                    }
                }
            })
        })
        .collect();

    for id in never_recorded {
        warn!(pitcher_id = ?id, "pitcher has no recorded hand; assuming right");
    }
    out
}

/// Batting hand per pitch.
///
/// `records` holds `(batter_id, recorded_hand, pitcher_hand)`. A batter recorded with exactly
/// one hand always bats with it. Anyone else is handled as a switch hitter and stands on the
/// side opposite the pitcher's throwing hand.
pub fn impute_batter_hands<I: Ord + Copy>(records: &[(I, Option<Hand>, Hand)]) -> Vec<Hand> {
    let tallies = tally_by_id(records.iter().map(|&(id, hand, _)| (id, hand)));

    records
        .iter()
        .map(|&(id, _, pitcher_hand)| {
            let tally = tallies.get(&id).copied().unwrap_or_default();
            match (tally.distinct(), tally.mode()) {
                (1, Some(h)) => h,
                _ => pitcher_hand.opposite(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(v: &[(&str, u8)]) -> Vec<(String, u8)> {
        v.iter().map(|(p, t)| (p.to_string(), *t)).collect()
    }

    #[test]
    fn duplicated_and_cross_table_players_get_one_id() {
        let pitchers = pairs(&[("A", 1), ("A", 1), ("B", 2), ("C", 3)]);
        let batters = pairs(&[("C", 3), ("D", 3), ("E", 4), ("F", 4), ("F", 5)]);

        let out = assign_ids(&pitchers, &batters, &TRANSFERRED_PLAYERS);

        assert_eq!(out.len(), 7);
        let ids: BTreeSet<u32> = out.iter().map(|r| r.player_id).collect();
        assert_eq!(ids.len(), 7);
        let order: Vec<(u8, &str)> = out.iter().map(|r| (r.team, r.player.as_str())).collect();
        assert_eq!(
            order,
            vec![(1, "A"), (2, "B"), (3, "C"), (3, "D"), (4, "E"), (4, "F"), (5, "F")]
        );
        assert_eq!(out[5].player_id, 5);
    }

    #[test]
    fn transferred_players_share_the_smallest_id() {
        let pitchers = pairs(&[
            ("A", 1),
            ("A", 1),
            ("B", 2),
            ("C", 3),
            ("ＤＪ．ジョンソン", 4),
            ("ＤＪ．ジョンソン", 5),
            ("小林 慶祐", 6),
        ]);
        let batters = pairs(&[
            ("C", 3),
            ("D", 3),
            ("E", 4),
            ("F", 4),
            ("F", 5),
            ("澤村 拓一", 7),
            ("澤村 拓一", 8),
            ("小林 慶祐", 12),
        ]);

        let out = assign_ids(&pitchers, &batters, &TRANSFERRED_PLAYERS);
        assert_eq!(out.len(), 13);
        let ids: BTreeSet<u32> = out.iter().map(|r| r.player_id).collect();
        assert_eq!(ids.len(), 10);

        let unmerged = assign_ids::<u8, &str>(&pitchers, &batters, &[]);
        for p in TRANSFERRED_PLAYERS {
            let merged: Vec<u32> = out.iter().filter(|r| r.player == p).map(|r| r.player_id).collect();
            assert_eq!(merged.len(), 2);
            assert_eq!(merged[0], merged[1]);
            let min_before = unmerged
                .iter()
                .filter(|r| r.player == p)
                .map(|r| r.player_id)
                .min();
            assert_eq!(Some(merged[0]), min_before);
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let pitchers = pairs(&[("Z", 2), ("Y", 1), ("Z", 1)]);
        let batters = pairs(&[("X", 2), ("Y", 1)]);
        let a = assign_ids(&pitchers, &batters, &["Z"]);
        let b = assign_ids(&pitchers, &batters, &["Z"]);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_inputs_yield_empty_registry() {
        let reg = PlayerRegistry::<u8>::build(&[], &[], &TRANSFERRED_PLAYERS);
        assert!(reg.is_empty());
        assert_eq!(reg.distinct_ids(), 0);
    }

    #[test]
    fn registry_lookup_by_name_and_team() {
        let pitchers = pairs(&[("A", 1), ("B", 2)]);
        let batters = pairs(&[("A", 2)]);
        let reg = PlayerRegistry::build(&pitchers, &batters, &["A"]);

        assert_eq!(reg.len(), 3);
        assert_eq!(reg.distinct_ids(), 2);
        assert_eq!(reg.id_of("A", &1), Some(0));
        assert_eq!(reg.id_of("A", &2), Some(0));
        assert_eq!(reg.id_of("B", &2), Some(2));
        assert_eq!(reg.id_of("B", &1), None);
    }

    #[test]
    fn populations_are_sorted_and_deduplicated() {
        let got = compare_populations(&[1, 1, 2, 3], &[2, 2, 2, 3, 7]);
        assert_eq!(got.train_only, vec![1]);
        assert_eq!(got.test_only, vec![7]);
        assert_eq!(got.shared, vec![2, 3]);

        let empty = compare_populations::<u32>(&[], &[]);
        assert_eq!(empty.counts(), (0, 0, 0));
    }

    #[test]
    fn pitcher_hand_missing_values_take_the_mode() {
        use Hand::{Left as L, Right as R};
        let input = vec![
            (1, Some(R)),
            (1, None),
            (1, None),
            (2, None),
            (2, Some(L)),
            (2, Some(L)),
            (3, Some(R)),
            (3, Some(R)),
            (3, Some(R)),
            (4, Some(L)),
            (4, Some(L)),
            (4, Some(L)),
        ];
        let flags: Vec<u8> = impute_pitcher_hands(&input).into_iter().map(Hand::flag).collect();
        assert_eq!(flags, vec![0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn pitcher_without_any_record_falls_back_to_right() {
        let got = impute_pitcher_hands(&[(9u32, None), (9u32, None)]);
        assert_eq!(got, vec![Hand::Right, Hand::Right]);
    }

    #[test]
    fn batter_hand_switch_hitters_face_the_pitcher() {
        use Hand::{Left as L, Right as R};
        let hands: [[Option<Hand>; 4]; 6] = [
            [Some(R), None, Some(R), None],
            [Some(L), None, Some(L), Some(L)],
            [Some(L), Some(R), None, Some(R)],
            [Some(R), Some(R), Some(R), Some(R)],
            [Some(L), Some(L), Some(L), Some(L)],
            [Some(L), Some(R), Some(L), Some(R)],
        ];
        let pitcher = [R, L, R, L];

        let mut input = Vec::new();
        for (i, row) in hands.iter().enumerate() {
            for (j, h) in row.iter().enumerate() {
                input.push((i as u32 + 1, *h, pitcher[j]));
            }
        }

        let flags: Vec<u8> = impute_batter_hands(&input).into_iter().map(Hand::flag).collect();
        assert_eq!(
            flags,
            vec![
                0, 0, 0, 0, //
                1, 1, 1, 1, //
                1, 0, 1, 0, //
                0, 0, 0, 0, //
                1, 1, 1, 1, //
                1, 0, 1, 0,
            ]
        );
    }
}
