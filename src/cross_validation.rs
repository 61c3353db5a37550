//! Grouped K-fold splitting that spreads rare labels across folds.
//!
//! Labels are visited from the fewest records to the most. Each label's not-yet-assigned
//! groups are shuffled and dealt round-robin into the folds, so a label with only a handful of
//! groups still lands in as many folds as it can before common labels fill them.
//!
//! Early exit: the first label whose groups are all already assigned stops the whole build.
//! Labels after it are never visited, even if they own unassigned groups. [`FoldTable::is_exhausted`]
//! reports when this happened.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

pub const DEFAULT_N_SPLITS: usize = 5;
pub const DEFAULT_RANDOM_STATE: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FoldError {
    #[error("valid folds are determined after calling `build`")]
    NotBuilt,
    #[error("n_splits must be > 0")]
    ZeroSplits,
    #[error("groups and labels differ in length: {groups} vs {labels}")]
    LengthMismatch { groups: usize, labels: usize },
}

/// Result of one build: fold index to the groups validated in that fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldTable<G> {
    valid_groups: BTreeMap<usize, BTreeSet<G>>,
    record_groups: Vec<G>,
    labels_processed: usize,
    exhausted: bool,
}

impl<G: Ord> FoldTable<G> {
    pub fn valid_groups(&self) -> &BTreeMap<usize, BTreeSet<G>> {
        &self.valid_groups
    }

    pub fn labels_processed(&self) -> usize {
        self.labels_processed
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn fold_of(&self, group: &G) -> Option<usize> {
        self.valid_groups
            .iter()
            .find(|(_, ids)| ids.contains(group))
            .map(|(fold, _)| *fold)
    }

    pub fn assigned_groups(&self) -> usize {
        self.valid_groups.values().map(BTreeSet::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold: usize,
    pub train_idx: Vec<usize>,
    pub valid_idx: Vec<usize>,
}

/// Lazily yields one [`FoldSplit`] per fold, in fold order.
pub struct Splits<'a, G> {
    record_groups: &'a [G],
    folds: btree_map::Iter<'a, usize, BTreeSet<G>>,
}

impl<G: Ord> Iterator for Splits<'_, G> {
    type Item = FoldSplit;

    fn next(&mut self) -> Option<Self::Item> {
        let (&fold, ids) = self.folds.next()?;
        let mut train_idx = Vec::with_capacity(self.record_groups.len());
        let mut valid_idx = Vec::new();
        for (idx, group) in self.record_groups.iter().enumerate() {
            if ids.contains(group) {
                valid_idx.push(idx);
            } else {
                train_idx.push(idx);
            }
        }
        Some(FoldSplit {
            fold,
            train_idx,
            valid_idx,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.folds.size_hint()
    }
}

impl<G: Ord> ExactSizeIterator for Splits<'_, G> {}

#[derive(Debug, Clone)]
enum State<G> {
    Unbuilt,
    Built(FoldTable<G>),
}

#[derive(Debug, Clone)]
pub struct PlayerKFold<G> {
    n_splits: usize,
    random_state: u64,
    state: State<G>,
}

impl<G: Ord + Clone> PlayerKFold<G> {
    pub fn new(n_splits: usize, random_state: u64) -> Result<Self, FoldError> {
        if n_splits == 0 {
            return Err(FoldError::ZeroSplits);
        }
        Ok(Self {
            n_splits,
            random_state,
            state: State::Unbuilt,
        })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn random_state(&self) -> u64 {
        self.random_state
    }

    /// Assign groups to folds using a generator seeded from `random_state`.
    pub fn build<L: Ord>(&mut self, groups: &[G], labels: &[L]) -> Result<&FoldTable<G>, FoldError> {
        let mut rng = StdRng::seed_from_u64(self.random_state);
        self.build_with_rng(groups, labels, &mut rng)
    }

    /// Same as [`PlayerKFold::build`] with a caller-supplied generator. Replaces any earlier build.
    pub fn build_with_rng<L, R>(
        &mut self,
        groups: &[G],
        labels: &[L],
        rng: &mut R,
    ) -> Result<&FoldTable<G>, FoldError>
    where
        L: Ord,
        R: Rng + ?Sized,
    {
        if groups.len() != labels.len() {
            return Err(FoldError::LengthMismatch {
                groups: groups.len(),
                labels: labels.len(),
            });
        }

        // label -> (record count, distinct groups), with first-encounter order kept for ties.
        let mut encounter: Vec<&L> = Vec::new();
        let mut by_label: BTreeMap<&L, (usize, BTreeSet<&G>)> = BTreeMap::new();
        for (group, label) in groups.iter().zip(labels) {
            let e = by_label.entry(label).or_insert_with(|| {
                encounter.push(label);
                (0, BTreeSet::new())
            });
            e.0 += 1;
            e.1.insert(group);
        }

        let mut ranked: Vec<(&L, usize)> = encounter
            .into_iter()
            .map(|l| (l, by_label.get(l).map(|(n, _)| *n).unwrap_or(0)))
            .collect();
        ranked.sort_by_key(|(_, n)| *n);

        let mut assigned: BTreeSet<&G> = BTreeSet::new();
        let mut valid_groups: BTreeMap<usize, BTreeSet<G>> = BTreeMap::new();
        let mut labels_processed = 0usize;
        let mut exhausted = false;

        for (label, records) in &ranked {
            let Some((_, label_groups)) = by_label.get(label) else {
                continue;
            };
            let mut ids_left: Vec<&G> = label_groups.difference(&assigned).copied().collect();
            if ids_left.is_empty() {
                debug!(
                    records,
                    labels_skipped = ranked.len() - labels_processed,
                    "no groups left; fold assignment ended"
                );
                exhausted = true;
                break;
            }

            ids_left.shuffle(rng);
            for (i, id) in ids_left.iter().enumerate() {
                valid_groups
                    .entry(i % self.n_splits)
                    .or_default()
                    .insert((*id).clone());
            }
            assigned.extend(ids_left);
            labels_processed += 1;
        }

        let table = FoldTable {
            valid_groups,
            record_groups: groups.to_vec(),
            labels_processed,
            exhausted,
        };
        info!(
            n_splits = self.n_splits,
            folds = table.valid_groups.len(),
            records = groups.len(),
            groups_assigned = table.assigned_groups(),
            labels = ranked.len(),
            labels_processed,
            exhausted,
            "built player folds"
        );

        self.state = State::Built(table);
        self.table()
    }

    pub fn table(&self) -> Result<&FoldTable<G>, FoldError> {
        match &self.state {
            State::Built(table) => Ok(table),
            State::Unbuilt => Err(FoldError::NotBuilt),
        }
    }

    pub fn valid_groups(&self) -> Result<&BTreeMap<usize, BTreeSet<G>>, FoldError> {
        Ok(self.table()?.valid_groups())
    }

    /// Train/validation record indices for each fold of the current build.
    pub fn split(&self) -> Result<Splits<'_, G>, FoldError> {
        let table = self.table()?;
        Ok(Splits {
            record_groups: &table.record_groups,
            folds: table.valid_groups.iter(),
        })
    }

    /// Validation fold of every record, `None` for groups the build never reached.
    pub fn record_folds(&self) -> Result<Vec<Option<usize>>, FoldError> {
        let table = self.table()?;
        let lookup: BTreeMap<&G, usize> = table
            .valid_groups
            .iter()
            .flat_map(|(fold, ids)| ids.iter().map(move |id| (id, *fold)))
            .collect();
        Ok(table
            .record_groups
            .iter()
            .map(|g| lookup.get(g).copied())
            .collect())
    }
}

impl<G: Ord + Clone> Default for PlayerKFold<G> {
    fn default() -> Self {
        Self {
            n_splits: DEFAULT_N_SPLITS,
            random_state: DEFAULT_RANDOM_STATE,
            state: State::Unbuilt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(layout: &[(&'static str, &[u32], usize)]) -> (Vec<u32>, Vec<&'static str>) {
        // (label, groups, records per group)
        let mut groups = Vec::new();
        let mut labels = Vec::new();
        for (label, ids, per_group) in layout {
            for id in *ids {
                for _ in 0..*per_group {
                    groups.push(*id);
                    labels.push(*label);
                }
            }
        }
        (groups, labels)
    }

    #[test]
    fn accessors_fail_before_build() {
        let kf = PlayerKFold::<u32>::new(3, 1).unwrap();
        assert_eq!(kf.valid_groups().err(), Some(FoldError::NotBuilt));
        assert!(matches!(kf.split(), Err(FoldError::NotBuilt)));
        assert_eq!(kf.record_folds(), Err(FoldError::NotBuilt));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            PlayerKFold::<u32>::new(0, 1).err(),
            Some(FoldError::ZeroSplits)
        );
        let mut kf = PlayerKFold::<u32>::default();
        assert_eq!(kf.n_splits(), 5);
        assert_eq!(kf.random_state(), 1);
        assert_eq!(
            kf.build(&[1, 2], &["a"]).err(),
            Some(FoldError::LengthMismatch {
                groups: 2,
                labels: 1
            })
        );
    }

    #[test]
    fn rare_labels_are_split_evenly() {
        let (groups, labels) = records(&[
            ("c", &[5, 6, 7, 8, 9, 10, 11, 12], 1),
            ("a", &[1, 2], 1),
            ("b", &[3, 4], 1),
        ]);
        let mut kf = PlayerKFold::new(2, 1).unwrap();
        let table = kf.build(&groups, &labels).unwrap();

        assert_eq!(table.valid_groups().len(), 2);
        for ids in table.valid_groups().values() {
            assert_eq!(ids.iter().filter(|g| (1..=2).contains(*g)).count(), 1);
            assert_eq!(ids.iter().filter(|g| (3..=4).contains(*g)).count(), 1);
            assert_eq!(ids.iter().filter(|g| (5..=12).contains(*g)).count(), 4);
        }
        assert!(!table.is_exhausted());
        assert_eq!(table.labels_processed(), 3);
    }

    #[test]
    fn every_group_lands_in_exactly_one_fold() {
        let (groups, labels) = records(&[
            ("x", &[1, 2, 3], 2),
            ("y", &[3, 4, 5, 6, 7], 3),
            ("z", &[7, 8, 9, 10, 11, 12, 13], 4),
        ]);
        let mut kf = PlayerKFold::new(4, 7).unwrap();
        kf.build(&groups, &labels).unwrap();

        let folds = kf.valid_groups().unwrap();
        let mut seen: BTreeSet<u32> = BTreeSet::new();
        for ids in folds.values() {
            for id in ids {
                assert!(seen.insert(*id), "group {id} in two folds");
            }
        }
        let expected: BTreeSet<u32> = groups.iter().copied().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn splits_partition_record_indices() {
        let (groups, labels) = records(&[("x", &[1, 2, 3], 2), ("y", &[4, 5, 6, 7], 3)]);
        let mut kf = PlayerKFold::new(3, 1).unwrap();
        kf.build(&groups, &labels).unwrap();
        let folds = kf.valid_groups().unwrap().clone();

        let splits: Vec<FoldSplit> = kf.split().unwrap().collect();
        assert_eq!(splits.len(), 3);
        for s in &splits {
            assert_eq!(s.train_idx.len() + s.valid_idx.len(), groups.len());
            for &i in &s.valid_idx {
                assert!(folds[&s.fold].contains(&groups[i]));
            }
            for &i in &s.train_idx {
                assert!(!folds[&s.fold].contains(&groups[i]));
            }
            assert!(s.train_idx.windows(2).all(|w| w[0] < w[1]));
        }

        let again: Vec<FoldSplit> = kf.split().unwrap().collect();
        assert_eq!(splits, again);
    }

    #[test]
    fn same_seed_same_folds() {
        let (groups, labels) = records(&[
            ("x", &[1, 2, 3, 4], 1),
            ("y", &[5, 6, 7, 8, 9, 10, 11], 2),
        ]);
        let mut a = PlayerKFold::new(3, 42).unwrap();
        let mut b = PlayerKFold::new(3, 42).unwrap();
        let ta = a.build(&groups, &labels).unwrap().clone();
        let tb = b.build(&groups, &labels).unwrap().clone();
        assert_eq!(ta, tb);

        let mut injected = PlayerKFold::new(3, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let tc = injected
            .build_with_rng(&groups, &labels, &mut rng)
            .unwrap()
            .clone();
        assert_eq!(ta, tc);
    }

    #[test]
    fn rebuild_replaces_previous_table() {
        let mut kf = PlayerKFold::new(2, 1).unwrap();
        kf.build(&[1u32, 2], &["a", "a"]).unwrap();
        kf.build(&[7u32], &["b"]).unwrap();
        let folds = kf.valid_groups().unwrap();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[&0], BTreeSet::from([7]));
    }

    #[test]
    fn early_exit_skips_remaining_labels() {
        // "first" (2 records) claims groups 1 and 2. "rare" (3 records) has nothing left, so
        // "common" (5 records) is never visited and its groups stay unassigned.
        let (mut groups, mut labels) = records(&[("first", &[1, 2], 1), ("rare", &[1, 2], 1)]);
        groups.push(2);
        labels.push("rare");
        let (g2, l2) = records(&[("common", &[3, 4, 5, 6, 7], 1)]);
        groups.extend(g2);
        labels.extend(l2);

        let mut kf = PlayerKFold::new(2, 1).unwrap();
        let table = kf.build(&groups, &labels).unwrap();
        assert!(table.is_exhausted());
        assert_eq!(table.labels_processed(), 1);
        assert_eq!(table.assigned_groups(), 2);
        assert_eq!(table.fold_of(&3), None);

        let folds = kf.record_folds().unwrap();
        for (g, f) in groups.iter().zip(&folds) {
            assert_eq!(f.is_some(), *g <= 2);
        }
    }

    #[test]
    fn small_label_fills_leading_folds_only() {
        let mut kf = PlayerKFold::new(5, 1).unwrap();
        let table = kf.build(&[1u32, 2, 2], &[0u8, 0, 0]).unwrap();
        assert_eq!(table.valid_groups().keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(kf.split().unwrap().len(), 2);
    }
}
