use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{info, warn};

use crate::cross_validation::PlayerKFold;
use crate::schema::{FILE_FOLDS, FOLDS_HEADER};

/// Group column value. Integer ids sort numerically and ahead of any text id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Int(i64),
    Text(String),
}

impl GroupKey {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(v) => GroupKey::Int(v),
            Err(_) => GroupKey::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Int(v) => write!(f, "{v}"),
            GroupKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSummary {
    pub fold: usize,
    pub groups: usize,
    pub valid_rows: usize,
    pub train_rows: usize,
}

#[derive(Debug, Clone)]
pub struct FoldExportResult {
    pub out_dir: PathBuf,
    pub rows: usize,
    pub groups: usize,
    pub unassigned_groups: usize,
    pub labels_processed: usize,
    pub exhausted: bool,
    pub folds: Vec<FoldSummary>,
}

#[derive(Debug, Clone)]
pub struct FoldExportArgs<'a> {
    pub input: &'a Path,
    pub out_dir: &'a Path,
    pub group_col: &'a str,
    pub label_col: &'a str,
    pub n_splits: usize,
    pub random_state: u64,
}

/// Read `(group, label)` pairs from a CSV, build player folds and write `folds.csv`.
pub fn run_fold_export(args: &FoldExportArgs<'_>) -> anyhow::Result<FoldExportResult> {
    let (groups, labels) = read_groups_and_labels(args.input, args.group_col, args.label_col)
        .with_context(|| format!("read {}", args.input.display()))?;

    let mut kf = PlayerKFold::new(args.n_splits, args.random_state)?;
    kf.build(&groups, &labels)?;
    let table = kf.table()?;

    let folds: Vec<FoldSummary> = kf
        .split()?
        .map(|s| FoldSummary {
            fold: s.fold,
            groups: table.valid_groups().get(&s.fold).map_or(0, |g| g.len()),
            valid_rows: s.valid_idx.len(),
            train_rows: s.train_idx.len(),
        })
        .collect();

    let distinct: BTreeSet<&GroupKey> = groups.iter().collect();
    let unassigned_groups = distinct.len() - table.assigned_groups();
    if unassigned_groups > 0 {
        warn!(
            unassigned_groups,
            "fold assignment stopped early; some groups have no validation fold"
        );
    }

    std::fs::create_dir_all(args.out_dir)
        .with_context(|| format!("create {}", args.out_dir.display()))?;
    write_folds(args.out_dir, &distinct, |g| table.fold_of(g)).context("write folds.csv")?;

    info!(
        rows = groups.len(),
        groups = distinct.len(),
        folds = folds.len(),
        "fold export done"
    );

    Ok(FoldExportResult {
        out_dir: args.out_dir.to_path_buf(),
        rows: groups.len(),
        groups: distinct.len(),
        unassigned_groups,
        labels_processed: table.labels_processed(),
        exhausted: table.is_exhausted(),
        folds,
    })
}

pub fn read_groups_and_labels(
    path: &Path,
    group_col: &str,
    label_col: &str,
) -> anyhow::Result<(Vec<GroupKey>, Vec<String>)> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let header = rdr.headers().context("read header")?.clone();
    let group_idx = idx(&header, group_col)?;
    let label_idx = idx(&header, label_col)?;

    let mut groups = Vec::new();
    let mut labels = Vec::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("row {}", n + 1))?;
        let group = record.get(group_idx).unwrap_or("");
        if group.is_empty() {
            anyhow::bail!("row {}: empty {group_col}", n + 1);
        }
        groups.push(GroupKey::parse(group));
        labels.push(record.get(label_idx).unwrap_or("").to_string());
    }
    Ok((groups, labels))
}

fn write_folds<F>(out_dir: &Path, groups: &BTreeSet<&GroupKey>, fold_of: F) -> anyhow::Result<()>
where
    F: Fn(&GroupKey) -> Option<usize>,
{
    let path = out_dir.join(FILE_FOLDS);
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(FOLDS_HEADER)
        .context("write folds header")?;
    for &g in groups {
        let fold = fold_of(g).map(|f| f.to_string()).unwrap_or_default();
        wtr.write_record([g.to_string(), fold])
            .context("write folds row")?;
    }
    wtr.flush().context("flush folds.csv")?;
    Ok(())
}

fn idx(header: &csv::StringRecord, name: &str) -> anyhow::Result<usize> {
    header
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("missing column: {name}"))
}
