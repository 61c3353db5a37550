use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use npb_prep::config::Config;
use npb_prep::fold_export::{run_fold_export, FoldExportArgs};

#[derive(Debug, Parser)]
#[command(
    name = "player_kfold",
    about = "Assign player groups to validation folds, rare labels first"
)]
struct Args {
    /// CSV with one row per record (e.g. features_train.csv).
    #[arg(long)]
    input: PathBuf,

    /// Output directory (default: the input's directory).
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// TOML config whose `[cv]` section supplies defaults for the flags below.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    group_col: Option<String>,

    #[arg(long)]
    label_col: Option<String>,

    #[arg(long)]
    n_splits: Option<usize>,

    #[arg(long)]
    random_state: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let cv = match &args.config {
        Some(path) => Config::load(path).context("load config")?.cv,
        None => Config::default().cv,
    };

    let out_dir = args.out_dir.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let group_col = args.group_col.unwrap_or(cv.group_col);
    let label_col = args.label_col.unwrap_or(cv.label_col);

    let res = run_fold_export(&FoldExportArgs {
        input: &args.input,
        out_dir: &out_dir,
        group_col: &group_col,
        label_col: &label_col,
        n_splits: args.n_splits.unwrap_or(cv.n_splits),
        random_state: args.random_state.unwrap_or(cv.random_state),
    })
    .with_context(|| format!("player_kfold {}", args.input.display()))?;

    println!("out_dir={}", res.out_dir.display());
    println!(
        "folds_csv={}",
        res.out_dir.join(npb_prep::schema::FILE_FOLDS).display()
    );
    println!("rows={}", res.rows);
    println!("groups={}", res.groups);
    println!("labels_processed={}", res.labels_processed);
    println!("exhausted={}", res.exhausted);
    println!("unassigned_groups={}", res.unassigned_groups);
    for f in &res.folds {
        println!(
            "fold={} groups={} valid_rows={} train_rows={}",
            f.fold, f.groups, f.valid_rows, f.train_rows
        );
    }
    Ok(())
}
