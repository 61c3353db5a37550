use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use npb_prep::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "npb_prep",
    version,
    about = "Build model-ready features from the NPB pitch-by-pitch tables"
)]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Overrides `data.input_dir`.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Overrides `data.out_dir`.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut cfg = if Path::new(&args.config).exists() {
        Config::load(&args.config).context("load config")?
    } else {
        warn!(config = %args.config, "config file not found; using defaults");
        Config::default()
    };
    if let Some(dir) = args.input_dir {
        cfg.data.input_dir = dir;
    }
    if let Some(dir) = args.out_dir {
        cfg.data.out_dir = dir;
    }
    cfg.validate().context("validate config")?;

    info!(
        input_dir = %cfg.data.input_dir.display(),
        out_dir = %cfg.data.out_dir.display(),
        "starting prepare"
    );

    let res = npb_prep::prepare::run_prepare(&cfg, &args.config).context("prepare")?;

    println!("run_id={}", res.run_id);
    println!("out_dir={}", res.out_dir.display());
    println!("train_rows={}", res.train_rows);
    println!("test_rows={}", res.test_rows);
    println!("player_rows={}", res.player_rows);
    println!("player_ids={}", res.player_ids);
    println!("at_bats={}", res.at_bats);
    Ok(())
}
