use serde::Deserialize;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub players: PlayersConfig,
    #[serde(default)]
    pub cv: CvConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            schema_version: default_schema_version(),
            players: PlayersConfig::default(),
            cv: CvConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg = Self::from_toml_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = toml::from_str(raw).context("decode toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cv.n_splits == 0 {
            anyhow::bail!("invalid cv.n_splits=0 (must be > 0)");
        }
        if self.cv.group_col.trim().is_empty() {
            anyhow::bail!("invalid cv.group_col (must be non-empty)");
        }
        if self.cv.label_col.trim().is_empty() {
            anyhow::bail!("invalid cv.label_col (must be non-empty)");
        }
        if let Some(i) = self
            .players
            .transferred
            .iter()
            .position(|p| p.trim().is_empty())
        {
            anyhow::bail!("invalid players.transferred[{i}] (must be non-empty)");
        }
        if self.data.input_dir == self.data.out_dir {
            anyhow::bail!(
                "data.out_dir must differ from data.input_dir, got {}",
                self.data.out_dir.display()
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DataConfig {
    /// Directory holding the competition CSVs.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default = "default_train_file")]
    pub train_file: String,
    #[serde(default = "default_test_file")]
    pub test_file: String,
    #[serde(default = "default_game_info_file")]
    pub game_info_file: String,
    /// Official replacement for the test set's `pitcher`/`batter` columns.
    #[serde(default = "default_test_improvement_file")]
    pub test_improvement_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            out_dir: default_out_dir(),
            train_file: default_train_file(),
            test_file: default_test_file(),
            game_info_file: default_game_info_file(),
            test_improvement_file: default_test_improvement_file(),
        }
    }
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("read_only")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("features")
}

fn default_train_file() -> String {
    crate::schema::FILE_TRAIN.to_string()
}

fn default_test_file() -> String {
    crate::schema::FILE_TEST.to_string()
}

fn default_game_info_file() -> String {
    crate::schema::FILE_GAME_INFO.to_string()
}

fn default_test_improvement_file() -> String {
    crate::schema::FILE_TEST_IMPROVEMENT.to_string()
}

fn default_schema_version() -> String {
    crate::schema::SCHEMA_VERSION.to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlayersConfig {
    /// Names that keep a single id across clubs.
    #[serde(default = "default_transferred")]
    pub transferred: Vec<String>,
}

impl Default for PlayersConfig {
    fn default() -> Self {
        Self {
            transferred: default_transferred(),
        }
    }
}

fn default_transferred() -> Vec<String> {
    crate::players::TRANSFERRED_PLAYERS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[derive(Clone, Debug, Deserialize)]
pub struct CvConfig {
    #[serde(default = "default_n_splits")]
    pub n_splits: usize,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_group_col")]
    pub group_col: String,
    #[serde(default = "default_label_col")]
    pub label_col: String,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            n_splits: default_n_splits(),
            random_state: default_random_state(),
            group_col: default_group_col(),
            label_col: default_label_col(),
        }
    }
}

fn default_n_splits() -> usize {
    crate::cross_validation::DEFAULT_N_SPLITS
}

fn default_random_state() -> u64 {
    crate::cross_validation::DEFAULT_RANDOM_STATE
}

fn default_group_col() -> String {
    "pitcherID".to_string()
}

fn default_label_col() -> String {
    "y".to_string()
}
