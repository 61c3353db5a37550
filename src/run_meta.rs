use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::schema::FILE_RUN_META_JSON;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub schema_version: String,
    pub git_sha: String,
    pub started_at: String,
    pub config_path: String,
    pub train_rows: usize,
    pub train_duplicates_dropped: usize,
    pub test_rows: usize,
    pub player_rows: usize,
    pub player_ids: usize,
    pub transferred_players: Vec<String>,
}

impl RunMeta {
    pub fn write_to_dir(&self, out_dir: &Path) -> anyhow::Result<()> {
        let out_path = out_dir.join(FILE_RUN_META_JSON);
        let json = serde_json::to_vec_pretty(self).context("serialize run_meta.json")?;
        std::fs::write(&out_path, json).with_context(|| format!("write {}", out_path.display()))?;
        Ok(())
    }

    pub fn read_from_dir(out_dir: &Path) -> anyhow::Result<Self> {
        let path = out_dir.join(FILE_RUN_META_JSON);
        let raw = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&raw).context("decode run_meta.json")
    }
}

pub fn env_git_sha() -> String {
    std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_string())
}
