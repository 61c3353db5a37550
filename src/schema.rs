use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

pub const SCHEMA_VERSION: &str = "v0.3.1";

// Inputs.
pub const FILE_TRAIN: &str = "train_data.csv";
pub const FILE_TEST: &str = "test_data.csv";
pub const FILE_GAME_INFO: &str = "game_info.csv";
pub const FILE_TEST_IMPROVEMENT: &str = "test_data_improvement.csv";

// Outputs.
pub const FILE_FEATURES_TRAIN: &str = "features_train.csv";
pub const FILE_FEATURES_TEST: &str = "features_test.csv";
pub const FILE_PLAYER_IDS: &str = "player_ids.csv";
pub const FILE_PITCHING_PATTERNS: &str = "pitching_patterns.csv";
pub const FILE_POPULATIONS_JSON: &str = "populations.json";
pub const FILE_RUN_META_JSON: &str = "run_meta.json";
pub const FILE_FOLDS: &str = "folds.csv";
pub const FILE_SCHEMA_VERSION: &str = "schema_version.json";

pub const FEATURES_HEADER: [&str; 20] = [
    "id",
    "gameID",
    "inningNo",
    "isBottom",
    "O",
    "B",
    "S",
    "b1",
    "b2",
    "b3",
    "totalPitchingCount",
    "pitcherID",
    "batterID",
    "pitcherTeam",
    "batterTeam",
    "isPitcherHandLeft",
    "isBatterHandLeft",
    "pitcherRestDays",
    "batterRestDays",
    "y",
];

pub const PLAYER_IDS_HEADER: [&str; 3] = ["playerID", "player", "team"];

pub const PITCHING_PATTERNS_HEADER: [&str; 8] = [
    "gameID",
    "inning",
    "pitcherID",
    "batterID",
    "O",
    "ballPositionLabel",
    "pitchType",
    "ballXY",
];

pub const FOLDS_HEADER: [&str; 2] = ["group_id", "fold"];

#[derive(Debug, Serialize)]
struct SchemaVersionFile {
    schema_version: String,
    generated_at: String,
    files: BTreeMap<String, String>,
}

pub fn write_schema_version_json(
    out_dir: &Path,
    schema_version: &str,
    generated_at: &str,
) -> anyhow::Result<()> {
    let mut files = BTreeMap::new();
    files.insert(FILE_FEATURES_TRAIN.to_string(), "v2".to_string());
    files.insert(FILE_FEATURES_TEST.to_string(), "v2".to_string());
    files.insert(FILE_PLAYER_IDS.to_string(), "v1".to_string());
    files.insert(FILE_PITCHING_PATTERNS.to_string(), "v1".to_string());
    files.insert(FILE_POPULATIONS_JSON.to_string(), "v1".to_string());

    let payload = SchemaVersionFile {
        schema_version: schema_version.to_string(),
        generated_at: generated_at.to_string(),
        files,
    };

    let out_path = out_dir.join(FILE_SCHEMA_VERSION);
    let json = serde_json::to_vec_pretty(&payload).context("serialize schema_version.json")?;
    std::fs::write(&out_path, json).with_context(|| format!("write {}", out_path.display()))?;
    Ok(())
}

pub fn make_run_id(started_at: &chrono::NaiveDateTime) -> String {
    format!("prep_{}", started_at.format("%Y%m%d_%H%M%S"))
}
