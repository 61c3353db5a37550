use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::dataset::{Dataset, PitchRow};
use crate::inning::Inning;
use crate::pitching_pattern::{ball_xy, patterns_by_at_bat, AtBatKey, PitchEvent, PitchPatterns};
use crate::players::{
    compare_populations, impute_batter_hands, impute_pitcher_hands, Hand, IdPopulations,
    PlayerRegistry,
};
use crate::rest::days_since_last_appearance;
use crate::run_meta::{env_git_sha, RunMeta};
use crate::schema::{
    make_run_id, write_schema_version_json, FEATURES_HEADER, FILE_FEATURES_TEST,
    FILE_FEATURES_TRAIN, FILE_PITCHING_PATTERNS, FILE_PLAYER_IDS, FILE_POPULATIONS_JSON,
    PITCHING_PATTERNS_HEADER, PLAYER_IDS_HEADER,
};
use crate::teams::Team;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: String,
    pub game_id: i64,
    pub inning: Inning,
    pub o: u8,
    pub b: u8,
    pub s: u8,
    pub b1: u8,
    pub b2: u8,
    pub b3: u8,
    pub total_pitching_count: u32,
    pub pitcher_id: u32,
    pub batter_id: u32,
    pub pitcher_team: Team,
    pub batter_team: Team,
    pub pitcher_hand: Hand,
    pub batter_hand: Hand,
    pub pitcher_rest_days: Option<f64>,
    pub batter_rest_days: Option<f64>,
    pub y: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Populations {
    pub pitcher: IdPopulations<u32>,
    pub batter: IdPopulations<u32>,
}

#[derive(Debug, Clone)]
pub struct Features {
    pub train: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
    pub registry: PlayerRegistry<Team>,
    pub patterns: BTreeMap<AtBatKey, PitchPatterns>,
    pub populations: Populations,
}

#[derive(Debug, Clone)]
pub struct PrepareResult {
    pub out_dir: PathBuf,
    pub run_id: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub player_rows: usize,
    pub player_ids: usize,
    pub at_bats: usize,
}

pub fn run_prepare(cfg: &Config, config_path: &str) -> anyhow::Result<PrepareResult> {
    let started_at = chrono::Utc::now().naive_utc();
    let run_id = make_run_id(&started_at);
    let out_dir = cfg.data.out_dir.clone();

    std::fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let ds = crate::dataset::load(&cfg.data).context("load dataset")?;
    let features = build_features(&ds, &cfg.players.transferred)?;

    write_features(&out_dir.join(FILE_FEATURES_TRAIN), &features.train)
        .context("write features_train.csv")?;
    write_features(&out_dir.join(FILE_FEATURES_TEST), &features.test)
        .context("write features_test.csv")?;
    write_player_ids(&out_dir, &features.registry).context("write player_ids.csv")?;
    write_patterns(&out_dir, &features.patterns).context("write pitching_patterns.csv")?;
    write_populations(&out_dir, &features.populations).context("write populations.json")?;

    let generated_at = started_at.format("%Y-%m-%dT%H:%M:%S").to_string();
    write_schema_version_json(&out_dir, &cfg.schema_version, &generated_at)?;

    RunMeta {
        run_id: run_id.clone(),
        schema_version: cfg.schema_version.clone(),
        git_sha: env_git_sha(),
        started_at: generated_at,
        config_path: config_path.to_string(),
        train_rows: features.train.len(),
        train_duplicates_dropped: ds.train_duplicates_dropped,
        test_rows: features.test.len(),
        player_rows: features.registry.len(),
        player_ids: features.registry.distinct_ids(),
        transferred_players: cfg.players.transferred.clone(),
    }
    .write_to_dir(&out_dir)?;

    info!(run_id = %run_id, out_dir = %out_dir.display(), "prepare done");

    Ok(PrepareResult {
        out_dir,
        run_id,
        train_rows: features.train.len(),
        test_rows: features.test.len(),
        player_rows: features.registry.len(),
        player_ids: features.registry.distinct_ids(),
        at_bats: features.patterns.len(),
    })
}

struct Located {
    inning: Inning,
    pitcher_team: Team,
    batter_team: Team,
}

fn locate(row: &PitchRow) -> anyhow::Result<Located> {
    let inning = Inning::parse(&row.pitch.inning)
        .with_context(|| format!("pitch id={}", row.pitch.id))?;
    let (top, bottom) = (&row.game.top_team, &row.game.bottom_team);
    Ok(Located {
        inning,
        pitcher_team: Team::pitcher_team(top, bottom, inning.half)
            .with_context(|| format!("pitch id={}", row.pitch.id))?,
        batter_team: Team::batter_team(top, bottom, inning.half)
            .with_context(|| format!("pitch id={}", row.pitch.id))?,
    })
}

/// Derive model features for train and test together.
///
/// Ids, hand imputation and rest days are computed over both sets, so a player seen in either
/// set keeps one identity. Pitching patterns cover training at-bats only.
pub fn build_features<A: AsRef<str>>(ds: &Dataset, aliases: &[A]) -> anyhow::Result<Features> {
    let rows: Vec<&PitchRow> = ds.train.iter().chain(&ds.test).collect();
    let located = rows
        .iter()
        .map(|r| locate(r))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let pitchers: Vec<(String, Team)> = rows
        .iter()
        .zip(&located)
        .map(|(r, l)| (r.pitch.pitcher.clone(), l.pitcher_team))
        .collect();
    let batters: Vec<(String, Team)> = rows
        .iter()
        .zip(&located)
        .map(|(r, l)| (r.pitch.batter.clone(), l.batter_team))
        .collect();

    let registry = PlayerRegistry::build(&pitchers, &batters, aliases);
    info!(
        rows = registry.len(),
        ids = registry.distinct_ids(),
        "assigned player ids"
    );

    let lookup = |pairs: &[(String, Team)], role: &str| -> anyhow::Result<Vec<u32>> {
        pairs
            .iter()
            .map(|(player, team)| {
                registry
                    .id_of(player, team)
                    .with_context(|| format!("no {role} id for {player} ({})", team.name()))
            })
            .collect()
    };
    let pitcher_ids = lookup(&pitchers[..], "pitcher")?;
    let batter_ids = lookup(&batters[..], "batter")?;

    let pitcher_hands = impute_pitcher_hands(
        &pitcher_ids
            .iter()
            .zip(&rows)
            .map(|(&id, r)| (id, r.pitch.pitcher_hand))
            .collect::<Vec<_>>(),
    );
    let batter_hands = impute_batter_hands(
        &batter_ids
            .iter()
            .zip(&rows)
            .zip(&pitcher_hands)
            .map(|((&id, r), &ph)| (id, r.pitch.batter_hand, ph))
            .collect::<Vec<_>>(),
    );

    let appearances = |ids: &[u32]| -> Vec<_> {
        ids.iter()
            .zip(&rows)
            .map(|(&id, r)| (id, r.game.start))
            .collect()
    };
    let pitcher_rest = days_since_last_appearance(&appearances(&pitcher_ids[..]));
    let batter_rest = days_since_last_appearance(&appearances(&batter_ids[..]));

    let mut all: Vec<FeatureRow> = Vec::with_capacity(rows.len());
    for (i, r) in rows.iter().enumerate() {
        let p = &r.pitch;
        let l = &located[i];
        all.push(FeatureRow {
            id: p.id.clone(),
            game_id: p.game_id,
            inning: l.inning,
            o: p.o,
            b: p.b,
            s: p.s,
            b1: p.b1,
            b2: p.b2,
            b3: p.b3,
            total_pitching_count: p.total_pitching_count,
            pitcher_id: pitcher_ids[i],
            batter_id: batter_ids[i],
            pitcher_team: l.pitcher_team,
            batter_team: l.batter_team,
            pitcher_hand: pitcher_hands[i],
            batter_hand: batter_hands[i],
            pitcher_rest_days: pitcher_rest[i],
            batter_rest_days: batter_rest[i],
            y: p.y,
        });
    }
    let test = all.split_off(ds.train.len());
    let train = all;

    let events: Vec<PitchEvent> = train
        .iter()
        .zip(&ds.train)
        .map(|(f, r)| PitchEvent {
            key: AtBatKey {
                game_id: f.game_id,
                inning: f.inning,
                pitcher_id: f.pitcher_id,
                batter_id: f.batter_id,
                outs: f.o,
            },
            total_pitching_count: f.total_pitching_count,
            ball_position_label: r.pitch.ball_position_label.clone(),
            pitch_type: r.pitch.pitch_type.clone(),
            ball_xy: r
                .pitch
                .ball_x
                .zip(r.pitch.ball_y.as_deref())
                .map(|(x, y)| ball_xy(x, y)),
        })
        .collect();
    let patterns = patterns_by_at_bat(&events).context("extract pitching patterns")?;

    let populations = Populations {
        pitcher: compare_populations(
            &train.iter().map(|f| f.pitcher_id).collect::<Vec<_>>(),
            &test.iter().map(|f| f.pitcher_id).collect::<Vec<_>>(),
        ),
        batter: compare_populations(
            &train.iter().map(|f| f.batter_id).collect::<Vec<_>>(),
            &test.iter().map(|f| f.batter_id).collect::<Vec<_>>(),
        ),
    };
    for (role, pop) in [("pitcher", &populations.pitcher), ("batter", &populations.batter)] {
        let (train_only, test_only, shared) = pop.counts();
        info!(role, train_only, test_only, shared, "id populations");
    }

    Ok(Features {
        train,
        test,
        registry,
        patterns,
        populations,
    })
}

fn write_features(path: &Path, rows: &[FeatureRow]) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(FEATURES_HEADER)
        .context("write features header")?;

    for f in rows {
        wtr.write_record([
            f.id.clone(),
            f.game_id.to_string(),
            f.inning.no.to_string(),
            f.inning.half.is_bottom().to_string(),
            f.o.to_string(),
            f.b.to_string(),
            f.s.to_string(),
            f.b1.to_string(),
            f.b2.to_string(),
            f.b3.to_string(),
            f.total_pitching_count.to_string(),
            f.pitcher_id.to_string(),
            f.batter_id.to_string(),
            f.pitcher_team.to_string(),
            f.batter_team.to_string(),
            f.pitcher_hand.flag().to_string(),
            f.batter_hand.flag().to_string(),
            fmt_days(f.pitcher_rest_days),
            fmt_days(f.batter_rest_days),
            f.y.map(|y| y.to_string()).unwrap_or_default(),
        ])
        .context("write features row")?;
    }

    wtr.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn write_player_ids(out_dir: &Path, registry: &PlayerRegistry<Team>) -> anyhow::Result<()> {
    let path = out_dir.join(FILE_PLAYER_IDS);
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(PLAYER_IDS_HEADER)
        .context("write player_ids header")?;
    for r in registry.rows() {
        wtr.write_record([r.player_id.to_string(), r.player.clone(), r.team.to_string()])
            .context("write player_ids row")?;
    }
    wtr.flush().context("flush player_ids.csv")?;
    Ok(())
}

fn write_patterns(
    out_dir: &Path,
    patterns: &BTreeMap<AtBatKey, PitchPatterns>,
) -> anyhow::Result<()> {
    let path = out_dir.join(FILE_PITCHING_PATTERNS);
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .with_context(|| format!("open {}", path.display()))?;
    wtr.write_record(PITCHING_PATTERNS_HEADER)
        .context("write patterns header")?;
    for (k, p) in patterns {
        wtr.write_record([
            k.game_id.to_string(),
            k.inning.to_string(),
            k.pitcher_id.to_string(),
            k.batter_id.to_string(),
            k.outs.to_string(),
            p.ball_position_label.clone(),
            p.pitch_type.clone(),
            p.ball_xy.clone(),
        ])
        .context("write patterns row")?;
    }
    wtr.flush().context("flush pitching_patterns.csv")?;
    Ok(())
}

fn write_populations(out_dir: &Path, populations: &Populations) -> anyhow::Result<()> {
    let path = out_dir.join(FILE_POPULATIONS_JSON);
    let json = serde_json::to_vec_pretty(populations).context("serialize populations.json")?;
    std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn fmt_days(v: Option<f64>) -> String {
    match v {
        Some(d) if d.is_finite() => format!("{d:.6}"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{parse_datetime, GameInfo, RawPitch};

    fn pitch(id: &str, game_id: i64, inning: &str, count: u32, pitcher: &str, batter: &str) -> RawPitch {
        RawPitch {
            id: id.to_string(),
            game_id,
            inning: inning.to_string(),
            total_pitching_count: count,
            b: 0,
            s: 0,
            o: 0,
            b1: 0,
            b2: 0,
            b3: 0,
            pitcher: pitcher.to_string(),
            pitcher_hand: Some(Hand::Right),
            batter: batter.to_string(),
            batter_hand: None,
            pitch_type: Some("ストレート".to_string()),
            ball_position_label: None,
            ball_x: Some(5),
            ball_y: Some("C".to_string()),
            y: Some(0),
        }
    }

    fn game(game_id: i64, start: &str) -> GameInfo {
        GameInfo {
            game_id,
            top_team: "中日".to_string(),
            bottom_team: "阪神".to_string(),
            start: parse_datetime(start).unwrap(),
        }
    }

    fn dataset() -> Dataset {
        let g1 = game(1, "2020-06-19 18:00:00");
        let g2 = game(2, "2020-06-21 18:00:00");
        let row = |p: RawPitch, g: &GameInfo| PitchRow {
            pitch: p,
            game: g.clone(),
        };
        Dataset {
            train: vec![
                row(pitch("0", 1, "1回表", 1, "P", "X"), &g1),
                row(pitch("1", 1, "1回表", 3, "P", "X"), &g1),
                row(pitch("2", 1, "1回裏", 1, "Q", "Y"), &g1),
            ],
            test: vec![row(pitch("3", 2, "2回表", 1, "P", "Z"), &g2)],
            train_duplicates_dropped: 0,
        }
    }

    #[test]
    fn features_share_ids_across_train_and_test() {
        let f = build_features(&dataset(), &["nobody"]).unwrap();
        assert_eq!(f.train.len(), 3);
        assert_eq!(f.test.len(), 1);

        assert_eq!(f.train[0].pitcher_team, Team::Hanshin);
        assert_eq!(f.train[0].batter_team, Team::Chunichi);
        assert_eq!(f.train[2].pitcher_team, Team::Chunichi);
        assert_eq!(f.test[0].pitcher_id, f.train[0].pitcher_id);

        assert_eq!(f.train[0].pitcher_rest_days, None);
        assert_eq!(f.test[0].pitcher_rest_days, Some(2.0));
        assert_eq!(f.test[0].batter_rest_days, None);

        // Right-handed pitcher, batter with no record: batter is set opposite.
        assert_eq!(f.train[0].batter_hand, Hand::Left);

        let (train_only, test_only, shared) = f.populations.pitcher.counts();
        assert_eq!((train_only, test_only, shared), (1, 0, 1));
        let (train_only, test_only, shared) = f.populations.batter.counts();
        assert_eq!((train_only, test_only, shared), (2, 1, 0));
    }

    #[test]
    fn patterns_cover_training_at_bats() {
        let f = build_features(&dataset(), &[] as &[&str]).unwrap();
        assert_eq!(f.patterns.len(), 2);
        let first = f.patterns.values().next().unwrap();
        assert_eq!(
            first.pitch_type,
            format!("ストレート {} ストレート", crate::pitching_pattern::NO_RECORD)
        );
        assert_eq!(first.ball_xy, format!("5C {} 5C", crate::pitching_pattern::NO_RECORD));
    }

    #[test]
    fn unknown_team_aborts() {
        let mut ds = dataset();
        ds.test[0].game.top_team = "巨神".to_string();
        assert!(build_features(&ds, &[] as &[&str]).is_err());
    }

    #[test]
    fn days_are_blank_when_missing() {
        assert_eq!(fmt_days(None), "");
        assert_eq!(fmt_days(Some(1.5)), "1.500000");
    }
}
