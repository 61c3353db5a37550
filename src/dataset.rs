//! Competition CSV loading.
//!
//! Training rows duplicated on every column but `id` are dropped. Base-occupancy flags become
//! 0/1. The test set's `pitcher`/`batter` columns are replaced from the official improvement file,
//! and game info is joined on `gameID`. The join must not change any row count.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::config::DataConfig;
use crate::players::Hand;

#[derive(Debug, Clone, PartialEq)]
pub struct RawPitch {
    pub id: String,
    pub game_id: i64,
    pub inning: String,
    pub total_pitching_count: u32,
    pub b: u8,
    pub s: u8,
    pub o: u8,
    pub b1: u8,
    pub b2: u8,
    pub b3: u8,
    pub pitcher: String,
    pub pitcher_hand: Option<Hand>,
    pub batter: String,
    pub batter_hand: Option<Hand>,
    pub pitch_type: Option<String>,
    pub ball_position_label: Option<String>,
    pub ball_x: Option<i64>,
    pub ball_y: Option<String>,
    pub y: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub game_id: i64,
    pub top_team: String,
    pub bottom_team: String,
    pub start: NaiveDateTime,
}

/// A pitch joined with its game.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchRow {
    pub pitch: RawPitch,
    pub game: GameInfo,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Vec<PitchRow>,
    pub test: Vec<PitchRow>,
    pub train_duplicates_dropped: usize,
}

pub fn load(cfg: &DataConfig) -> anyhow::Result<Dataset> {
    let dir = &cfg.input_dir;

    let (train, train_duplicates_dropped) =
        read_pitches(&dir.join(&cfg.train_file), true).context("load train")?;
    let (mut test, _) = read_pitches(&dir.join(&cfg.test_file), false).context("load test")?;
    let games = read_game_info(&dir.join(&cfg.game_info_file)).context("load game info")?;
    let names = read_improvement(&dir.join(&cfg.test_improvement_file))
        .context("load test improvement")?;

    apply_improvement(&mut test, &names).context("interpolate test pitcher/batter")?;

    info!(
        train = train.len(),
        train_duplicates_dropped,
        test = test.len(),
        games = games.len(),
        "loaded competition csv"
    );

    let train = merge_game_info(train, &games).context("merge game info into train")?;
    let test = merge_game_info(test, &games).context("merge game info into test")?;

    Ok(Dataset {
        train,
        test,
        train_duplicates_dropped,
    })
}

fn open(path: &Path) -> anyhow::Result<std::fs::File> {
    std::fs::File::open(path).with_context(|| format!("open {}", path.display()))
}

pub fn read_pitches(path: &Path, dedup: bool) -> anyhow::Result<(Vec<RawPitch>, usize)> {
    read_pitches_from_reader(open(path)?, dedup).with_context(|| format!("read {}", path.display()))
}

pub fn read_game_info(path: &Path) -> anyhow::Result<BTreeMap<i64, GameInfo>> {
    read_game_info_from_reader(open(path)?).with_context(|| format!("read {}", path.display()))
}

pub fn read_improvement(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    read_improvement_from_reader(open(path)?).with_context(|| format!("read {}", path.display()))
}

fn csv_reader<R: Read>(rdr: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr)
}

/// Parse pitch rows. With `dedup`, rows equal on every column except `id` keep only the first
/// occurrence. Returns the rows and the number dropped.
pub fn read_pitches_from_reader<R: Read>(
    rdr: R,
    dedup: bool,
) -> anyhow::Result<(Vec<RawPitch>, usize)> {
    let mut rdr = csv_reader(rdr);
    let header = rdr.headers().context("read header")?.clone();
    let meta = PitchHeader::new(&header)?;

    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut dropped = 0usize;
    let mut out = Vec::new();

    for (n, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("row {}", n + 1))?;
        if dedup {
            let key: Vec<String> = record
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != meta.id)
                .map(|(_, v)| v.to_string())
                .collect();
            if !seen.insert(key) {
                dropped += 1;
                continue;
            }
        }
        out.push(parse_pitch(&record, &meta).with_context(|| format!("row {}", n + 1))?);
    }

    Ok((out, dropped))
}

pub fn read_game_info_from_reader<R: Read>(rdr: R) -> anyhow::Result<BTreeMap<i64, GameInfo>> {
    let mut rdr = csv_reader(rdr);
    let header = rdr.headers().context("read header")?.clone();
    let game_id = require_col(&header, "gameid")?;
    let top_team = require_col(&header, "topteam")?;
    let bottom_team = require_col(&header, "bottomteam")?;
    let start = require_col(&header, "startdaytime")?;

    let mut out = BTreeMap::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("row {}", n + 1))?;
        let game = GameInfo {
            game_id: parse_required(&record, game_id, "gameID")?,
            top_team: field(&record, top_team).to_string(),
            bottom_team: field(&record, bottom_team).to_string(),
            start: parse_datetime(field(&record, start))
                .with_context(|| format!("row {}: invalid startDayTime", n + 1))?,
        };
        if out.insert(game.game_id, game).is_some() {
            anyhow::bail!("row {}: duplicate gameID", n + 1);
        }
    }
    Ok(out)
}

pub fn read_improvement_from_reader<R: Read>(rdr: R) -> anyhow::Result<Vec<(String, String)>> {
    let mut rdr = csv_reader(rdr);
    let header = rdr.headers().context("read header")?.clone();
    let pitcher = require_col(&header, "pitcher")?;
    let batter = require_col(&header, "batter")?;

    let mut out = Vec::new();
    for (n, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("row {}", n + 1))?;
        out.push((
            field(&record, pitcher).to_string(),
            field(&record, batter).to_string(),
        ));
    }
    Ok(out)
}

/// Overwrite `pitcher`/`batter` position by position.
pub fn apply_improvement(test: &mut [RawPitch], names: &[(String, String)]) -> anyhow::Result<()> {
    if test.len() != names.len() {
        anyhow::bail!(
            "improvement rows={} must equal test rows={}",
            names.len(),
            test.len()
        );
    }
    for (row, (pitcher, batter)) in test.iter_mut().zip(names) {
        row.pitcher = pitcher.clone();
        row.batter = batter.clone();
    }
    Ok(())
}

/// Inner join on `gameID`. Any pitch without a game is an error, since the join would shrink
/// the table.
pub fn merge_game_info(
    pitches: Vec<RawPitch>,
    games: &BTreeMap<i64, GameInfo>,
) -> anyhow::Result<Vec<PitchRow>> {
    pitches
        .into_iter()
        .map(|pitch| {
            let Some(game) = games.get(&pitch.game_id) else {
                anyhow::bail!("pitch id={} has unknown gameID={}", pitch.id, pitch.game_id);
            };
            Ok(PitchRow {
                pitch,
                game: game.clone(),
            })
        })
        .collect()
}

#[derive(Clone, Debug)]
struct PitchHeader {
    id: usize,
    game_id: usize,
    inning: usize,
    total_pitching_count: usize,
    b: usize,
    s: usize,
    o: usize,
    b1: usize,
    b2: usize,
    b3: usize,
    pitcher: usize,
    pitcher_hand: usize,
    batter: usize,
    batter_hand: usize,

    pitch_type: Option<usize>,
    ball_position_label: Option<usize>,
    ball_x: Option<usize>,
    ball_y: Option<usize>,
    y: Option<usize>,
}

impl PitchHeader {
    fn new(header: &csv::StringRecord) -> anyhow::Result<Self> {
        Ok(Self {
            id: require_col(header, "id")?,
            game_id: require_col(header, "gameid")?,
            inning: require_col(header, "inning")?,
            total_pitching_count: require_col(header, "totalpitchingcount")?,
            b: require_col(header, "b")?,
            s: require_col(header, "s")?,
            o: require_col(header, "o")?,
            b1: require_col(header, "b1")?,
            b2: require_col(header, "b2")?,
            b3: require_col(header, "b3")?,
            pitcher: require_col(header, "pitcher")?,
            pitcher_hand: require_col(header, "pitcherhand")?,
            batter: require_col(header, "batter")?,
            batter_hand: require_col(header, "batterhand")?,
            pitch_type: find_col(header, "pitchtype"),
            ball_position_label: find_col(header, "ballpositionlabel"),
            ball_x: find_col(header, "ballx"),
            ball_y: find_col(header, "bally"),
            y: find_col(header, "y"),
        })
    }
}

fn parse_pitch(record: &csv::StringRecord, meta: &PitchHeader) -> anyhow::Result<RawPitch> {
    let opt = |idx: Option<usize>| -> Option<String> {
        let v = field(record, idx?);
        (!v.is_empty()).then(|| v.to_string())
    };

    Ok(RawPitch {
        id: field(record, meta.id).to_string(),
        game_id: parse_required(record, meta.game_id, "gameID")?,
        inning: field(record, meta.inning).to_string(),
        total_pitching_count: parse_required(record, meta.total_pitching_count, "totalPitchingCount")?,
        b: parse_required(record, meta.b, "B")?,
        s: parse_required(record, meta.s, "S")?,
        o: parse_required(record, meta.o, "O")?,
        b1: parse_flag_required(record, meta.b1, "b1")?,
        b2: parse_flag_required(record, meta.b2, "b2")?,
        b3: parse_flag_required(record, meta.b3, "b3")?,
        pitcher: field(record, meta.pitcher).to_string(),
        pitcher_hand: Hand::parse(field(record, meta.pitcher_hand)),
        batter: field(record, meta.batter).to_string(),
        batter_hand: Hand::parse(field(record, meta.batter_hand)),
        pitch_type: opt(meta.pitch_type),
        ball_position_label: opt(meta.ball_position_label),
        ball_x: opt(meta.ball_x).and_then(|v| parse_i64_lenient(&v)),
        ball_y: opt(meta.ball_y),
        y: opt(meta.y).and_then(|v| v.parse::<u8>().ok()),
    })
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

fn parse_required<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> anyhow::Result<T> {
    let raw = field(record, idx);
    raw.parse::<T>()
        .ok()
        .with_context(|| format!("invalid {name}: {raw:?}"))
}

fn parse_flag_required(record: &csv::StringRecord, idx: usize, name: &str) -> anyhow::Result<u8> {
    let raw = field(record, idx);
    parse_flag(raw).with_context(|| format!("invalid {name}: {raw:?}"))
}

/// Boolean cells as written by pandas (`True`/`False`) or already as 0/1.
pub fn parse_flag(s: &str) -> Option<u8> {
    match s.trim() {
        "True" | "true" | "TRUE" | "1" | "1.0" => Some(1),
        "False" | "false" | "FALSE" | "0" | "0.0" => Some(0),
        _ => None,
    }
}

// Coordinates may be written as floats when the column had missing values.
fn parse_i64_lenient(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 {
        Some(f as i64)
    } else {
        None
    }
}

pub fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];
    let s = s.trim();
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("unrecognized datetime {s:?}"))?;
    date.and_hms_opt(0, 0, 0)
        .with_context(|| format!("unrecognized datetime {s:?}"))
}

fn find_col(header: &csv::StringRecord, name: &str) -> Option<usize> {
    header.iter().position(|h| norm(h) == name)
}

fn require_col(header: &csv::StringRecord, name: &str) -> anyhow::Result<usize> {
    find_col(header, name).with_context(|| format!("missing required column: {name}"))
}

fn norm(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
