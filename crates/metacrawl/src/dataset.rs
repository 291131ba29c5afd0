use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::types::{GameRecord, Platform, RecordKey};

const GENRE_SEPARATOR: &str = "; ";

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV failure on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Could not move dataset into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
    /// A partial record arrived for a key that already holds a complete one.
    Retained,
}

/// Ordered records, unique by `(title, platform)`. Later upserts replace
/// earlier ones in place, so first-seen order is kept. A partial record never
/// replaces a complete one.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<GameRecord>,
    index: HashMap<RecordKey, usize>,
    partial: HashSet<RecordKey>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: GameRecord) -> Upsert {
        self.partial.remove(&record.key());
        self.replace(record)
    }

    pub fn upsert_partial(&mut self, record: GameRecord) -> Upsert {
        let key = record.key();
        if self.index.contains_key(&key) && !self.partial.contains(&key) {
            return Upsert::Retained;
        }
        self.partial.insert(key);
        self.replace(record)
    }

    fn replace(&mut self, record: GameRecord) -> Upsert {
        match self.index.get(&record.key()) {
            Some(&i) if self.records[i] == record => Upsert::Unchanged,
            Some(&i) => {
                self.records[i] = record;
                Upsert::Updated
            }
            None => {
                self.index.insert(record.key(), self.records.len());
                self.records.push(record);
                Upsert::Inserted
            }
        }
    }

    pub fn is_partial(&self, key: &RecordKey) -> bool {
        self.partial.contains(key)
    }

    pub fn get(&self, key: &RecordKey) -> Option<&GameRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[GameRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<GameRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, WriteError> {
        let csv_err = |source| WriteError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let mut dataset = Self::new();
        for row in reader.deserialize::<GameRow>() {
            dataset.upsert(row.map_err(csv_err)?.into());
        }
        Ok(dataset)
    }

    /// Writes through a temporary sibling file, so `path` holds either the old
    /// contents or the complete new ones. An existing file keeps its permissions.
    pub fn save(&self, path: &Path) -> Result<(), WriteError> {
        let io_err = |source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(BufWriter::new(tmp.as_file()));
            let csv_err = |source| WriteError::Csv {
                path: path.to_path_buf(),
                source,
            };
            writer.write_record(GameRow::HEADERS).map_err(csv_err)?;
            for record in &self.records {
                writer.serialize(GameRow::from(record)).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        if let Ok(existing) = fs::metadata(path) {
            tmp.as_file()
                .set_permissions(existing.permissions())
                .map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;

        tmp.persist(path).map_err(|source| WriteError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub path: PathBuf,
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub retained: usize,
}

impl FromIterator<GameRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = GameRecord>>(iter: I) -> Self {
        let mut dataset = Self::new();
        for record in iter {
            dataset.upsert(record);
        }
        dataset
    }
}

/// Merges `incoming` into the dataset at `path` (created if missing) and
/// atomically replaces the file. Rows already on disk count as complete, so a
/// partial incoming record only lands when its key is new.
pub fn write_dataset(path: &Path, incoming: &Dataset) -> Result<WriteResult, WriteError> {
    let mut dataset = if path.exists() {
        log::info!("Merging into existing dataset {}", path.display());
        Dataset::load(path)?
    } else {
        log::info!("Creating dataset {}", path.display());
        Dataset::new()
    };

    let (mut inserted, mut updated, mut unchanged, mut retained) = (0, 0, 0, 0);
    for record in incoming.records() {
        let outcome = if incoming.is_partial(&record.key()) {
            dataset.upsert_partial(record.clone())
        } else {
            dataset.upsert(record.clone())
        };
        match outcome {
            Upsert::Inserted => inserted += 1,
            Upsert::Updated => updated += 1,
            Upsert::Unchanged => unchanged += 1,
            Upsert::Retained => {
                log::warn!(
                    "Keeping stored {} [{}] over a partial re-scrape",
                    record.title,
                    record.platform
                );
                retained += 1;
            }
        }
    }

    dataset.save(path)?;
    log::info!(
        "Wrote {} record(s) to {} ({} new, {} updated)",
        dataset.len(),
        path.display(),
        inserted,
        updated
    );

    Ok(WriteResult {
        path: path.to_path_buf(),
        total: dataset.len(),
        inserted,
        updated,
        unchanged,
        retained,
    })
}

/// Writes one URL per line; an empty list removes the file.
pub fn write_url_list(path: &Path, urls: &[String]) -> Result<(), WriteError> {
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    if urls.is_empty() {
        return match fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(e)),
            _ => Ok(()),
        };
    }
    let mut out = BufWriter::new(File::create(path).map_err(io_err)?);
    for url in urls {
        writeln!(out, "{}", url).map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

pub fn read_url_list(path: &Path) -> Result<Vec<String>, WriteError> {
    let contents = fs::read_to_string(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Serialize, Deserialize)]
struct GameRow {
    title: String,
    platform: Platform,
    release_date: Option<NaiveDate>,
    critic_score: Option<u8>,
    user_score: Option<f32>,
    genres: Option<String>,
    developer: Option<String>,
    publisher: Option<String>,
    rating: Option<String>,
    description: Option<String>,
    source_url: String,
}

impl GameRow {
    const HEADERS: [&'static str; 11] = [
        "title",
        "platform",
        "release_date",
        "critic_score",
        "user_score",
        "genres",
        "developer",
        "publisher",
        "rating",
        "description",
        "source_url",
    ];
}

impl From<&GameRecord> for GameRow {
    fn from(r: &GameRecord) -> Self {
        Self {
            title: r.title.clone(),
            platform: r.platform,
            release_date: r.release_date,
            critic_score: r.critic_score,
            user_score: r.user_score,
            genres: (!r.genres.is_empty()).then(|| r.genres.join(GENRE_SEPARATOR)),
            developer: r.developer.clone(),
            publisher: r.publisher.clone(),
            rating: r.rating.clone(),
            description: r.description.clone(),
            source_url: r.source_url.clone(),
        }
    }
}

impl From<GameRow> for GameRecord {
    fn from(row: GameRow) -> Self {
        Self {
            title: row.title,
            platform: row.platform,
            release_date: row.release_date,
            critic_score: row.critic_score,
            user_score: row.user_score,
            genres: row
                .genres
                .map(|g| {
                    g.split(GENRE_SEPARATOR.trim())
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            developer: row.developer,
            publisher: row.publisher,
            rating: row.rating,
            description: row.description,
            source_url: row.source_url,
        }
    }
}
