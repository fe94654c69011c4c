use crate::error::{DrillError, Result};
use crate::store::{CharacterRecord, CharacterStore};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Columns every character table must provide; `last_seen` is optional
pub const REQUIRED_COLUMNS: [&str; 5] = ["content", "level", "appearances", "correct", "accuracy"];

/// Loads and persists the character table
pub trait StoreBackend {
    fn load(&self) -> Result<CharacterStore>;
    fn save(&self, store: &CharacterStore) -> Result<()>;
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Csv,
    Sqlite,
}

impl BackendKind {
    /// Guess from the file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendKind::Sqlite,
            _ => BackendKind::Csv,
        }
    }

    pub fn open(self, path: &Path) -> Box<dyn StoreBackend> {
        match self {
            BackendKind::Csv => Box::new(CsvBackend::with_path(path)),
            BackendKind::Sqlite => Box::new(SqliteBackend::with_path(path)),
        }
    }
}

/// Row shape shared by both backends
#[derive(Debug, Serialize, Deserialize)]
struct TableRow {
    content: String,
    level: i64,
    appearances: u32,
    correct: u32,
    accuracy: Option<f64>,
    #[serde(default)]
    last_seen: Option<String>,
}

impl TableRow {
    fn into_record(self) -> Result<CharacterRecord> {
        let mut chars = self.content.chars();
        let content = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(DrillError::InvalidRecord {
                    content: self.content,
                    reason: "content must be exactly one character".to_string(),
                })
            }
        };
        // an unparseable date is treated like a never-seen character
        let last_seen = self
            .last_seen
            .as_deref()
            .map(str::trim)
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());
        Ok(CharacterRecord {
            content,
            level: self.level,
            appearances: self.appearances,
            correct: self.correct,
            accuracy: self.accuracy.filter(|a| !a.is_nan()).unwrap_or(0.0),
            last_seen,
        })
    }
}

impl From<&CharacterRecord> for TableRow {
    fn from(r: &CharacterRecord) -> Self {
        Self {
            content: r.content.to_string(),
            level: r.level,
            appearances: r.appearances,
            correct: r.correct,
            accuracy: Some(r.accuracy),
            last_seen: r.last_seen.map(|d| d.format(DATE_FORMAT).to_string()),
        }
    }
}

fn check_columns(columns: &[&str]) -> Result<()> {
    for required in REQUIRED_COLUMNS {
        if !columns.contains(&required) {
            return Err(DrillError::Schema {
                column: required.to_string(),
            });
        }
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Character table kept as a CSV file
#[derive(Debug, Clone)]
pub struct CsvBackend {
    path: PathBuf,
}

impl CsvBackend {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn read_from<R: io::Read>(reader: R) -> Result<CharacterStore> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        check_columns(&headers.iter().collect::<Vec<_>>())?;

        let mut records = Vec::new();
        for row in rdr.deserialize::<TableRow>() {
            records.push(row?.into_record()?);
        }
        CharacterStore::from_records(records)
    }

    pub fn write_to<W: io::Write>(writer: W, store: &CharacterStore) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in store.iter() {
            wtr.serialize(TableRow::from(record))?;
        }
        if store.is_empty() {
            wtr.write_record(REQUIRED_COLUMNS.iter().copied().chain(["last_seen"]))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl StoreBackend for CsvBackend {
    fn load(&self) -> Result<CharacterStore> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no character table yet, starting empty");
            return Ok(CharacterStore::new());
        }
        Self::read_from(fs::File::open(&self.path)?)
    }

    fn save(&self, store: &CharacterStore) -> Result<()> {
        ensure_parent(&self.path)?;
        Self::write_to(fs::File::create(&self.path)?, store)?;
        debug!(path = %self.path.display(), records = store.len(), "saved character table");
        Ok(())
    }
}

/// Character table kept in a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Connection> {
        ensure_parent(&self.path)?;
        let conn = Connection::open(&self.path)?;
        create_table(&conn)?;
        Ok(conn)
    }
}

fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS characters (
            content TEXT PRIMARY KEY,
            level INTEGER NOT NULL DEFAULT 0,
            appearances INTEGER NOT NULL DEFAULT 0,
            correct INTEGER NOT NULL DEFAULT 0,
            accuracy REAL NOT NULL DEFAULT 0,
            last_seen TEXT
        )
        "#,
        [],
    )?;
    Ok(())
}

fn read_table(conn: &Connection) -> Result<CharacterStore> {
    let columns: Vec<String> = conn
        .prepare("PRAGMA table_info(characters)")?
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<_>>()?;
    check_columns(&columns.iter().map(String::as_str).collect::<Vec<_>>())?;
    let has_last_seen = columns.iter().any(|c| c == "last_seen");

    let sql = if has_last_seen {
        "SELECT content, level, appearances, correct, accuracy, last_seen FROM characters ORDER BY rowid"
    } else {
        "SELECT content, level, appearances, correct, accuracy, NULL FROM characters ORDER BY rowid"
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(TableRow {
            content: row.get(0)?,
            level: row.get(1)?,
            appearances: row.get(2)?,
            correct: row.get(3)?,
            accuracy: row.get(4)?,
            last_seen: row.get(5)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    CharacterStore::from_records(records)
}

fn write_table(conn: &mut Connection, store: &CharacterStore) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM characters", [])?;
    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO characters
            (content, level, appearances, correct, accuracy, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )?;
        for record in store.iter() {
            let row = TableRow::from(record);
            stmt.execute(params![
                row.content,
                row.level,
                row.appearances,
                row.correct,
                row.accuracy,
                row.last_seen,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

impl StoreBackend for SqliteBackend {
    fn load(&self) -> Result<CharacterStore> {
        let conn = self.open()?;
        read_table(&conn)
    }

    fn save(&self, store: &CharacterStore) -> Result<()> {
        let mut conn = self.open()?;
        write_table(&mut conn, store)?;
        debug!(path = %self.path.display(), records = store.len(), "saved character table");
        Ok(())
    }
}
