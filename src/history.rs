//! On-disk chat history, grouped by day in memory.
//!
//! The file is a single JSON array of [`ChatTurn`] objects in chronological
//! order.  [`GroupedHistory`] is the date-bucketed view built from it on load;
//! it is never written as such.  Writes go through [`flatten`] then
//! [`HistoryStore::save_all`] so the file stays globally time-ordered.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use time::Date;

use crate::error::{Error, Result};
use crate::observability::{HISTORY_LOADS, HISTORY_LOAD_ERRORS, HISTORY_WRITES, HISTORY_WRITE_ERRORS};
use crate::types::ChatTurn;

/// Default history file name, relative to the working directory.
pub const DEFAULT_HISTORY_FILE: &str = "chat_history.json";

/// Chat turns bucketed by calendar date.
///
/// Buckets keep the order in which their dates were first seen and turns keep
/// their relative order within a bucket.  A bucket may be empty after
/// deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedHistory {
    days: IndexMap<Date, Vec<ChatTurn>>,
}

impl GroupedHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups turns by the date of their timestamp.
    pub fn from_turns(turns: impl IntoIterator<Item = ChatTurn>) -> Self {
        let mut grouped = Self::new();
        for turn in turns {
            grouped.push(turn);
        }
        grouped
    }

    /// Appends a turn to the bucket for its date.
    pub fn push(&mut self, turn: ChatTurn) {
        self.days.entry(turn.timestamp.date()).or_default().push(turn);
    }

    /// The turns recorded on `date`, or an empty slice.
    pub fn turns(&self, date: Date) -> &[ChatTurn] {
        self.days.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable access to an existing bucket.
    pub fn bucket_mut(&mut self, date: Date) -> Option<&mut Vec<ChatTurn>> {
        self.days.get_mut(&date)
    }

    /// Ensures a (possibly empty) bucket exists for `date`.
    pub fn ensure_day(&mut self, date: Date) {
        self.days.entry(date).or_default();
    }

    /// Dates in bucket order.
    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.days.keys().copied()
    }

    /// Iterates over `(date, turns)` in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (Date, &[ChatTurn])> + '_ {
        self.days.iter().map(|(date, turns)| (*date, turns.as_slice()))
    }

    /// True when there are no buckets at all.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of buckets, including empty ones.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// Total number of turns across all buckets.
    pub fn turn_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    /// The latest timestamp held, if any.
    pub fn latest(&self) -> Option<crate::types::Timestamp> {
        self.days
            .values()
            .flat_map(|turns| turns.iter().map(|t| t.timestamp))
            .max()
    }
}

/// Concatenate every bucket and sort by timestamp, oldest first.
///
/// The sort is stable, so turns sharing a timestamp keep their bucket order.
pub fn flatten(grouped: &GroupedHistory) -> Vec<ChatTurn> {
    let mut all: Vec<ChatTurn> = grouped.days.values().flatten().cloned().collect();
    all.sort_by_key(|turn| turn.timestamp);
    all
}

/// The persisted history file.
///
/// There is no cross-process locking: one session owns the file.  Writes
/// replace the file atomically by renaming a fully written sibling.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Creates a store for the file at `path`.  Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The history file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the history and group it by date.
    ///
    /// A missing or blank file is an empty history.  A malformed file is an
    /// error; nothing is salvaged from it.
    pub fn load(&self) -> Result<GroupedHistory> {
        HISTORY_LOADS.click();
        let turns = self.read_turns().inspect_err(|err| {
            HISTORY_LOAD_ERRORS.click();
            tracing::warn!(path = %self.path.display(), error = %err, "cannot load history");
        })?;
        tracing::debug!(path = %self.path.display(), turns = turns.len(), "history loaded");
        Ok(GroupedHistory::from_turns(turns))
    }

    /// Read the flat list of turns exactly as stored.
    pub fn read_turns(&self) -> Result<Vec<ChatTurn>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read {}: {err}", self.path.display()),
                    err,
                ));
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|err| {
            Error::serialization(
                format!("malformed history file {}: {err}", self.path.display()),
                Some(Box::new(err)),
            )
        })
    }

    /// Overwrite the file with exactly `turns`.
    pub fn save_all(&mut self, turns: &[ChatTurn]) -> Result<()> {
        HISTORY_WRITES.click();
        self.write_atomically(turns).inspect_err(|err| {
            HISTORY_WRITE_ERRORS.click();
            tracing::warn!(path = %self.path.display(), error = %err, "cannot save history");
        })?;
        tracing::debug!(path = %self.path.display(), turns = turns.len(), "history saved");
        Ok(())
    }

    /// Append one turn to the file.
    ///
    /// This is a read-modify-write of the whole file.  If the current file
    /// cannot be parsed it is left untouched and the error is returned.
    pub fn append(&mut self, turn: &ChatTurn) -> Result<()> {
        let mut turns = self.read_turns()?;
        turns.push(turn.clone());
        self.save_all(&turns)
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_HISTORY_FILE.to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn write_atomically(&self, turns: &[ChatTurn]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                Error::io(format!("failed to create {}", parent.display()), err)
            })?;
        }

        let temp = self.temp_path();
        let result = write_json(&temp, turns).and_then(|()| {
            fs::rename(&temp, &self.path).map_err(|err| {
                Error::io(
                    format!("failed to replace {}", self.path.display()),
                    err,
                )
            })
        });
        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

fn write_json(path: &Path, turns: &[ChatTurn]) -> Result<()> {
    let file = File::create(path)
        .map_err(|err| Error::io(format!("failed to create {}", path.display()), err))?;
    let mut writer = BufWriter::new(file);
    let mut serializer = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    turns.serialize(&mut serializer).map_err(|err| {
        Error::serialization("failed to serialize history", Some(Box::new(err)))
    })?;
    writer.write_all(b"\n")?;
    let file = writer
        .into_inner()
        .map_err(|err| Error::io("failed to flush history", err.into_error()))?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Speaker, Timestamp};
    use time::macros::date;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn sample() -> Vec<ChatTurn> {
        vec![
            ChatTurn::user(ts("30-01-2025 09:00:00"), "morning"),
            ChatTurn::assistant(ts("30-01-2025 09:00:05"), "good morning"),
            ChatTurn::user(ts("02-02-2025 21:15:00"), "evening"),
            ChatTurn::assistant(ts("02-02-2025 21:15:04"), "good evening"),
            ChatTurn::user(ts("02-02-2025 21:16:00"), "bye"),
        ]
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("absent.json"));
        let grouped = store.load().unwrap();
        assert!(grouped.is_empty());
        assert!(flatten(&grouped).is_empty());
    }

    #[test]
    fn blank_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.json");
        fs::write(&path, "  \n").unwrap();
        assert!(HistoryStore::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[{\"timestamp\": 12}").unwrap();
        let err = HistoryStore::new(path).load().unwrap_err();
        assert!(err.is_serialization());
    }

    #[test]
    fn groups_by_date_in_first_seen_order() {
        let grouped = GroupedHistory::from_turns(sample());
        let dates: Vec<Date> = grouped.dates().collect();
        assert_eq!(dates, vec![date!(2025 - 01 - 30), date!(2025 - 02 - 02)]);
        assert_eq!(grouped.turns(date!(2025 - 01 - 30)).len(), 2);
        assert_eq!(grouped.turns(date!(2025 - 02 - 02)).len(), 3);
        assert!(grouped.turns(date!(2025 - 03 - 01)).is_empty());
        assert_eq!(grouped.turn_count(), 5);
    }

    #[test]
    fn flatten_sorts_chronologically() {
        let mut grouped = GroupedHistory::new();
        // Insert the later day first.
        for turn in sample().into_iter().rev() {
            grouped.push(turn);
        }
        let flat = flatten(&grouped);
        assert_eq!(flat, sample());
    }

    #[test]
    fn flatten_is_stable_for_equal_timestamps() {
        let same = ts("01-01-2025 00:00:00");
        let grouped = GroupedHistory::from_turns(vec![
            ChatTurn::user(same, "first"),
            ChatTurn::assistant(same, "second"),
        ]);
        let texts: Vec<String> = flatten(&grouped).into_iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn round_trip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::new(&path);

        // Store out of order to begin with.
        let mut scrambled = sample();
        scrambled.swap(0, 4);
        store.save_all(&scrambled).unwrap();

        let once = flatten(&store.load().unwrap());
        store.save_all(&once).unwrap();
        let twice = flatten(&store.load().unwrap());
        assert_eq!(once, twice);
        assert_eq!(once, sample());
    }

    #[test]
    fn append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::new(dir.path().join("history.json"));
        store.save_all(&sample()).unwrap();

        let newest = ChatTurn::assistant(ts("02-02-2025 21:16:09"), "see you");
        store.append(&newest).unwrap();

        let flat = flatten(&store.load().unwrap());
        assert_eq!(flat.len(), 6);
        assert_eq!(flat.last(), Some(&newest));
        assert_eq!(&flat[..5], sample().as_slice());
    }

    #[test]
    fn append_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = HistoryStore::new(&path);
        let turn = ChatTurn::user(ts("10-10-2025 10:10:10"), "hello");
        store.append(&turn).unwrap();
        assert_eq!(store.read_turns().unwrap(), vec![turn]);
    }

    #[test]
    fn append_refuses_to_clobber_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "this is not json").unwrap();
        let mut store = HistoryStore::new(&path);
        let turn = ChatTurn::user(ts("10-10-2025 10:10:10"), "hello");
        assert!(store.append(&turn).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "this is not json");
    }

    #[test]
    fn save_leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::new(&path);
        store.save_all(&sample()).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["history.json".to_string()]);
    }

    #[test]
    fn file_uses_stable_wire_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let mut store = HistoryStore::new(&path);
        store
            .save_all(&[ChatTurn::user(ts("01-05-2025 08:00:00"), "hi")])
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let expected = "[\n    {\n        \"timestamp\": \"01-05-2025 08:00:00\",\n        \"user\": \"You\",\n        \"message\": \"hi\"\n    }\n]\n";
        assert_eq!(content, expected);
    }

    #[test]
    fn reads_files_written_with_legacy_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[
    {"timestamp": "01-05-2025 08:00:00", "user": "You", "message": "hi"},
    {"timestamp": "01-05-2025 08:00:03", "user": "Ollama", "message": "hello"}
]"#,
        )
        .unwrap();
        let turns = HistoryStore::new(&path).read_turns().unwrap();
        assert_eq!(turns[0].speaker, Speaker::User);
        assert_eq!(turns[1].speaker, Speaker::Assistant);
    }

    #[test]
    fn append_keeps_foreign_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[
    {"timestamp": "01-05-2025 08:00:00", "user": "You", "message": "hi"},
    {"timestamp": "01-05-2025 08:00:01", "user": "System", "message": "note"}
]"#,
        )
        .unwrap();
        let mut store = HistoryStore::new(&path);
        store
            .append(&ChatTurn::user(ts("01-05-2025 08:01:00"), "again"))
            .unwrap();

        let turns = store.read_turns().unwrap();
        assert_eq!(turns[1].speaker, Speaker::Other("System".to_string()));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(r#""user": "System""#));
        assert!(!content.contains("AI"));
    }
}
