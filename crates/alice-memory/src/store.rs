use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::MemoryError;
use crate::record::{CommandRecord, Record, StoredCommand, StoredMessage};

/// Append-only JSON-lines store with an in-memory copy of every record.
pub struct Memory {
    path: PathBuf,
    file: File,
    records: Vec<Record>,
    next_id: u64,
}

impl Memory {
    /// Open (or create) the store at `path`, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|source| MemoryError::io("creating store directory", parent, source))?;
        }

        let loaded = if path.exists() {
            let loaded = load_records(&path)?;
            if let Some(len) = loaded.truncate_to {
                OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .and_then(|file| file.set_len(len))
                    .map_err(|source| MemoryError::io("truncating torn record", &path, source))?;
            }
            loaded
        } else {
            Loaded {
                records: Vec::new(),
                truncate_to: None,
                needs_newline: false,
            }
        };
        let records = loaded.records;
        let next_id = records.iter().map(Record::id).max().map_or(1, |id| id + 1);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| MemoryError::io("opening store for append", &path, source))?;

        if loaded.needs_newline {
            file.write_all(b"\n")
                .map_err(|source| MemoryError::io("terminating last record", &path, source))?;
        }

        debug!(
            "Opened conversation store {} with {} records",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            file,
            records,
            next_id,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_message(
        &mut self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<u64, MemoryError> {
        let id = self.next_id;
        self.append(Record::Message(StoredMessage {
            id,
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }))?;
        Ok(id)
    }

    /// Messages of one session, oldest first. With a limit, only the most recent `limit`.
    pub fn get_messages(&self, session_id: &str, limit: Option<usize>) -> Vec<StoredMessage> {
        let messages: Vec<StoredMessage> = self
            .records
            .iter()
            .filter(|record| record.session_id() == session_id)
            .filter_map(|record| match record {
                Record::Message(m) => Some(m.clone()),
                Record::Command(_) => None,
            })
            .collect();

        match limit {
            Some(limit) if messages.len() > limit => messages[messages.len() - limit..].to_vec(),
            _ => messages,
        }
    }

    pub fn add_command(
        &mut self,
        session_id: &str,
        command: CommandRecord,
    ) -> Result<u64, MemoryError> {
        let id = self.next_id;
        self.append(Record::Command(StoredCommand {
            id,
            session_id: session_id.to_string(),
            command: command.command,
            args: command.args,
            approved: command.approved,
            exit_code: command.exit_code,
            stdout: command.stdout,
            stderr: command.stderr,
            created_at: Utc::now(),
        }))?;
        Ok(id)
    }

    /// Up to `limit` commands of one session, newest first.
    pub fn get_recent_commands(&self, session_id: &str, limit: usize) -> Vec<StoredCommand> {
        self.records
            .iter()
            .rev()
            .filter(|record| record.session_id() == session_id)
            .filter_map(|record| match record {
                Record::Command(c) => Some(c.clone()),
                Record::Message(_) => None,
            })
            .take(limit)
            .collect()
    }

    fn append(&mut self, record: Record) -> Result<(), MemoryError> {
        let mut line = serde_json::to_string(&record).map_err(|source| MemoryError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| MemoryError::io("appending record", &self.path, source))?;

        self.next_id = record.id() + 1;
        self.records.push(record);
        Ok(())
    }
}

/// Records from the complete lines of the store, plus how the tail was handled.
struct Loaded {
    records: Vec<Record>,
    /// Length to cut the file back to when the final write was torn.
    truncate_to: Option<u64>,
    /// The last record is intact but its newline never made it to disk.
    needs_newline: bool,
}

fn load_records(path: &Path) -> Result<Loaded, MemoryError> {
    let bytes = std::fs::read(path).map_err(|source| MemoryError::io("reading store", path, source))?;

    let (complete, tail) = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(pos) => bytes.split_at(pos + 1),
        None => bytes.split_at(0),
    };

    let mut records = Vec::new();
    let text = String::from_utf8_lossy(complete);
    let mut line_count = 0;
    for (line_index, line) in text.lines().enumerate() {
        line_count = line_index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<Record>(line).map_err(|source| MemoryError::Parse {
            path: path.to_path_buf(),
            line: line_index + 1,
            source,
        })?;
        records.push(record);
    }

    let mut loaded = Loaded {
        records,
        truncate_to: None,
        needs_newline: false,
    };

    let tail = String::from_utf8_lossy(tail);
    if !tail.trim().is_empty() {
        // Only the final line can be cut short by an interrupted append.
        match serde_json::from_str::<Record>(tail.trim()) {
            Ok(record) => {
                loaded.records.push(record);
                loaded.needs_newline = true;
            }
            Err(e) => {
                warn!(
                    "Dropping torn record at {}:{}: {}",
                    path.display(),
                    line_count + 1,
                    e
                );
                loaded.truncate_to = Some(complete.len() as u64);
            }
        }
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("memory.jsonl");
        let memory = Memory::open(&path).unwrap();
        assert_eq!(memory.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn ids_increase_across_record_kinds() {
        let dir = TempDir::new().unwrap();
        let mut memory = Memory::open(dir.path().join("m.jsonl")).unwrap();

        let first = memory.add_message("s1", "user", "hi").unwrap();
        let second = memory
            .add_command("s1", CommandRecord::rejected("rm", vec!["-rf".into()]))
            .unwrap();
        let third = memory.add_message("s1", "assistant", "no").unwrap();

        assert_eq!((first, second, third), (1, 2, 3));
    }

    #[test]
    fn corrupt_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.jsonl");
        {
            let mut memory = Memory::open(&path).unwrap();
            memory.add_message("s1", "user", "hi").unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        match Memory::open(&path) {
            Err(MemoryError::Parse { line, .. }) => assert_eq!(line, 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("corrupt store opened"),
        }
    }

    #[test]
    fn intact_record_without_newline_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.jsonl");
        {
            let mut memory = Memory::open(&path).unwrap();
            memory.add_message("s1", "user", "hi").unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.trim_end()).unwrap();

        let mut memory = Memory::open(&path).unwrap();
        assert_eq!(memory.add_message("s1", "assistant", "hello").unwrap(), 2);

        let reopened = Memory::open(&path).unwrap();
        assert_eq!(reopened.get_messages("s1", None).len(), 2);
    }
}
