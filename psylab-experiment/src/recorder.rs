use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Writer, WriterBuilder};
use psylab_core::Value;

use crate::error::RecorderError;

/// Append-only data file, one row per completed trial.
///
/// The file is only ever opened in append mode, so an existing data file is
/// never truncated. The header is settled on the first append of a run: it is
/// written unless the file already starts with exactly the same header.
#[derive(Debug)]
pub struct DataRecorder {
    path: PathBuf,
    writer: Option<Writer<File>>,
    header_settled: bool,
    rows: usize,
}

impl DataRecorder {
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                std::fs::create_dir_all(dir).map_err(|source| RecorderError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| RecorderError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        tracing::info!(path = %path.display(), "data file opened for appending");
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            header_settled: false,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended during this run
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// First physical line of the file as CSV fields, if there is one
    fn existing_header(&self) -> Option<Vec<String>> {
        let file = File::open(&self.path).ok()?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).ok()?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());
        let record = reader.records().next()?.ok()?;
        Some(record.iter().map(str::to_string).collect())
    }

    fn needs_header(&self, fields: &[String]) -> bool {
        match self.existing_header() {
            None => true,
            Some(existing) if existing == fields => false,
            Some(existing) => {
                tracing::warn!(
                    path = %self.path.display(),
                    ?existing,
                    "data file header differs from this run; writing a new header"
                );
                true
            }
        }
    }

    /// Appends one row, writing the header first if this is the first row of
    /// the run and the file does not already carry it. Every row is flushed
    /// before returning.
    pub fn append(&mut self, fields: &[String], row: &[Value]) -> Result<(), RecorderError> {
        if self.writer.is_none() {
            return Err(RecorderError::Closed(self.path.clone()));
        }
        let write_header = !self.header_settled && self.needs_header(fields);
        let path = self.path.clone();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecorderError::Closed(path.clone()))?;
        let write_err = |source| RecorderError::Write {
            path: path.clone(),
            source,
        };

        if write_header {
            writer.write_record(fields).map_err(write_err)?;
        }
        self.header_settled = true;

        writer
            .write_record(row.iter().map(Value::to_cell))
            .map_err(write_err)?;
        writer.flush().map_err(|source| RecorderError::Flush {
            path: path.clone(),
            source,
        })?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes and releases the file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), RecorderError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| RecorderError::Flush {
                path: self.path.clone(),
                source,
            })?;
            tracing::info!(path = %self.path.display(), rows = self.rows, "data file closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for DataRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn read(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_written_once_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("01.csv");
        let fields = header(&["subj_id", "cond", "rt"]);

        let mut rec = DataRecorder::open(&path).unwrap();
        for i in 0..3 {
            rec.append(&fields, &["01".into(), Value::Int(i), Value::Float(0.5)])
                .unwrap();
        }
        rec.close().unwrap();

        let lines = read(&path);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "subj_id,cond,rt");
        assert_eq!(lines[1], "01,0,0.500");
    }

    #[test]
    fn resumed_run_with_same_header_only_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01.csv");
        let fields = header(&["cond", "rt"]);

        for _ in 0..2 {
            let mut rec = DataRecorder::open(&path).unwrap();
            rec.append(&fields, &[Value::Int(1), Value::Float(0.25)])
                .unwrap();
            rec.close().unwrap();
        }

        let lines = read(&path);
        assert_eq!(lines, vec!["cond,rt", "1,0.250", "1,0.250"]);
    }

    #[test]
    fn changed_fields_rewrite_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01.csv");

        let mut first = DataRecorder::open(&path).unwrap();
        first
            .append(&header(&["cond", "rt"]), &[Value::Int(1), Value::Float(0.25)])
            .unwrap();
        first.close().unwrap();

        let mut second = DataRecorder::open(&path).unwrap();
        let fields = header(&["cond", "rt", "accuracy"]);
        second
            .append(&fields, &[Value::Int(2), Value::Empty, Value::Empty])
            .unwrap();
        second
            .append(&fields, &[Value::Int(3), Value::Float(1.0), "Correct".into()])
            .unwrap();
        second.close().unwrap();

        let lines = read(&path);
        assert_eq!(
            lines,
            vec![
                "cond,rt",
                "1,0.250",
                "cond,rt,accuracy",
                "2,,",
                "3,1.000,Correct"
            ]
        );
    }

    #[test]
    fn floats_are_cut_to_milliseconds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.csv");
        let mut rec = DataRecorder::open(&path).unwrap();
        rec.append(&header(&["onset"]), &[Value::Float(12.345678)])
            .unwrap();
        drop(rec);
        assert_eq!(read(&path)[1], "12.346");
    }

    #[test]
    fn unwritable_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = DataRecorder::open(&blocker.join("data.csv")).unwrap_err();
        assert!(matches!(
            err,
            RecorderError::CreateDir { .. } | RecorderError::Open { .. }
        ));
        // the blocking file is untouched
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");
    }

    #[test]
    fn append_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = DataRecorder::open(&dir.path().join("c.csv")).unwrap();
        rec.close().unwrap();
        assert!(matches!(
            rec.append(&header(&["a"]), &[Value::Int(1)]),
            Err(RecorderError::Closed(_))
        ));
    }
}
