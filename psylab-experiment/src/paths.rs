use std::path::{Path, PathBuf};

/// Where a run keeps its files
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub root: PathBuf,
    pub data: PathBuf,
    pub logs: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data: root.join("data"),
            logs: root.join("logs"),
            root,
        }
    }

    pub fn data_file(&self, subj_id: &str) -> PathBuf {
        self.data.join(format!("{subj_id}.csv"))
    }

    pub fn summary_file(&self, subj_id: &str) -> PathBuf {
        self.data.join(format!("{subj_id}_summary.json"))
    }

    pub fn log_file(&self, subj_id: &str) -> PathBuf {
        self.logs.join(format!("{subj_id}.log"))
    }
}

fn file_stems(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect()
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Next participant id: one past the largest numeric file name in the data
/// folder, zero padded to two digits. Falls back to `default` when there is
/// nothing numbered yet.
pub fn guess_participant(data_dir: &Path, default: &str) -> String {
    match file_stems(data_dir)
        .iter()
        .filter_map(|stem| leading_number(stem))
        .max()
    {
        Some(last) => format!("{:02}", last + 1),
        None => default.to_string(),
    }
}

/// Next run number: one past the largest `run<N>` found in the data folder's
/// file names
pub fn guess_run_no(data_dir: &Path, default: u32) -> u32 {
    file_stems(data_dir)
        .iter()
        .filter_map(|stem| {
            let at = stem.rfind("run")?;
            leading_number(&stem[at + 3..])
        })
        .max()
        .map(|last| last + 1)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn layout_under_root() {
        let paths = Paths::new("/tmp/study");
        assert_eq!(paths.data_file("04"), PathBuf::from("/tmp/study/data/04.csv"));
        assert_eq!(paths.log_file("04"), PathBuf::from("/tmp/study/logs/04.log"));
        assert_eq!(
            paths.summary_file("04"),
            PathBuf::from("/tmp/study/data/04_summary.json")
        );
    }

    #[test]
    fn participant_follows_highest_number() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "01.csv");
        touch(dir.path(), "07.csv");
        touch(dir.path(), "07_summary.json");
        touch(dir.path(), "pilot.csv");
        assert_eq!(guess_participant(dir.path(), "subj"), "08");
    }

    #[test]
    fn participant_default_when_nothing_numbered() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pilot.csv");
        assert_eq!(guess_participant(dir.path(), "subj"), "subj");
        assert_eq!(guess_participant(&dir.path().join("missing"), "01"), "01");
    }

    #[test]
    fn run_number_follows_highest_run() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(guess_run_no(dir.path(), 1), 1);
        touch(dir.path(), "03_run1.csv");
        touch(dir.path(), "03_run4.csv");
        touch(dir.path(), "notes.txt");
        assert_eq!(guess_run_no(dir.path(), 1), 5);
    }
}
