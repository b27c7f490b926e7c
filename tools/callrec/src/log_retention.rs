use crate::errors::CallrecError;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding `log_path`; a bare file name lives in `.`.
pub fn log_dir(log_path: &Path) -> &Path {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Whether `candidate` belongs to the log family of `log_path`: same stem
/// prefix, same extension (`events.jsonl`, `events.1.jsonl`, `events-old.jsonl`).
fn is_owned_by(log_path: &Path, candidate: &Path) -> bool {
    let (Some(stem), Some(ext)) = (log_path.file_stem(), log_path.extension()) else {
        return false;
    };
    let (Some(stem), Some(ext)) = (stem.to_str(), ext.to_str()) else {
        return false;
    };
    let Some(name) = candidate.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(stem) && candidate.extension().and_then(|e| e.to_str()) == Some(ext)
}

/// Deletes the oldest rotated siblings of `log_path` until the log family fits
/// in `budget_bytes`. Files outside the family and the active log are never
/// touched.
pub fn enforce_log_budget(log_path: &Path, budget_bytes: u64) -> Result<Vec<PathBuf>, CallrecError> {
    let dir = log_dir(log_path);
    let active = log_path.file_name();

    let mut family = fs::read_dir(dir)
        .map_err(|e| CallrecError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_owned_by(log_path, path))
        .collect::<Vec<_>>();

    let mut total = family
        .iter()
        .filter_map(|path| fs::metadata(path).ok().map(|meta| meta.len()))
        .sum::<u64>();

    family.retain(|path| path.file_name() != active);
    family.sort_by_key(|path| fs::metadata(path).ok().and_then(|m| m.modified().ok()));

    let mut deleted = Vec::new();
    for path in family {
        if total <= budget_bytes {
            break;
        }
        let len = fs::metadata(&path)
            .map_err(|e| CallrecError::Io(e.to_string()))?
            .len();
        fs::remove_file(&path).map_err(|e| CallrecError::Io(e.to_string()))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::{enforce_log_budget, is_owned_by, log_dir};
    use std::fs;
    use std::path::Path;

    #[test]
    fn prunes_oldest_rotated_logs_until_budget_is_met() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("events.jsonl");
        fs::write(dir.path().join("events.1.jsonl"), vec![b'x'; 40]).expect("older");
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("events.2.jsonl"), vec![b'x'; 40]).expect("newer");
        fs::write(&log, vec![b'x'; 10]).expect("active");

        let deleted = enforce_log_budget(&log, 60).expect("pruned");
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with("events.1.jsonl"));
        assert!(dir.path().join("events.2.jsonl").exists());
        assert!(log.exists());
    }

    #[test]
    fn unrelated_files_in_the_log_directory_survive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = dir.path().join("events.jsonl");
        fs::write(dir.path().join("thesis.pdf"), vec![b'x'; 200]).expect("user file");
        fs::write(dir.path().join("other.jsonl"), vec![b'x'; 200]).expect("other log");
        fs::write(&log, vec![b'x'; 200]).expect("active");

        let deleted = enforce_log_budget(&log, 128).expect("pruned");
        assert!(deleted.is_empty());
        assert!(dir.path().join("thesis.pdf").exists());
        assert!(dir.path().join("other.jsonl").exists());
        assert!(log.exists());
    }

    #[test]
    fn ownership_requires_stem_prefix_and_extension() {
        let log = Path::new("/logs/events.jsonl");
        assert!(is_owned_by(log, Path::new("/logs/events.jsonl")));
        assert!(is_owned_by(log, Path::new("/logs/events.3.jsonl")));
        assert!(!is_owned_by(log, Path::new("/logs/events.txt")));
        assert!(!is_owned_by(log, Path::new("/logs/notes.jsonl")));
        assert!(!is_owned_by(Path::new("/logs/events"), Path::new("/logs/events.1")));
    }

    #[test]
    fn bare_file_name_resolves_to_current_directory() {
        assert_eq!(log_dir(Path::new("events.jsonl")), Path::new("."));
        assert_eq!(log_dir(Path::new("logs/events.jsonl")), Path::new("logs"));
    }
}
