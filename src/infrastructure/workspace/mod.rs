//! Workspace store
//!
//! The only component that writes into the workspace: the target file,
//! source tree backups, violation logs and the captured build log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::domain::errors::{FixerError, FixerResult};
use crate::domain::models::config::WorkspaceConfig;
use crate::domain::models::{Artifact, Backup};

/// Latest violation log, overwritten every build.
pub const VIOLATION_LOG: &str = "azc-errors.txt";

/// Full output of the most recent build.
pub const BUILD_LOG: &str = "build-output.log";

/// Resolved workspace paths plus the file operations the loop needs.
#[derive(Debug, Clone)]
pub struct Workspace {
    source_dir: PathBuf,
    target_file: PathBuf,
    main_file: PathBuf,
    log_dir: PathBuf,
    backup_dir: PathBuf,
}

impl Workspace {
    pub fn new(config: &WorkspaceConfig) -> Self {
        Self {
            source_dir: config.source_path(),
            target_file: config.target_path(),
            main_file: config.main_path(),
            log_dir: config.resolve(&config.log_dir),
            backup_dir: config.resolve(&config.backup_dir),
        }
    }

    pub fn target_path(&self) -> &Path {
        &self.target_file
    }

    pub fn violation_log_path(&self) -> PathBuf {
        self.log_dir.join(VIOLATION_LOG)
    }

    pub fn build_log_path(&self) -> PathBuf {
        self.log_dir.join(BUILD_LOG)
    }

    /// Fail early when the mutable source tree is missing.
    pub fn ensure_source_tree(&self) -> FixerResult<()> {
        for path in [&self.source_dir, &self.target_file] {
            if !path.exists() {
                return Err(FixerError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                ));
            }
        }
        Ok(())
    }

    pub fn read_target(&self) -> FixerResult<String> {
        read_to_string(&self.target_file)
    }

    pub fn read_main(&self) -> FixerResult<String> {
        read_to_string(&self.main_file)
    }

    /// Replace the target file with `content`. Writing the same content twice
    /// leaves the same bytes on disk.
    pub fn write_target(&self, content: &str) -> FixerResult<()> {
        fs::write(&self.target_file, content).map_err(|e| FixerError::io(&self.target_file, e))?;
        tracing::debug!(
            path = %self.target_file.display(),
            bytes = content.len(),
            "target file written"
        );
        Ok(())
    }

    /// Write the current violation log and a timestamped snapshot of it.
    ///
    /// Returns the path of the current log.
    pub fn persist_violations(&self, rendered: &str, now: DateTime<Local>) -> FixerResult<PathBuf> {
        self.ensure_dir(&self.log_dir)?;

        let current = self.violation_log_path();
        fs::write(&current, rendered).map_err(|e| FixerError::io(&current, e))?;

        let snapshot = self
            .log_dir
            .join(format!("azc-errors-{}.txt", now.format("%Y%m%d_%H%M%S_%3f")));
        fs::write(&snapshot, rendered).map_err(|e| FixerError::io(&snapshot, e))?;

        Ok(current)
    }

    pub fn persist_build_log(&self, raw: &str) -> FixerResult<PathBuf> {
        self.ensure_dir(&self.log_dir)?;
        let path = self.build_log_path();
        fs::write(&path, raw).map_err(|e| FixerError::io(&path, e))?;
        Ok(path)
    }

    /// Snapshot the source tree as `iteration-<n>-src-backup-<timestamp>.tar.gz`.
    ///
    /// Backups are write-once: an existing file at the target path is an error.
    pub fn create_backup(&self, iteration: u32, now: DateTime<Local>) -> FixerResult<Backup> {
        self.ensure_dir(&self.backup_dir)?;

        let path = self.backup_dir.join(format!(
            "iteration-{iteration}-src-backup-{}.tar.gz",
            now.format("%Y%m%d_%H%M%S_%3f")
        ));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FixerError::io(&path, e))?;

        write_archive(file, &self.source_dir).map_err(|e| FixerError::io(&path, e))?;

        tracing::info!(iteration, path = %path.display(), "source tree backed up");
        Ok(Backup {
            path,
            iteration,
            timestamp: now,
        })
    }

    /// Files uploaded into every worker session.
    pub fn artifacts(&self) -> Vec<Artifact> {
        [&self.main_file, &self.target_file, &self.violation_log_path()]
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Artifact::new(name, path.clone())
            })
            .collect()
    }

    fn ensure_dir(&self, dir: &Path) -> FixerResult<()> {
        fs::create_dir_all(dir).map_err(|e| FixerError::io(dir, e))
    }
}

fn read_to_string(path: &Path) -> FixerResult<String> {
    fs::read_to_string(path).map_err(|e| FixerError::io(path, e))
}

fn write_archive(file: File, source_dir: &Path) -> std::io::Result<()> {
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all("src", source_dir)?;
    let mut encoder = builder.into_inner()?;
    encoder.flush()?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use chrono::TimeZone;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    use super::*;

    fn workspace() -> (TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.tsp"), "namespace Demo;").unwrap();
        fs::write(src.join("client.tsp"), "model Wrapper {}").unwrap();
        let config = WorkspaceConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        (dir, Workspace::new(&config))
    }

    fn at(ms: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 15)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(i64::from(ms)))
            .unwrap()
    }

    #[test]
    fn write_target_is_idempotent() {
        let (_dir, ws) = workspace();
        ws.write_target("model Foo {}").unwrap();
        let first = fs::read(ws.target_path()).unwrap();
        ws.write_target("model Foo {}").unwrap();
        assert_eq!(fs::read(ws.target_path()).unwrap(), first);
        assert_eq!(ws.read_target().unwrap(), "model Foo {}");
    }

    #[test]
    fn violation_logs_are_current_plus_snapshot() {
        let (dir, ws) = workspace();
        let current = ws.persist_violations("AZC0012: too generic\n", at(0)).unwrap();
        assert_eq!(fs::read_to_string(current).unwrap(), "AZC0012: too generic\n");
        let snapshot = dir.path().join("log/azc-errors-20240501_123015_000.txt");
        assert!(snapshot.exists());

        ws.persist_violations("", at(0)).unwrap();
        assert_eq!(fs::read_to_string(ws.violation_log_path()).unwrap(), "");
    }

    #[test]
    fn snapshots_within_one_second_are_kept_apart() {
        let (dir, ws) = workspace();
        ws.persist_violations("AZC0030: first\n", at(5)).unwrap();
        ws.persist_violations("AZC0031: second\n", at(10)).unwrap();

        let log = dir.path().join("log");
        assert_eq!(
            fs::read_to_string(log.join("azc-errors-20240501_123015_005.txt")).unwrap(),
            "AZC0030: first\n"
        );
        assert_eq!(
            fs::read_to_string(log.join("azc-errors-20240501_123015_010.txt")).unwrap(),
            "AZC0031: second\n"
        );
    }

    #[test]
    fn backup_contains_source_tree() {
        let (_dir, ws) = workspace();
        let backup = ws.create_backup(1, at(250)).unwrap();
        assert!(backup
            .path
            .ends_with("iteration-1-src-backup-20240501_123015_250.tar.gz"));

        let mut archive = tar::Archive::new(GzDecoder::new(File::open(&backup.path).unwrap()));
        let mut found = false;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().ends_with("client.tsp") {
                let mut text = String::new();
                entry.read_to_string(&mut text).unwrap();
                assert_eq!(text, "model Wrapper {}");
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn backups_are_never_overwritten() {
        let (_dir, ws) = workspace();
        ws.create_backup(1, at(0)).unwrap();
        let err = ws.create_backup(1, at(0)).unwrap_err();
        assert!(matches!(err, FixerError::Io { .. }));
    }

    #[test]
    fn missing_source_tree_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(&WorkspaceConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        });
        assert!(matches!(ws.ensure_source_tree(), Err(FixerError::Io { .. })));
    }

    #[test]
    fn artifacts_cover_main_client_and_log() {
        let (_dir, ws) = workspace();
        let names: Vec<_> = ws.artifacts().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["main.tsp", "client.tsp", "azc-errors.txt"]);
    }
}
