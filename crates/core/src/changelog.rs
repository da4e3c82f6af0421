use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::diff::DiffResult;
use crate::hashing::content_slot;
use crate::util::file_safe;

/// Append-only audit trail: one Markdown file per target.
#[derive(Clone, Debug)]
pub struct ChangeLog {
    dir: PathBuf,
}

impl ChangeLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Readable id plus a short hash of the exact id, so ids that sanitise alike stay apart.
    pub fn path_for(&self, target_id: &str) -> PathBuf {
        let slot = content_slot(target_id);
        self.dir
            .join(format!("{}_{}_changes.md", file_safe(target_id), &slot[..8]))
    }

    /// Appends one change section for `diff` and returns the log path.
    pub fn append(
        &self,
        source_url: &str,
        at: DateTime<Utc>,
        diff: &DiffResult,
    ) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&diff.target_id);
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        writeln!(f)?;
        writeln!(f, "## JSWatch: new change for `{}`", diff.target_id)?;
        writeln!(f, "url: {source_url}")?;
        writeln!(f, "time: {}", at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f)?;
        writeln!(f, "```diff")?;
        for line in &diff.changed_lines {
            writeln!(f, "{} {}", line.tag.marker(), line.text)?;
        }
        writeln!(f, "```")?;
        Ok(path)
    }
}
