//! File placement engine
//!
//! A receipt's uploaded file always lives under a directory named for its
//! current lifecycle stage, subdivided by the receipt's submission date:
//! `<root>/<stage>/<yyyy-mm-dd>/<filename>`. The engine owns every physical
//! move; the database path column is updated by the workflow's transaction
//! before the move happens.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::ReceiptStatus;
use crate::repositories::ReceiptRepository;

/// Lifecycle stage directory of a receipt file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submitted,
    Approved,
    Rejected,
}

impl Stage {
    pub fn dir_name(self) -> &'static str {
        match self {
            Stage::Submitted => "submitted",
            Stage::Approved => "approved",
            Stage::Rejected => "rejected",
        }
    }

    /// The stage a receipt's file belongs in for a given status
    pub fn for_status(status: ReceiptStatus) -> Self {
        match status {
            ReceiptStatus::Pending => Stage::Submitted,
            ReceiptStatus::Handled => Stage::Approved,
            ReceiptStatus::Rejected => Stage::Rejected,
        }
    }
}

/// Placement of a newly stored file
#[derive(Debug, Clone)]
pub struct PlacedFile {
    /// Directory the file was written to
    pub path: String,
    pub filename: String,
}

/// Receipt file store rooted at a configured directory
#[derive(Clone)]
pub struct ReceiptStorage {
    root: PathBuf,
}

impl ReceiptStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for a stage and submission date
    pub fn stage_dir(&self, stage: Stage, submit_date: NaiveDate) -> PathBuf {
        self.root
            .join(stage.dir_name())
            .join(submit_date.format("%Y-%m-%d").to_string())
    }

    /// Strip a filename down to a safe set of characters
    ///
    /// Whitespace becomes underscores; anything outside ASCII alphanumerics,
    /// dots, and dashes is dropped.
    pub fn sanitize_filename(name: &str) -> String {
        let sanitized: String = name
            .chars()
            .filter_map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    Some(c)
                } else if c.is_whitespace() {
                    Some('_')
                } else {
                    None
                }
            })
            .collect();

        let sanitized = sanitized.trim_matches(['.', '_']).to_string();
        if sanitized.is_empty() {
            "file".to_string()
        } else {
            sanitized
        }
    }

    /// Find a collision-free variant of `desired` within `dir`
    ///
    /// Appends `_1`, `_2`, ... before the extension until the name matches
    /// neither a file on disk nor a row in the file store. The store check
    /// matters: a name can be taken by a record whose file sits in another
    /// stage directory.
    async fn uniquify(
        &self,
        dir: &Path,
        desired: &str,
        receipts: &ReceiptRepository,
    ) -> AppResult<String> {
        let (stem, extension) = match desired.rfind('.') {
            Some(pos) => (&desired[..pos], &desired[pos..]),
            None => (desired, ""),
        };

        let mut candidate = desired.to_string();
        let mut counter = 1;
        while fs::try_exists(dir.join(&candidate)).await? || receipts.file_exists(&candidate).await?
        {
            candidate = format!("{}_{}{}", stem, counter, extension);
            counter += 1;
        }

        Ok(candidate)
    }

    /// Write a new upload into `submitted/<date>/` under a collision-free
    /// name
    pub async fn place_new(
        &self,
        receipts: &ReceiptRepository,
        submit_date: NaiveDate,
        desired_name: &str,
        content: &[u8],
    ) -> AppResult<PlacedFile> {
        let dir = self.stage_dir(Stage::Submitted, submit_date);
        fs::create_dir_all(&dir).await?;

        let desired = Self::sanitize_filename(desired_name);
        let filename = self.uniquify(&dir, &desired, receipts).await?;

        fs::write(dir.join(&filename), content).await?;
        info!("Stored upload {} in {}", filename, dir.display());

        Ok(PlacedFile {
            path: dir.display().to_string(),
            filename,
        })
    }

    /// Move a file between stage directories
    ///
    /// Called after the owning transaction committed the new path; a failure
    /// here means the database and disk disagree and needs manual
    /// reconciliation, so it is logged loudly and surfaced, never swallowed.
    pub async fn move_file(&self, filename: &str, from_dir: &str, to_dir: &str) -> AppResult<()> {
        let source = Path::new(from_dir).join(filename);
        let destination_dir = Path::new(to_dir);
        let destination = destination_dir.join(filename);

        if !fs::try_exists(&source).await? {
            error!(
                "Receipt file {} missing from {}; database points at {} — reconcile manually",
                filename,
                from_dir,
                destination.display()
            );
            return Err(AppError::FileSystem(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Source file {} is missing", source.display()),
            )));
        }

        fs::create_dir_all(destination_dir).await?;
        fs::rename(&source, &destination).await.map_err(|e| {
            error!(
                "Failed to move {} to {}; database already points at the destination — reconcile manually: {}",
                source.display(),
                destination.display(),
                e
            );
            AppError::FileSystem(e)
        })?;

        info!("Moved {} to {}", source.display(), to_dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            ReceiptStorage::sanitize_filename("2024-05-01_Kalle Kula.pdf"),
            "2024-05-01_Kalle_Kula.pdf"
        );
        assert_eq!(ReceiptStorage::sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(ReceiptStorage::sanitize_filename("???"), "file");
    }

    #[test]
    fn test_stage_dir_layout() {
        let storage = ReceiptStorage::new("/data/receipts");
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            storage.stage_dir(Stage::Approved, date),
            PathBuf::from("/data/receipts/approved/2024-05-01")
        );
    }

    #[test]
    fn test_stage_for_status() {
        assert_eq!(Stage::for_status(ReceiptStatus::Pending), Stage::Submitted);
        assert_eq!(Stage::for_status(ReceiptStatus::Handled), Stage::Approved);
        assert_eq!(Stage::for_status(ReceiptStatus::Rejected), Stage::Rejected);
    }
}
