//! Per-run extraction context.
//!
//! Built once at startup and passed to the walker and the store, so nothing
//! in the pipeline reads process-wide state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};

use crate::config::{self, Config};
use crate::error::{HarvestError, Result};
use crate::export::attachment::AttachmentMaterializer;
use crate::resolve::classify::SentFolders;

#[derive(Debug, Clone)]
pub struct ExtractContext {
    /// SQLite database receiving the records.
    pub database: PathBuf,
    pub materializer: AttachmentMaterializer,
    /// Records per transaction; never zero.
    pub batch_size: usize,
    /// Offset used for `local_time` and attachment folder dates.
    pub utc_offset: FixedOffset,
    pub sent_folders: SentFolders,
    pub fallback_domain: Option<String>,
    cancel: Arc<AtomicBool>,
}

impl ExtractContext {
    /// Context with default settings.
    pub fn new(database: impl Into<PathBuf>, attachment_dir: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            materializer: AttachmentMaterializer::new(attachment_dir),
            batch_size: 1,
            utc_offset: default_offset(),
            sent_folders: SentFolders::default(),
            fallback_domain: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Context for one archive, from the loaded configuration.
    pub fn from_config(config: &Config, archive_path: &Path) -> Result<Self> {
        let extraction = &config.extraction;
        if extraction.batch_size == 0 {
            return Err(HarvestError::Config(
                "extraction.batch_size must be at least 1".to_string(),
            ));
        }
        let utc_offset = extraction
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                HarvestError::Config(format!(
                    "extraction.utc_offset_minutes out of range: {}",
                    extraction.utc_offset_minutes
                ))
            })?;

        Ok(Self {
            database: config::database_path(config, archive_path),
            materializer: AttachmentMaterializer::new(&config.storage.attachment_dir),
            batch_size: extraction.batch_size,
            utc_offset,
            sent_folders: SentFolders::with_extra(&extraction.extra_sent_folders),
            fallback_domain: extraction
                .fallback_domain
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an externally owned cancellation flag (e.g. one set by a signal
    /// handler).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.storage.db_dir = PathBuf::from("/db");
        config.extraction.utc_offset_minutes = -300;
        config.extraction.fallback_domain = Some("  ".to_string());

        let ctx = ExtractContext::from_config(&config, Path::new("mail.json")).unwrap();
        assert_eq!(ctx.database, PathBuf::from("/db/mail.db"));
        assert_eq!(ctx.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(ctx.fallback_domain, None);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = Config::default();
        config.extraction.batch_size = 0;
        assert!(matches!(
            ExtractContext::from_config(&config, Path::new("a.json")),
            Err(HarvestError::Config(_))
        ));

        let mut config = Config::default();
        config.extraction.utc_offset_minutes = 48 * 60;
        assert!(ExtractContext::from_config(&config, Path::new("a.json")).is_err());
    }

    #[test]
    fn test_shared_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = ExtractContext::new("a.db", "att").with_cancel_flag(Arc::clone(&flag));
        flag.store(true, Ordering::Relaxed);
        assert!(ctx.is_cancelled());
    }
}
