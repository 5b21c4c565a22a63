//! Write message attachments to disk.
//!
//! The name on disk is generated from the email id, a timestamp and the
//! original extension; the original filename is kept as metadata only.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::archive::{ArchiveAttachment, ArchiveMessage};
use crate::error::{HarvestError, Result};
use crate::model::mail::AttachmentRecord;
use crate::model::property::LogicalProperty;
use crate::resolve::property::{get_string, is_sentinel};

/// Longest original filename kept, in characters.
const MAX_NAME_CHARS: usize = 200;

/// Longest extension (dot included) carried over to the physical name.
const MAX_EXTENSION_CHARS: usize = 16;

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("valid filename regex"));

/// Images Outlook generates for inline pictures in rich-text bodies.
static INLINE_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^image\d{3}\.(png|jpg|jpeg|gif|bmp|tiff|wmf|emf)$")
        .expect("valid inline image regex")
});

/// Writes attachments under a base directory.
#[derive(Debug, Clone)]
pub struct AttachmentMaterializer {
    base_dir: PathBuf,
}

/// Outcome of one attachment index.
enum Materialized {
    Written(AttachmentRecord),
    InlineImage,
}

impl AttachmentMaterializer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Materialize attachments `0..attachment_count` of a message into
    /// `<base_dir>/<save_folder>`.
    ///
    /// A failing attachment is logged and skipped; the others are still
    /// written. Inline images are neither written nor returned.
    pub fn extract<M: ArchiveMessage + ?Sized>(
        &self,
        message: &M,
        save_folder: &str,
        email_id: &str,
        attachment_count: usize,
    ) -> Vec<AttachmentRecord> {
        let target = self.base_dir.join(save_folder);
        let mut records = Vec::with_capacity(attachment_count);

        for index in 0..attachment_count {
            match self.materialize(message, index, &target, save_folder, email_id) {
                Ok(Materialized::Written(record)) => records.push(record),
                Ok(Materialized::InlineImage) => {}
                Err(e) => warn!(email_id, index, error = %e, "Skipping attachment"),
            }
        }

        records
    }

    fn materialize<M: ArchiveMessage + ?Sized>(
        &self,
        message: &M,
        index: usize,
        target: &Path,
        save_folder: &str,
        email_id: &str,
    ) -> Result<Materialized> {
        let read_error = |reason: String| HarvestError::AttachmentRead {
            email_id: email_id.to_string(),
            index,
            reason,
        };

        let attachment = message
            .attachment(index)
            .map_err(|e| read_error(e.to_string()))?;

        let original = sanitize_filename(&original_name(&attachment).unwrap_or_default());
        if is_inline_image(&original) {
            debug!(email_id, index, filename = %original, "Skipping inline image");
            return Ok(Materialized::InlineImage);
        }

        let declared = attachment
            .size()
            .map_err(|e| read_error(e.to_string()))?;
        let data = attachment
            .read_payload()
            .map_err(|e| read_error(e.to_string()))?;
        if data.len() as u64 != declared {
            warn!(
                email_id,
                index,
                declared,
                read = data.len(),
                "Attachment payload differs from declared size, keeping bytes read"
            );
        }

        std::fs::create_dir_all(target).map_err(|e| HarvestError::io(target, e))?;
        let path = unique_path(&target.join(physical_filename(email_id, &original, Utc::now())));
        std::fs::write(&path, &data).map_err(|e| HarvestError::io(&path, e))?;

        let physical = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(
            email_id,
            index,
            original = %original,
            physical = %physical,
            size = data.len(),
            "Wrote attachment"
        );

        Ok(Materialized::Written(AttachmentRecord {
            email_id: email_id.to_string(),
            original_filename: original,
            physical_filename: physical,
            save_folder: save_folder.to_string(),
            size: data.len() as u64,
        }))
    }
}

/// Original filename: filename properties in priority order, then the
/// reader's own name accessor. Placeholder values are ignored.
fn original_name<A: ArchiveAttachment + ?Sized>(attachment: &A) -> Option<String> {
    get_string(
        attachment,
        LogicalProperty::AttachmentFilename.tags(),
        |value| !is_sentinel(value),
    )
    .or_else(|| {
        attachment
            .alternate_name()
            .ok()
            .flatten()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty() && !is_sentinel(name))
    })
}

/// Make a filename safe on common filesystems.
///
/// Reserved characters and control characters become `_`, trailing dots and
/// spaces are removed, and an empty result is replaced by `file_<random>`.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = INVALID_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);
    let limited: String = trimmed.chars().take(MAX_NAME_CHARS).collect();

    if limited.is_empty() {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("file_{}", &id[..8])
    } else {
        limited
    }
}

/// Whether a sanitized name is an auto-generated inline image (`image001.png`).
pub fn is_inline_image(name: &str) -> bool {
    INLINE_IMAGE.is_match(name)
}

/// `{email_id}_{YYYYmmddHHMMSS}_{micros}{.ext}`.
pub fn physical_filename(email_id: &str, original: &str, at: DateTime<Utc>) -> String {
    format!(
        "{email_id}_{}_{:06}{}",
        at.format("%Y%m%d%H%M%S"),
        at.timestamp_subsec_micros(),
        extension_of(original)
    )
}

/// Extension with its leading dot, or `""`.
fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => {
            let ext = &name[pos..];
            if ext.chars().count() <= MAX_EXTENSION_CHARS && !ext.contains(' ') {
                ext
            } else {
                ""
            }
        }
        _ => "",
    }
}

/// If `path` already exists, append `_1`, `_2`, ... to the stem until free.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut counter: u64 = 1;
    loop {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{counter}"))
        } else {
            parent.join(format!("{stem}_{counter}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
