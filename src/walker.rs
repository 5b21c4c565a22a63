//! Depth-first traversal of the archive folder tree.
//!
//! Within a folder, messages are handled in declared order before the child
//! folders, which are visited in declared order. Each message runs inside
//! its own error boundary: a failure is logged and counted, and the walk
//! moves on.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::archive::{ArchiveFolder, ArchiveMessage, MailboxArchive};
use crate::context::ExtractContext;
use crate::error::{HarvestError, Result};
use crate::extract::build_record;
use crate::model::mail::EmailRecord;
use crate::resolve::classify::is_mail_class;
use crate::resolve::property::message_class;
use crate::store;

/// Characters of the subject shown in log lines.
const SUBJECT_LOG_CHARS: usize = 30;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub folders: usize,
    pub messages_seen: usize,
    /// Items that are not mail (appointments, contacts, ...).
    pub skipped_non_mail: usize,
    /// Folders or messages reached a second time.
    pub revisits: usize,
    pub persisted: usize,
    pub failed: usize,
    pub attachments: usize,
    pub attachment_bytes: u64,
    /// The walk stopped early on request.
    pub cancelled: bool,
}

/// Traversal state for one archive.
pub struct FolderWalker<'a> {
    ctx: &'a ExtractContext,
    progress: &'a dyn Fn(&WalkStats),
    visited_folders: HashSet<u64>,
    seen_messages: HashSet<u64>,
    pending: Vec<EmailRecord>,
    stats: WalkStats,
}

impl<'a> FolderWalker<'a> {
    pub fn new(ctx: &'a ExtractContext, progress: &'a dyn Fn(&WalkStats)) -> Self {
        Self {
            ctx,
            progress,
            visited_folders: HashSet::new(),
            seen_messages: HashSet::new(),
            pending: Vec::with_capacity(ctx.batch_size),
            stats: WalkStats::default(),
        }
    }

    /// Walk the tree below `root` and persist every mail item.
    ///
    /// The root's own name is not part of any folder path.
    pub fn walk<F: ArchiveFolder>(mut self, root: &F) -> WalkStats {
        self.visit(root, None);
        self.flush();
        if self.stats.cancelled {
            info!("Walk cancelled, pending records flushed");
        }
        self.stats
    }

    fn visit<F: ArchiveFolder>(&mut self, folder: &F, path: Option<&str>) {
        if self.ctx.is_cancelled() {
            self.stats.cancelled = true;
            return;
        }
        if !self.visited_folders.insert(folder.identifier()) {
            warn!(folder_id = folder.identifier(), "Folder already visited, skipping");
            self.stats.revisits += 1;
            return;
        }
        self.stats.folders += 1;
        let folder_path = path.unwrap_or_default();
        debug!(folder = folder_path, "Entering folder");

        match folder.messages() {
            Ok(messages) => {
                for message in &messages {
                    if self.ctx.is_cancelled() {
                        self.stats.cancelled = true;
                        return;
                    }
                    self.process_message(message, folder_path);
                    (self.progress)(&self.stats);
                }
            }
            Err(e) => warn!(folder = folder_path, error = %e, "Cannot list messages"),
        }

        match folder.sub_folders() {
            Ok(children) => {
                for child in &children {
                    let name = child.name();
                    let child_path = match path {
                        Some(parent) => format!("{parent}/{name}"),
                        None => name,
                    };
                    self.visit(child, Some(&child_path));
                    if self.stats.cancelled {
                        return;
                    }
                }
            }
            Err(e) => warn!(folder = folder_path, error = %e, "Cannot list sub-folders"),
        }
    }

    fn process_message<M: ArchiveMessage>(&mut self, message: &M, folder_path: &str) {
        self.stats.messages_seen += 1;
        let id = message.identifier();
        if !self.seen_messages.insert(id) {
            warn!(email_id = id, "Message already processed, skipping");
            self.stats.revisits += 1;
            return;
        }

        match message_class(message) {
            Some(class) if is_mail_class(&class) => {}
            class => {
                trace!(email_id = id, class = ?class, "Skipping non-mail item");
                self.stats.skipped_non_mail += 1;
                return;
            }
        }

        match build_record(message, folder_path, self.ctx) {
            Ok(record) => {
                self.stats.attachments += record.attachments.len();
                self.stats.attachment_bytes += record.attachments.iter().map(|a| a.size).sum::<u64>();
                self.pending.push(record);
                if self.pending.len() >= self.ctx.batch_size {
                    self.flush();
                }
            }
            Err(e) => {
                let subject: String = message
                    .subject()
                    .ok()
                    .flatten()
                    .unwrap_or_default()
                    .chars()
                    .take(SUBJECT_LOG_CHARS)
                    .collect();
                warn!(email_id = id, subject = %subject, error = %e, "Skipping message");
                self.stats.failed += 1;
            }
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        match store::save_batch(&self.ctx.database, &batch) {
            Ok(committed) => self.stats.persisted += committed,
            Err(e) => {
                for record in &batch {
                    warn!(
                        email_id = %record.email_id,
                        subject = %record.subject_prefix(SUBJECT_LOG_CHARS),
                        error = %e,
                        "Batch rolled back"
                    );
                }
                self.stats.failed += batch.len();
            }
        }
    }
}

/// Run a full extraction over an opened archive.
///
/// Prepares the schema, walks from the root and always closes the archive,
/// whatever the outcome. Only schema and root-folder failures are errors.
pub fn harvest<A: MailboxArchive>(
    archive: &mut A,
    archive_path: &Path,
    ctx: &ExtractContext,
    progress: &dyn Fn(&WalkStats),
) -> Result<WalkStats> {
    let result = run(archive, archive_path, ctx, progress);
    if let Err(e) = archive.close() {
        warn!(path = %archive_path.display(), error = %e, "Failed to close archive");
    }
    result
}

fn run<A: MailboxArchive>(
    archive: &A,
    archive_path: &Path,
    ctx: &ExtractContext,
    progress: &dyn Fn(&WalkStats),
) -> Result<WalkStats> {
    store::ensure_schema(&ctx.database)?;
    let root = archive
        .root_folder()
        .map_err(|e| HarvestError::ArchiveAccess {
            path: archive_path.to_path_buf(),
            reason: e.to_string(),
        })?;
    info!(
        archive = %archive_path.display(),
        database = %ctx.database.display(),
        "Starting extraction"
    );
    Ok(FolderWalker::new(ctx, progress).walk(&root))
}
