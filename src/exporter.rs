//! Resumable batch export of mailbox messages into a session CSV.
//!
//! A session moves through: resolve (fresh or resume) → stream (fetch,
//! extract, buffer, flush every `dump_frequency` records) → finalize (flush
//! the rest, rename with the completion stamp, clear the checkpoint). Any
//! error while streaming flushes the buffer before it is returned, so the
//! checkpoint never names a message that is missing from the output file.

use crate::checkpoint::{CheckpointStore, CommittedIds};
use crate::config::ExportConfig;
use crate::email_content::parse_with_error_handling;
use crate::error::ExportError;
use crate::gmail_api::MessageSource;
use crate::output::{self, timestamp_now, SessionPaths};
use crate::prompt::ResumePrompt;
use crate::types::{ExportRecord, LabelMap, MessageRef};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// How a session begins after looking for a checkpoint.
#[derive(Debug, PartialEq)]
enum SessionStart {
    Fresh,
    Resuming(CommittedIds),
}

/// In-memory state of one export session.
struct Session {
    id: String,
    paths: SessionPaths,
    committed: CommittedIds,
    buffer: Vec<ExportRecord>,
    resumed: bool,
}

impl Session {
    /// Append the buffer to the output file, then save the full committed set.
    fn flush(&mut self, checkpoints: &CheckpointStore) -> Result<(), ExportError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let path = self.paths.in_progress();
        let written = output::append_records(&path, &self.buffer)?;
        self.committed
            .extend(self.buffer.drain(..).map(|record| record.message.id));
        checkpoints.save(&self.id, &self.committed)?;

        tracing::debug!(
            "Flushed {} messages to {} ({} committed)",
            written,
            path.display(),
            self.committed.len()
        );
        Ok(())
    }
}

pub struct BatchExporter<'a, S: ?Sized, P> {
    source: &'a S,
    prompt: P,
    checkpoints: CheckpointStore,
    emails_dir: PathBuf,
    dump_frequency: usize,
}

impl<'a, S, P> BatchExporter<'a, S, P>
where
    S: MessageSource + ?Sized,
    P: ResumePrompt,
{
    pub fn new(source: &'a S, prompt: P, config: &ExportConfig) -> Result<Self, ExportError> {
        let emails_dir = config.emails_dir();
        if !emails_dir.exists() {
            tracing::info!("Creating directory: {}", emails_dir.display());
        }
        fs::create_dir_all(&emails_dir).map_err(|e| ExportError::output(&emails_dir, e))?;

        Ok(Self {
            source,
            prompt,
            checkpoints: CheckpointStore::new(config.checkpoints_dir())?,
            emails_dir,
            dump_frequency: config.dump_frequency.max(1),
        })
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Export `messages` into the CSV of `session_id` (or a new timestamped
    /// session) and return the path of the finished file.
    pub async fn save_messages(
        &self,
        messages: &[MessageRef],
        labels: &LabelMap,
        session_id: Option<&str>,
        force_fresh: bool,
    ) -> Result<PathBuf, ExportError> {
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(timestamp_now);
        let mut session = self.resolve_session(&session_id, force_fresh)?;

        let remaining = remaining_messages(messages, &session.committed);
        if session.resumed {
            tracing::info!(
                "Resuming processing: {} messages remaining",
                remaining.len()
            );
        }

        if let Err(e) = self.stream(&mut session, &remaining, labels).await {
            tracing::error!("Error during processing: {}", e);
            // Save what is buffered before giving up
            if let Err(flush_err) = session.flush(&self.checkpoints) {
                tracing::error!("Failed to save buffered messages: {}", flush_err);
            }
            return Err(e);
        }

        self.finalize(session)
    }

    fn resolve_session(&self, session_id: &str, force_fresh: bool) -> Result<Session, ExportError> {
        let paths = SessionPaths::new(&self.emails_dir, session_id);

        let start = if force_fresh {
            SessionStart::Fresh
        } else {
            match self.checkpoints.load(session_id)? {
                Some(ids) => {
                    tracing::info!("Found existing checkpoint for session {}", session_id);
                    if self.prompt.confirm_resume(session_id, ids.len())? {
                        SessionStart::Resuming(ids)
                    } else {
                        SessionStart::Fresh
                    }
                }
                None => SessionStart::Fresh,
            }
        };

        let (committed, resumed) = match start {
            SessionStart::Fresh => {
                tracing::info!("Starting fresh process with session ID: {}", session_id);
                self.checkpoints.clear(session_id)?;
                let in_progress = paths.in_progress();
                if in_progress.exists() {
                    tracing::warn!("Removing partial output {}", in_progress.display());
                    fs::remove_file(&in_progress)
                        .map_err(|e| ExportError::output(&in_progress, e))?;
                }
                (CommittedIds::new(), false)
            }
            SessionStart::Resuming(ids) => {
                if !paths.in_progress().exists() && paths.find_completed()?.is_none() {
                    tracing::warn!(
                        "Checkpoint for {} lists {} messages but {} is missing; \
                         they will not be exported again (use --fresh to start over)",
                        session_id,
                        ids.len(),
                        paths.in_progress().display()
                    );
                }
                (ids, true)
            }
        };

        Ok(Session {
            id: session_id.to_string(),
            paths,
            committed,
            buffer: Vec::with_capacity(self.dump_frequency),
            resumed,
        })
    }

    async fn stream(
        &self,
        session: &mut Session,
        remaining: &[&MessageRef],
        labels: &LabelMap,
    ) -> Result<(), ExportError> {
        let total = remaining.len();
        for (i, message_ref) in remaining.iter().enumerate() {
            let record = self.process(message_ref, labels).await?;
            session.buffer.push(record);

            if session.buffer.len() >= self.dump_frequency {
                session.flush(&self.checkpoints)?;
                tracing::info!("Processing emails: {}/{}", i + 1, total);
            }
        }
        Ok(())
    }

    // Fetch one message and turn it into an export row
    async fn process(
        &self,
        message_ref: &MessageRef,
        labels: &LabelMap,
    ) -> Result<ExportRecord, ExportError> {
        let message = self.source.get_message_detail(&message_ref.id).await?;
        let body = parse_with_error_handling(message.payload.as_ref());
        let label_names = labels.resolve(&message.label_ids);
        Ok(ExportRecord::new(message, body, label_names))
    }

    fn finalize(&self, mut session: Session) -> Result<PathBuf, ExportError> {
        session.flush(&self.checkpoints)?;

        let in_progress = session.paths.in_progress();
        if !in_progress.exists() {
            // A resumed session with nothing left to do and no partial file
            // was already renamed before its checkpoint could be cleared.
            if session.resumed {
                if let Some(done) = session.paths.find_completed()? {
                    tracing::warn!(
                        "Session {} was already finalized as {}; clearing its stale checkpoint",
                        session.id,
                        done.display()
                    );
                    self.checkpoints.clear(&session.id)?;
                    return Ok(done);
                }
            }
            output::write_empty(&in_progress)?;
        }

        // Rename before clearing: a crash in between leaves the checkpoint,
        // which the branch above recognizes on the next run.
        let final_path = session.paths.completed(&timestamp_now());
        fs::rename(&in_progress, &final_path).map_err(|e| ExportError::output(&in_progress, e))?;
        self.checkpoints.clear(&session.id)?;

        tracing::info!(
            "Session {} complete: {} messages in {}",
            session.id,
            session.committed.len(),
            final_path.display()
        );
        Ok(final_path)
    }
}

// Messages not yet committed, in source order, each id at most once.
// Repeated ids in one listing are deliberately written once: the checkpoint
// size must always equal the row count.
fn remaining_messages<'m>(
    messages: &'m [MessageRef],
    committed: &CommittedIds,
) -> Vec<&'m MessageRef> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| !committed.contains(&m.id))
        .filter(|m| {
            let first = seen.insert(m.id.as_str());
            if !first {
                tracing::debug!("Skipping duplicate message id {}", m.id);
            }
            first
        })
        .collect()
}
