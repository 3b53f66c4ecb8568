use crate::errors::AppResult;
use crate::gmail::MailService;
use crate::types::ArchiveRequest;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Nothing to do; no request was made.
    Empty,
    /// Dry run; the batch was not sent.
    Skipped(usize),
    Archived(usize),
}

/// Remove INBOX and UNREAD from every id in one batch call.
pub async fn archive<S: MailService + ?Sized>(
    service: &S,
    ids: &[String],
    dry_run: bool,
) -> AppResult<ArchiveOutcome> {
    if ids.is_empty() {
        return Ok(ArchiveOutcome::Empty);
    }
    if dry_run {
        info!(count = ids.len(), dry_run, "Skipping archive");
        return Ok(ArchiveOutcome::Skipped(ids.len()));
    }

    info!(count = ids.len(), "Archiving messages");
    service.batch_modify(&ArchiveRequest::new(ids.to_vec())).await?;
    Ok(ArchiveOutcome::Archived(ids.len()))
}
