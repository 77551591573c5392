//! Job finalization -- evaluate the engine outcome and set the final status.

use std::path::Path;

use crate::classify::classify;
use crate::compiler::RequestConfig;
use crate::engine::{EngineOutcome, EntryOutcome};
use crate::types::{
    ErrorKind, Event, JobError, JobResult, MediaItem, ResultSummary, SkipRecord, Status,
};

use super::context::JobTaskContext;
use super::orchestration::RunFailure;

/// Turn per-entry outcomes into the job's terminal result.
///
/// - any hard failure fails the job with the first failure's classification
/// - skips alone never fail the job unless nothing succeeded
/// - no entries at all is a download failure
pub(super) fn evaluate_outcome(outcome: EngineOutcome) -> JobResult {
    let mut downloads = Vec::new();
    let mut skipped = Vec::new();
    let mut failed = 0;
    let mut first_failure: Option<String> = None;

    for entry in outcome.entries {
        match entry {
            EntryOutcome::Downloaded(item) => downloads.push(item),
            EntryOutcome::Skipped { index, reason } => skipped.push(SkipRecord { index, reason }),
            EntryOutcome::Failed { index, message } => {
                tracing::debug!(index, message = %message, "entry failed");
                failed += 1;
                first_failure.get_or_insert(message);
            }
        }
    }

    let summary = ResultSummary {
        total_attempted: downloads.len() + skipped.len() + failed,
        successful: downloads.len(),
        failed,
        skipped: skipped.len(),
    };

    let error = match first_failure {
        Some(message) => classify(&message),
        None if downloads.is_empty() && skipped.is_empty() => {
            JobError::new(ErrorKind::DownloadFailed, "no media was produced")
        }
        None if downloads.is_empty() => JobError::new(
            ErrorKind::PartialSkip,
            format!(
                "all {} entries could not be retrieved: {}",
                skipped.len(),
                skipped
                    .iter()
                    .map(|s| s.reason.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        ),
        None => {
            return JobResult::Completed {
                downloads,
                skipped,
                summary,
            };
        }
    };

    JobResult::Failed {
        error,
        skipped,
        summary,
    }
}

/// Evaluate the engine result, run transcription if requested, and record the
/// terminal status.
pub(super) async fn finalize_job(
    ctx: JobTaskContext,
    config: &RequestConfig,
    run: Result<EngineOutcome, RunFailure>,
) {
    let id = ctx.id;

    let (result, produced) = match run {
        Ok(outcome) => {
            let produced: Vec<String> = outcome
                .entries
                .iter()
                .filter_map(|entry| match entry {
                    EntryOutcome::Downloaded(item) => Some(item.filename.clone()),
                    _ => None,
                })
                .collect();
            (evaluate_outcome(outcome), produced)
        }
        Err(failure) => {
            ctx.mark_failed(failure.into_job_error()).await;
            ctx.remove_from_active().await;
            return;
        }
    };

    let (mut downloads, skipped, summary) = match result {
        JobResult::Completed {
            downloads,
            skipped,
            summary,
        } => (downloads, skipped, summary),
        failed => {
            remove_artifacts(&ctx, &produced).await;
            ctx.finish_failed(failed).await;
            ctx.remove_from_active().await;
            return;
        }
    };

    let mut warnings = Vec::new();
    if let Some(directive) = &config.transcription
        && let Some(warning) = transcribe_items(&ctx, &directive.language, &mut downloads).await
    {
        tracing::warn!(job_id = %id, warning = %warning, "transcription skipped");
        warnings.push(warning);
    }

    if !skipped.is_empty() {
        tracing::warn!(
            job_id = %id,
            skipped = skipped.len(),
            successful = summary.successful,
            "some playlist entries were skipped"
        );
    }

    let items = downloads.len();
    let completed = JobResult::Completed {
        downloads,
        skipped,
        summary,
    };

    let outcome = ctx
        .store
        .update(id, move |job| {
            job.status = Status::Completed;
            job.progress = 100.0;
            job.result = Some(completed);
            job.warnings.extend(warnings);
        })
        .await;

    match outcome {
        Ok(outcome) if outcome.is_applied() => {
            tracing::info!(job_id = %id, items, "job completed");
            ctx.event_tx.send(Event::Completed { id, items }).ok();
        }
        Ok(_) => {
            tracing::debug!(job_id = %id, "job already finished, completion not recorded");
        }
        Err(e) => {
            tracing::error!(job_id = %id, error = %e, "failed to mark job completed");
        }
    }

    ctx.remove_from_active().await;
}

/// Delete what a failed job left in the download directory.
///
/// Each produced file goes together with every file sharing its stem, which
/// covers thumbnails, `.info.json`, subtitles and leftover `.part` fragments.
async fn remove_artifacts(ctx: &JobTaskContext, produced: &[String]) {
    let prefixes: Vec<String> = produced
        .iter()
        .filter_map(|name| Path::new(name).file_stem())
        .map(|stem| format!("{}.", stem.to_string_lossy()))
        .collect();
    if prefixes.is_empty() {
        return;
    }

    let dir = ctx.config.download_dir();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(job_id = %ctx.id, dir = %dir.display(), error = %e, "cannot scan download directory");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(job_id = %ctx.id, error = %e, "download directory scan interrupted");
                break;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if !prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
            continue;
        }
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => tracing::debug!(job_id = %ctx.id, file = %name, "removed artifact of failed job"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id = %ctx.id, file = %name, error = %e, "failed to remove artifact");
            }
        }
    }
}

/// Transcribe every produced item in place.
///
/// Returns a warning instead of transcribing when no transcriber is available.
/// A failure on one item is recorded on that item only.
async fn transcribe_items(
    ctx: &JobTaskContext,
    language: &str,
    downloads: &mut [MediaItem],
) -> Option<String> {
    if !ctx.transcriber.is_available() {
        return Some(format!(
            "transcription requested but no transcriber is available ({})",
            ctx.transcriber.name()
        ));
    }

    let entered = ctx
        .store
        .update(ctx.id, |job| job.status = Status::Processing)
        .await;
    if let Ok(outcome) = entered
        && outcome.is_applied()
    {
        ctx.event_tx.send(Event::Processing { id: ctx.id }).ok();
    }

    for item in downloads.iter_mut() {
        let media_file = ctx.config.download_dir().join(&item.filename);
        match ctx.transcriber.transcribe(&media_file, language).await {
            Ok(transcription) => {
                tracing::info!(
                    job_id = %ctx.id,
                    file = %item.filename,
                    segments = transcription.segments,
                    "transcription finished"
                );
                item.transcription = Some(transcription);
            }
            Err(e) => {
                tracing::warn!(job_id = %ctx.id, file = %item.filename, error = %e, "transcription failed");
                item.transcription_error = Some(e.to_string());
            }
        }
    }

    None
}
