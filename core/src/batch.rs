use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{instrument, warn};

use crate::{
	binder::RecordType,
	context::SyncContext,
	error::Error,
	job::{Jobs, SyncJob},
};

/// Extension points bracketing a whole batch run; no-op by default.
#[async_trait]
pub trait BatchHooks: Send + Sync {
	async fn before_batch(&self) -> Result<(), Error> {
		Ok(())
	}

	async fn after_batch(&self, _report: &BatchReport) -> Result<(), Error> {
		Ok(())
	}
}

pub struct NoopBatchHooks;

impl BatchHooks for NoopBatchHooks {}

/// What happened to each candidate of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
	pub attempted: usize,
	pub succeeded: usize,
	pub failures: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
	/// Local id for exports, remote id for imports.
	pub target: String,
	pub error: String,
}

/// Export every stale binding of the record type inline, one at a time.
/// One record's failure is logged and collected; the batch carries on.
#[instrument(skip_all, fields(record_type = %record_type, cutoff = ?cutoff))]
pub(crate) async fn export_direct(
	ctx: &SyncContext,
	record_type: &RecordType,
	cutoff: Option<DateTime<Utc>>,
) -> Result<BatchReport, Error> {
	let flow = ctx.flow(record_type)?;
	flow.batch_hooks.before_batch().await?;

	let candidates = ctx
		.bindings()
		.select_stale(ctx.backend_id(), record_type, cutoff)
		.await?;

	let mut report = BatchReport::default();

	for binding in candidates {
		report.attempted += 1;

		match ctx.export_record(record_type, binding.local_id, false).await {
			Ok(_) => report.succeeded += 1,
			Err(e) => {
				warn!(local_id = %binding.local_id, %e, "Record export failed; continuing batch;");
				report.failures.push(BatchFailure {
					target: binding.local_id.to_string(),
					error: e.to_string(),
				});
			}
		}
	}

	flow.batch_hooks.after_batch(&report).await?;

	Ok(report)
}

/// Submit one deferred export job per stale binding and return immediately.
/// Ordering across candidates is not guaranteed and not needed; each export
/// is independent and idempotent under re-application.
#[instrument(skip_all, fields(record_type = %record_type, cutoff = ?cutoff))]
pub(crate) async fn export_deferred(
	ctx: &SyncContext,
	jobs: &Jobs,
	record_type: &RecordType,
	cutoff: Option<DateTime<Utc>>,
) -> Result<usize, Error> {
	let flow = ctx.flow(record_type)?;
	flow.batch_hooks.before_batch().await?;

	let candidates = ctx
		.bindings()
		.select_stale(ctx.backend_id(), record_type, cutoff)
		.await?;

	for binding in &candidates {
		jobs.enqueue(SyncJob::export(
			ctx.backend_id(),
			record_type.clone(),
			binding.local_id,
		))
		.await;
	}

	let report = BatchReport {
		attempted: candidates.len(),
		..BatchReport::default()
	};
	flow.batch_hooks.after_batch(&report).await?;

	Ok(candidates.len())
}

/// Re-import every stale, previously imported binding inline.
#[instrument(skip_all, fields(record_type = %record_type, cutoff = ?cutoff))]
pub(crate) async fn import_direct(
	ctx: &SyncContext,
	record_type: &RecordType,
	cutoff: Option<DateTime<Utc>>,
) -> Result<BatchReport, Error> {
	let flow = ctx.flow(record_type)?;
	flow.batch_hooks.before_batch().await?;

	let candidates = ctx
		.bindings()
		.select_stale(ctx.backend_id(), record_type, cutoff)
		.await?;

	let mut report = BatchReport::default();

	for binding in candidates {
		let Some(remote_id) = binding.remote_id else {
			continue;
		};

		report.attempted += 1;

		match ctx.import_record(record_type, &remote_id).await {
			Ok(_) => report.succeeded += 1,
			Err(e) => {
				warn!(%remote_id, %e, "Record import failed; continuing batch;");
				report.failures.push(BatchFailure {
					target: remote_id.to_string(),
					error: e.to_string(),
				});
			}
		}
	}

	flow.batch_hooks.after_batch(&report).await?;

	Ok(report)
}

/// Submit one deferred import job per stale, previously imported binding.
#[instrument(skip_all, fields(record_type = %record_type, cutoff = ?cutoff))]
pub(crate) async fn import_deferred(
	ctx: &SyncContext,
	jobs: &Jobs,
	record_type: &RecordType,
	cutoff: Option<DateTime<Utc>>,
) -> Result<usize, Error> {
	let flow = ctx.flow(record_type)?;
	flow.batch_hooks.before_batch().await?;

	let candidates = ctx
		.bindings()
		.select_stale(ctx.backend_id(), record_type, cutoff)
		.await?;

	let mut submitted = 0;
	for binding in candidates {
		let Some(remote_id) = binding.remote_id else {
			continue;
		};

		jobs.enqueue(SyncJob::import(
			ctx.backend_id(),
			record_type.clone(),
			remote_id,
		))
		.await;
		submitted += 1;
	}

	let report = BatchReport {
		attempted: submitted,
		..BatchReport::default()
	};
	flow.batch_hooks.after_batch(&report).await?;

	Ok(submitted)
}
