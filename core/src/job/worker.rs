use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, instrument};

use super::{JobId, JobTarget, JobsEvent, SyncJob};
use crate::{error::Error, runtime::Runtime, Direction};

// a worker is a dedicated task that runs a single sync job
// once the job is complete it reports back to the manager and exits
#[instrument(skip_all, fields(job_id = %id))]
pub(super) async fn run(
	id: JobId,
	job: SyncJob,
	runtime: Arc<Runtime>,
	done_tx: mpsc::UnboundedSender<JobsEvent>,
) {
	let outcome = execute(&job, &runtime).await.map_err(|e| e.to_string());

	if done_tx.send(JobsEvent::WorkDone(id, outcome)).is_err() {
		error!("Error sending worker done event");
	}
}

async fn execute(job: &SyncJob, runtime: &Runtime) -> Result<(), Error> {
	let ctx = runtime.context(job.backend_id).await?;

	match (job.direction, &job.target) {
		(Direction::Export, JobTarget::Local(local_id)) => ctx
			.export_record(&job.record_type, *local_id, job.force_deactivate)
			.await
			.map(|_| ()),
		(Direction::Import, JobTarget::Remote(remote_id)) => ctx
			.import_record(&job.record_type, remote_id)
			.await
			.map(|_| ()),
		_ => Err(Error::MalformedJob),
	}
}
