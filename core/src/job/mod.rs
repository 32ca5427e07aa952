use std::{
	collections::{HashMap, HashSet, VecDeque},
	sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
	binder::{RecordType, RemoteId},
	runtime::Runtime,
	BackendId, Direction, LocalId,
};

mod worker;

const MAX_WORKERS: usize = 5;

pub type JobId = Uuid;

/// Serializable description of one deferred synchronization.
///
/// The queue guarantees at-least-once execution, never exactly-once; the
/// single-record operations are idempotent under re-application, so a job
/// that ran twice converges on the same state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
	pub direction: Direction,
	pub backend_id: BackendId,
	pub record_type: RecordType,
	pub target: JobTarget,
	#[serde(default)]
	pub force_deactivate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobTarget {
	Local(LocalId),
	Remote(RemoteId),
}

impl SyncJob {
	#[must_use]
	pub fn export(backend_id: BackendId, record_type: RecordType, local_id: LocalId) -> Self {
		Self {
			direction: Direction::Export,
			backend_id,
			record_type,
			target: JobTarget::Local(local_id),
			force_deactivate: false,
		}
	}

	/// Deactivate without consulting the record's active flag, saving the
	/// extra store round trip when the caller already knows.
	#[must_use]
	pub fn deactivate(backend_id: BackendId, record_type: RecordType, local_id: LocalId) -> Self {
		Self {
			force_deactivate: true,
			..Self::export(backend_id, record_type, local_id)
		}
	}

	#[must_use]
	pub fn import(backend_id: BackendId, record_type: RecordType, remote_id: RemoteId) -> Self {
		Self {
			direction: Direction::Import,
			backend_id,
			record_type,
			target: JobTarget::Remote(remote_id),
			force_deactivate: false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
	Queued,
	Running,
	Completed,
	Failed,
}

/// Persistent trace of one job; failures are recorded here, never silently
/// discarded.
#[derive(Debug, Clone)]
pub struct JobReport {
	pub id: JobId,
	pub job: SyncJob,
	pub status: JobStatus,
	pub enqueued_at: DateTime<Utc>,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub error: Option<String>,
}

pub(crate) enum JobsEvent {
	Ingest,
	WorkDone(JobId, Result<(), String>),
	Shutdown(oneshot::Sender<()>),
}

#[must_use = "'job::Actor::start' must be called to start the job actor"]
pub struct Actor {
	jobs: Arc<Jobs>,
	internal_receiver: mpsc::UnboundedReceiver<JobsEvent>,
}

impl Actor {
	pub fn start(mut self, runtime: Arc<Runtime>) {
		tokio::spawn(async move {
			let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

			while let Some(event) = self.internal_receiver.recv().await {
				match event {
					JobsEvent::Ingest => {
						if shutdown_reply.is_none() {
							self.jobs.dispatch(&runtime).await;
						}
					}
					JobsEvent::WorkDone(id, outcome) => {
						self.jobs.complete(id, outcome).await;

						if shutdown_reply.is_some() {
							if self.jobs.running.read().await.is_empty() {
								info!("Job queue drained; completing shutdown");
								if let Some(reply) = shutdown_reply.take() {
									reply.send(()).ok();
								}
								break;
							}
						} else {
							self.jobs.dispatch(&runtime).await;
						}
					}
					// Stop dispatching and reply once the running workers
					// have drained
					JobsEvent::Shutdown(reply) => {
						info!("Shutting down job queue");
						if self.jobs.running.read().await.is_empty() {
							reply.send(()).ok();
							break;
						}
						shutdown_reply = Some(reply);
					}
				}
			}
		});
	}
}

/// FIFO deferred-execution facility handing sync jobs to a bounded pool of
/// workers.
pub struct Jobs {
	queue: RwLock<VecDeque<JobId>>,
	running: RwLock<HashSet<JobId>>,
	reports: RwLock<HashMap<JobId, JobReport>>,
	internal_sender: mpsc::UnboundedSender<JobsEvent>,
}

impl Jobs {
	/// Initializes the queue and the actor to be started on a runtime.
	pub fn new() -> (Arc<Self>, Actor) {
		let (internal_sender, internal_receiver) = mpsc::unbounded_channel();

		let this = Arc::new(Self {
			queue: RwLock::new(VecDeque::new()),
			running: RwLock::new(HashSet::new()),
			reports: RwLock::new(HashMap::new()),
			internal_sender,
		});

		(
			Arc::clone(&this),
			Actor {
				jobs: this,
				internal_receiver,
			},
		)
	}

	#[instrument(
		skip_all,
		fields(direction = ?job.direction, record_type = %job.record_type),
	)]
	pub async fn enqueue(&self, job: SyncJob) -> JobId {
		let id = Uuid::new_v4();

		self.reports.write().await.insert(
			id,
			JobReport {
				id,
				job,
				status: JobStatus::Queued,
				enqueued_at: Utc::now(),
				started_at: None,
				completed_at: None,
				error: None,
			},
		);
		self.queue.write().await.push_back(id);

		debug!(job_id = %id, "Enqueued sync job;");

		if self.internal_sender.send(JobsEvent::Ingest).is_err() {
			error!("Error sending job ingest event");
		}

		id
	}

	pub async fn report(&self, id: JobId) -> Option<JobReport> {
		self.reports.read().await.get(&id).cloned()
	}

	/// Jobs that are queued or still running.
	pub async fn pending(&self) -> usize {
		self.queue.read().await.len() + self.running.read().await.len()
	}

	pub async fn shutdown(&self) {
		let (reply, wait) = oneshot::channel();
		if self.internal_sender.send(JobsEvent::Shutdown(reply)).is_ok() {
			wait.await.ok();
		}
	}

	/// Hands queued jobs to workers while under the `MAX_WORKERS` limit.
	async fn dispatch(&self, runtime: &Arc<Runtime>) {
		let mut running = self.running.write().await;
		let mut queue = self.queue.write().await;
		let mut reports = self.reports.write().await;

		while running.len() < MAX_WORKERS {
			let Some(id) = queue.pop_front() else {
				break;
			};

			let Some(report) = reports.get_mut(&id) else {
				error!(job_id = %id, "Queued job has no report; dropping");
				continue;
			};

			report.status = JobStatus::Running;
			report.started_at = Some(Utc::now());
			running.insert(id);

			tokio::spawn(worker::run(
				id,
				report.job.clone(),
				Arc::clone(runtime),
				self.internal_sender.clone(),
			));
		}
	}

	async fn complete(&self, id: JobId, outcome: Result<(), String>) {
		self.running.write().await.remove(&id);

		let mut reports = self.reports.write().await;
		let Some(report) = reports.get_mut(&id) else {
			error!(job_id = %id, "Completed job has no report");
			return;
		};

		report.completed_at = Some(Utc::now());
		match outcome {
			Ok(()) => report.status = JobStatus::Completed,
			Err(error) => {
				warn!(job_id = %id, %error, "Sync job failed;");
				report.status = JobStatus::Failed;
				report.error = Some(error);
			}
		}
	}
}
