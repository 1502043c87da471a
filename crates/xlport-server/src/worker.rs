//! Dedicated export thread fed through an async channel.
//!
//! Export and import are CPU-bound and synchronous, so they run on one OS
//! thread of their own; request handlers only await the reply.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;
use xlport_xlsx::{Dispatcher, WorkerRequest, WorkerResponse};

const QUEUE_DEPTH: usize = 32;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker is not running")]
    Unavailable,
}

struct Job {
    id: Uuid,
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerResponse>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Cloneable handle to the worker thread. The thread exits once every
/// handle is dropped.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    sender: mpsc::Sender<Job>,
}

impl WorkerHandle {
    pub fn spawn(dispatcher: Dispatcher) -> Result<Self, WorkerError> {
        Self::spawn_with(move |request| dispatcher.handle(request))
    }

    fn spawn_with<F>(handler: F) -> Result<Self, WorkerError>
    where
        F: Fn(WorkerRequest) -> WorkerResponse + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Job>(QUEUE_DEPTH);
        std::thread::Builder::new()
            .name("xlport-worker".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    let span = tracing::info_span!("job", id = %job.id);
                    let _enter = span.enter();
                    let response = run_guarded(&handler, job.request);
                    if job.reply.send(response).is_err() {
                        tracing::debug!("caller went away before the reply");
                    }
                }
                tracing::info!("worker channel closed");
            })?;
        Ok(Self { sender })
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a request and wait for its single terminal response.
    pub async fn submit(&self, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
        let (reply, response) = oneshot::channel();
        let job = Job {
            id: Uuid::new_v4(),
            request,
            reply,
        };
        tracing::debug!(id = %job.id, "job queued");
        self.sender
            .send(job)
            .await
            .map_err(|_| WorkerError::Unavailable)?;
        response.await.map_err(|_| WorkerError::Unavailable)
    }
}

/// Run one job, turning a panic into an error reply so the thread keeps
/// serving later jobs.
fn run_guarded<F>(handler: &F, request: WorkerRequest) -> WorkerResponse
where
    F: Fn(WorkerRequest) -> WorkerResponse,
{
    panic::catch_unwind(AssertUnwindSafe(|| handler(request))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(%reason, "worker job panicked");
        WorkerResponse::error(format_args!("internal error: {reason}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlport_core::{Cell, CellCoord, SerializedModel, SerializedSheet};

    #[tokio::test]
    async fn test_round_trip_through_worker() {
        let worker = WorkerHandle::spawn(Dispatcher::default()).unwrap();
        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(CellCoord::new(0, 0), Cell::text("hello"));

        let exported = worker
            .submit(WorkerRequest::export(SerializedModel::new(vec![sheet])))
            .await
            .unwrap();
        let blob = match exported {
            WorkerResponse::Complete { blob: Some(blob), .. } => blob,
            other => panic!("export failed: {other:?}"),
        };

        let imported = worker.submit(WorkerRequest::import(blob)).await.unwrap();
        let model = match imported {
            WorkerResponse::Complete {
                results: Some(model),
                ..
            } => model,
            other => panic!("import failed: {other:?}"),
        };
        assert_eq!(
            model.sheets[0].get_cell(CellCoord::new(0, 0)).unwrap().value,
            Cell::text("hello").value
        );
    }

    #[tokio::test]
    async fn test_concurrent_jobs_each_get_their_reply() {
        let worker = WorkerHandle::spawn(Dispatcher::default()).unwrap();
        let jobs: Vec<_> = (0..4).map(|n| {
            let worker = worker.clone();
            tokio::spawn(async move {
                let mut sheet = SerializedSheet::new("s", format!("Sheet{n}"));
                sheet.set_cell(CellCoord::new(0, 0), Cell::number(n as f64));
                worker
                    .submit(WorkerRequest::export(SerializedModel::new(vec![sheet])))
                    .await
            })
        })
        .collect();
        for job in jobs {
            let response = job.await.unwrap().unwrap();
            assert!(!response.is_error());
        }
    }

    #[tokio::test]
    async fn test_worker_survives_a_panicking_job() {
        let dispatcher = Dispatcher::default();
        let worker = WorkerHandle::spawn_with(move |request| match request {
            WorkerRequest::Import { .. } => panic!("import blew up"),
            other => dispatcher.handle(other),
        })
        .unwrap();

        let failed = worker.submit(WorkerRequest::import(Vec::new())).await.unwrap();
        match failed {
            WorkerResponse::Error { data } => assert!(data.contains("import blew up")),
            other => panic!("expected an error reply, got {other:?}"),
        }
        assert!(worker.is_running());

        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(CellCoord::new(0, 0), Cell::number(1.0));
        let exported = worker
            .submit(WorkerRequest::export(SerializedModel::new(vec![sheet])))
            .await
            .unwrap();
        assert!(!exported.is_error());
    }

    #[tokio::test]
    async fn test_failed_request_does_not_block_the_next() {
        let worker = WorkerHandle::spawn(Dispatcher::default()).unwrap();
        let failed = worker
            .submit(WorkerRequest::export(SerializedModel::default()))
            .await
            .unwrap();
        assert!(failed.is_error());

        let mut sheet = SerializedSheet::new("s1", "Sheet1");
        sheet.set_cell(CellCoord::new(0, 0), Cell::number(1.0));
        let exported = worker
            .submit(WorkerRequest::export(SerializedModel::new(vec![sheet])))
            .await
            .unwrap();
        assert!(!exported.is_error());
    }
}
