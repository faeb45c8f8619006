use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::engine::error::BuildError;
use crate::engine::field::{self, ParticleField, SourceImage};
use crate::engine::scheduler::BuildJob;

/// What the worker produced for one job.
pub struct BuildOutcome {
    pub job: BuildJob,
    pub result: Result<ParticleField, BuildError>,
}

/// The background build thread.
///
/// Owns an immutable snapshot of the source image and turns jobs into
/// brand-new fields, one at a time in submission order. Jobs go in and
/// outcomes come out over channels, so the worker never shares mutable
/// state with the frame loop and a running build is never cancelled.
/// Dropping the worker closes the job channel and joins the thread.
#[derive(Debug)]
pub struct BuildWorker {
    job_tx: Option<Sender<BuildJob>>,
    outcome_rx: Receiver<BuildOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl BuildWorker {
    pub fn spawn(source: Arc<SourceImage>) -> Self {
        let (job_tx, job_rx) = unbounded::<BuildJob>();
        let (outcome_tx, outcome_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("field-builder".into())
            .spawn(move || {
                for job in job_rx {
                    let started = Instant::now();
                    let result = field::build(&source, job.density, job.disparity);
                    if let Ok(built) = &result {
                        log::debug!(
                            "built {} particles in {:?} (density {:.3}, disparity {:.2})",
                            built.len(),
                            started.elapsed(),
                            job.density,
                            job.disparity
                        );
                    }
                    // The engine is gone; drain the remaining jobs and stop.
                    if outcome_tx.send(BuildOutcome { job, result }).is_err() {
                        break;
                    }
                }
            })
            .expect("Failed to spawn field-builder thread");

        Self {
            job_tx: Some(job_tx),
            outcome_rx,
            handle: Some(handle),
        }
    }

    /// Queues a job. The scheduler guarantees at most one is outstanding.
    pub fn submit(&self, job: BuildJob) {
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(job);
        }
    }

    /// Picks up one completed build, if any has landed.
    pub fn try_recv(&self) -> Option<BuildOutcome> {
        self.outcome_rx.try_recv().ok()
    }
}

impl Drop for BuildWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker's loop.
        self.job_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job(density: f32, disparity: f32) -> BuildJob {
        BuildJob {
            density,
            disparity,
            requested_at: Instant::now(),
        }
    }

    fn gray_source(width: u32, height: u32) -> Arc<SourceImage> {
        let rgba = vec![100u8; width as usize * height as usize * 4];
        Arc::new(SourceImage::new(width, height, rgba))
    }

    fn recv_blocking(worker: &BuildWorker) -> BuildOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = worker.try_recv() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "worker never answered");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn completes_jobs_in_submission_order() {
        let worker = BuildWorker::spawn(gray_source(20, 10));
        worker.submit(job(0.5, 1.0));
        worker.submit(job(1.0, 2.0));

        let first = recv_blocking(&worker);
        assert_eq!(first.job.density, 0.5);
        assert_eq!(first.result.unwrap().len(), 100);

        let second = recv_blocking(&worker);
        assert_eq!(second.job.density, 1.0);
        assert_eq!(second.result.unwrap().len(), 200);
    }

    #[test]
    fn invalid_parameters_come_back_as_errors() {
        let worker = BuildWorker::spawn(gray_source(4, 4));
        worker.submit(job(-0.1, 1.0));
        let outcome = recv_blocking(&worker);
        assert!(matches!(
            outcome.result,
            Err(BuildError::InvalidParameter { name: "density", .. })
        ));

        // The worker keeps serving after a failed job.
        worker.submit(job(1.0, 1.0));
        assert!(recv_blocking(&worker).result.is_ok());
    }

    #[test]
    fn drop_joins_cleanly_with_work_queued() {
        let worker = BuildWorker::spawn(gray_source(64, 64));
        worker.submit(job(1.0, 3.0));
        drop(worker);
    }
}
