//! Worker pools - long-lived tasks draining a bounded queue
//!
//! Each pool shares one receiver behind a mutex; a worker takes one candidate,
//! runs its trials, reports back, and loops until it receives `WorkItem::Stop`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use edgescout_common::{Candidate, TrialOutcome};

/// Queue payload; `Stop` ends exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItem {
    Task(Candidate),
    Stop,
}

/// Everything one worker learned about one candidate.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub candidate: Candidate,
    pub trials: Vec<TrialOutcome>,
    /// Wall time the worker spent on the candidate, pauses included.
    pub wall: Duration,
}

pub struct WorkerPool {
    name: &'static str,
    tx: mpsc::Sender<WorkItem>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers over a queue of `depth` slots, reporting on `results`.
    pub fn spawn<F, Fut>(
        name: &'static str,
        size: usize,
        depth: usize,
        results: mpsc::UnboundedSender<StageReport>,
        job: F,
    ) -> Self
    where
        F: Fn(Candidate) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<TrialOutcome>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<WorkItem>(depth.max(1));
        let queue = Arc::new(Mutex::new(rx));
        let job = Arc::new(job);

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let queue = queue.clone();
            let job = job.clone();
            let results = results.clone();

            let worker = tokio::spawn(async move {
                loop {
                    let item = {
                        let mut q = queue.lock().await;
                        q.recv().await
                    };

                    let candidate = match item {
                        Some(WorkItem::Task(c)) => c,
                        Some(WorkItem::Stop) | None => break,
                    };

                    let started = Instant::now();
                    let trials = job(candidate).await;
                    let report = StageReport {
                        candidate,
                        trials,
                        wall: started.elapsed(),
                    };
                    if results.send(report).is_err() {
                        break;
                    }
                }
                trace!(pool = name, worker = id, "worker exited");
            });
            workers.push(worker);
        }

        Self { name, tx, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue without waiting; hands the candidate back when the queue is full.
    pub fn try_dispatch(&self, candidate: Candidate) -> Result<(), Candidate> {
        self.tx
            .try_send(WorkItem::Task(candidate))
            .map_err(|_| candidate)
    }

    /// Send one `Stop` per worker and wait for every outstanding trial.
    pub async fn shutdown(self) {
        for _ in 0..self.workers.len() {
            if self.tx.send(WorkItem::Stop).await.is_err() {
                break;
            }
        }
        for w in self.workers {
            if let Err(e) = w.await {
                warn!("{} worker panicked: {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn candidate(last: u8) -> Candidate {
        Candidate::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last)))
    }

    #[tokio::test]
    async fn workers_report_each_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn("test", 3, 6, tx, |_c| async {
            vec![TrialOutcome::latency(true, Duration::from_millis(5))]
        });
        assert_eq!(pool.size(), 3);

        for i in 0..5 {
            pool.try_dispatch(candidate(i)).unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..5 {
            let report = rx.recv().await.unwrap();
            assert_eq!(report.trials.len(), 1);
            seen.push(report.candidate);
        }
        seen.sort();
        assert_eq!(seen, (0..5).map(candidate).collect::<Vec<_>>());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_hands_candidate_back() {
        let (tx, _rx) = mpsc::unbounded_channel();
        // workers never finish, so the single slot stays taken
        let pool = WorkerPool::spawn("blocked", 1, 1, tx, |_c| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Vec::new()
        });
        pool.try_dispatch(candidate(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.try_dispatch(candidate(2)).unwrap();
        assert_eq!(pool.try_dispatch(candidate(3)), Err(candidate(3)));
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_work() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn("drain", 2, 4, tx, |_c| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            vec![TrialOutcome::latency(true, Duration::from_millis(30))]
        });
        pool.try_dispatch(candidate(1)).unwrap();
        pool.try_dispatch(candidate(2)).unwrap();
        pool.shutdown().await;

        let mut done = 0;
        while rx.try_recv().is_ok() {
            done += 1;
        }
        assert_eq!(done, 2);
    }
}
