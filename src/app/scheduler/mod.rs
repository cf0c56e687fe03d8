//! Process-wide fetch admission control
//!
//! The scheduler bounds how many retrievals run concurrently across every
//! load request in the process. Requests submit a job and receive an
//! admission ticket; under capacity the grant fires immediately, otherwise
//! the job waits in a FIFO queue. Every mutation of the queue and active
//! set is serialized behind one async mutex, so two jobs can never be
//! admitted into a single free slot and a released slot is always offered
//! to the queue head before the releaser regains control.
//!
//! The scheduler is an explicitly constructed instance shared by reference;
//! one instance per process is expected but never implied through global
//! state.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info};

use crate::app::locator::SourceLocator;
use crate::constants::scheduler::{DEFAULT_MAX_CONCURRENCY, QUEUE_WAIT_LOG_THRESHOLD_MS};
use crate::errors::{SchedulerError, SchedulerResult};

/// Global admission controller for concurrent fetches
pub struct FetchScheduler {
    state: Mutex<SchedulerState>,
}

#[derive(Debug)]
struct SchedulerState {
    max_concurrency: usize,
    next_ticket: u64,
    active: HashMap<u64, ActiveJob>,
    queue: VecDeque<QueuedJob>,
}

#[derive(Debug)]
struct ActiveJob {
    label: String,
    cancel_tx: watch::Sender<bool>,
}

#[derive(Debug)]
struct QueuedJob {
    id: u64,
    label: String,
    submitted_at: DateTime<Utc>,
    grant_tx: oneshot::Sender<FetchGrant>,
    cancel_tx: watch::Sender<bool>,
}

/// Handle for one submitted job: await the grant, or use the id to cancel
#[derive(Debug)]
pub struct AdmissionTicket {
    id: u64,
    grant_rx: oneshot::Receiver<FetchGrant>,
}

impl AdmissionTicket {
    /// Ticket identifier, used for `cancel` and `release`
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait until the scheduler admits this job
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Cancelled` when the ticket was cancelled
    /// while queued, or the scheduler went away before admission.
    pub async fn admitted(self) -> SchedulerResult<FetchGrant> {
        self.grant_rx.await.map_err(|_| SchedulerError::Cancelled)
    }
}

/// Proof of admission, carrying the job's cooperative cancel signal
#[derive(Debug)]
pub struct FetchGrant {
    ticket_id: u64,
    cancel_rx: watch::Receiver<bool>,
}

impl FetchGrant {
    /// Ticket identifier of the admitted job
    pub fn ticket_id(&self) -> u64 {
        self.ticket_id
    }

    /// A receiver that flips to `true` when the job is cancelled
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    /// Whether cancellation has already been signalled
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }
}

impl FetchScheduler {
    /// Create a scheduler with the given concurrency ceiling
    ///
    /// A ceiling of zero is clamped to one; a scheduler that can never
    /// admit anything would deadlock every request.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                max_concurrency: max_concurrency.max(1),
                next_ticket: 1,
                active: HashMap::new(),
                queue: VecDeque::new(),
            }),
        }
    }

    /// Create a scheduler with the default ceiling
    pub fn with_default_concurrency() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }

    /// Submit a fetch job for admission
    ///
    /// Admits immediately when a slot is free, otherwise appends to the
    /// FIFO queue. The locator is used for diagnostics only.
    pub async fn submit(&self, locator: &SourceLocator) -> AdmissionTicket {
        let mut state = self.state.lock().await;
        let id = state.next_ticket;
        state.next_ticket += 1;

        let label = locator.to_string();
        let (grant_tx, grant_rx) = oneshot::channel();
        let (cancel_tx, _) = watch::channel(false);

        if state.active.len() < state.max_concurrency {
            let grant = FetchGrant {
                ticket_id: id,
                cancel_rx: cancel_tx.subscribe(),
            };
            state.active.insert(id, ActiveJob { label, cancel_tx });
            let _ = grant_tx.send(grant);
            debug!("Admitted fetch {} immediately ({} active)", id, state.active.len());
        } else {
            debug!(
                "Queued fetch {} for {} ({} active, {} queued)",
                id,
                label,
                state.active.len(),
                state.queue.len() + 1
            );
            state.queue.push_back(QueuedJob {
                id,
                label,
                submitted_at: Utc::now(),
                grant_tx,
                cancel_tx,
            });
        }

        AdmissionTicket { id, grant_rx }
    }

    /// Cancel a submitted job
    ///
    /// A queued job is removed without side effects; its ticket resolves
    /// as cancelled and it will never be admitted. An active job receives
    /// the cooperative cancel signal and keeps its slot until the owner
    /// releases it.
    pub async fn cancel(&self, ticket_id: u64) {
        let mut state = self.state.lock().await;

        if let Some(job) = state.active.get(&ticket_id) {
            let _ = job.cancel_tx.send(true);
            debug!("Signalled cancellation for active fetch {} ({})", ticket_id, job.label);
            return;
        }

        let before = state.queue.len();
        state.queue.retain(|job| job.id != ticket_id);
        if state.queue.len() != before {
            debug!("Removed queued fetch {} before admission", ticket_id);
        }
    }

    /// Release the slot held by a finished job
    ///
    /// Called on success, failure and cancellation alike. The freed slot is
    /// offered to the queue head synchronously, before this call returns,
    /// so a released slot can never be lost to a submit/release race.
    pub async fn release(&self, ticket_id: u64) {
        let mut state = self.state.lock().await;
        if state.active.remove(&ticket_id).is_none() {
            return;
        }
        debug!("Released fetch slot for ticket {}", ticket_id);
        Self::admit_ready(&mut state);
    }

    /// Change the concurrency ceiling
    ///
    /// Lowering the ceiling never pre-empts active jobs; admissions simply
    /// stop until the active count drops below the new ceiling. Raising it
    /// admits queued jobs immediately.
    pub async fn set_max_concurrency(&self, max_concurrency: usize) {
        let mut state = self.state.lock().await;
        let ceiling = max_concurrency.max(1);
        info!(
            "Scheduler concurrency ceiling {} -> {}",
            state.max_concurrency, ceiling
        );
        state.max_concurrency = ceiling;
        Self::admit_ready(&mut state);
    }

    /// Current concurrency ceiling
    pub async fn max_concurrency(&self) -> usize {
        self.state.lock().await.max_concurrency
    }

    /// Number of jobs currently fetching
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    /// Number of jobs waiting for admission
    pub async fn queued_count(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// Active plus queued jobs
    pub async fn total_count(&self) -> usize {
        let state = self.state.lock().await;
        state.active.len() + state.queue.len()
    }

    /// Admit queued jobs while slots are free (caller holds the lock)
    fn admit_ready(state: &mut SchedulerState) {
        while state.active.len() < state.max_concurrency {
            let Some(job) = state.queue.pop_front() else {
                break;
            };
            if job.grant_tx.is_closed() {
                debug!("Skipping abandoned queued fetch {}", job.id);
                continue;
            }

            let waited = Utc::now().signed_duration_since(job.submitted_at);
            if waited.num_milliseconds() > QUEUE_WAIT_LOG_THRESHOLD_MS {
                debug!("Fetch {} waited {}ms for a slot", job.id, waited.num_milliseconds());
            }

            let grant = FetchGrant {
                ticket_id: job.id,
                cancel_rx: job.cancel_tx.subscribe(),
            };
            let id = job.id;
            state.active.insert(
                id,
                ActiveJob {
                    label: job.label,
                    cancel_tx: job.cancel_tx,
                },
            );
            if job.grant_tx.send(grant).is_err() {
                // Receiver dropped between the closed check and the send.
                state.active.remove(&id);
                continue;
            }
            debug!("Admitted queued fetch {} ({} active)", id, state.active.len());
        }
    }
}

impl fmt::Debug for FetchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchScheduler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn locator(name: &str) -> SourceLocator {
        SourceLocator::parse(&format!("https://example.com/{}.jpg", name)).unwrap()
    }

    async fn admitted_soon(ticket: AdmissionTicket) -> FetchGrant {
        timeout(Duration::from_millis(100), ticket.admitted())
            .await
            .expect("grant should arrive promptly")
            .expect("ticket should not be cancelled")
    }

    async fn assert_still_queued(ticket: AdmissionTicket) -> AdmissionTicket {
        let mut ticket = ticket;
        let result = timeout(Duration::from_millis(50), &mut ticket.grant_rx).await;
        assert!(result.is_err(), "ticket should still be waiting");
        ticket
    }

    #[tokio::test]
    async fn test_immediate_admission_under_capacity() {
        let scheduler = FetchScheduler::new(2);
        let ticket = scheduler.submit(&locator("a")).await;
        let grant = admitted_soon(ticket).await;

        assert_eq!(scheduler.active_count().await, 1);
        assert!(!grant.is_cancelled());
    }

    #[tokio::test]
    async fn test_bound_never_exceeded() {
        let scheduler = FetchScheduler::new(2);

        let t1 = scheduler.submit(&locator("a")).await;
        let t2 = scheduler.submit(&locator("b")).await;
        let t3 = scheduler.submit(&locator("c")).await;

        assert_eq!(scheduler.active_count().await, 2);
        assert_eq!(scheduler.queued_count().await, 1);
        assert_eq!(scheduler.total_count().await, 3);

        let g1 = admitted_soon(t1).await;
        let _g2 = admitted_soon(t2).await;
        let t3 = assert_still_queued(t3).await;

        scheduler.release(g1.ticket_id()).await;
        let _g3 = admitted_soon(t3).await;
        assert_eq!(scheduler.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_fifo_admission_order() {
        let scheduler = FetchScheduler::new(1);

        let t1 = scheduler.submit(&locator("a")).await;
        let t2 = scheduler.submit(&locator("b")).await;
        let t3 = scheduler.submit(&locator("c")).await;

        let g1 = admitted_soon(t1).await;
        scheduler.release(g1.ticket_id()).await;

        // The earlier submission is admitted first.
        let g2 = admitted_soon(t2).await;
        let t3 = assert_still_queued(t3).await;

        scheduler.release(g2.ticket_id()).await;
        let _g3 = admitted_soon(t3).await;
    }

    #[tokio::test]
    async fn test_cancelled_queued_job_is_skipped() {
        let scheduler = FetchScheduler::new(1);

        let t1 = scheduler.submit(&locator("a")).await;
        let t2 = scheduler.submit(&locator("b")).await;
        let t3 = scheduler.submit(&locator("c")).await;

        scheduler.cancel(t2.id()).await;
        let result = t2.admitted().await;
        assert!(matches!(result, Err(SchedulerError::Cancelled)));

        // Releasing the slot admits the next non-cancelled submission.
        let g1 = admitted_soon(t1).await;
        scheduler.release(g1.ticket_id()).await;
        let _g3 = admitted_soon(t3).await;
        assert_eq!(scheduler.queued_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancel_active_signals_cooperatively() {
        let scheduler = FetchScheduler::new(1);
        let ticket = scheduler.submit(&locator("a")).await;
        let id = ticket.id();
        let grant = admitted_soon(ticket).await;

        scheduler.cancel(id).await;
        assert!(grant.is_cancelled());
        // The slot is held until the owner releases it.
        assert_eq!(scheduler.active_count().await, 1);

        scheduler.release(id).await;
        assert_eq!(scheduler.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_lowered_ceiling_blocks_new_admissions() {
        let scheduler = FetchScheduler::new(2);

        let t1 = scheduler.submit(&locator("a")).await;
        let t2 = scheduler.submit(&locator("b")).await;
        let t3 = scheduler.submit(&locator("c")).await;
        let g1 = admitted_soon(t1).await;
        let g2 = admitted_soon(t2).await;

        scheduler.set_max_concurrency(1).await;
        // Active jobs are not pre-empted.
        assert_eq!(scheduler.active_count().await, 2);

        // One release leaves the active count at the new ceiling, so the
        // queued job stays put.
        scheduler.release(g1.ticket_id()).await;
        let t3 = assert_still_queued(t3).await;

        scheduler.release(g2.ticket_id()).await;
        let _g3 = admitted_soon(t3).await;
        assert_eq!(scheduler.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_raised_ceiling_admits_queued_jobs() {
        let scheduler = FetchScheduler::new(1);

        let t1 = scheduler.submit(&locator("a")).await;
        let t2 = scheduler.submit(&locator("b")).await;
        let _g1 = admitted_soon(t1).await;
        let t2 = assert_still_queued(t2).await;

        scheduler.set_max_concurrency(3).await;
        let _g2 = admitted_soon(t2).await;
        assert_eq!(scheduler.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_every_queued_job_is_eventually_admitted() {
        let scheduler = FetchScheduler::new(1);

        let mut tickets = Vec::new();
        for i in 0..10 {
            tickets.push(scheduler.submit(&locator(&format!("job{}", i))).await);
        }

        for ticket in tickets {
            assert!(scheduler.active_count().await <= 1);
            let grant = admitted_soon(ticket).await;
            scheduler.release(grant.ticket_id()).await;
        }
        assert_eq!(scheduler.total_count().await, 0);
    }

    #[tokio::test]
    async fn test_release_of_unknown_ticket_is_noop() {
        let scheduler = FetchScheduler::new(1);
        scheduler.release(9999).await;
        assert_eq!(scheduler.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_respect_bound() {
        let scheduler = std::sync::Arc::new(FetchScheduler::new(3));

        let mut handles = Vec::new();
        for i in 0..20 {
            let scheduler = std::sync::Arc::clone(&scheduler);
            handles.push(tokio::spawn(async move {
                let ticket = scheduler.submit(&locator(&format!("c{}", i))).await;
                let grant = ticket.admitted().await.unwrap();
                let active = scheduler.active_count().await;
                tokio::time::sleep(Duration::from_millis(2)).await;
                scheduler.release(grant.ticket_id()).await;
                active
            }));
        }

        for handle in handles {
            let observed_active = handle.await.unwrap();
            assert!(observed_active <= 3);
        }
        assert_eq!(scheduler.total_count().await, 0);
    }
}
