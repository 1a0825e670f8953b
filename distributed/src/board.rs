use common::{merge_all, JobPlan, Outcome, Partial, PartialResult, Phase, ShardStats};
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use eyre::ensure;
use itertools::Itertools;
use log::{error, info};
use std::{
    mem,
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tonic::Status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub run_id: String,
    pub total_records: u64,
    pub world_size: u32,
    pub plan: JobPlan,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("rank {rank} out of range for {world_size} workers")]
    UnknownRank { rank: u32, world_size: u32 },
    #[error("rank {0} already joined")]
    AlreadyJoined(u32),
    #[error("rank {0} has not joined")]
    NotJoined(u32),
    #[error("rank {0} already submitted for the {1} phase")]
    DuplicateSubmission(u32, Phase),
    #[error("rank {rank} submitted for the {got} phase during the {current} phase")]
    WrongPhase { rank: u32, got: Phase, current: String },
    #[error("run {0} is not the current run")]
    StaleRun(String),
    #[error("the {phase} phase expects a different payload than a {kind}")]
    WrongPayload { phase: Phase, kind: &'static str },
    #[error("run aborted: {0}")]
    Aborted(String),
}

impl From<BoardError> for Status {
    fn from(e: BoardError) -> Self {
        let message = e.to_string();
        match e {
            BoardError::UnknownRank { .. } | BoardError::WrongPayload { .. } => {
                Status::invalid_argument(message)
            }
            BoardError::AlreadyJoined(_) | BoardError::DuplicateSubmission(..) => {
                Status::already_exists(message)
            }
            BoardError::NotJoined(_) | BoardError::WrongPhase { .. } | BoardError::StaleRun(_) => {
                Status::failed_precondition(message)
            }
            BoardError::Aborted(_) => Status::aborted(message),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Progress {
    completed: usize,
    aborted: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    outcome: Outcome,
    progress: Progress,
}

/// Coordinator-side gather point. Holds at most one partial per rank for the
/// current phase, folds them when the last one arrives and releases every
/// waiting submitter at once.
#[derive(Debug)]
pub struct PhaseBoard {
    job: JobSpec,
    joined: DashSet<u32>,
    received: DashMap<u32, PartialResult>,
    arrivals: AtomicUsize,
    current: AtomicUsize,
    state: Mutex<State>,
    progress: watch::Sender<Progress>,
    // keeps the channel open for `send`
    watcher: watch::Receiver<Progress>,
}

impl PhaseBoard {
    pub fn new(job: JobSpec) -> common::Result<Self> {
        ensure!(job.world_size >= 1, "world size must be at least 1");
        ensure!(job.plan.chunk_size >= 1, "chunk size must be at least 1");
        let (progress, watcher) = watch::channel(Progress::default());
        Ok(Self {
            job,
            joined: DashSet::new(),
            received: DashMap::new(),
            arrivals: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            state: Mutex::new(State::default()),
            progress,
            watcher,
        })
    }

    pub fn job(&self) -> &JobSpec {
        &self.job
    }

    pub fn current_phase(&self) -> Option<Phase> {
        Phase::from_index(self.current.load(Ordering::Acquire))
    }

    pub fn is_aborted(&self) -> bool {
        self.watcher.borrow().aborted.is_some()
    }

    fn check_live(&self) -> Result<(), BoardError> {
        match &self.watcher.borrow().aborted {
            Some(reason) => Err(BoardError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }

    fn check_rank(&self, rank: u32) -> Result<(), BoardError> {
        if rank < self.job.world_size {
            Ok(())
        } else {
            Err(BoardError::UnknownRank {
                rank,
                world_size: self.job.world_size,
            })
        }
    }

    pub fn join(&self, rank: u32) -> Result<JobSpec, BoardError> {
        self.check_live()?;
        self.check_rank(rank)?;
        if !self.joined.insert(rank) {
            return Err(BoardError::AlreadyJoined(rank));
        }
        info!("rank {} joined ({}/{})", rank, self.joined.len(), self.job.world_size);
        Ok(self.job.clone())
    }

    /// Stores `result` and resolves once every rank has submitted for its
    /// phase and the merge is done.
    pub async fn submit(&self, run_id: &str, result: PartialResult) -> Result<Phase, BoardError> {
        self.check_live()?;
        if run_id != self.job.run_id {
            return Err(BoardError::StaleRun(run_id.to_owned()));
        }
        let rank = result.owner;
        let phase = result.phase;
        self.check_rank(rank)?;
        if !self.joined.contains(&rank) {
            return Err(BoardError::NotJoined(rank));
        }
        if !result.partial.fits(phase) {
            return Err(BoardError::WrongPayload {
                phase,
                kind: result.partial.kind(),
            });
        }

        {
            // phase check, insert and fold happen under one lock
            let mut state = self.state.lock().await;
            if let Some(reason) = &state.progress.aborted {
                return Err(BoardError::Aborted(reason.clone()));
            }
            let current = self.current_phase();
            if current != Some(phase) {
                return Err(BoardError::WrongPhase {
                    rank,
                    got: phase,
                    current: current.map_or_else(|| "finished".to_owned(), |p| p.to_string()),
                });
            }
            match self.received.entry(rank) {
                Entry::Occupied(_) => return Err(BoardError::DuplicateSubmission(rank, phase)),
                Entry::Vacant(v) => {
                    v.insert(result);
                }
            }

            let arrived = self.arrivals.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                "{} phase: rank {} submitted ({}/{})",
                phase, rank, arrived, self.job.world_size
            );
            if arrived == self.job.world_size as usize {
                self.fold(&mut state, phase);
            }
        }

        self.wait_for(phase.index() + 1).await?;
        Ok(phase)
    }

    fn fold(&self, state: &mut State, phase: Phase) {
        let ranks = self.received.iter().map(|e| *e.key()).collect_vec();
        let results = ranks
            .into_iter()
            .filter_map(|rank| self.received.remove(&rank))
            .map(|(_, result)| result)
            .collect_vec();
        let workers = results.len();

        let (partials, stats): (Vec<Partial>, Vec<ShardStats>) =
            results.into_iter().map(|r| (r.partial, r.stats)).unzip();
        let stats: ShardStats = merge_all(stats);
        let partial = if phase.produces_table() {
            Partial::Table(merge_all(partials.into_iter().filter_map(Partial::into_table)))
        } else {
            Partial::Tally(merge_all(partials.into_iter().filter_map(Partial::into_tally)))
        };

        if let Err(e) = state.outcome.absorb(phase, partial, stats) {
            error!("{} phase merge failed: {}", phase, e);
        }
        info!(
            "{} phase merged from {} workers: {} records",
            phase, workers, stats.records
        );

        self.arrivals.store(0, Ordering::SeqCst);
        self.current.store(phase.index() + 1, Ordering::Release);
        state.progress.completed = phase.index() + 1;
        let _ = self.progress.send(state.progress.clone());
    }

    async fn wait_for(&self, completed: usize) -> Result<(), BoardError> {
        let mut rx = self.watcher.clone();
        loop {
            {
                let progress = rx.borrow();
                if let Some(reason) = &progress.aborted {
                    return Err(BoardError::Aborted(reason.clone()));
                }
                if progress.completed >= completed {
                    return Ok(());
                }
            }
            if rx.changed().await.is_err() {
                return Err(BoardError::Aborted("board closed".to_owned()));
            }
        }
    }

    /// Marks the run failed. The first reason wins; every pending and later
    /// request fails with it.
    pub async fn abort(&self, rank: u32, reason: &str) {
        let mut state = self.state.lock().await;
        if state.progress.aborted.is_some() {
            return;
        }
        error!("rank {} aborted the run: {}", rank, reason);
        state.progress.aborted = Some(format!("rank {}: {}", rank, reason));
        let _ = self.progress.send(state.progress.clone());
    }

    pub async fn finished(&self) -> Result<Outcome, BoardError> {
        self.wait_for(Phase::ALL.len()).await?;
        let mut state = self.state.lock().await;
        Ok(mem::take(&mut state.outcome))
    }
}
