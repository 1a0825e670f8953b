use crate::{board::JobSpec, link::Link};
use common::{
    pipeline::run_phase, ChunkReader, Classifier, PartialResult, Phase, Result, WorkDistributor,
};
use eyre::{Report, WrapErr};
use log::{error, info, warn};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tokio::task;

#[derive(Debug)]
pub struct Worker<L> {
    rank: u32,
    dataset: PathBuf,
    link: L,
    classifier: Arc<dyn Classifier>,
}

impl<L: Link> Worker<L> {
    pub fn new(rank: u32, dataset: impl Into<PathBuf>, link: L, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            rank,
            dataset: dataset.into(),
            link,
            classifier,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let job = match self.link.join(self.rank).await {
            Ok(job) => job,
            Err(e) => {
                // no run id yet, the coordinator accepts an anonymous abort
                self.report(None, &e).await;
                return Err(e);
            }
        };
        info!(
            "rank {} joined run {}: {} records, {} workers",
            self.rank, job.run_id, job.total_records, job.world_size
        );

        match self.run_phases(&job).await {
            Ok(()) => {
                info!("rank {} done", self.rank);
                Ok(())
            }
            Err(e) => {
                self.report(Some(&job.run_id), &e).await;
                Err(e)
            }
        }
    }

    async fn report(&mut self, run_id: Option<&str>, e: &Report) {
        let reason = format!("{:#}", e);
        error!("rank {} failed: {}", self.rank, reason);
        if let Err(abort) = self.link.abort(run_id.unwrap_or_default(), self.rank, &reason).await {
            warn!("rank {} could not report the failure: {:#}", self.rank, abort);
        }
    }

    async fn run_phases(&mut self, job: &JobSpec) -> Result<()> {
        let rank = self.rank;
        let distributor = WorkDistributor::new(job.total_records, job.world_size)?;
        let mut reader = {
            let dataset = self.dataset.clone();
            let plan = job.plan.clone();
            task::spawn_blocking(move || -> Result<ChunkReader> {
                Ok(ChunkReader::open(&dataset, plan.dialect)?.with_limits(plan.limits))
            })
            .await??
        };

        for phase in Phase::ALL.iter().copied() {
            let start = Instant::now();
            let plan = job.plan.clone();
            let classifier = Arc::clone(&self.classifier);
            let (returned, partial, stats) = task::spawn_blocking(move || -> Result<_> {
                let (partial, stats) = run_phase(phase, &mut reader, &distributor, rank, &plan, &classifier)
                    .wrap_err_with(|| format!("{} phase failed on {}", phase, reader.path().display()))?;
                Ok((reader, partial, stats))
            })
            .await??;
            reader = returned;
            info!(
                "rank {}: {} phase computed over {} records in {:?}",
                rank,
                phase,
                stats.records,
                start.elapsed()
            );

            let result = PartialResult {
                owner: rank,
                phase,
                partial,
                stats,
            };
            self.link.submit(&job.run_id, result).await?;
        }
        Ok(())
    }
}
