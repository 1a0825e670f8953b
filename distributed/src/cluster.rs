use crate::{
    board::{JobSpec, PhaseBoard},
    link::LocalLink,
    worker::Worker,
};
use common::{ChunkReader, Classifier, Dialect, JobPlan, Outcome, Result};
use eyre::Report;
use futures::future::try_join_all;
use log::info;
use std::{path::Path, sync::Arc};
use tokio::task;
use uuid::Uuid;

pub async fn count_records(dataset: &Path, dialect: Dialect) -> Result<u64> {
    let dataset = dataset.to_path_buf();
    task::spawn_blocking(move || ChunkReader::open(&dataset, dialect)?.count_records()).await?
}

pub fn new_job(total_records: u64, world_size: u32, plan: JobPlan) -> JobSpec {
    JobSpec {
        run_id: Uuid::new_v4().to_string(),
        total_records,
        world_size,
        plan,
    }
}

/// A whole world of `world_size` workers in this process, all talking to the
/// board over `LocalLink`.
pub async fn run_in_process(
    dataset: &Path,
    world_size: u32,
    plan: JobPlan,
    classifier: Arc<dyn Classifier>,
) -> Result<Outcome> {
    let total = count_records(dataset, plan.dialect).await?;
    let board = Arc::new(PhaseBoard::new(new_job(total, world_size, plan))?);
    info!(
        "in-process run {}: {} records over {} workers",
        board.job().run_id,
        total,
        world_size
    );

    let workers = (0..world_size).map(|rank| {
        Worker::new(
            rank,
            dataset,
            LocalLink::new(Arc::clone(&board)),
            Arc::clone(&classifier),
        )
        .run()
    });
    let finished = async { board.finished().await.map_err(Report::from) };
    let (_, outcome) = futures::try_join!(try_join_all(workers), finished)?;
    Ok(outcome)
}
