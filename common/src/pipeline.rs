use crate::{
    analysis::{Analysis, ArtistFrequency, SentimentAnalysis, WordFrequency},
    distribution::{ChunkDescriptor, WorkDistributor},
    job::{JobPlan, Outcome, Partial, Phase, SentimentMode, ShardStats},
    reader::ChunkReader,
    sentiment::Classifier,
    Result,
};
use eyre::WrapErr;
use log::{debug, info};
use std::{path::Path, sync::Arc};

/// Streams the given chunks through `analysis`. Each chunk's records are
/// dropped as soon as they are aggregated.
pub fn run_shard<A, I>(reader: &mut ChunkReader, chunks: I, analysis: &A) -> Result<(A::Partial, ShardStats)>
where
    A: Analysis,
    I: IntoIterator<Item = ChunkDescriptor>,
{
    let mut partial = A::Partial::default();
    let mut stats = ShardStats::default();
    for descriptor in chunks {
        let chunk = reader.read_chunk(descriptor)?;
        debug!(
            "chunk [{}, {}): {} records",
            descriptor.start,
            descriptor.end(),
            chunk.actual_count()
        );
        stats.absorb(&chunk);
        for record in &chunk.records {
            analysis.accumulate(&mut partial, record);
        }
    }
    Ok((partial, stats))
}

/// Feeds at most `limit` records to `analysis`, in dataset order from row 0.
pub fn run_sample<A: Analysis>(
    reader: &mut ChunkReader,
    limit: u64,
    chunk_size: u64,
    analysis: &A,
) -> Result<(A::Partial, ShardStats)> {
    let mut partial = A::Partial::default();
    let mut stats = ShardStats::default();
    let mut start = 0;
    while stats.records < limit {
        let chunk = reader.read_chunk(ChunkDescriptor::new(start, chunk_size.max(1)))?;
        if chunk.rows() == 0 {
            break;
        }
        start += chunk.rows();

        let wanted = (limit - stats.records) as usize;
        let mut taken = chunk.records;
        taken.truncate(wanted);
        stats.chunks += 1;
        stats.records += taken.len() as u64;
        stats.malformed += chunk.malformed;
        stats.truncated += chunk.truncated;
        for record in &taken {
            analysis.accumulate(&mut partial, record);
        }
    }
    Ok((partial, stats))
}

pub fn run_phase(
    phase: Phase,
    reader: &mut ChunkReader,
    distributor: &WorkDistributor,
    rank: u32,
    plan: &JobPlan,
    classifier: &Arc<dyn Classifier>,
) -> Result<(Partial, ShardStats)> {
    let chunks = || distributor.plan(rank, plan.policy(phase), plan.chunk_size);
    match phase {
        Phase::Words => {
            let (table, stats) = run_shard(reader, chunks()?, &WordFrequency)?;
            Ok((Partial::Table(table), stats))
        }
        Phase::Artists => {
            let (table, stats) = run_shard(reader, chunks()?, &ArtistFrequency)?;
            Ok((Partial::Table(table), stats))
        }
        Phase::Sentiment => {
            let analysis = SentimentAnalysis::new(Arc::clone(classifier));
            let (tally, stats) = match sample_limit(plan, classifier.as_ref()) {
                None => run_shard(reader, chunks()?, &analysis)?,
                Some(limit) if rank == 0 => run_sample(reader, limit, plan.chunk_size, &analysis)?,
                Some(_) => Default::default(),
            };
            Ok((Partial::Tally(tally), stats))
        }
    }
}

/// How many records rank 0 samples for sentiment, or `None` when every rank
/// classifies its own shard.
fn sample_limit(plan: &JobPlan, classifier: &dyn Classifier) -> Option<u64> {
    match (classifier.sample_cap(), plan.sentiment_mode) {
        (Some(cap), _) => Some(cap.min(plan.sentiment_sample)),
        (None, SentimentMode::CoordinatorOnly) => Some(plan.sentiment_sample),
        (None, SentimentMode::Distributed) => None,
    }
}

/// The whole job in one process: a world of one worker that is also the coordinator.
pub fn analyze(path: impl AsRef<Path>, plan: &JobPlan, classifier: Arc<dyn Classifier>) -> Result<Outcome> {
    let path = path.as_ref();
    let mut reader = ChunkReader::open(path, plan.dialect)?.with_limits(plan.limits);
    let total = reader.count_records()?;
    let distributor = WorkDistributor::new(total, 1)?;
    info!("{}: {} data rows", path.display(), total);

    let mut outcome = Outcome::default();
    for phase in Phase::ALL.iter().copied() {
        let (partial, stats) = run_phase(phase, &mut reader, &distributor, 0, plan, &classifier)
            .wrap_err_with(|| format!("{} phase failed on {}", phase, path.display()))?;
        info!("{} phase done: {} records", phase, stats.records);
        outcome.absorb(phase, partial, stats)?;
    }
    Ok(outcome)
}
