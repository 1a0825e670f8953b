use common::{
    Dialect, FieldLimits, JobPlan, LexiconClassifier, Policy, Report, Result, SentimentMode,
};
use distributed::{
    coordinator::serve, count_records, init_logger, new_job, LocalLink, PhaseBoard, Worker, ADDR,
};
use eyre::{ensure, WrapErr};
use log::{info, warn};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use structopt::StructOpt;
use tokio::{sync::oneshot, time};

#[derive(StructOpt, Debug)]
pub struct Opt {
    #[structopt(short, long, env = "LYRICS_DATASET")]
    dataset: PathBuf,
    /// Number of workers, this process included as rank 0.
    #[structopt(short = "n", long, env = "LYRICS_WORLD_SIZE", default_value = "1")]
    world_size: u32,
    #[structopt(short, long, env = "LYRICS_LISTEN", default_value = ADDR)]
    listen: SocketAddr,
    #[structopt(long, env = "LYRICS_DIALECT", default_value = "comma")]
    dialect: Dialect,
    #[structopt(short, long, env = "LYRICS_CHUNK_SIZE", default_value = "1000")]
    chunk_size: u64,
    #[structopt(long, env = "LYRICS_WORDS_POLICY", default_value = "round-robin")]
    words_policy: Policy,
    #[structopt(long, env = "LYRICS_ARTISTS_POLICY", default_value = "static")]
    artists_policy: Policy,
    #[structopt(long, env = "LYRICS_SENTIMENT_POLICY", default_value = "round-robin")]
    sentiment_policy: Policy,
    #[structopt(short, long, env = "LYRICS_TOP_N", default_value = "20")]
    top_n: usize,
    #[structopt(long, env = "LYRICS_SENTIMENT_MODE", default_value = "distributed")]
    sentiment_mode: SentimentMode,
    /// Record cap of sampled sentiment (coordinator-only mode or a capped model).
    #[structopt(long, env = "LYRICS_SENTIMENT_SAMPLE", default_value = "100")]
    sentiment_sample: u64,
    #[structopt(long, env = "LYRICS_MAX_ARTIST")]
    max_artist: Option<usize>,
    #[structopt(long, env = "LYRICS_MAX_TITLE")]
    max_title: Option<usize>,
    #[structopt(long, env = "LYRICS_MAX_LYRICS")]
    max_lyrics: Option<usize>,
}

impl Opt {
    fn plan(&self) -> JobPlan {
        JobPlan {
            dialect: self.dialect,
            chunk_size: self.chunk_size,
            words: self.words_policy,
            artists: self.artists_policy,
            sentiment: self.sentiment_policy,
            sentiment_mode: self.sentiment_mode,
            sentiment_sample: self.sentiment_sample,
            limits: FieldLimits {
                artist: self.max_artist,
                title: self.max_title,
                lyrics: self.max_lyrics,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let opt = Opt::from_args();
    ensure!(opt.world_size >= 1, "world size must be at least 1");
    ensure!(opt.chunk_size >= 1, "chunk size must be at least 1");
    let start = Instant::now();

    let plan = opt.plan();
    let total = count_records(&opt.dataset, plan.dialect)
        .await
        .wrap_err("coordinator cannot count records")?;
    let board = Arc::new(PhaseBoard::new(new_job(total, opt.world_size, plan))?);
    info!(
        "run {}: {} records in {}, {} workers",
        board.job().run_id,
        total,
        opt.dataset.display(),
        opt.world_size
    );

    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(Arc::clone(&board), opt.listen, async move {
        rx.await.ok();
        // let the last replies reach the remote workers
        time::sleep(Duration::from_millis(200)).await;
    }));

    let local = Worker::new(
        0,
        opt.dataset.clone(),
        LocalLink::new(Arc::clone(&board)),
        Arc::new(LexiconClassifier::default()),
    );
    let (local, outcome) = tokio::join!(local.run(), board.finished());

    let _ = tx.send(());
    if let Err(e) = server.await? {
        warn!("server stopped with error: {:#}", e);
    }

    local?;
    let outcome = outcome?;
    let report = Report::build(outcome, opt.top_n, start.elapsed());
    info!(
        "run {} finished in {:?}, {:.1} records/s",
        board.job().run_id,
        report.elapsed,
        report.throughput()
    );
    println!("{}", report);
    Ok(())
}
