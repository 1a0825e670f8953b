use common::{LexiconClassifier, Result};
use distributed::{init_logger, GrpcLink, Worker, ADDR};
use eyre::ensure;
use std::{path::PathBuf, sync::Arc, time::Duration};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
struct Opt {
    #[structopt(short, long, env = "LYRICS_CONNECT", default_value = ADDR)]
    connect: String,
    /// 1..world size; rank 0 lives in the coordinator.
    #[structopt(short, long, env = "LYRICS_RANK")]
    rank: u32,
    #[structopt(short, long, env = "LYRICS_DATASET")]
    dataset: PathBuf,
    #[structopt(long, env = "LYRICS_CONNECT_RETRIES", default_value = "10")]
    retries: u32,
    #[structopt(long, env = "LYRICS_RETRY_DELAY_MS", default_value = "500")]
    retry_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let opt = Opt::from_args();
    ensure!(opt.rank >= 1, "rank 0 is run by the coordinator");

    let addr = format!("http://{}", opt.connect);
    let link = GrpcLink::connect(addr, opt.retries, Duration::from_millis(opt.retry_delay_ms)).await?;

    let worker = Worker::new(opt.rank, opt.dataset, link, Arc::new(LexiconClassifier::default()));
    worker.run().await
}
