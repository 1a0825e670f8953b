use common::{
    pipeline::analyze, Dialect, FieldLimits, JobPlan, LexiconClassifier, Report, Result,
    SentimentMode,
};
use log::info;
use std::{path::PathBuf, sync::Arc, time::Instant};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
struct Opt {
    #[structopt(short, long, env = "LYRICS_DATASET")]
    dataset: PathBuf,
    #[structopt(long, env = "LYRICS_DIALECT", default_value = "comma")]
    dialect: Dialect,
    #[structopt(short, long, env = "LYRICS_CHUNK_SIZE", default_value = "1000")]
    chunk_size: u64,
    #[structopt(short, long, env = "LYRICS_TOP_N", default_value = "20")]
    top_n: usize,
    #[structopt(long, env = "LYRICS_SENTIMENT_MODE", default_value = "distributed")]
    sentiment_mode: SentimentMode,
    #[structopt(long, env = "LYRICS_SENTIMENT_SAMPLE", default_value = "100")]
    sentiment_sample: u64,
    #[structopt(long, env = "LYRICS_MAX_ARTIST")]
    max_artist: Option<usize>,
    #[structopt(long, env = "LYRICS_MAX_TITLE")]
    max_title: Option<usize>,
    #[structopt(long, env = "LYRICS_MAX_LYRICS")]
    max_lyrics: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::from_args();
    let plan = JobPlan {
        dialect: opt.dialect,
        chunk_size: opt.chunk_size,
        sentiment_mode: opt.sentiment_mode,
        sentiment_sample: opt.sentiment_sample,
        limits: FieldLimits {
            artist: opt.max_artist,
            title: opt.max_title,
            lyrics: opt.max_lyrics,
        },
        ..JobPlan::default()
    };

    let start = Instant::now();
    let outcome = analyze(&opt.dataset, &plan, Arc::new(LexiconClassifier::default()))?;
    let report = Report::build(outcome, opt.top_n, start.elapsed());
    info!(
        "{} records in {:?}, {:.1} records/s",
        report.records,
        report.elapsed,
        report.throughput()
    );
    println!("{}", report);
    Ok(())
}
