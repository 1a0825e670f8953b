use common::{pipeline::analyze, Classifier, Dialect, JobPlan, LexiconClassifier, Policy};
use distributed::{
    coordinator::serve, new_job, BoardError, GrpcLink, Link, LocalLink, PhaseBoard, Worker,
};
use std::{io::Write, sync::Arc, time::Duration};
use tempfile::NamedTempFile;
use tokio::sync::oneshot;

const ADDR: &str = "127.0.0.1:50777";

fn lexicon() -> Arc<dyn Classifier> {
    Arc::new(LexiconClassifier::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_workers_over_loopback() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "artist,song,link,text").unwrap();
    for i in 0..37 {
        writeln!(
            file,
            "\"Artist {}\",\"Song, {}\",/x/{}.html,\"love and pain\nline {} of a \"\"happy\"\" song\"",
            i % 6,
            i,
            i,
            i
        )
        .unwrap();
    }

    let plan = JobPlan {
        dialect: Dialect::QuotedComma,
        chunk_size: 4,
        artists: Policy::RoundRobin,
        ..JobPlan::default()
    };
    let expected = analyze(file.path(), &plan, lexicon()).unwrap();
    assert_eq!(expected.stats.records, 37);

    let board = Arc::new(PhaseBoard::new(new_job(37, 3, plan)).unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(Arc::clone(&board), ADDR.parse().unwrap(), async move {
        rx.await.ok();
    }));

    let remotes = (1..3)
        .map(|rank| {
            let path = file.path().to_path_buf();
            tokio::spawn(async move {
                let link = GrpcLink::connect(format!("http://{}", ADDR), 20, Duration::from_millis(100))
                    .await?;
                Worker::new(rank, path, link, lexicon()).run().await
            })
        })
        .collect::<Vec<_>>();

    let local = Worker::new(0, file.path(), LocalLink::new(Arc::clone(&board)), lexicon());
    let (local, outcome) = tokio::join!(local.run(), board.finished());
    local.unwrap();
    for remote in remotes {
        remote.await.unwrap().unwrap();
    }

    let outcome = outcome.unwrap();
    assert_eq!(outcome.words, expected.words);
    assert_eq!(outcome.artists, expected.artists);
    assert_eq!(outcome.sentiment, expected.sentiment);
    assert_eq!(outcome.stats.records, 37);
    assert_eq!(outcome.artists.get("Artist 0"), 7);

    // the run is over: late joins are rejected at the gRPC edge
    let mut late = GrpcLink::connect(format!("http://{}", ADDR), 0, Duration::default())
        .await
        .unwrap();
    assert!(late.join(1).await.is_err());
    assert!(late.join(9).await.is_err());

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remote_join_failure_reaches_the_coordinator() {
    const ADDR: &str = "127.0.0.1:50778";
    let file = NamedTempFile::new().unwrap();
    let board = Arc::new(PhaseBoard::new(new_job(0, 2, JobPlan::default())).unwrap());
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(Arc::clone(&board), ADDR.parse().unwrap(), async move {
        rx.await.ok();
    }));

    let mut link = GrpcLink::connect(format!("http://{}", ADDR), 20, Duration::from_millis(100))
        .await
        .unwrap();
    // an abort for some other run is refused
    assert!(link.abort("other-run", 1, "stale").await.is_err());

    let failed = Worker::new(7, file.path(), link, lexicon()).run().await;
    assert!(failed.is_err());
    match board.finished().await {
        Err(BoardError::Aborted(reason)) => assert!(reason.starts_with("rank 7")),
        other => panic!("unexpected {:?}", other),
    }

    tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
