pub mod service {
    tonic::include_proto!("analytics");
}

pub mod board;
pub mod cluster;
pub mod convert;
pub mod coordinator;
pub mod link;
pub mod worker;

pub use board::{BoardError, JobSpec, PhaseBoard};
pub use cluster::{count_records, new_job, run_in_process};
pub use link::{GrpcLink, LocalLink, Link};
pub use worker::Worker;

pub const ADDR: &str = "[::1]:56789";

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init()
}
