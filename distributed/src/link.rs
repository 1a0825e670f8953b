use crate::{
    board::{JobSpec, PhaseBoard},
    convert::{decode_phase, decode_plan, encode_partial, encode_phase, encode_stats},
    service::{coordinator_client::CoordinatorClient, AbortRequest, JoinRequest, SubmitPartialRequest},
};
use common::{PartialResult, Phase, Result};
use eyre::WrapErr;
use log::{info, warn};
use std::{sync::Arc, time::Duration};
use tokio::time;
use tonic::transport::Channel;

#[tonic::async_trait]
pub trait Link: Send {
    async fn join(&mut self, rank: u32) -> Result<JobSpec>;

    /// Hands `result` over and returns once its phase is merged.
    async fn submit(&mut self, run_id: &str, result: PartialResult) -> Result<Phase>;

    async fn abort(&mut self, run_id: &str, rank: u32, reason: &str) -> Result<()>;
}

/// Talks to a board in the same process; used by rank 0.
#[derive(Debug, Clone)]
pub struct LocalLink {
    board: Arc<PhaseBoard>,
}

impl LocalLink {
    pub fn new(board: Arc<PhaseBoard>) -> Self {
        Self { board }
    }
}

#[tonic::async_trait]
impl Link for LocalLink {
    async fn join(&mut self, rank: u32) -> Result<JobSpec> {
        Ok(self.board.join(rank)?)
    }

    async fn submit(&mut self, run_id: &str, result: PartialResult) -> Result<Phase> {
        Ok(self.board.submit(run_id, result).await?)
    }

    async fn abort(&mut self, _run_id: &str, rank: u32, reason: &str) -> Result<()> {
        self.board.abort(rank, reason).await;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GrpcLink {
    client: CoordinatorClient<Channel>,
}

impl GrpcLink {
    /// Connects to `addr` (an `http://` URI), trying up to `retries + 1` times.
    pub async fn connect(addr: String, retries: u32, delay: Duration) -> Result<Self> {
        let mut attempt = 0;
        loop {
            match CoordinatorClient::connect(addr.clone()).await {
                Ok(client) => {
                    info!("connected to coordinator at {}", addr);
                    return Ok(Self { client });
                }
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!(
                        "coordinator at {} not reachable ({}), retry {}/{}",
                        addr, e, attempt, retries
                    );
                    time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(e).wrap_err_with(|| format!("cannot connect to coordinator at {}", addr))
                }
            }
        }
    }
}

#[tonic::async_trait]
impl Link for GrpcLink {
    async fn join(&mut self, rank: u32) -> Result<JobSpec> {
        let reply = self
            .client
            .join(JoinRequest { rank })
            .await
            .wrap_err_with(|| format!("rank {} failed to join", rank))?
            .into_inner();
        Ok(JobSpec {
            run_id: reply.run_id,
            total_records: reply.total_records,
            world_size: reply.world_size,
            plan: decode_plan(reply.plan)?,
        })
    }

    async fn submit(&mut self, run_id: &str, result: PartialResult) -> Result<Phase> {
        let PartialResult {
            owner,
            phase,
            partial,
            stats,
        } = result;
        let request = SubmitPartialRequest {
            run_id: run_id.to_owned(),
            rank: owner,
            phase: encode_phase(phase),
            stats: Some(encode_stats(stats)),
            payload: Some(encode_partial(partial)),
        };
        let reply = self
            .client
            .submit_partial(request)
            .await
            .wrap_err_with(|| format!("rank {} failed to submit the {} phase", owner, phase))?
            .into_inner();
        Ok(decode_phase(reply.completed)?)
    }

    async fn abort(&mut self, run_id: &str, rank: u32, reason: &str) -> Result<()> {
        self.client
            .abort(AbortRequest {
                run_id: run_id.to_owned(),
                rank,
                reason: reason.to_owned(),
            })
            .await?;
        Ok(())
    }
}
