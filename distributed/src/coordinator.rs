use crate::{
    board::PhaseBoard,
    convert::{decode_partial, decode_phase, decode_stats, encode_phase, encode_plan},
    service::{
        coordinator_server::{Coordinator, CoordinatorServer},
        AbortReply, AbortRequest, JoinReply, JoinRequest, SubmitPartialReply, SubmitPartialRequest,
    },
};
use common::{PartialResult, Result};
use log::{info, warn};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tonic::{transport::Server, Request, Response, Status};

#[derive(Debug, Clone)]
pub struct CoordinatorService {
    board: Arc<PhaseBoard>,
}

impl CoordinatorService {
    pub fn new(board: Arc<PhaseBoard>) -> Self {
        Self { board }
    }
}

#[tonic::async_trait]
impl Coordinator for CoordinatorService {
    async fn join(&self, request: Request<JoinRequest>) -> Result<Response<JoinReply>, Status> {
        let JoinRequest { rank } = request.into_inner();
        let job = self.board.join(rank)?;
        Ok(Response::new(JoinReply {
            run_id: job.run_id,
            total_records: job.total_records,
            world_size: job.world_size,
            plan: Some(encode_plan(&job.plan)),
        }))
    }

    async fn submit_partial(
        &self,
        request: Request<SubmitPartialRequest>,
    ) -> Result<Response<SubmitPartialReply>, Status> {
        let SubmitPartialRequest {
            run_id,
            rank,
            phase,
            stats,
            payload,
        } = request.into_inner();
        let result = PartialResult {
            owner: rank,
            phase: decode_phase(phase)?,
            partial: decode_partial(payload)?,
            stats: decode_stats(stats),
        };

        let completed = self.board.submit(&run_id, result).await?;
        Ok(Response::new(SubmitPartialReply {
            completed: encode_phase(completed),
        }))
    }

    async fn abort(&self, request: Request<AbortRequest>) -> Result<Response<AbortReply>, Status> {
        let AbortRequest {
            run_id,
            rank,
            reason,
        } = request.into_inner();
        if !run_id.is_empty() && run_id != self.board.job().run_id {
            warn!("ignoring abort from rank {} for run {}", rank, run_id);
            return Err(Status::failed_precondition(format!("run {} is not the current run", run_id)));
        }
        self.board.abort(rank, &reason).await;
        Ok(Response::new(AbortReply {}))
    }
}

/// Serves the board on `addr` until `shutdown` resolves.
pub async fn serve<F>(board: Arc<PhaseBoard>, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("coordinator listening on {}", addr);
    Server::builder()
        .add_service(CoordinatorServer::new(CoordinatorService::new(board)))
        .serve_with_shutdown(addr, shutdown)
        .await?;
    Ok(())
}
