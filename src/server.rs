/// Transport assembly for the execution service
use crate::gate::AdmissionGate;
use crate::proto::code_executor_server::CodeExecutorServer;
use crate::service::CodeExecutorService;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

/// Binds `addr` with plaintext credentials and serves until shutdown.
/// Bind failures propagate to the caller.
pub async fn serve(addr: SocketAddr, max_sandboxes: usize) -> anyhow::Result<()> {
    let gate = Arc::new(AdmissionGate::new(max_sandboxes));
    let service = CodeExecutorService::new(gate);

    info!("server listening on {addr}");
    tonic::transport::Server::builder()
        .add_service(CodeExecutorServer::new(service))
        .serve(addr)
        .await?;
    Ok(())
}
