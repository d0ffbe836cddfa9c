/// tonic service implementation for the CodeExecutor RPC surface
use crate::gate::AdmissionGate;
use crate::proto::code_executor_server::CodeExecutor;
use crate::proto::CodeRequest;
use crate::stream::ExecutionStream;
use log::{info, warn};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct CodeExecutorService {
    gate: Arc<AdmissionGate>,
}

impl CodeExecutorService {
    pub fn new(gate: Arc<AdmissionGate>) -> Self {
        Self { gate }
    }
}

#[tonic::async_trait]
impl CodeExecutor for CodeExecutorService {
    type ExecuteStream = ExecutionStream;

    async fn execute(
        &self,
        request: Request<CodeRequest>,
    ) -> Result<Response<Self::ExecuteStream>, Status> {
        let request = request.into_inner();

        let Some(permit) = self.gate.try_acquire() else {
            warn!("rejected {:?} request: gate is full", request.language);
            return Err(Status::resource_exhausted("Too many active sandboxes"));
        };

        info!(
            "admitted {:?} request ({} bytes of source)",
            request.language,
            request.code.len()
        );
        Ok(Response::new(ExecutionStream::spawn(
            request.language,
            request.code,
            permit,
        )))
    }
}
