//! dcodex: a sandboxed remote code-execution service
//! Clients submit a source program over gRPC; the server compiles it when
//! the language calls for it, runs it under kernel resource limits, and
//! streams stdout/stderr back in order.

pub mod gate;
pub mod lang;
pub mod runner;
pub mod sandbox;
pub mod server;
pub mod service;
pub mod stream;
pub mod types;
pub mod workspace;

pub mod proto {
    #![allow(missing_docs)]
    tonic::include_proto!("dcodex");
}
