use clap::Parser;
use std::net::SocketAddr;

/// Remote code execution server streaming program output over gRPC.
#[derive(Parser, Debug)]
#[command(name = "dcodex", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:50051")]
    listen: SocketAddr,

    /// Maximum number of concurrently admitted sandboxes
    #[arg(long, default_value_t = dcodex::gate::DEFAULT_CAPACITY)]
    max_sandboxes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    dcodex::server::serve(args.listen, args.max_sandboxes).await
}
