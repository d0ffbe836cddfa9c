//! End-to-end scenarios against an in-process server.
//!
//! Toolchain-dependent cases skip early when `g++` or `python3` is not
//! on PATH, so the suite degrades gracefully on minimal hosts.

use dcodex::gate::AdmissionGate;
use dcodex::proto::code_executor_client::CodeExecutorClient;
use dcodex::proto::code_executor_server::CodeExecutorServer;
use dcodex::proto::CodeRequest;
use dcodex::service::CodeExecutorService;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;

fn have(tool: &str) -> bool {
    std::process::Command::new(tool)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

async fn start_server(capacity: usize) -> (CodeExecutorClient<Channel>, Arc<AdmissionGate>) {
    let gate = Arc::new(AdmissionGate::new(capacity));
    let service = CodeExecutorService::new(Arc::clone(&gate));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _server = tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(CodeExecutorServer::new(service))
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    let client = CodeExecutorClient::connect(format!("http://{addr}"))
        .await
        .unwrap();
    (client, gate)
}

/// Runs one job to completion, returning the concatenated stdout and
/// stderr chunk bytes.
async fn run_job(
    client: &mut CodeExecutorClient<Channel>,
    language: &str,
    code: &str,
) -> Result<(Vec<u8>, Vec<u8>), tonic::Status> {
    let request = CodeRequest {
        language: language.to_string(),
        code: code.to_string(),
    };
    let mut stream = client.execute(request).await?.into_inner();

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some(chunk) = stream.message().await? {
        // Every message carries exactly one populated side.
        assert!(chunk.stdout_chunk.is_empty() != chunk.stderr_chunk.is_empty());
        stdout.extend_from_slice(&chunk.stdout_chunk);
        stderr.extend_from_slice(&chunk.stderr_chunk);
    }
    Ok((stdout, stderr))
}

async fn wait_for_idle(gate: &AdmissionGate) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while gate.active() > 0 {
        assert!(Instant::now() < deadline, "gate never drained");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn cpp_hello_world() {
    if !have("g++") {
        return;
    }
    let (mut client, _gate) = start_server(10).await;
    let (stdout, stderr) = run_job(
        &mut client,
        "cpp",
        "#include <cstdio>\nint main() { puts(\"hello\"); }\n",
    )
    .await
    .unwrap();
    assert_eq!(stdout, b"hello\n");
    assert!(stderr.is_empty());
}

#[tokio::test]
async fn python_hello_world() {
    if !have("python3") {
        return;
    }
    let (mut client, _gate) = start_server(10).await;
    let (stdout, stderr) = run_job(&mut client, "python", "print('hi')").await.unwrap();
    assert_eq!(stdout, b"hi\n");
    assert!(stderr.is_empty());
}

#[tokio::test]
async fn cpp_compile_error_streams_diagnostics_and_closes_ok() {
    if !have("g++") {
        return;
    }
    let (mut client, gate) = start_server(10).await;
    let (stdout, stderr) = run_job(&mut client, "cpp", "int main() { return x; }\n")
        .await
        .unwrap();
    assert!(stdout.is_empty());
    assert!(String::from_utf8_lossy(&stderr).contains('x'));
    wait_for_idle(&gate).await;
}

#[tokio::test]
async fn per_side_ordering_is_preserved() {
    if !have("python3") {
        return;
    }
    let code = "\
import sys
for i in range(50):
    sys.stdout.write(f'o{i};')
    sys.stdout.flush()
    sys.stderr.write(f'e{i};')
    sys.stderr.flush()
";
    let (mut client, _gate) = start_server(10).await;
    let (stdout, stderr) = run_job(&mut client, "python", code).await.unwrap();
    let expect = |prefix: &str| -> Vec<u8> {
        (0..50u32)
            .flat_map(|i| format!("{prefix}{i};").into_bytes())
            .collect()
    };
    assert_eq!(stdout, expect("o"));
    assert_eq!(stderr, expect("e"));
}

#[tokio::test]
async fn cpu_spinner_is_terminated_by_the_sandbox() {
    if !have("python3") {
        return;
    }
    let (mut client, gate) = start_server(10).await;
    let begun = Instant::now();
    let (stdout, _stderr) = run_job(&mut client, "python", "while True:\n    pass\n")
        .await
        .unwrap();
    // 5 s CPU budget plus drain margin.
    assert!(begun.elapsed() < Duration::from_secs(30));
    assert!(stdout.is_empty());
    wait_for_idle(&gate).await;
}

#[tokio::test]
async fn memory_hog_fails_under_the_address_space_limit() {
    if !have("python3") {
        return;
    }
    let (mut client, _gate) = start_server(10).await;
    let (stdout, stderr) = run_job(&mut client, "python", "a = bytearray(512 * 1024 * 1024)\n")
        .await
        .unwrap();
    assert!(stdout.is_empty());
    assert!(!stderr.is_empty());
}

#[tokio::test]
async fn workspace_is_gone_once_the_stream_closes() {
    if !have("python3") {
        return;
    }
    let (mut client, _gate) = start_server(10).await;
    let (stdout, _stderr) = run_job(&mut client, "python", "print(__file__)")
        .await
        .unwrap();
    let source = String::from_utf8(stdout).unwrap();
    let workspace = Path::new(source.trim()).parent().unwrap();
    assert!(source.trim().contains("dcodex_run_"));
    assert!(!workspace.exists());
}

#[tokio::test]
async fn over_limit_requests_are_rejected_without_chunks() {
    if !have("python3") {
        return;
    }
    let (client, gate) = start_server(2).await;

    // Two slow jobs occupy the whole gate.
    let mut busy = Vec::new();
    for _ in 0..2 {
        let mut client = client.clone();
        let stream = client
            .execute(CodeRequest {
                language: "python".to_string(),
                code: "import time; time.sleep(2)".to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        busy.push(stream);
    }
    assert_eq!(gate.active(), 2);

    let mut client_over = client.clone();
    let status = client_over
        .execute(CodeRequest {
            language: "python".to_string(),
            code: "print('never runs')".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::ResourceExhausted);
    assert_eq!(status.message(), "Too many active sandboxes");

    // Drain the admitted jobs; the counter must return to zero and a
    // fresh request must be admitted again.
    for mut stream in busy {
        while stream.message().await.unwrap().is_some() {}
    }
    wait_for_idle(&gate).await;

    let mut client = client.clone();
    let (stdout, _stderr) = run_job(&mut client, "python", "print('ok')").await.unwrap();
    assert_eq!(stdout, b"ok\n");
}

#[tokio::test]
async fn unsupported_language_is_an_invalid_argument() {
    let (mut client, gate) = start_server(10).await;
    let status = run_job(&mut client, "ruby", "puts 1").await.unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    wait_for_idle(&gate).await;
}

#[tokio::test]
async fn disconnecting_mid_stream_frees_the_slot() {
    if !have("python3") {
        return;
    }
    let (mut client, gate) = start_server(1).await;
    let stream = client
        .execute(CodeRequest {
            language: "python".to_string(),
            code: "import time\nprint('started', flush=True)\ntime.sleep(30)".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    // Abandon the RPC; server-side teardown kills the child and releases
    // the admission slot well before the sleep would finish.
    drop(stream);
    wait_for_idle(&gate).await;
}
