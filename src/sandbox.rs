/// Compile-and-run orchestration over a scoped workspace
use crate::lang::{self, OutputSink};
use crate::runner::CancelToken;
use crate::types::{ExecutionResult, ResourceLimits, Result};
use crate::workspace::Workspace;
use log::info;

/// Materializes `code` into a fresh workspace, compiles it with the
/// strategy for `language`, and runs the artifact under sandbox limits.
///
/// Unknown languages fail before any workspace exists. Compile and run
/// failures are `Ok` results with `success == false`; their diagnostics
/// have already been streamed through `sink`. The workspace is removed on
/// every path, and only after the child has been reaped.
pub fn execute(
    language: &str,
    code: &str,
    sink: OutputSink<'_>,
    cancel: &CancelToken,
) -> Result<ExecutionResult> {
    let strategy = lang::strategy_for(language)?;

    let workspace = Workspace::create()?;
    let source = workspace.write_file(&format!("Main{}", strategy.extension()), code.as_bytes())?;
    let binary = match strategy.binary_name() {
        Some(name) => workspace.path().join(name),
        None => source.clone(),
    };

    let compiled = strategy.compile(&source, &binary, sink, cancel);
    if !compiled.success {
        info!(
            "{} compile failed with exit {}",
            language, compiled.exit_code
        );
        return Ok(compiled);
    }

    // The client may have gone away while the compiler ran.
    if cancel.is_cancelled() {
        info!("{} job cancelled before the run stage", language);
        return Ok(ExecutionResult {
            success: false,
            exit_code: -1,
            error_message: Some("cancelled".to_string()),
        });
    }

    let limits = ResourceLimits::sandboxed();
    let result = strategy.run(&binary, sink, &limits, cancel);
    info!(
        "{} job finished: success={} exit={}",
        language, result.success, result.exit_code
    );
    Ok(result)
}
