use crate::lang::{LanguageStrategy, OutputSink};
use crate::runner::{self, CancelToken};
use crate::types::{ExecutionResult, ResourceLimits};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonStrategy;

impl LanguageStrategy for PythonStrategy {
    fn tag(&self) -> &'static str {
        "python"
    }

    fn extension(&self) -> &'static str {
        ".py"
    }

    fn binary_name(&self) -> Option<&'static str> {
        // Interpreted: the run stage executes the source file directly.
        None
    }

    fn compile(
        &self,
        source: &Path,
        _binary: &Path,
        sink: OutputSink<'_>,
        cancel: &CancelToken,
    ) -> ExecutionResult {
        // Syntax check stands in for compilation, so syntax errors reach
        // the client before anything runs under the sandbox.
        let argv = vec![
            "python3".to_string(),
            "-m".to_string(),
            "py_compile".to_string(),
            source.to_string_lossy().into_owned(),
        ];
        runner::run(&argv, sink, false, None, cancel)
    }

    fn run(
        &self,
        program: &Path,
        sink: OutputSink<'_>,
        limits: &ResourceLimits,
        cancel: &CancelToken,
    ) -> ExecutionResult {
        let argv = vec![
            "python3".to_string(),
            program.to_string_lossy().into_owned(),
        ];
        runner::run(&argv, sink, true, Some(limits), cancel)
    }
}
