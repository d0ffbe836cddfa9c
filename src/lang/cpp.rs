use crate::lang::{LanguageStrategy, OutputSink};
use crate::runner::{self, CancelToken};
use crate::types::{ExecutionResult, ResourceLimits};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct CppStrategy;

impl LanguageStrategy for CppStrategy {
    fn tag(&self) -> &'static str {
        "cpp"
    }

    fn extension(&self) -> &'static str {
        ".cpp"
    }

    fn binary_name(&self) -> Option<&'static str> {
        Some("Main.bin")
    }

    fn compile(
        &self,
        source: &Path,
        binary: &Path,
        sink: OutputSink<'_>,
        cancel: &CancelToken,
    ) -> ExecutionResult {
        let argv = vec![
            "g++".to_string(),
            "-std=c++17".to_string(),
            source.to_string_lossy().into_owned(),
            "-o".to_string(),
            binary.to_string_lossy().into_owned(),
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
        let argv = vec![program.to_string_lossy().into_owned()];
        runner::run(&argv, sink, true, Some(limits), cancel)
    }
}
