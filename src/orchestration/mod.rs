//! Orchestration module for the external image tooling
//!
//! - Image runtime: Docker or Podman CLI
//! - Digest resolver: skopeo against the origin registry

mod engine_cli;
mod factory;
mod resolver;
mod runtime;

pub use engine_cli::{Engine, EngineCliRuntime};
pub use factory::{create_resolver, create_runtime, create_store};
pub use resolver::{DigestResolver, SkopeoResolver};
pub use runtime::ImageRuntime;

/// Max number of output lines to include in command error messages.
const ERROR_TAIL_LINES: usize = 20;

/// Extract the useful tail of a failed command's output for diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// non-empty lines so error messages are actionable without being
/// overwhelming.
pub(crate) fn command_error_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let lines: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    let tail = lines[start..].join("\n");

    if tail.is_empty() {
        match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    } else {
        tail
    }
}
