//! Run mode: call the freshly built nexus once, then clean up.

use std::process::Command;

use morloc_core::BuildOutput;

/// Call the nexus with the whitespace-split `command`.
///
/// Output streams are inherited so the run's stdout and stderr pass through
/// unchanged. The output directory and the nexus are removed whatever the
/// outcome.
pub fn execute(output: &BuildOutput, command: &str) -> anyhow::Result<u8> {
    let nexus = std::env::current_dir()?.join(&output.nexus);
    let args: Vec<&str> = command.split_whitespace().collect();
    tracing::debug!("Running {} {}", nexus.display(), args.join(" "));

    let status = Command::new(&nexus).args(&args).status();
    let cleanup = output.remove();

    let status = status.map_err(|e| anyhow::anyhow!("failed to run {}: {}", nexus.display(), e))?;
    cleanup?;

    // Killed by a signal
    let code = status.code().unwrap_or(1);
    Ok(u8::try_from(code).unwrap_or(1))
}
