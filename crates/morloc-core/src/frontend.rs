//! Upstream frontend invocation.
//!
//! The frontend lexes, parses and type checks morloc source and prints LIL
//! on stdout. It is located through `$MORLOC_FRONTEND`, falling back to
//! `morloc-frontend` on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Executable name searched on `PATH`.
pub const FRONTEND_NAME: &str = "morloc-frontend";

/// Flags forwarded to the frontend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontendOptions {
    /// Type check only (`-c`). Any diagnostic is fatal.
    pub typecheck: bool,

    /// Print lexer tokens (`-t`).
    pub token_dump: bool,

    /// Print the parser symbol table (`-d`).
    pub table_dump: bool,

    /// Run the frontend under valgrind.
    pub valgrind: bool,

    /// Run the frontend under valgrind with `--leak-check=full`.
    pub memtest: bool,
}

impl FrontendOptions {
    fn flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.typecheck {
            flags.push("-c");
        }
        if self.token_dump {
            flags.push("-t");
        }
        if self.table_dump {
            flags.push("-d");
        }
        flags
    }
}

/// Captured result of one frontend run.
#[derive(Debug, Clone)]
pub struct FrontendOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl FrontendOutput {
    /// Take the LIL text, turning a failed run into an error.
    ///
    /// Under typecheck any diagnostic on stderr fails with code 1, whatever
    /// the frontend's own exit code was.
    pub fn into_lil(self, options: &FrontendOptions) -> Result<String> {
        if options.typecheck && !self.stderr.is_empty() {
            return Err(Error::Frontend {
                code: 1,
                message: self.stderr.trim_end().to_string(),
            });
        }
        if self.code != 0 {
            let message = if self.stderr.is_empty() {
                "failed to compile morloc source".to_string()
            } else {
                self.stderr.trim_end().to_string()
            };
            return Err(Error::Frontend {
                code: self.code,
                message,
            });
        }
        Ok(self.stdout)
    }
}

/// Handle on the frontend executable.
#[derive(Debug, Clone)]
pub struct Frontend {
    path: PathBuf,
}

impl Frontend {
    /// Locate the frontend.
    ///
    /// # Errors
    /// Returns an error if neither `$MORLOC_FRONTEND` nor `PATH` provides it.
    pub fn locate() -> Result<Self> {
        if let Some(path) = std::env::var_os("MORLOC_FRONTEND") {
            return Ok(Self::at(path));
        }
        let path = which::which(FRONTEND_NAME).map_err(|_| Error::Frontend {
            code: 1,
            message: format!("{FRONTEND_NAME} not found in PATH (set MORLOC_FRONTEND)"),
        })?;
        Ok(Self { path })
    }

    /// Use a specific executable.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build the command line without running it.
    pub fn command(&self, source: &Path, options: &FrontendOptions) -> Command {
        let mut command = if options.valgrind || options.memtest {
            let mut command = Command::new("valgrind");
            if options.memtest {
                command.arg("--leak-check=full");
            }
            command.arg(&self.path);
            command
        } else {
            Command::new(&self.path)
        };
        command.args(options.flags()).arg(source);
        command
    }

    /// Run the frontend on a source file and capture its output.
    ///
    /// # Errors
    /// Returns an error if the process cannot be started. A non-zero exit
    /// is reported in the output, not as an error.
    pub fn run(&self, source: &Path, options: &FrontendOptions) -> Result<FrontendOutput> {
        tracing::info!("Running frontend {} on {}", self.path.display(), source.display());

        let output = self
            .command(source, options)
            .output()
            .map_err(|e| Error::Frontend {
                code: 1,
                message: format!("Failed to run {}: {}", self.path.display(), e),
            })?;

        Ok(FrontendOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // Killed by a signal
            code: output.status.code().unwrap_or(1),
        })
    }
}
