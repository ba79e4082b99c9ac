//! Project build: pools and nexus written to disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ir::Program;
use crate::lang::{Backend, backend_for};
use crate::nexus::{DEFAULT_NEXUS_NAME, Nexus};
use crate::paths::{Workspace, morloc_home};
use crate::pool::PoolBuilder;

/// Configuration for one build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Morloc home; temporary output directories live under `<home>/tmp`.
    pub home: PathBuf,

    /// Explicit output directory. If None, a `morloc_N` slot is allocated.
    pub execution_path: Option<PathBuf>,

    /// Reuse an existing execution path.
    pub clobber: bool,

    /// Where the nexus script is written.
    pub nexus_path: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            home: morloc_home(),
            execution_path: None,
            clobber: false,
            nexus_path: PathBuf::from(DEFAULT_NEXUS_NAME),
        }
    }
}

impl BuildConfig {
    /// Create or allocate the output directory this config names.
    pub fn workspace(&self) -> Result<Workspace> {
        match &self.execution_path {
            Some(path) => Workspace::at(path, self.clobber),
            None => Workspace::allocate(&self.home),
        }
    }
}

/// Everything a build left on disk.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub workspace: Workspace,
    pub pools: Vec<PathBuf>,
    pub nexus: PathBuf,
}

impl BuildOutput {
    /// Remove the output directory and the nexus script.
    pub fn remove(&self) -> Result<()> {
        self.workspace.remove()?;
        if self.nexus.exists() {
            fs::remove_file(&self.nexus)?;
        }
        Ok(())
    }
}

/// Builds a loaded program into an output directory.
pub struct ProjectBuilder<'a> {
    program: &'a Program,
    config: &'a BuildConfig,
}

impl<'a> ProjectBuilder<'a> {
    pub fn new(program: &'a Program, config: &'a BuildConfig) -> Self {
        Self { program, config }
    }

    /// Allocate the output directory and write the project into it.
    ///
    /// An allocated temporary directory is removed again if the build fails.
    ///
    /// # Errors
    /// Returns an error if the output directory cannot be created, a
    /// language or type is unsupported, or a file cannot be written.
    pub fn build(&self) -> Result<BuildOutput> {
        let workspace = self.config.workspace()?;
        tracing::debug!("Building into {}", workspace.root.display());

        match write_project(self.program, &workspace, &self.config.nexus_path) {
            Ok(output) => Ok(output),
            Err(e) => {
                if self.config.execution_path.is_none() {
                    workspace.remove()?;
                }
                Err(e)
            }
        }
    }
}

/// Write every pool, the cache directory and the nexus.
///
/// Every language is resolved and every pool rendered before the first
/// file is written.
///
/// # Errors
/// Returns an error if a language or type is unsupported, an export is
/// dangling, or a file cannot be written.
pub fn write_project(
    program: &Program,
    workspace: &Workspace,
    nexus_path: &Path,
) -> Result<BuildOutput> {
    let backends = program
        .graph
        .languages()
        .into_iter()
        .map(backend_for)
        .collect::<Result<Vec<Backend>>>()?;

    let mut rendered = Vec::with_capacity(backends.len());
    for backend in &backends {
        let pool = PoolBuilder::new(program, backend, &workspace.root).build()?;
        rendered.push((backend, pool));
    }

    let nexus_name = nexus_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_NEXUS_NAME.to_string());
    let nexus = Nexus::new(program, &workspace.root, &nexus_name).render()?;

    let mut pools = Vec::with_capacity(rendered.len());
    for (backend, pool) in rendered {
        let path = workspace.pool_path(backend.lang.name());
        write_executable(&path, &pool)?;
        tracing::info!("Wrote {} pool to {}", backend.lang, path.display());

        let interpreter = backend.lang.interpreter();
        if which::which(interpreter).is_err() {
            tracing::warn!(
                "{} not found in PATH; {} will not run",
                interpreter,
                path.display()
            );
        }
        pools.push(path);
    }

    if program.graph.uses_cache() {
        fs::create_dir_all(&workspace.cache_dir)?;
    }

    write_executable(nexus_path, &nexus)?;
    tracing::info!("Wrote nexus to {}", nexus_path.display());

    Ok(BuildOutput {
        workspace: workspace.clone(),
        pools,
        nexus: nexus_path.to_path_buf(),
    })
}

fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}
