//! morloc - compile morloc programs into executable pools.

mod run;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use morloc_core::{
    BuildConfig, DEFAULT_NEXUS_NAME, Frontend, FrontendOptions, Program, ProjectBuilder,
};

#[derive(Parser)]
#[command(name = "morloc")]
#[command(about = "Compile a morloc program")]
#[command(version)]
struct Cli {
    /// Morloc source file, or a `.lil` file to skip the frontend
    source: PathBuf,

    /// Name of the generated nexus
    #[arg(short = 'o', long, default_value = DEFAULT_NEXUS_NAME)]
    nexus_name: PathBuf,

    /// Compile, call CMD through the nexus, then delete everything generated
    #[arg(short, long, value_name = "CMD")]
    run: Option<String>,

    /// Type check the source without building
    #[arg(short, long)]
    typecheck: bool,

    /// Only run the frontend and print the LIL
    #[arg(short, long)]
    lil_only: bool,

    /// Print a summary of every manifold
    #[arg(short = 'm', long)]
    print_manifolds: bool,

    /// Directory for pools and caches
    #[arg(short = 'x', long, value_name = "DIR")]
    execution_path: Option<PathBuf>,

    /// Reuse an existing execution path
    #[arg(short = 'k', long)]
    clobber: bool,

    /// Run the frontend under valgrind
    #[arg(long)]
    valgrind: bool,

    /// Run the frontend under valgrind with --leak-check=full
    #[arg(long)]
    memtest: bool,

    /// Print the lexer tokens
    #[arg(long)]
    token_dump: bool,

    /// Dump the parser symbol table
    #[arg(long)]
    table_dump: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn frontend_options(&self) -> FrontendOptions {
        FrontendOptions {
            typecheck: self.typecheck,
            token_dump: self.token_dump,
            table_dump: self.table_dump,
            valgrind: self.valgrind,
            memtest: self.memtest,
        }
    }

    fn build_config(&self) -> BuildConfig {
        BuildConfig {
            execution_path: self.execution_path.clone(),
            clobber: self.clobber,
            nexus_path: self.nexus_name.clone(),
            ..Default::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            // Format morloc-core errors with recovery hints
            let (message, code) = match err.downcast_ref::<morloc_core::Error>() {
                Some(morloc_err) => (morloc_err.with_hint(), morloc_err.exit_code()),
                None => (format!("{err:#}"), 1),
            };
            eprintln!("morloc: {message}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Run the requested pipeline and return the process exit code.
fn execute(cli: &Cli) -> anyhow::Result<u8> {
    let lil = load_lil(&cli.source, &cli.frontend_options())?;

    if cli.lil_only {
        print!("{lil}");
        return Ok(0);
    }

    let program = Program::from_lil(&lil)?;
    tracing::debug!(
        "Loaded {} manifolds, {} exports",
        program.graph.len(),
        program.exports.len()
    );

    if cli.typecheck {
        return Ok(0);
    }

    if cli.print_manifolds {
        for m in program.graph.manifolds() {
            print!("{m}");
        }
        return Ok(0);
    }

    let config = cli.build_config();
    let output = ProjectBuilder::new(&program, &config).build()?;

    match &cli.run {
        Some(command) => run::execute(&output, command),
        None => Ok(0),
    }
}

/// Read LIL directly from a `.lil` file, or produce it with the frontend.
fn load_lil(source: &Path, options: &FrontendOptions) -> anyhow::Result<String> {
    if source.extension().is_some_and(|ext| ext == "lil") {
        tracing::debug!("Reading LIL from {}", source.display());
        let lil = fs::read_to_string(source)
            .map_err(|e| anyhow::anyhow!("cannot read '{}': {}", source.display(), e))?;
        return Ok(lil);
    }

    let output = Frontend::locate()?.run(source, options)?;
    let warnings = output.stderr.clone();
    let lil = output.into_lil(options)?;
    if !warnings.is_empty() {
        eprint!("{warnings}");
    }
    Ok(lil)
}
