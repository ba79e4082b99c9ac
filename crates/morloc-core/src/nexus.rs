//! Nexus generation.
//!
//! The nexus is the one program the user runs. It maps every exported name
//! to the pool implementing it and replaces itself with that pool, so the
//! pool's output and exit code reach the caller untouched:
//!
//! ```text
//! ./manifold-nexus NAME ARG...  =>  exec <outdir>/call.<lang> MID ARG...
//! ```

use std::path::Path;

use crate::error::Result;
use crate::grammar::sh_quote;
use crate::ir::Program;

/// Default file name of the generated nexus.
pub const DEFAULT_NEXUS_NAME: &str = "manifold-nexus";

/// Name and version printed by `--version`.
pub fn compiler_version() -> String {
    format!("morloc {}", env!("CARGO_PKG_VERSION"))
}

/// Renders the nexus dispatcher as a bash script.
pub struct Nexus<'a> {
    program: &'a Program,
    outdir: &'a Path,
    name: &'a str,
}

impl<'a> Nexus<'a> {
    /// `name` is only used in usage and error text.
    pub fn new(program: &'a Program, outdir: &'a Path, name: &'a str) -> Self {
        Self {
            program,
            outdir,
            name,
        }
    }

    /// Render the nexus script.
    ///
    /// # Errors
    /// Returns an error if an export names a manifold that does not exist.
    pub fn render(&self) -> Result<String> {
        let mut out = String::from("#!/usr/bin/env bash\n\n");
        out.push_str(&format!(
            "outdir={}\n\n",
            sh_quote(&self.outdir.display().to_string())
        ));

        out.push_str("usage () {\n    cat << 'END_OF_USAGE'\n");
        out.push_str(&self.usage()?);
        out.push_str("END_OF_USAGE\n}\n\n");

        out.push_str("if [[ $# -eq 0 ]]; then\n    usage >&2\n    exit 1\nfi\n\n");

        out.push_str("case \"$1\" in\n");
        out.push_str("    -h|--help)\n        usage\n        exit 0\n        ;;\n");
        out.push_str(&format!(
            "    -v|--version)\n        echo {}\n        exit 0\n        ;;\n",
            sh_quote(&compiler_version())
        ));
        for (name, mid) in self.program.exports.iter() {
            let m = self.program.graph.manifold(mid)?;
            out.push_str(&format!(
                "    {})\n        shift\n        exec \"$outdir/call.{}\" {} \"$@\"\n        ;;\n",
                sh_quote(name),
                m.lang,
                m.id
            ));
        }
        out.push_str(&format!(
            "    *)\n        printf \"%s: unknown command '%s'\\n\" {} \"$1\" >&2\n        usage >&2\n        exit 1\n        ;;\nesac\n",
            sh_quote(self.name)
        ));

        Ok(out)
    }

    fn usage(&self) -> Result<String> {
        let mut text = format!("Usage: ./{} [OPTION]... COMMAND [ARG]...\n\n", self.name);

        if self.program.exports.is_empty() {
            text.push_str("No exported commands\n");
        } else {
            text.push_str("Exported commands:\n");
            let width = self
                .program
                .exports
                .iter()
                .map(|(name, _)| name.len())
                .max()
                .unwrap_or(0);
            for (name, mid) in self.program.exports.iter() {
                let m = self.program.graph.manifold(mid)?;
                text.push_str(&format!("  {name:<width$}  [{}] :: {}\n", m.id, m.signature));
                if let Some(doc) = &m.doc {
                    text.push_str(&format!("  {:<width$}  {doc}\n", ""));
                }
            }
        }

        text.push_str("\nOptions:\n");
        text.push_str("  -h, --help     print this help message\n");
        text.push_str("  -v, --version  print the compiler name and version\n");
        Ok(text)
    }
}
