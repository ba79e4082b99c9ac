//! Per-language code generation templates.
//!
//! A grammar knows how to spell each generation unit of a pool (program
//! skeleton, manifold definitions, cache and validation blocks, call sites)
//! in one language. It never walks the graph itself: the pool builder
//! decides what goes where and asks the grammar to render it.

mod py;
mod r;
mod sh;

use std::path::Path;

pub use py::PyGrammar;
pub use r::RGrammar;
pub use sh::ShGrammar;

use crate::ir::{Manifold, Type};
use crate::lang::Lang;
use crate::mogrifier::Mogrifier;

/// A call from one manifold body to another manifold.
#[derive(Debug, Clone)]
pub struct CallSite<'a> {
    /// Function to call: a uid wrapper or a foreign stub
    pub name: String,
    /// Wire arguments, already rendered
    pub args: Vec<String>,
    /// Declared output of the callee
    pub output: &'a Type,
}

/// Everything that goes into one pool program, in template order.
#[derive(Debug)]
pub struct ProgramParts<'a> {
    /// Absolute output directory, baked into the pool
    pub outdir: &'a Path,
    /// `(mid, signature)` for every manifold in the pool
    pub type_map: Vec<(String, String)>,
    /// User source for this language, pasted verbatim
    pub source: &'a str,
    /// Rendered manifold definitions
    pub manifolds: Vec<String>,
    /// Rendered conversion routines
    pub conversions: String,
    /// Whether any manifold caches (needs the key helper)
    pub caches: bool,
    /// Whether the built-in `datcache` backend is used
    pub datcache: bool,
}

impl ProgramParts<'_> {
    /// The vestigial type map, one comment line per manifold.
    pub fn type_map_comment(&self) -> String {
        self.type_map
            .iter()
            .map(|(mid, sig)| format!("# {mid} :: {sig}\n"))
            .collect()
    }
}

/// Code generation contract for one target language.
pub trait Grammar {
    fn lang(&self) -> Lang;

    fn true_literal(&self) -> &'static str;
    fn false_literal(&self) -> &'static str;

    /// Separator between call arguments.
    fn separator(&self) -> &'static str;

    /// Joins a named argument's key to its value.
    fn binder(&self) -> &'static str;

    /// Joins validation conditions.
    fn conjunction(&self) -> &'static str;

    fn indent_width(&self) -> usize {
        4
    }

    /// Assemble a complete pool: header, type map, user source, manifold
    /// definitions, conversion routines, dispatch trailer.
    fn program(&self, parts: &ProgramParts<'_>) -> String;

    /// A manifold with the full caching/validation machinery.
    fn native_manifold(&self, m: &Manifold, body: &str, mogrifier: &dyn Mogrifier) -> String;

    /// A manifold that is a direct call of its function.
    fn simple_manifold(&self, m: &Manifold, call: &str, mogrifier: &dyn Mogrifier) -> String;

    /// Counter plus wrapper minting a fresh uid per call.
    fn uid_wrapper(&self, m: &Manifold) -> String;

    /// Local stand-in for a manifold implemented in another pool.
    ///
    /// A pool prints its result followed by one newline. The stub removes
    /// exactly that newline and keeps any others, so a value ending in blank
    /// lines decodes the same in every language. A failed call yields the
    /// absent value.
    fn foreign_manifold(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String;

    /// The `show_<mid>` routine the dispatch trailer calls.
    fn entry_point(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String;

    /// Cache check with its hit and miss branches.
    fn cache_block(&self, m: &Manifold, backend: &str, hit: &str, miss: &str) -> String;

    /// Statement replaying a stored artifact.
    fn cache_get(&self, m: &Manifold, backend: &str) -> String;

    /// Statement storing the current artifact.
    fn cache_put(&self, m: &Manifold, backend: &str) -> String;

    /// Statement consuming the transient artifact as the result.
    fn emit_artifact(&self, m: &Manifold) -> String;

    /// Validation if/else.
    fn validate_block(&self, condition: &str, pass: &str, fail: &str) -> String;

    /// One validation condition.
    fn check(&self, site: &CallSite<'_>) -> String;

    /// Statement calling the function and writing its encoded result.
    fn store_result(&self, m: &Manifold, call: &str, mogrifier: &dyn Mogrifier) -> String;

    /// Statement writing the fallback value, absent when there is no fallback.
    fn store_fallback(
        &self,
        m: &Manifold,
        fallback: Option<&CallSite<'_>>,
        mogrifier: &dyn Mogrifier,
    ) -> String;

    /// Statement writing a diagnostic to standard error.
    fn message(&self, text: &str) -> String;

    /// Statement running a trace hook, its encoded result on standard error.
    fn hook(&self, site: &CallSite<'_>, mogrifier: &dyn Mogrifier) -> String;

    /// Raw call of a manifold routine.
    fn call(&self, site: &CallSite<'_>) -> String;

    /// Another manifold's result used as a function argument.
    fn reference(&self, site: &CallSite<'_>) -> String;

    /// Call of the underlying function.
    fn function_call(&self, function: &str, arguments: &str) -> String;

    /// Join rendered positional and named arguments.
    fn arguments(&self, positional: &[String], named: &[(String, String)]) -> String {
        let mut parts = positional.to_vec();
        parts.extend(
            named
                .iter()
                .map(|(key, value)| format!("{key}{}{value}", self.binder())),
        );
        parts.join(self.separator())
    }

    /// A literal argument as a native value.
    fn literal(&self, value: &str, ty: &Type, mogrifier: &dyn Mogrifier) -> String;

    /// The k-th manifold parameter, in wire form.
    fn parameter(&self, k: usize) -> String;

    /// The k-th manifold parameter as a native value.
    fn parameter_value(&self, k: usize, ty: &Type, mogrifier: &dyn Mogrifier) -> String {
        mogrifier.unpack(ty, &self.parameter(k))
    }

    /// The uid a manifold body was called with.
    fn uid(&self, m: &Manifold) -> String;

    /// Indent every non-empty line by `levels` steps.
    fn indent(&self, text: &str, levels: usize) -> String {
        indent(text, levels * self.indent_width())
    }
}

/// Indent every non-empty line of `text` by `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join statements, skipping empty ones.
pub fn block(statements: &[String]) -> String {
    statements
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Double-quoted string literal valid in Python, R and JSON.
pub(crate) fn double_quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Single-quoted bash word.
pub(crate) fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
