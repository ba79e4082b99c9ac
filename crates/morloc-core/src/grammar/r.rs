//! R pools.
//!
//! Rscript runs single threaded, so uid counters are plain globals updated
//! with `<<-`.

use super::{CallSite, Grammar, ProgramParts, double_quote};
use crate::ir::{Atom, Manifold, Type};
use crate::lang::Lang;
use crate::mogrifier::Mogrifier;

const RUNTIME: &str = r#".read_file <- function(path) {
    size <- file.info(path)$size
    if (is.na(size) || size == 0) "" else readChar(path, size, useBytes = TRUE)
}

.artifact <- function(mid) file.path(outdir, paste0(mid, "_tmp"))

.write_artifact <- function(mid, wire) cat(wire, file = .artifact(mid), sep = "")

.read_artifact <- function(mid) .read_file(.artifact(mid))

.take_artifact <- function(mid) {
    wire <- .read_artifact(mid)
    unlink(.artifact(mid))
    wire
}
"#;

const CACHE_KEY: &str = r#".cache_key <- function(args) {
    f <- tempfile()
    on.exit(unlink(f))
    cat(paste(args, collapse = "\x1f"), file = f)
    unname(tools::md5sum(f))
}
"#;

const DATCACHE: &str = r#".cache_path <- function(mid, key) file.path(outdir, "cache", mid, key)

datcache_chk <- function(mid, key) file.exists(.cache_path(mid, key))

datcache_get <- function(mid, key) .read_file(.cache_path(mid, key))

datcache_put <- function(mid, key, wire) {
    dir.create(dirname(.cache_path(mid, key)), recursive = TRUE, showWarnings = FALSE)
    cat(wire, file = .cache_path(mid, key), sep = "")
}
"#;

const TRAILER: &str = r#"args <- commandArgs(trailingOnly = TRUE)
fun <- if (length(args) > 0) paste0("show_", args[[1]]) else ""
if (nzchar(fun) && exists(fun, mode = "function")) {
    result <- do.call(fun, as.list(args[-1]))
    cat(result, "\n", sep = "")
} else {
    quit(status = 1)
}
"#;

pub struct RGrammar;

impl RGrammar {
    fn params(m: &Manifold) -> String {
        let mut params: Vec<String> = (0..m.arity).map(|k| format!("x{k}")).collect();
        params.push("uid".to_string());
        params.join(", ")
    }

    fn header(m: &Manifold) -> String {
        match &m.doc {
            Some(doc) => format!("# {} :: {}\n# {doc}\n", m.id, m.signature),
            None => format!("# {} :: {}\n", m.id, m.signature),
        }
    }

    fn artifact_write(m: &Manifold, wire: &str) -> String {
        format!(".write_artifact(\"{}\", {wire})", m.id)
    }
}

impl Grammar for RGrammar {
    fn lang(&self) -> Lang {
        Lang::R
    }

    fn true_literal(&self) -> &'static str {
        "TRUE"
    }

    fn false_literal(&self) -> &'static str {
        "FALSE"
    }

    fn separator(&self) -> &'static str {
        ", "
    }

    fn binder(&self) -> &'static str {
        " = "
    }

    fn conjunction(&self) -> &'static str {
        " && "
    }

    fn program(&self, parts: &ProgramParts<'_>) -> String {
        let mut out = String::from("#!/usr/bin/env Rscript\n\n");
        out.push_str(&format!(
            "outdir <- {}\n\n",
            double_quote(&parts.outdir.display().to_string())
        ));
        out.push_str(RUNTIME);
        if parts.caches {
            out.push('\n');
            out.push_str(CACHE_KEY);
        }
        if parts.datcache {
            out.push('\n');
            out.push_str(DATCACHE);
        }
        out.push('\n');
        out.push_str(&parts.type_map_comment());
        if !parts.source.is_empty() {
            out.push('\n');
            out.push_str(parts.source);
            out.push('\n');
        }
        for manifold in &parts.manifolds {
            out.push('\n');
            out.push_str(manifold);
        }
        if !parts.conversions.is_empty() {
            out.push('\n');
            out.push_str(&parts.conversions);
        }
        out.push('\n');
        out.push_str(TRAILER);
        out
    }

    fn native_manifold(&self, m: &Manifold, body: &str, mogrifier: &dyn Mogrifier) -> String {
        let mut inner = String::from("wire <- \"\"\n");
        if m.cache.is_some() {
            let params: Vec<String> = (0..m.arity).map(|k| format!("x{k}")).collect();
            inner.push_str(&format!("key <- .cache_key(c({}))\n", params.join(", ")));
        }
        inner.push_str(body);
        inner.push('\n');
        inner.push_str(&mogrifier.unpack(m.output(), "wire"));
        format!(
            "{}{} <- function({}) {{\n{}\n}}\n",
            Self::header(m),
            m.id,
            Self::params(m),
            self.indent(&inner, 1)
        )
    }

    fn simple_manifold(&self, m: &Manifold, call: &str, _mogrifier: &dyn Mogrifier) -> String {
        format!(
            "{}{} <- function({}) {{\n{}\n}}\n",
            Self::header(m),
            m.id,
            Self::params(m),
            self.indent(call, 1)
        )
    }

    fn uid_wrapper(&self, m: &Manifold) -> String {
        format!(
            ".uid_{mid} <- 0\n\
             wrap_{mid} <- function(...) {{\n    \
                 .uid_{mid} <<- .uid_{mid} + 1\n    \
                 {mid}(..., as.character(.uid_{mid}))\n\
             }}\n",
            mid = m.id
        )
    }

    fn foreign_manifold(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String {
        format!(
            "# {mid} ({lang}) :: {sig}\n\
             {mid} <- function(...) {{\n    \
                 wire <- suppressWarnings(tryCatch(\n        \
                     system2(file.path(outdir, \"call.{lang}\"), c(\"{mid}\", shQuote(c(...))), stdout = TRUE),\n        \
                     error = function(e) character(0)\n    \
                 ))\n    \
                 if (!is.null(attr(wire, \"status\"))) wire <- character(0)\n    \
                 {decode}\n\
             }}\n",
            mid = m.id,
            lang = m.lang,
            sig = m.signature,
            decode = mogrifier.unpack(m.output(), "paste(wire, collapse = \"\\n\")"),
        )
    }

    fn entry_point(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String {
        let n = m.arity;
        let direct = format!(
            "do.call({}, c(args[seq_len({n})], list(args[[{}]])))",
            m.id,
            n + 1
        );
        let minted = format!("do.call(wrap_{}, args)", m.id);
        format!(
            "show_{mid} <- function(...) {{\n    \
                 args <- list(...)\n    \
                 if (length(args) > {n}) {{\n        \
                     return({direct})\n    \
                 }}\n    \
                 args <- c(args, rep(list(\"\"), {n} - length(args)))\n    \
                 {minted}\n\
             }}\n",
            mid = m.id,
            direct = mogrifier.pack(m.output(), &direct),
            minted = mogrifier.pack(m.output(), &minted),
        )
    }

    fn cache_block(&self, m: &Manifold, backend: &str, hit: &str, miss: &str) -> String {
        format!(
            "if ({backend}_chk(\"{}\", key)) {{\n{}\n}} else {{\n{}\n}}",
            m.id,
            self.indent(hit, 1),
            self.indent(miss, 1)
        )
    }

    fn cache_get(&self, m: &Manifold, backend: &str) -> String {
        format!("wire <- {backend}_get(\"{}\", key)", m.id)
    }

    fn cache_put(&self, m: &Manifold, backend: &str) -> String {
        format!("{backend}_put(\"{mid}\", key, .read_artifact(\"{mid}\"))", mid = m.id)
    }

    fn emit_artifact(&self, m: &Manifold) -> String {
        format!("wire <- .take_artifact(\"{}\")", m.id)
    }

    fn validate_block(&self, condition: &str, pass: &str, fail: &str) -> String {
        format!(
            "if ({condition}) {{\n{}\n}} else {{\n{}\n}}",
            self.indent(pass, 1),
            self.indent(fail, 1)
        )
    }

    fn check(&self, site: &CallSite<'_>) -> String {
        format!("isTRUE({})", self.call(site))
    }

    fn store_result(&self, m: &Manifold, call: &str, mogrifier: &dyn Mogrifier) -> String {
        if m.is_void() {
            format!("{call}\n{}", Self::artifact_write(m, "\"\""))
        } else {
            Self::artifact_write(m, &mogrifier.pack(m.output(), call))
        }
    }

    fn store_fallback(
        &self,
        m: &Manifold,
        fallback: Option<&CallSite<'_>>,
        mogrifier: &dyn Mogrifier,
    ) -> String {
        match fallback {
            Some(site) if !m.is_void() => {
                Self::artifact_write(m, &mogrifier.pack(m.output(), &self.call(site)))
            }
            Some(site) => format!("{}\n{}", self.call(site), Self::artifact_write(m, "\"\"")),
            None => Self::artifact_write(m, "\"\""),
        }
    }

    fn message(&self, text: &str) -> String {
        format!("message({})", double_quote(text))
    }

    fn hook(&self, site: &CallSite<'_>, mogrifier: &dyn Mogrifier) -> String {
        if site.output.is_void() {
            self.call(site)
        } else {
            format!("message({})", mogrifier.pack(site.output, &self.call(site)))
        }
    }

    fn call(&self, site: &CallSite<'_>) -> String {
        format!("{}({})", site.name, site.args.join(self.separator()))
    }

    fn reference(&self, site: &CallSite<'_>) -> String {
        self.call(site)
    }

    fn function_call(&self, function: &str, arguments: &str) -> String {
        format!("{function}({arguments})")
    }

    fn literal(&self, value: &str, ty: &Type, mogrifier: &dyn Mogrifier) -> String {
        match ty {
            Type::Atom(Atom::Int) => format!("{value}L"),
            Type::Atom(Atom::Num) => value.to_string(),
            Type::Atom(Atom::Bool) if value == "true" => self.true_literal().to_string(),
            Type::Atom(Atom::Bool) => self.false_literal().to_string(),
            Type::Atom(_) => double_quote(value),
            composite => mogrifier.unpack(composite, &double_quote(value)),
        }
    }

    fn parameter(&self, k: usize) -> String {
        format!("x{k}")
    }

    fn uid(&self, _m: &Manifold) -> String {
        "uid".to_string()
    }
}
