//! Python pools.
//!
//! Manifold routines return native values; only entry points and foreign
//! stubs deal in wire text. Uid counters are module globals guarded by one
//! `threading.Lock`.

use super::{CallSite, Grammar, ProgramParts, double_quote};
use crate::ir::{Atom, Manifold, Type};
use crate::lang::Lang;
use crate::mogrifier::Mogrifier;

const HEADER: &str = "import hashlib
import json
import os
import subprocess
import sys
import threading
";

const RUNTIME: &str = r#"_uid_lock = threading.Lock()


def _artifact(mid):
    return os.path.join(outdir, mid + "_tmp")


def _write_artifact(mid, wire):
    with open(_artifact(mid), "w") as f:
        f.write(wire)


def _read_artifact(mid):
    with open(_artifact(mid)) as f:
        return f.read()


def _take_artifact(mid):
    wire = _read_artifact(mid)
    os.remove(_artifact(mid))
    return wire
"#;

const CACHE_KEY: &str = r#"def _cache_key(args):
    return hashlib.sha1("\0".join(args).encode()).hexdigest()
"#;

const DATCACHE: &str = r#"def _cache_path(mid, key):
    return os.path.join(outdir, "cache", mid, key)


def datcache_chk(mid, key):
    return os.path.exists(_cache_path(mid, key))


def datcache_get(mid, key):
    with open(_cache_path(mid, key)) as f:
        return f.read()


def datcache_put(mid, key, wire):
    os.makedirs(os.path.dirname(_cache_path(mid, key)), exist_ok=True)
    with open(_cache_path(mid, key), "w") as f:
        f.write(wire)
"#;

const TRAILER: &str = r#"if __name__ == "__main__":
    fun = globals().get("show_" + sys.argv[1]) if len(sys.argv) > 1 else None
    if fun is None:
        sys.exit(1)
    print(fun(*sys.argv[2:]))
"#;

pub struct PyGrammar;

impl PyGrammar {
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
        format!("_write_artifact(\"{}\", {wire})", m.id)
    }
}

impl Grammar for PyGrammar {
    fn lang(&self) -> Lang {
        Lang::Py
    }

    fn true_literal(&self) -> &'static str {
        "True"
    }

    fn false_literal(&self) -> &'static str {
        "False"
    }

    fn separator(&self) -> &'static str {
        ", "
    }

    fn binder(&self) -> &'static str {
        "="
    }

    fn conjunction(&self) -> &'static str {
        " and "
    }

    fn program(&self, parts: &ProgramParts<'_>) -> String {
        let mut out = String::from("#!/usr/bin/env python3\n\n");
        out.push_str(HEADER);
        out.push_str(&format!(
            "\noutdir = {}\n\n",
            double_quote(&parts.outdir.display().to_string())
        ));
        out.push_str(RUNTIME);
        if parts.caches {
            out.push_str("\n\n");
            out.push_str(CACHE_KEY);
        }
        if parts.datcache {
            out.push_str("\n\n");
            out.push_str(DATCACHE);
        }
        out.push_str("\n\n");
        out.push_str(&parts.type_map_comment());
        if !parts.source.is_empty() {
            out.push_str("\n\n");
            out.push_str(parts.source);
            out.push('\n');
        }
        for manifold in &parts.manifolds {
            out.push_str("\n\n");
            out.push_str(manifold);
        }
        if !parts.conversions.is_empty() {
            out.push_str("\n\n");
            out.push_str(&parts.conversions);
        }
        out.push_str("\n\n");
        out.push_str(TRAILER);
        out
    }

    fn native_manifold(&self, m: &Manifold, body: &str, mogrifier: &dyn Mogrifier) -> String {
        let mut inner = String::from("wire = \"\"\n");
        if m.cache.is_some() {
            let params: Vec<String> = (0..m.arity).map(|k| format!("x{k}")).collect();
            inner.push_str(&format!("key = _cache_key([{}])\n", params.join(", ")));
        }
        inner.push_str(body);
        inner.push('\n');
        inner.push_str(&format!("return {}", mogrifier.unpack(m.output(), "wire")));
        format!(
            "{}def {}({}):\n{}\n",
            Self::header(m),
            m.id,
            Self::params(m),
            self.indent(&inner, 1)
        )
    }

    fn simple_manifold(&self, m: &Manifold, call: &str, _mogrifier: &dyn Mogrifier) -> String {
        let statement = if m.is_void() {
            format!("{call}\nreturn None")
        } else {
            format!("return {call}")
        };
        format!(
            "{}def {}({}):\n{}\n",
            Self::header(m),
            m.id,
            Self::params(m),
            self.indent(&statement, 1)
        )
    }

    fn uid_wrapper(&self, m: &Manifold) -> String {
        format!(
            "_uid_{mid} = 0\n\n\n\
             def wrap_{mid}(*args):\n    \
                 global _uid_{mid}\n    \
                 with _uid_lock:\n        \
                     _uid_{mid} += 1\n        \
                     uid = str(_uid_{mid})\n    \
                 return {mid}(*args, uid)\n",
            mid = m.id
        )
    }

    fn foreign_manifold(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String {
        format!(
            "# {mid} ({lang}) :: {sig}\n\
             def {mid}(*args):\n    \
                 try:\n        \
                     proc = subprocess.run(\n            \
                         [os.path.join(outdir, \"call.{lang}\"), \"{mid}\", *args],\n            \
                         stdout=subprocess.PIPE,\n            \
                         text=True,\n        \
                     )\n        \
                     wire = proc.stdout if proc.returncode == 0 else \"\"\n    \
                 except OSError:\n        \
                     wire = \"\"\n    \
                 if wire.endswith(\"\\n\"):\n        \
                     wire = wire[:-1]\n    \
                 return {decode}\n",
            mid = m.id,
            lang = m.lang,
            sig = m.signature,
            decode = mogrifier.unpack(m.output(), "wire"),
        )
    }

    fn entry_point(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String {
        let n = m.arity;
        format!(
            "def show_{mid}(*args):\n    \
                 if len(args) > {n}:\n        \
                     return {direct}\n    \
                 args = list(args) + [\"\"] * ({n} - len(args))\n    \
                 return {minted}\n",
            mid = m.id,
            direct = mogrifier.pack(m.output(), &format!("{}(*args[:{n}], args[{n}])", m.id)),
            minted = mogrifier.pack(m.output(), &format!("wrap_{}(*args)", m.id)),
        )
    }

    fn cache_block(&self, m: &Manifold, backend: &str, hit: &str, miss: &str) -> String {
        format!(
            "if {backend}_chk(\"{}\", key):\n{}\nelse:\n{}",
            m.id,
            self.indent(hit, 1),
            self.indent(miss, 1)
        )
    }

    fn cache_get(&self, m: &Manifold, backend: &str) -> String {
        format!("wire = {backend}_get(\"{}\", key)", m.id)
    }

    fn cache_put(&self, m: &Manifold, backend: &str) -> String {
        format!("{backend}_put(\"{mid}\", key, _read_artifact(\"{mid}\"))", mid = m.id)
    }

    fn emit_artifact(&self, m: &Manifold) -> String {
        format!("wire = _take_artifact(\"{}\")", m.id)
    }

    fn validate_block(&self, condition: &str, pass: &str, fail: &str) -> String {
        format!(
            "if {condition}:\n{}\nelse:\n{}",
            self.indent(pass, 1),
            self.indent(fail, 1)
        )
    }

    fn check(&self, site: &CallSite<'_>) -> String {
        self.call(site)
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
        format!("print({}, file=sys.stderr)", double_quote(text))
    }

    fn hook(&self, site: &CallSite<'_>, mogrifier: &dyn Mogrifier) -> String {
        if site.output.is_void() {
            self.call(site)
        } else {
            format!(
                "print({}, file=sys.stderr)",
                mogrifier.pack(site.output, &self.call(site))
            )
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
            Type::Atom(Atom::Int | Atom::Num) => value.to_string(),
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
