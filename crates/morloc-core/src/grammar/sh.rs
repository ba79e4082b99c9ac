//! Bash pools.
//!
//! A manifold's result is whatever it writes to standard output. Command
//! substitutions fork, so uid counters live in files under a per-process
//! directory and are updated under a `mkdir` lock.

use super::{CallSite, Grammar, ProgramParts, sh_quote};
use crate::ir::{Atom, Manifold, Type};
use crate::lang::Lang;
use crate::mogrifier::Mogrifier;

const RUNTIME: &str = r#"set -o pipefail

uid_dir=$(mktemp -d)
trap 'rm -rf "$uid_dir"' EXIT

next_uid () {
    local n=0
    until mkdir "$uid_dir/$1.lock" 2> /dev/null; do
        sleep 0.01
    done
    if [[ -f $uid_dir/$1 ]]; then
        n=$(< "$uid_dir/$1")
    fi
    n=$(( n + 1 ))
    echo "$n" > "$uid_dir/$1"
    rmdir "$uid_dir/$1.lock"
    echo "$n"
}
"#;

const CACHE_KEY: &str = r#"cache_key () {
    printf '%s\0' "$@" | sha1sum | cut -d' ' -f1
}
"#;

const DATCACHE: &str = r#"datcache_chk () {
    [[ -f $outdir/cache/$1/$2 ]]
}

datcache_get () {
    cat "$outdir/cache/$1/$2"
}

datcache_put () {
    mkdir -p "$outdir/cache/$1"
    cp "$3" "$outdir/cache/$1/$2"
}
"#;

const TRAILER: &str = r#"if [[ $# -gt 0 ]] && declare -F "show_$1" > /dev/null; then
    fun="show_$1"
    shift
    "$fun" "$@"
else
    exit 1
fi
"#;

pub struct ShGrammar;

impl ShGrammar {
    fn artifact(m: &Manifold) -> String {
        format!("\"$outdir/{}_tmp\"", m.id)
    }

    fn header(m: &Manifold) -> String {
        match &m.doc {
            Some(doc) => format!("# {} :: {}\n# {doc}\n", m.id, m.signature),
            None => format!("# {} :: {}\n", m.id, m.signature),
        }
    }
}

impl Grammar for ShGrammar {
    fn lang(&self) -> Lang {
        Lang::Sh
    }

    fn true_literal(&self) -> &'static str {
        "true"
    }

    fn false_literal(&self) -> &'static str {
        "false"
    }

    fn separator(&self) -> &'static str {
        " "
    }

    fn binder(&self) -> &'static str {
        " "
    }

    fn conjunction(&self) -> &'static str {
        " && "
    }

    fn program(&self, parts: &ProgramParts<'_>) -> String {
        let mut out = String::from("#!/usr/bin/env bash\n\n");
        out.push_str(&format!(
            "outdir={}\n\n",
            sh_quote(&parts.outdir.display().to_string())
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

    fn native_manifold(&self, m: &Manifold, body: &str, _mogrifier: &dyn Mogrifier) -> String {
        let mut inner = String::new();
        if m.cache.is_some() {
            inner.push_str(&format!(
                "local key\nkey=$(cache_key \"${{@:1:{}}}\")\n",
                m.arity
            ));
        }
        inner.push_str(body);
        format!(
            "{}{} () {{\n{}\n}}\n",
            Self::header(m),
            m.id,
            self.indent(&inner, 1)
        )
    }

    fn simple_manifold(&self, m: &Manifold, call: &str, mogrifier: &dyn Mogrifier) -> String {
        let statement = if m.is_void() {
            format!("{call} > /dev/null")
        } else {
            mogrifier.pack(m.output(), call)
        };
        format!(
            "{}{} () {{\n{}\n}}\n",
            Self::header(m),
            m.id,
            self.indent(&statement, 1)
        )
    }

    fn uid_wrapper(&self, m: &Manifold) -> String {
        format!(
            "wrap_{mid} () {{\n    {mid} \"$@\" \"$(next_uid {mid})\"\n}}\n",
            mid = m.id
        )
    }

    fn foreign_manifold(&self, m: &Manifold, mogrifier: &dyn Mogrifier) -> String {
        let decode = mogrifier.unpack(m.output(), "printf '%s' \"$wire\"");
        format!(
            "# {mid} ({lang}) :: {sig}\n\
             {mid} () {{\n    \
                 local wire\n    \
                 wire=$(\"$outdir/call.{lang}\" {mid} \"$@\" && printf x) || wire=\"\"\n    \
                 wire=${{wire%x}}\n    \
                 wire=${{wire%$'\\n'}}\n    \
                 {decode}\n\
             }}\n",
            mid = m.id,
            lang = m.lang,
            sig = m.signature,
        )
    }

    fn entry_point(&self, m: &Manifold, _mogrifier: &dyn Mogrifier) -> String {
        let n = m.arity;
        format!(
            "show_{mid} () {{\n    \
                 if (( $# > {n} )); then\n        \
                     {mid} \"${{@:1:{n}}}\" \"${{{uid}}}\"\n    \
                 else\n        \
                     local args=(\"$@\")\n        \
                     while (( ${{#args[@]}} < {n} )); do\n            \
                         args+=(\"\")\n        \
                     done\n        \
                     wrap_{mid} \"${{args[@]}}\"\n    \
                 fi\n\
             }}\n",
            mid = m.id,
            uid = n + 1,
        )
    }

    fn cache_block(&self, m: &Manifold, backend: &str, hit: &str, miss: &str) -> String {
        format!(
            "if {backend}_chk {} \"$key\"; then\n{}\nelse\n{}\nfi",
            m.id,
            self.indent(hit, 1),
            self.indent(miss, 1)
        )
    }

    fn cache_get(&self, m: &Manifold, backend: &str) -> String {
        format!("{backend}_get {} \"$key\"", m.id)
    }

    fn cache_put(&self, m: &Manifold, backend: &str) -> String {
        format!("{backend}_put {} \"$key\" {}", m.id, Self::artifact(m))
    }

    fn emit_artifact(&self, m: &Manifold) -> String {
        let artifact = Self::artifact(m);
        format!("cat {artifact}\nrm -f {artifact}")
    }

    fn validate_block(&self, condition: &str, pass: &str, fail: &str) -> String {
        format!(
            "if [[ {condition} ]]; then\n{}\nelse\n{}\nfi",
            self.indent(pass, 1),
            self.indent(fail, 1)
        )
    }

    fn check(&self, site: &CallSite<'_>) -> String {
        format!("$({}) == \"true\"", self.call(site))
    }

    fn store_result(&self, m: &Manifold, call: &str, mogrifier: &dyn Mogrifier) -> String {
        let artifact = Self::artifact(m);
        if m.is_void() {
            format!("{call} > /dev/null\n: > {artifact}")
        } else {
            format!("{} > {artifact}", mogrifier.pack(m.output(), call))
        }
    }

    fn store_fallback(
        &self,
        m: &Manifold,
        fallback: Option<&CallSite<'_>>,
        _mogrifier: &dyn Mogrifier,
    ) -> String {
        let artifact = Self::artifact(m);
        match fallback {
            Some(site) if !m.is_void() => format!("{} > {artifact}", self.call(site)),
            Some(site) => format!("{} > /dev/null\n: > {artifact}", self.call(site)),
            None => format!(": > {artifact}"),
        }
    }

    fn message(&self, text: &str) -> String {
        format!("echo {} >&2", sh_quote(text))
    }

    fn hook(&self, site: &CallSite<'_>, _mogrifier: &dyn Mogrifier) -> String {
        format!("{} 1>&2", self.call(site))
    }

    fn call(&self, site: &CallSite<'_>) -> String {
        let mut words = vec![site.name.clone()];
        words.extend(site.args.iter().cloned());
        words.join(" ")
    }

    fn reference(&self, site: &CallSite<'_>) -> String {
        // Text is streamed: the function receives a readable path
        if matches!(site.output, Type::Atom(Atom::Text)) {
            format!("<({})", self.call(site))
        } else {
            format!("\"$({})\"", self.call(site))
        }
    }

    fn function_call(&self, function: &str, arguments: &str) -> String {
        if arguments.is_empty() {
            function.to_string()
        } else {
            format!("{function} {arguments}")
        }
    }

    /// Named arguments are command options, so they come first.
    fn arguments(&self, positional: &[String], named: &[(String, String)]) -> String {
        let mut words: Vec<String> = named
            .iter()
            .map(|(key, value)| format!("{key}{}{}", self.binder(), sh_quote(value)))
            .collect();
        words.extend(positional.iter().cloned());
        words.join(self.separator())
    }

    fn literal(&self, value: &str, ty: &Type, _mogrifier: &dyn Mogrifier) -> String {
        match ty {
            Type::Atom(Atom::Int | Atom::Num | Atom::Bool) => value.to_string(),
            _ => sh_quote(value),
        }
    }

    fn parameter(&self, k: usize) -> String {
        format!("\"${{{}}}\"", k + 1)
    }

    /// Shell parameters are already the wire text.
    fn parameter_value(&self, k: usize, _ty: &Type, _mogrifier: &dyn Mogrifier) -> String {
        self.parameter(k)
    }

    fn uid(&self, m: &Manifold) -> String {
        format!("\"${{{}}}\"", m.arity + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::test_support::manifold;
    use crate::mogrifier::ShMogrifier;

    #[test]
    fn test_parameters_and_uid() {
        let m = manifold("sh");
        assert_eq!(ShGrammar.parameter(0), "\"${1}\"");
        assert_eq!(ShGrammar.parameter(11), "\"${12}\"");
        assert_eq!(ShGrammar.uid(&m), "\"${2}\"");
    }

    #[test]
    fn test_literals() {
        let string = Type::Atom(Atom::String);
        assert_eq!(ShGrammar.literal("it's", &string, &ShMogrifier), r"'it'\''s'");
        assert_eq!(ShGrammar.literal("42", &Type::Atom(Atom::Int), &ShMogrifier), "42");
        let array: Type = "[Int]".parse().unwrap();
        assert_eq!(ShGrammar.literal("[1,2]", &array, &ShMogrifier), "'[1,2]'");
    }

    #[test]
    fn test_named_arguments_first() {
        let args = ShGrammar.arguments(
            &["\"${1}\"".to_string()],
            &[("-n".to_string(), "2".to_string())],
        );
        assert_eq!(args, "-n '2' \"${1}\"");
    }

    #[test]
    fn test_references() {
        let text = Type::Atom(Atom::Text);
        let int = Type::Atom(Atom::Int);
        let site = |output| CallSite {
            name: "wrap_m1".to_string(),
            args: vec!["\"${1}\"".to_string()],
            output,
        };
        assert_eq!(ShGrammar.reference(&site(&int)), "\"$(wrap_m1 \"${1}\")\"");
        assert_eq!(ShGrammar.reference(&site(&text)), "<(wrap_m1 \"${1}\")");
        assert_eq!(ShGrammar.check(&site(&int)), "$(wrap_m1 \"${1}\") == \"true\"");
    }

    #[test]
    fn test_entry_point_forwards_uid() {
        let out = ShGrammar.entry_point(&manifold("sh"), &ShMogrifier);
        assert!(out.contains("if (( $# > 1 )); then"));
        assert!(out.contains("m0 \"${@:1:1}\" \"${2}\""));
        assert!(out.contains("wrap_m0 \"${args[@]}\""));
    }

    #[test]
    fn test_foreign_stub() {
        let mut m = manifold("py");
        m.id = "m3".to_string();
        let out = ShGrammar.foreign_manifold(&m, &ShMogrifier);
        assert!(out.contains("wire=$(\"$outdir/call.py\" m3 \"$@\" && printf x) || wire=\"\""));
        assert!(out.contains("wire=${wire%x}\n    wire=${wire%$'\\n'}\n"));
        assert!(out.contains("printf '%s' \"$wire\" | unpack_String"));
    }
}
