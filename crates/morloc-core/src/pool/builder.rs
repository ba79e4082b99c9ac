//! Drives one grammar and one mogrifier over the manifold graph.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::grammar::{CallSite, Grammar, ProgramParts, block};
use crate::ir::{Argument, HookPoint, Manifold, Program, Type};
use crate::lang::Backend;
use crate::mogrifier::{self, Mogrifier};

/// Built-in on-disk cache backend, generated into every pool that uses it.
pub const DATCACHE: &str = "datcache";

/// Renders the pool program for one language.
pub struct PoolBuilder<'a> {
    program: &'a Program,
    grammar: &'a dyn Grammar,
    mogrifier: &'a dyn Mogrifier,
    outdir: &'a Path,
}

impl<'a> PoolBuilder<'a> {
    pub fn new(program: &'a Program, backend: &'a Backend, outdir: &'a Path) -> Self {
        Self {
            program,
            grammar: backend.grammar.as_ref(),
            mogrifier: backend.mogrifier.as_ref(),
            outdir,
        }
    }

    /// Render the complete pool program.
    ///
    /// # Errors
    /// Returns an error if a type has no handler in this language or a
    /// reference does not resolve.
    pub fn build(&self) -> Result<String> {
        let lang = self.grammar.lang().name();
        let native: Vec<&Manifold> = self.program.graph.in_language(lang).collect();
        let foreign = self.foreign_callees(&native);

        tracing::debug!(
            "Rendering {} pool: {} manifolds, {} foreign stubs",
            lang,
            native.len(),
            foreign.len()
        );

        let mut manifolds = Vec::with_capacity(native.len() + foreign.len());
        for m in &native {
            manifolds.push(self.render_manifold(m)?);
        }
        for m in &foreign {
            manifolds.push(self.grammar.foreign_manifold(m, self.mogrifier));
        }

        let types = native.iter().chain(&foreign).flat_map(|m| used_types(*m));
        let conversions = mogrifier::conversions(self.mogrifier, types)?;

        let parts = ProgramParts {
            outdir: self.outdir,
            type_map: native
                .iter()
                .map(|m| (m.id.clone(), m.signature.to_string()))
                .collect(),
            source: self.program.source(lang),
            manifolds,
            conversions,
            caches: native.iter().any(|m| m.cache.is_some()),
            datcache: native.iter().any(|m| m.cache.as_deref() == Some(DATCACHE)),
        };

        Ok(self.grammar.program(&parts))
    }

    /// Manifolds of other languages called from this pool, in declaration order.
    fn foreign_callees(&self, native: &[&Manifold]) -> Vec<&'a Manifold> {
        let called: BTreeSet<&str> = native.iter().flat_map(|m| m.references()).collect();
        let lang = self.grammar.lang().name();
        self.program
            .graph
            .manifolds()
            .filter(|m| m.lang != lang && called.contains(m.id.as_str()))
            .collect()
    }

    /// Uid wrapper, definition and entry point of one native manifold.
    fn render_manifold(&self, m: &Manifold) -> Result<String> {
        let call = self.function_call(m)?;
        let definition = if m.is_simple() {
            self.grammar.simple_manifold(m, &call, self.mogrifier)
        } else {
            let body = self.body(m, &call)?;
            self.grammar.native_manifold(m, &body, self.mogrifier)
        };

        Ok([
            self.grammar.uid_wrapper(m),
            definition,
            self.grammar.entry_point(m, self.mogrifier),
        ]
        .join("\n"))
    }

    /// Hook 0, cache or miss path, hook 1.
    fn body(&self, m: &Manifold, call: &str) -> Result<String> {
        let g = self.grammar;

        let run = block(&[
            self.hooks(m, HookPoint::BeforeRun)?,
            g.store_result(m, call, self.mogrifier),
            m.cache
                .as_deref()
                .map(|backend| g.cache_put(m, backend))
                .unwrap_or_default(),
            self.hooks(m, HookPoint::AfterRun)?,
        ]);

        let validated = if m.checks.is_empty() {
            run
        } else {
            let fallback = match &m.fail.fallback {
                Some(mid) => Some(self.call_site(m, mid)?),
                None => None,
            };
            let fail = block(&[
                self.hooks(m, HookPoint::BeforeFail)?,
                g.store_fallback(m, fallback.as_ref(), self.mogrifier),
                m.fail
                    .message
                    .as_deref()
                    .map(|text| g.message(text))
                    .unwrap_or_default(),
                self.hooks(m, HookPoint::AfterFail)?,
            ]);
            let conditions = m
                .checks
                .iter()
                .map(|mid| Ok(g.check(&self.call_site(m, mid)?)))
                .collect::<Result<Vec<_>>>()?;
            g.validate_block(&conditions.join(g.conjunction()), &run, &fail)
        };

        let miss = block(&[
            self.hooks(m, HookPoint::BeforeMiss)?,
            validated,
            self.hooks(m, HookPoint::AfterMiss)?,
            g.emit_artifact(m),
        ]);

        let main = match m.cache.as_deref() {
            Some(backend) => {
                let hit = block(&[
                    self.hooks(m, HookPoint::BeforeHit)?,
                    g.cache_get(m, backend),
                    self.hooks(m, HookPoint::AfterHit)?,
                ]);
                g.cache_block(m, backend, &hit, &miss)
            }
            None => miss,
        };

        Ok(block(&[
            self.hooks(m, HookPoint::Enter)?,
            main,
            self.hooks(m, HookPoint::Exit)?,
        ]))
    }

    /// Call of the underlying function with every argument materialized.
    fn function_call(&self, m: &Manifold) -> Result<String> {
        let g = self.grammar;
        let positional = m
            .arguments
            .iter()
            .enumerate()
            .map(|(i, arg)| match arg {
                Argument::Literal { value, ty } => Ok(g.literal(value, ty, self.mogrifier)),
                Argument::Manifold(mid) => Ok(g.reference(&self.call_site(m, mid)?)),
                Argument::Parameter(k) => {
                    Ok(g.parameter_value(*k, &m.signature.inputs[i], self.mogrifier))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(g.function_call(&m.function, &g.arguments(&positional, &m.named_arguments)))
    }

    /// Statements for every hook at one point.
    fn hooks(&self, m: &Manifold, point: HookPoint) -> Result<String> {
        let statements = m
            .hooks_at(point)
            .iter()
            .map(|mid| Ok(self.grammar.hook(&self.call_site(m, mid)?, self.mogrifier)))
            .collect::<Result<Vec<_>>>()?;
        Ok(block(&statements))
    }

    /// A call from `caller` to `mid`.
    ///
    /// The callee receives the caller's parameters followed by the caller's
    /// uid, truncated to its own arity. Foreign stubs also get the caller's
    /// uid as the pool-level uid.
    fn call_site(&self, caller: &Manifold, mid: &str) -> Result<CallSite<'a>> {
        let g = self.grammar;
        let callee = self.program.graph.manifold(mid)?;

        let mut args: Vec<String> = (0..callee.arity)
            .map(|k| {
                if k < caller.arity {
                    g.parameter(k)
                } else {
                    g.uid(caller)
                }
            })
            .collect();

        let name = if callee.lang == caller.lang {
            format!("wrap_{}", callee.id)
        } else {
            args.push(g.uid(caller));
            callee.id.clone()
        };

        Ok(CallSite {
            name,
            args,
            output: callee.output(),
        })
    }
}

/// Every type a manifold's routines encode or decode.
fn used_types(m: &Manifold) -> Vec<&Type> {
    let mut types: Vec<&Type> = m.signature.inputs.iter().collect();
    types.push(m.output());
    for arg in &m.arguments {
        if let Argument::Literal { ty, .. } = arg {
            types.push(ty);
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::lang::backend_for;

    fn render(lil: &str, lang: &str) -> Result<String> {
        let program = Program::from_lil(lil)?;
        let backend = backend_for(lang)?;
        PoolBuilder::new(&program, &backend, Path::new("/tmp/out")).build()
    }

    const HELLO: &str = "\
EMIT\tm0\tsh
FUNC\tm0\tmain
TYPE\tm0\tString
NSRC\tsh
    main () {
        echo hello
    }
";

    #[test]
    fn test_simple_sh_pool() {
        let pool = render(HELLO, "sh").unwrap();
        assert!(pool.starts_with("#!/usr/bin/env bash\n\noutdir='/tmp/out'\n"));
        assert!(pool.contains("# m0 :: String\n"));
        assert!(pool.contains("main () {\n    echo hello\n}"));
        assert!(pool.contains("m0 () {\n    main | pack_String\n}"));
        assert!(pool.contains("show_m0 () {"));
        assert!(pool.contains("pack_String () {"));
        assert!(!pool.contains("cache_key"));
    }

    #[test]
    fn test_template_order() {
        let pool = render(HELLO, "sh").unwrap();
        let pos = |needle: &str| pool.find(needle).unwrap();
        assert!(pos("# m0 :: String") < pos("main () {"));
        assert!(pos("main () {") < pos("wrap_m0 () {"));
        assert!(pos("wrap_m0 () {") < pos("pack_String () {"));
        assert!(pos("pack_String () {") < pos("declare -F"));
    }

    #[test]
    fn test_cached_body_layout() {
        let lil = "\
EMIT\tm0\tpy
FUNC\tm0\tsquare
TYPE\tm0\tInt -> Int
INPA\tm0\t0\t0
CACH\tm0\tdatcache
";
        let pool = render(lil, "py").unwrap();
        assert!(pool.contains("def datcache_put(mid, key, wire):"));
        assert!(pool.contains("key = _cache_key([x0])"));
        assert!(pool.contains(
            "    if datcache_chk(\"m0\", key):\n        wire = datcache_get(\"m0\", key)\n    else:\n"
        ));
        assert!(pool.contains("_write_artifact(\"m0\", pack_Int(square(unpack_Int(x0))))"));
        assert!(pool.contains("datcache_put(\"m0\", key, _read_artifact(\"m0\"))"));
        assert!(pool.contains("wire = _take_artifact(\"m0\")"));
        assert!(pool.contains("    return unpack_Int(wire)\n"));
    }

    #[test]
    fn test_validation_and_fallback() {
        let lil = "\
EMIT\tm0\tsh
FUNC\tm0\tcompute
EMIT\tm1\tsh
FUNC\tm1\tis_ok
TYPE\tm1\tBool
EMIT\tm2\tsh
FUNC\tm2\tdefault
CHEK\tm0\tm1
FAIL\tm0\tm2
MESG\tm0\tinput rejected
";
        let pool = render(lil, "sh").unwrap();
        assert!(pool.contains("if [[ $(wrap_m1) == \"true\" ]]; then"));
        assert!(pool.contains("compute | pack_String > \"$outdir/m0_tmp\""));
        assert!(pool.contains("wrap_m2 > \"$outdir/m0_tmp\""));
        assert!(pool.contains("echo 'input rejected' >&2"));
    }

    #[test]
    fn test_hooks_forward_uid() {
        let lil = "\
EMIT\tm0\tsh
FUNC\tm0\tcompute
EMIT\tm1\tsh
FUNC\tm1\techo
INPA\tm1\t0\t0
HOOK\tm0\t0\tm1
";
        let pool = render(lil, "sh").unwrap();
        // m0 has no parameters, so m1's only parameter is m0's uid
        assert!(pool.contains("    wrap_m1 \"${1}\" 1>&2\n"));
    }

    #[test]
    fn test_foreign_reference_gets_stub() {
        let lil = "\
EMIT\tm0\tpy
FUNC\tm0\tlen
TYPE\tm0\tString -> Int
INPM\tm0\t0\tm1
EMIT\tm1\tsh
FUNC\tm1\twhoami
";
        let pool = render(lil, "py").unwrap();
        assert!(pool.contains("def m1(*args):"));
        assert!(pool.contains("[os.path.join(outdir, \"call.sh\"), \"m1\", *args]"));
        assert!(pool.contains("return len(m1(uid))"));

        // The sh pool knows nothing about m0
        let sh = render(lil, "sh").unwrap();
        assert!(!sh.contains("m0"));
    }

    #[test]
    fn test_r_pool_renders() {
        let lil = "\
EMIT\tm0\tR
FUNC\tm0\tsum
TYPE\tm0\t[Num] -> Num
INPP\tm0\t0\t[1.5,2.5]
MDOC\tm0\tadds things
";
        let pool = render(lil, "R").unwrap();
        assert!(pool.starts_with("#!/usr/bin/env Rscript\n"));
        assert!(pool.contains("# adds things\n"));
        assert!(pool.contains("sum(unpack_Array_Num(\"[1.5,2.5]\"))"));
        assert!(pool.contains("from_plain_Array_Num <- function(x) lapply(x, from_plain_Num)"));
        assert!(pool.contains("quit(status = 1)"));
    }

    #[test]
    fn test_unsupported_type_fails_fast() {
        let lil = "EMIT\tm0\tpy\nFUNC\tm0\tf\nTYPE\tm0\t[void]\n";
        assert!(matches!(
            render(lil, "py").unwrap_err(),
            Error::UnsupportedType { .. }
        ));
    }

    #[test]
    fn test_output_is_deterministic() {
        let lil = "\
EMIT\tm0\tpy
FUNC\tm0\tf
TYPE\tm0\t(Int,String) -> [Bool]
INPA\tm0\t0\t0
";
        assert_eq!(render(lil, "py").unwrap(), render(lil, "py").unwrap());
    }
}
