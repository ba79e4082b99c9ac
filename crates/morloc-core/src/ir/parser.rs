//! LIL parser: turns the frontend's record stream into a [`Program`].
//!
//! Records are tab-separated, one per line. A source block starts with
//! `NSRC <lang>`; every following line indented by four spaces (or empty)
//! belongs to it.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use super::graph::ManifoldGraph;
use super::types::{Argument, HookPoint, Manifold, Signature, Type};
use super::{ExportTable, Program};
use crate::error::{Error, Result};
use crate::wire::{self, Value};

const SOURCE_INDENT: &str = "    ";

/// A manifold while its records are still being collected.
#[derive(Default)]
struct Draft {
    lang: Option<String>,
    function: Option<String>,
    signature: Option<Signature>,
    arity: Option<usize>,
    /// (position, argument, explicit literal type)
    arguments: Vec<(usize, Argument, Option<Type>)>,
    named_arguments: Vec<(String, String)>,
    cache: Option<String>,
    checks: Vec<String>,
    fallback: Option<String>,
    message: Option<String>,
    hooks: BTreeMap<HookPoint, Vec<String>>,
    doc: Option<String>,
    /// Line of the first record mentioning this manifold
    line: usize,
}

/// Parser for LIL record streams.
pub struct LilParser {
    drafts: FxHashMap<String, Draft>,
    /// Manifold ids in EMIT order
    order: Vec<String>,
    exports: Vec<(String, String, usize)>,
    sources: BTreeMap<String, Vec<String>>,
    /// Language of the source block being read, if any
    current_source: Option<String>,
}

impl LilParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self {
            drafts: FxHashMap::default(),
            order: Vec::new(),
            exports: Vec::new(),
            sources: BTreeMap::new(),
            current_source: None,
        }
    }

    /// Parse a complete LIL stream.
    pub fn parse_str(mut self, lil: &str) -> Result<Program> {
        for (i, line) in lil.lines().enumerate() {
            self.parse_line(i + 1, line)?;
        }
        self.finish()
    }

    fn parse_line(&mut self, lineno: usize, line: &str) -> Result<()> {
        if let Some(lang) = &self.current_source {
            if line.trim().is_empty() {
                self.sources.entry(lang.clone()).or_default().push(String::new());
                return Ok(());
            }
            if let Some(code) = line.strip_prefix(SOURCE_INDENT) {
                self.sources.entry(lang.clone()).or_default().push(code.to_string());
                return Ok(());
            }
            self.current_source = None;
        }

        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(());
        }

        let fields: Vec<&str> = line.split('\t').collect();
        let err = |message: String| Error::Parse {
            line: lineno,
            message,
        };
        let expect = |n: usize| -> Result<()> {
            if fields.len() < n {
                Err(err(format!(
                    "{} expects {} fields, found {}",
                    fields[0],
                    n - 1,
                    fields.len() - 1
                )))
            } else {
                Ok(())
            }
        };
        let number = |s: &str| -> Result<usize> {
            s.trim()
                .parse()
                .map_err(|_| err(format!("expected a number, found '{s}'")))
        };

        match fields[0] {
            "NSRC" => {
                expect(2)?;
                let lang = fields[1].trim().to_string();
                self.sources.entry(lang.clone()).or_default();
                self.current_source = Some(lang);
            }
            "EXPT" => {
                expect(3)?;
                self.exports
                    .push((fields[2].trim().to_string(), fields[1].trim().to_string(), lineno));
            }
            "EMIT" => {
                expect(3)?;
                let mid = fields[1].trim();
                let draft = self.draft(mid, lineno);
                if draft.lang.is_some() {
                    return Err(err(format!("manifold {mid} is emitted twice")));
                }
                draft.lang = Some(fields[2].trim().to_string());
                self.order.push(mid.to_string());
            }
            "FUNC" => {
                expect(3)?;
                self.draft(fields[1], lineno).function = Some(fields[2].trim().to_string());
            }
            "TYPE" => {
                expect(3)?;
                let signature = fields[2].parse::<Signature>().map_err(|e: Error| err(e.to_string()))?;
                self.draft(fields[1], lineno).signature = Some(signature);
            }
            "NARG" => {
                expect(3)?;
                let n = number(fields[2])?;
                self.draft(fields[1], lineno).arity = Some(n);
            }
            "INPP" => {
                expect(4)?;
                let pos = number(fields[2])?;
                let ty: Option<Type> = match fields.get(4) {
                    Some(t) => Some(t.parse::<Type>().map_err(|e: Error| err(e.to_string()))?),
                    None => None,
                };
                let arg = Argument::Literal {
                    value: fields[3].to_string(),
                    // Placeholder until the signature is known
                    ty: ty.clone().unwrap_or(Type::Atom(super::Atom::String)),
                };
                self.draft(fields[1], lineno).arguments.push((pos, arg, ty));
            }
            "INPM" => {
                expect(4)?;
                let pos = number(fields[2])?;
                let arg = Argument::Manifold(fields[3].trim().to_string());
                self.draft(fields[1], lineno).arguments.push((pos, arg, None));
            }
            "INPA" => {
                expect(4)?;
                let pos = number(fields[2])?;
                let k = number(fields[3])?;
                self.draft(fields[1], lineno)
                    .arguments
                    .push((pos, Argument::Parameter(k), None));
            }
            "FARG" => {
                expect(4)?;
                let pair = (fields[2].trim().to_string(), fields[3].to_string());
                self.draft(fields[1], lineno).named_arguments.push(pair);
            }
            "CACH" => {
                expect(3)?;
                self.draft(fields[1], lineno).cache = Some(fields[2].trim().to_string());
            }
            "CHEK" => {
                expect(3)?;
                self.draft(fields[1], lineno).checks.push(fields[2].trim().to_string());
            }
            "FAIL" => {
                expect(3)?;
                self.draft(fields[1], lineno).fallback = Some(fields[2].trim().to_string());
            }
            "MESG" => {
                expect(3)?;
                self.draft(fields[1], lineno).message = Some(fields[2].to_string());
            }
            "HOOK" => {
                expect(4)?;
                let index = number(fields[2])?;
                let point = HookPoint::from_index(index)
                    .ok_or_else(|| err(format!("hook point {index} is out of range 0-9")))?;
                self.draft(fields[1], lineno)
                    .hooks
                    .entry(point)
                    .or_default()
                    .push(fields[3].trim().to_string());
            }
            "EFCT" => {
                // An effect without an explicit point runs as the manifold exits
                expect(3)?;
                let (point, target) = match fields.get(3) {
                    Some(target) => {
                        let index = number(fields[2])?;
                        let point = HookPoint::from_index(index).ok_or_else(|| {
                            err(format!("effect point {index} is out of range 0-9"))
                        })?;
                        (point, *target)
                    }
                    None => (HookPoint::Exit, fields[2]),
                };
                self.draft(fields[1], lineno)
                    .hooks
                    .entry(point)
                    .or_default()
                    .push(target.trim().to_string());
            }
            "OPEN" | "PACK" | "PASS" => {
                tracing::warn!("Ignoring unsupported {} record on line {}", fields[0], lineno);
            }
            "MDOC" => {
                expect(3)?;
                self.draft(fields[1], lineno).doc = Some(fields[2].to_string());
            }
            other => return Err(err(format!("unknown record '{other}'"))),
        }

        Ok(())
    }

    fn draft(&mut self, mid: &str, lineno: usize) -> &mut Draft {
        self.drafts.entry(mid.trim().to_string()).or_insert_with(|| Draft {
            line: lineno,
            ..Draft::default()
        })
    }

    fn finish(mut self) -> Result<Program> {
        // Attributes for a manifold that was never emitted
        if let Some((mid, draft)) = self.drafts.iter().find(|(_, d)| d.lang.is_none()) {
            return Err(Error::Parse {
                line: draft.line,
                message: format!("manifold {mid} has no EMIT record"),
            });
        }

        let mut manifolds = Vec::with_capacity(self.order.len());
        for mid in &self.order {
            let draft = self.drafts.remove(mid).unwrap_or_default();
            manifolds.push(finish_manifold(mid, draft)?);
        }

        let graph = ManifoldGraph::new(manifolds)?;

        let mut exports = ExportTable::new();
        for (name, mid, line) in self.exports {
            if graph.get(&mid).is_none() {
                return Err(Error::InvalidExport(format!(
                    "'{name}' (line {line}) refers to unknown manifold {mid}"
                )));
            }
            exports.insert(name, mid)?;
        }
        if exports.is_empty() {
            if let Some(first) = graph.manifolds().next() {
                exports.insert("main".to_string(), first.id.clone())?;
            }
        }

        let sources = self
            .sources
            .into_iter()
            .map(|(lang, lines)| {
                let mut text = lines.join("\n");
                text.truncate(text.trim_end().len());
                (lang, text)
            })
            .collect();

        Ok(Program {
            graph,
            exports,
            sources,
        })
    }
}

impl Default for LilParser {
    fn default() -> Self {
        Self::new()
    }
}

fn finish_manifold(mid: &str, draft: Draft) -> Result<Manifold> {
    let invalid = |message: String| Error::InvalidManifold {
        mid: mid.to_string(),
        message,
    };

    if !is_identifier(mid) {
        return Err(invalid("ids must be identifiers".to_string()));
    }

    let mut m = Manifold::new(mid, draft.lang.unwrap_or_default());
    m.function = draft
        .function
        .ok_or_else(|| invalid("no FUNC record".to_string()))?;

    let mut arguments = draft.arguments;
    arguments.sort_by_key(|(pos, _, _)| *pos);
    for (expected, (pos, _, _)) in arguments.iter().enumerate() {
        if *pos != expected {
            return Err(invalid(format!(
                "argument positions must be 0..{} without gaps or repeats, found {pos}",
                arguments.len()
            )));
        }
    }

    m.signature = draft
        .signature
        .unwrap_or_else(|| Signature::untyped(arguments.len()));
    if m.signature.inputs.len() != arguments.len() {
        return Err(invalid(format!(
            "type {} declares {} inputs but {} arguments are given",
            m.signature,
            m.signature.inputs.len(),
            arguments.len()
        )));
    }

    let max_param = arguments
        .iter()
        .filter_map(|(_, arg, _)| match arg {
            Argument::Parameter(k) => Some(k + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    m.arity = draft.arity.unwrap_or(max_param);
    if max_param > m.arity {
        return Err(invalid(format!(
            "parameter ${max_param} exceeds the declared arity {}",
            m.arity
        )));
    }

    for (pos, arg, explicit) in arguments {
        let arg = match arg {
            Argument::Literal { value, .. } => {
                let ty = explicit.unwrap_or_else(|| m.signature.inputs[pos].clone());
                match wire::decode(&ty, &value) {
                    Ok(Value::Absent) | Err(_) => {
                        return Err(Error::InvalidLiteral {
                            mid: mid.to_string(),
                            ty: ty.to_string(),
                            value,
                        });
                    }
                    Ok(_) => Argument::Literal { value, ty },
                }
            }
            other => other,
        };
        m.arguments.push(arg);
    }

    m.named_arguments = draft.named_arguments;
    m.cache = draft.cache;
    m.checks = draft.checks;
    m.fail.fallback = draft.fallback;
    m.fail.message = draft.message;
    m.hooks = draft.hooks;
    m.doc = draft.doc;

    Ok(m)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
