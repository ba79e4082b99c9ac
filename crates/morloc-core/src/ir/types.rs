//! Types for the manifold data model.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Atomic wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Int,
    Num,
    String,
    File,
    Bool,
    Text,
    Void,
}

impl Atom {
    pub const ALL: [Atom; 7] = [
        Atom::Int,
        Atom::Num,
        Atom::String,
        Atom::File,
        Atom::Bool,
        Atom::Text,
        Atom::Void,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Atom::Int => "Int",
            Atom::Num => "Num",
            Atom::String => "String",
            Atom::File => "File",
            Atom::Bool => "Bool",
            Atom::Text => "Text",
            Atom::Void => "void",
        }
    }
}

/// A declared type: an atom or a composite over atoms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Atom(Atom),
    Array(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Atom(Atom::Void))
    }

    /// Identifier-safe name used in generated routine names.
    ///
    /// Prefix form with tuple arity keeps nested names unambiguous:
    /// `[(Int,String)]` becomes `Array_Tuple2_Int_String`.
    pub fn mangle(&self) -> String {
        match self {
            Type::Atom(atom) => atom.name().to_string(),
            Type::Array(inner) => format!("Array_{}", inner.mangle()),
            Type::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Type::mangle).collect();
                format!("Tuple{}_{}", items.len(), parts.join("_"))
            }
        }
    }

    /// This type followed by every type nested inside it.
    pub fn walk(&self) -> Vec<&Type> {
        let mut out = vec![self];
        match self {
            Type::Atom(_) => {}
            Type::Array(inner) => out.extend(inner.walk()),
            Type::Tuple(items) => {
                for item in items {
                    out.extend(item.walk());
                }
            }
        }
        out
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Atom(atom) => f.write_str(atom.name()),
            Type::Array(inner) => write!(f, "[{inner}]"),
            Type::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

impl FromStr for Type {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidType(s.to_string());

        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(invalid)?;
            if inner.trim().is_empty() {
                return Err(invalid());
            }
            return Ok(Type::Array(Box::new(inner.parse()?)));
        }

        if let Some(inner) = s.strip_prefix('(') {
            let inner = inner.strip_suffix(')').ok_or_else(invalid)?;
            let items = split_top_level(inner, ',').ok_or_else(invalid)?;
            let mut types = items
                .iter()
                .map(|item| item.parse::<Type>())
                .collect::<Result<Vec<_>>>()?;
            return match types.len() {
                0 => Err(invalid()),
                1 => Ok(types.remove(0)),
                _ => Ok(Type::Tuple(types)),
            };
        }

        match s {
            "Int" => Ok(Type::Atom(Atom::Int)),
            "Num" => Ok(Type::Atom(Atom::Num)),
            "String" => Ok(Type::Atom(Atom::String)),
            "File" => Ok(Type::Atom(Atom::File)),
            "Bool" => Ok(Type::Atom(Atom::Bool)),
            "Text" => Ok(Type::Atom(Atom::Text)),
            "void" | "Void" => Ok(Type::Atom(Atom::Void)),
            _ => Err(invalid()),
        }
    }
}

/// Split on `sep` outside of brackets and parentheses.
///
/// Returns `None` when the brackets are unbalanced.
fn split_top_level(s: &str, sep: char) -> Option<Vec<&str>> {
    let mut depth = 0i32;
    let mut start = 0;
    let mut parts = Vec::new();

    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    parts.push(&s[start..]);
    Some(parts)
}

/// A function signature: input types followed by the output type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<Type>,
    pub output: Type,
}

impl Signature {
    /// The untyped default: every position passes wire text through as `String`.
    pub fn untyped(ninputs: usize) -> Self {
        Self {
            inputs: vec![Type::Atom(Atom::String); ninputs],
            output: Type::Atom(Atom::String),
        }
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut terms = Vec::new();
        let mut depth = 0i32;
        let mut start = 0;
        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'[' | b'(' => depth += 1,
                b']' | b')' => depth -= 1,
                b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
                    terms.push(&s[start..i]);
                    start = i + 2;
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        terms.push(&s[start..]);

        let mut types = terms
            .into_iter()
            .map(str::parse::<Type>)
            .collect::<Result<Vec<_>>>()?;
        let output = types.pop().ok_or_else(|| Error::InvalidType(s.to_string()))?;
        if types.iter().any(Type::is_void) {
            return Err(Error::InvalidType(s.to_string()));
        }

        Ok(Self {
            inputs: types,
            output,
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "{input} -> ")?;
        }
        write!(f, "{}", self.output)
    }
}

/// One positional argument of the underlying function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    /// A literal value in wire form.
    Literal { value: String, ty: Type },
    /// The output of another manifold, possibly in another language.
    Manifold(String),
    /// The k-th manifold-level parameter.
    Parameter(usize),
}

/// Trace hook points within a manifold body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPoint {
    Enter,
    Exit,
    BeforeMiss,
    AfterMiss,
    BeforeRun,
    AfterRun,
    BeforeFail,
    AfterFail,
    BeforeHit,
    AfterHit,
}

impl HookPoint {
    pub fn from_index(index: usize) -> Option<Self> {
        const POINTS: [HookPoint; 10] = [
            HookPoint::Enter,
            HookPoint::Exit,
            HookPoint::BeforeMiss,
            HookPoint::AfterMiss,
            HookPoint::BeforeRun,
            HookPoint::AfterRun,
            HookPoint::BeforeFail,
            HookPoint::AfterFail,
            HookPoint::BeforeHit,
            HookPoint::AfterHit,
        ];
        POINTS.get(index).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// What a manifold does when validation fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailAction {
    /// Manifold producing the fallback value; `None` yields the absent value.
    pub fallback: Option<String>,
    /// Diagnostic written to stderr.
    pub message: Option<String>,
}

impl FailAction {
    pub fn is_empty(&self) -> bool {
        self.fallback.is_none() && self.message.is_none()
    }
}

/// The unit of compilation.
#[derive(Debug, Clone)]
pub struct Manifold {
    /// Unique id, e.g. `m0`
    pub id: String,
    /// Implementing language, as named in the IR
    pub lang: String,
    /// Underlying function name
    pub function: String,
    /// Number of manifold-level parameters
    pub arity: usize,
    pub signature: Signature,
    /// Cache backend, when caching is enabled
    pub cache: Option<String>,
    /// Validation predicates, in order
    pub checks: Vec<String>,
    pub fail: FailAction,
    pub hooks: BTreeMap<HookPoint, Vec<String>>,
    /// Positional arguments of the underlying function
    pub arguments: Vec<Argument>,
    /// Named arguments rendered after the positional ones
    pub named_arguments: Vec<(String, String)>,
    pub doc: Option<String>,
}

impl Manifold {
    pub fn new(id: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lang: lang.into(),
            function: String::new(),
            arity: 0,
            signature: Signature::untyped(0),
            cache: None,
            checks: Vec::new(),
            fail: FailAction::default(),
            hooks: BTreeMap::new(),
            arguments: Vec::new(),
            named_arguments: Vec::new(),
            doc: None,
        }
    }

    pub fn output(&self) -> &Type {
        &self.signature.output
    }

    pub fn is_void(&self) -> bool {
        self.signature.output.is_void()
    }

    /// A manifold without caching, validation or hooks is a plain call.
    pub fn is_simple(&self) -> bool {
        self.cache.is_none() && self.checks.is_empty() && self.fail.is_empty() && self.hooks.is_empty()
    }

    pub fn hooks_at(&self, point: HookPoint) -> &[String] {
        self.hooks.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every manifold this one calls, in rendering order.
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .arguments
            .iter()
            .filter_map(|arg| match arg {
                Argument::Manifold(mid) => Some(mid.as_str()),
                _ => None,
            })
            .collect();
        refs.extend(self.checks.iter().map(String::as_str));
        refs.extend(self.fail.fallback.as_deref());
        refs.extend(self.hooks.values().flatten().map(String::as_str));
        refs
    }
}

impl fmt::Display for Manifold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) :: {}", self.id, self.lang, self.signature)?;
        writeln!(f, "  function: {}", self.function)?;
        writeln!(f, "  arity: {}", self.arity)?;
        if let Some(doc) = &self.doc {
            writeln!(f, "  doc: {doc}")?;
        }
        if let Some(cache) = &self.cache {
            writeln!(f, "  cache: {cache}")?;
        }
        for (i, arg) in self.arguments.iter().enumerate() {
            match arg {
                Argument::Literal { value, ty } => writeln!(f, "  arg {i}: {value:?} :: {ty}")?,
                Argument::Manifold(mid) => writeln!(f, "  arg {i}: <{mid}>")?,
                Argument::Parameter(k) => writeln!(f, "  arg {i}: ${}", k + 1)?,
            }
        }
        for (key, value) in &self.named_arguments {
            writeln!(f, "  {key} = {value}")?;
        }
        if !self.checks.is_empty() {
            writeln!(f, "  checks: {}", self.checks.join(", "))?;
        }
        if let Some(fallback) = &self.fail.fallback {
            writeln!(f, "  fail: {fallback}")?;
        }
        if let Some(message) = &self.fail.message {
            writeln!(f, "  message: {message}")?;
        }
        for (point, hooks) in &self.hooks {
            writeln!(f, "  hook {}: {}", point.index(), hooks.join(", "))?;
        }
        Ok(())
    }
}
