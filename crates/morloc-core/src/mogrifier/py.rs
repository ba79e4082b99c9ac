//! Python marshalling: scalars by hand, composites through `json`.
//!
//! Composites decode to lists and tuples via `from_plain_<T>` over the
//! parsed JSON, and encode via `to_plain_<T>` before `json.dumps`. The
//! absent value decodes to `None` for every non-textual type.

use super::Mogrifier;
use crate::ir::{Atom, Type};
use crate::lang::Lang;

pub struct PyMogrifier;

impl PyMogrifier {
    fn scalar(&self, atom: Atom) -> String {
        let name = atom.name();
        let (unpack, pack, plain) = match atom {
            Atom::Int => (
                "int(wire) if wire != \"\" else None",
                "\"\" if x is None else str(int(x))",
                "None if x is None else int(x)",
            ),
            Atom::Num => (
                "float(wire) if wire != \"\" else None",
                "\"\" if x is None else repr(float(x))",
                "None if x is None else float(x)",
            ),
            Atom::Bool => (
                "{\"true\": True, \"false\": False}.get(wire)",
                "\"\" if x is None else (\"true\" if x else \"false\")",
                "None if x is None else bool(x)",
            ),
            Atom::String | Atom::File | Atom::Text => (
                "wire",
                "\"\" if x is None else str(x)",
                "None if x is None else str(x)",
            ),
            Atom::Void => ("None", "\"\"", "None"),
        };

        format!(
            "def unpack_{name}(wire):\n    return {unpack}\n\n\
             def pack_{name}(x):\n    return {pack}\n\n\
             def from_plain_{name}(x):\n    return {plain}\n\n\
             def to_plain_{name}(x):\n    return {plain}\n"
        )
    }

    fn composite(&self, ty: &Type, from_plain: String, to_plain: String) -> String {
        let name = ty.mangle();
        format!(
            "def unpack_{name}(wire):\n    return from_plain_{name}(json.loads(wire)) if wire != \"\" else None\n\n\
             def pack_{name}(x):\n    return \"\" if x is None else json.dumps(to_plain_{name}(x), separators=(\",\", \":\"))\n\n\
             def from_plain_{name}(x):\n    return None if x is None else {from_plain}\n\n\
             def to_plain_{name}(x):\n    return None if x is None else {to_plain}\n"
        )
    }
}

impl Mogrifier for PyMogrifier {
    fn lang(&self) -> Lang {
        Lang::Py
    }

    fn conversion(&self, ty: &Type) -> String {
        match ty {
            Type::Atom(atom) => self.scalar(*atom),
            Type::Array(inner) => {
                let inner = inner.mangle();
                self.composite(
                    ty,
                    format!("[from_plain_{inner}(v) for v in x]"),
                    format!("[to_plain_{inner}(v) for v in x]"),
                )
            }
            Type::Tuple(items) => {
                let from: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("from_plain_{}(x[{i}])", t.mangle()))
                    .collect();
                let to: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("to_plain_{}(x[{i}])", t.mangle()))
                    .collect();
                self.composite(
                    ty,
                    format!("({},)", from.join(", ")),
                    format!("[{}]", to.join(", ")),
                )
            }
        }
    }
}
