//! R marshalling.
//!
//! Composites decode through `jsonlite::fromJSON(simplifyVector = FALSE)`
//! into nested lists and encode with hand-built JSON text so that tuple
//! arity and element order never depend on R's vector simplification.
//! The absent value decodes to `NA`.

use super::Mogrifier;
use crate::ir::{Atom, Type};
use crate::lang::Lang;

/// Shortest of 15 or 17 significant digits that reads back as `x`.
const NUM_TEXT: &str = r#".num_text <- function(x) {
    x <- as.numeric(x)
    text <- sprintf("%.15g", x)
    if (identical(as.numeric(text), x)) text else sprintf("%.17g", x)
}
"#;

pub struct RMogrifier;

impl RMogrifier {
    fn scalar(&self, atom: Atom) -> String {
        let name = atom.name();
        let (unpack, pack, from_plain, to_json) = match atom {
            Atom::Int => (
                "if (identical(wire, \"\")) NA_integer_ else as.integer(wire)",
                "if (length(x) == 0 || is.na(x)) \"\" else as.character(x)",
                "if (is.null(x)) NA_integer_ else as.integer(x)",
                "if (length(x) == 0 || is.na(x)) \"null\" else as.character(x)",
            ),
            Atom::Num => (
                "if (identical(wire, \"\")) NA_real_ else as.numeric(wire)",
                "if (length(x) == 0 || is.na(x)) \"\" else .num_text(x)",
                "if (is.null(x)) NA_real_ else as.numeric(x)",
                "if (length(x) == 0 || is.na(x)) \"null\" else .num_text(x)",
            ),
            Atom::Bool => (
                "if (identical(wire, \"true\")) TRUE else if (identical(wire, \"false\")) FALSE else NA",
                "if (length(x) == 0 || is.na(x)) \"\" else if (x) \"true\" else \"false\"",
                "if (is.null(x)) NA else as.logical(x)",
                "if (length(x) == 0 || is.na(x)) \"null\" else if (x) \"true\" else \"false\"",
            ),
            Atom::String | Atom::File | Atom::Text => (
                "wire",
                "if (length(x) == 0) \"\" else as.character(x)",
                "if (is.null(x)) NA_character_ else as.character(x)",
                "as.character(jsonlite::toJSON(as.character(x), auto_unbox = TRUE))",
            ),
            Atom::Void => ("NULL", "\"\"", "NULL", "\"null\""),
        };

        format!(
            "unpack_{name} <- function(wire) {unpack}\n\
             pack_{name} <- function(x) {pack}\n\
             from_plain_{name} <- function(x) {from_plain}\n\
             to_json_{name} <- function(x) {to_json}\n"
        )
    }

    fn composite(&self, ty: &Type, from_plain: String, to_json: String) -> String {
        let name = ty.mangle();
        format!(
            "unpack_{name} <- function(wire) {{\n    \
                 if (identical(wire, \"\")) return(NA)\n    \
                 from_plain_{name}(jsonlite::fromJSON(wire, simplifyVector = FALSE))\n\
             }}\n\
             pack_{name} <- function(x) if (identical(x, NA)) \"\" else to_json_{name}(x)\n\
             from_plain_{name} <- function(x) {from_plain}\n\
             to_json_{name} <- function(x) {to_json}\n"
        )
    }
}

impl Mogrifier for RMogrifier {
    fn lang(&self) -> Lang {
        Lang::R
    }

    fn prelude(&self) -> String {
        NUM_TEXT.to_string()
            + ".json_array <- function(parts) paste0(\"[\", paste(parts, collapse = \",\"), \"]\")\n"
    }

    fn conversion(&self, ty: &Type) -> String {
        match ty {
            Type::Atom(atom) => self.scalar(*atom),
            Type::Array(inner) => {
                let inner = inner.mangle();
                self.composite(
                    ty,
                    format!("lapply(x, from_plain_{inner})"),
                    format!(".json_array(vapply(x, to_json_{inner}, character(1)))"),
                )
            }
            Type::Tuple(items) => {
                let from: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("from_plain_{}(x[[{}]])", t.mangle(), i + 1))
                    .collect();
                let to: Vec<String> = items
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("to_json_{}(x[[{}]])", t.mangle(), i + 1))
                    .collect();
                self.composite(
                    ty,
                    format!("list({})", from.join(", ")),
                    format!(".json_array(c({}))", to.join(", ")),
                )
            }
        }
    }
}
