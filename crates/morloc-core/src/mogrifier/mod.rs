//! Per-language value marshalling.
//!
//! A mogrifier generates, for every type a pool touches, a decode routine
//! (`unpack_<T>`, wire text to native value) and an encode routine
//! (`pack_<T>`, native value to wire text). Routine names use the mangled
//! type name, see [`Type::mangle`].

mod py;
mod r;
mod sh;

use std::collections::BTreeMap;

pub use py::PyMogrifier;
pub use r::RMogrifier;
pub use sh::ShMogrifier;

use crate::error::{Error, Result};
use crate::ir::Type;
use crate::lang::Lang;

/// Value marshalling contract for one target language.
pub trait Mogrifier {
    fn lang(&self) -> Lang;

    /// Whether this language has a handler for `ty`.
    ///
    /// `void` is only meaningful as a result, never inside a composite.
    fn supports(&self, ty: &Type) -> bool {
        match ty {
            Type::Atom(_) => true,
            composite => composite
                .walk()
                .iter()
                .skip(1)
                .all(|inner| !inner.is_void() && self.supports(inner)),
        }
    }

    /// Helpers shared by every conversion routine.
    fn prelude(&self) -> String {
        String::new()
    }

    /// Definitions of the encode and decode routines for one type.
    ///
    /// Nested types get their own definitions; this renders only `ty`.
    fn conversion(&self, ty: &Type) -> String;

    /// Expression encoding a native value to wire text.
    fn pack(&self, ty: &Type, expr: &str) -> String {
        format!("pack_{}({expr})", ty.mangle())
    }

    /// Expression decoding wire text to a native value.
    fn unpack(&self, ty: &Type, expr: &str) -> String {
        format!("unpack_{}({expr})", ty.mangle())
    }
}

/// Render the conversion section of a pool.
///
/// Every type and every type nested inside it gets exactly one pair of
/// routines, sorted by mangled name.
///
/// # Errors
/// Returns [`Error::UnsupportedType`] for the first type without a handler.
pub fn conversions<'a>(
    mogrifier: &dyn Mogrifier,
    types: impl IntoIterator<Item = &'a Type>,
) -> Result<String> {
    let mut unique: BTreeMap<String, &Type> = BTreeMap::new();
    for ty in types {
        if !mogrifier.supports(ty) {
            return Err(Error::UnsupportedType {
                lang: mogrifier.lang().to_string(),
                ty: ty.to_string(),
            });
        }
        for inner in ty.walk() {
            unique.entry(inner.mangle()).or_insert(inner);
        }
    }

    let mut out = mogrifier.prelude();
    for ty in unique.values() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&mogrifier.conversion(ty));
    }
    Ok(out)
}
