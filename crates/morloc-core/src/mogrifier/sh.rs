//! Bash marshalling.
//!
//! Shell values are already text, so every routine is a `cat` filter over
//! standard input. They still exist per type so a pool reads the same
//! whatever language it is written in.

use super::Mogrifier;
use crate::ir::Type;
use crate::lang::Lang;

pub struct ShMogrifier;

impl Mogrifier for ShMogrifier {
    fn lang(&self) -> Lang {
        Lang::Sh
    }

    fn conversion(&self, ty: &Type) -> String {
        let name = ty.mangle();
        format!("pack_{name} () {{\n    cat\n}}\n\nunpack_{name} () {{\n    cat\n}}\n")
    }

    fn pack(&self, ty: &Type, expr: &str) -> String {
        format!("{expr} | pack_{}", ty.mangle())
    }

    fn unpack(&self, ty: &Type, expr: &str) -> String {
        format!("{expr} | unpack_{}", ty.mangle())
    }
}
