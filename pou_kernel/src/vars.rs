//! Variable declarations.
//!
//! A POU's declaration table is generated at compile time by
//! `declare_pou!` and lives in a `'static` slice, in field order.

use serde::{Deserialize, Serialize};

use crate::types::ValueKind;

/// Where a variable sits in the POU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarClass {
    Input,
    Output,
    InOut,
    /// `VAR`: internal state kept between cycles.
    Private,
    /// `VAR_TEMP`: re-initialized before every cycle.
    Temp,
    /// `VAR ... AT %...`: internal variable with a direct address.
    Located,
}

impl VarClass {
    /// Input, output and in/out variables form the POU interface.
    pub fn is_interface(self) -> bool {
        matches!(self, VarClass::Input | VarClass::Output | VarClass::InOut)
    }

    /// May the host write this variable from outside before a cycle?
    pub fn accepts_input(self) -> bool {
        matches!(self, VarClass::Input | VarClass::InOut | VarClass::Located)
    }

    /// Is this variable published to the host after a cycle?
    pub fn produces_output(self) -> bool {
        matches!(self, VarClass::Output | VarClass::InOut | VarClass::Located)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            VarClass::Input => "VAR_INPUT",
            VarClass::Output => "VAR_OUTPUT",
            VarClass::InOut => "VAR_IN_OUT",
            VarClass::Private | VarClass::Located => "VAR",
            VarClass::Temp => "VAR_TEMP",
        }
    }
}

/// One declared field of an instance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VarDecl {
    pub name: &'static str,
    pub kind: ValueKind,
    pub class: VarClass,
    pub retain: bool,
}

impl VarDecl {
    /// IEC identifiers are case-insensitive.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Find a declaration by (case-insensitive) name.
pub fn find_decl<'a>(decls: &'a [VarDecl], name: &str) -> Option<&'a VarDecl> {
    decls.iter().find(|d| d.matches(name))
}
