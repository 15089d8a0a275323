//! Interface-variable binding.
//!
//! How inputs reach a POU and where its outputs go is host business. The
//! scheduler calls `read_inputs` right before each body and `write_outputs`
//! right after a successful one; implementations decide what backs them.

use std::collections::BTreeMap;

use pou_kernel::pou::VarAccess;
use pou_kernel::vars::find_decl;
use pou_kernel::{AccessError, IecType, Value};

use crate::error::IoError;

pub trait IoBinding {
    /// Copy external values into input-capable variables.
    fn read_inputs(&mut self, vars: &mut dyn VarAccess) -> Result<(), IoError>;

    /// Publish output-capable variables.
    fn write_outputs(&mut self, vars: &dyn VarAccess) -> Result<(), IoError>;
}

/// No external I/O: the program runs on its private state only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIo;

impl IoBinding for NoIo {
    fn read_inputs(&mut self, _vars: &mut dyn VarAccess) -> Result<(), IoError> {
        Ok(())
    }

    fn write_outputs(&mut self, _vars: &dyn VarAccess) -> Result<(), IoError> {
        Ok(())
    }
}

/// In-memory process image keyed by variable name.
///
/// Inputs stay latched until changed; outputs hold the values published by
/// the last successful cycle.
#[derive(Debug, Clone, Default)]
pub struct ProcessImage {
    inputs: BTreeMap<String, Value>,
    outputs: BTreeMap<String, Value>,
}

impl ProcessImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input<T: IecType>(&mut self, name: &str, value: T) {
        self.set_input_value(name, value.into_value());
    }

    pub fn set_input_value(&mut self, name: &str, value: Value) {
        self.inputs.insert(name.to_ascii_lowercase(), value);
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    pub fn output(&self, name: &str) -> Option<Value> {
        self.outputs.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }
}

impl IoBinding for ProcessImage {
    fn read_inputs(&mut self, vars: &mut dyn VarAccess) -> Result<(), IoError> {
        // Check every binding before writing any of them.
        let decls = vars.declarations();
        for (name, value) in &self.inputs {
            let decl = find_decl(decls, name).ok_or_else(|| AccessError::UnknownVariable(name.clone()))?;
            if !decl.class.accepts_input() {
                return Err(IoError::NotAnInput {
                    name: name.clone(),
                    class: decl.class,
                });
            }
            if decl.kind != value.kind() {
                return Err(AccessError::KindMismatch {
                    name: decl.name.to_string(),
                    expected: decl.kind,
                    found: value.kind(),
                }
                .into());
            }
        }
        for (name, value) in &self.inputs {
            vars.write_var(name, *value)?;
        }
        Ok(())
    }

    fn write_outputs(&mut self, vars: &dyn VarAccess) -> Result<(), IoError> {
        for decl in vars.declarations().iter().filter(|d| d.class.produces_output()) {
            if let Some(value) = vars.read_var(decl.name) {
                self.outputs.insert(decl.name.to_ascii_lowercase(), value);
            }
        }
        Ok(())
    }
}
