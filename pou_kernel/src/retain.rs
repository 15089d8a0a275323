//! Retain images and the two-pass warm initializer.
//!
//! A `RetainImage` holds the values of every retain variable of one
//! instance, bound to the layout fingerprint it was captured from.
//!
//! Warm start:
//!   1. restore retain fields from the image (all-or-nothing)
//!   2. `init(true)`: reset every non-retain field
//!
//! An image from another layout is rejected before anything is written.

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, RetainError};
use crate::hashing::layout_fingerprint;
use crate::pou::PouLayout;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetainedVar {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetainImage {
    pub pou: String,
    pub layout: String,
    /// Retain variables in record order.
    pub vars: Vec<RetainedVar>,
}

impl RetainImage {
    /// Capture every retain variable of `instance`.
    pub fn capture<P: PouLayout>(instance: &P) -> Self {
        let vars = P::DECLARATIONS
            .iter()
            .filter(|d| d.retain)
            .filter_map(|d| {
                instance.read(d.name).map(|value| RetainedVar {
                    name: d.name.to_string(),
                    value,
                })
            })
            .collect();

        Self {
            pou: P::NAME.to_string(),
            layout: layout_fingerprint::<P>(),
            vars,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .map(|v| v.value)
    }

    /// Check that the image can be applied to `P` without writing anything.
    pub fn validate<P: PouLayout>(&self) -> Result<(), RetainError> {
        let expected = layout_fingerprint::<P>();
        if self.layout != expected {
            return Err(RetainError::LayoutMismatch {
                expected,
                found: self.layout.clone(),
            });
        }
        for var in &self.vars {
            let decl = P::declaration(&var.name)
                .ok_or_else(|| AccessError::UnknownVariable(var.name.clone()))?;
            if !decl.retain {
                return Err(RetainError::NotRetain(var.name.clone()));
            }
            if decl.kind != var.value.kind() {
                return Err(AccessError::KindMismatch {
                    name: var.name.clone(),
                    expected: decl.kind,
                    found: var.value.kind(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Pass 1: write retained values into `instance`.
    pub fn restore_into<P: PouLayout>(&self, instance: &mut P) -> Result<(), RetainError> {
        self.validate::<P>()?;
        for var in &self.vars {
            instance.write(&var.name, var.value)?;
        }
        Ok(())
    }
}

/// Restore retained values, then reset everything else.
pub fn warm_init<P: PouLayout>(instance: &mut P, image: &RetainImage) -> Result<(), RetainError> {
    image.restore_into(instance)?;
    instance.init(true);
    Ok(())
}
