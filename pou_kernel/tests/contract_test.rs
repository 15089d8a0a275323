//! Lifecycle contract checks run against every shipped program.
//!
//! Each check is written once, generically over `Pou`, and applied to
//! MAIN, BATCH_COUNTER and RATIO.

use std::time::Duration;

use pou_kernel::arithmetic::FaultPolicy;
use pou_kernel::hashing::state_hash;
use pou_kernel::programs::{BatchCounter, Main, Ratio};
use pou_kernel::retain::{warm_init, RetainImage};
use pou_kernel::vars::VarClass;
use pou_kernel::{CycleContext, Pou, PouLayout, Value, ValueKind, ABI_VERSION};

/// A value of `kind` that differs from any initializer used by the programs.
fn odd_value(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(true),
        ValueKind::Sint => Value::Sint(-77),
        ValueKind::Int => Value::Int(-7777),
        ValueKind::Dint => Value::Dint(-777_777),
        ValueKind::Lint => Value::Lint(-7_777_777_777),
        ValueKind::Usint => Value::Usint(77),
        ValueKind::Uint => Value::Uint(7777),
        ValueKind::Udint => Value::Udint(777_777),
        ValueKind::Ulint => Value::Ulint(7_777_777_777),
        ValueKind::Real => Value::Real(7.75),
        ValueKind::Lreal => Value::Lreal(-7.75),
    }
}

/// Overwrite every variable, as if memory held garbage.
fn scramble<P: PouLayout>(instance: &mut P) {
    for decl in P::DECLARATIONS {
        instance
            .write(decl.name, odd_value(decl.kind))
            .expect("declared variable must be writable");
    }
}

fn cx(cycle: u64) -> CycleContext {
    CycleContext::new(cycle, Duration::from_millis(10), FaultPolicy::Saturate)
}

fn check_cold_init<P: Pou + PartialEq + std::fmt::Debug>() {
    let mut instance = P::default();
    scramble(&mut instance);
    instance.init(false);
    assert_eq!(instance, P::default(), "{}: cold init must restore initializers", P::NAME);
}

fn check_retain_init<P: Pou + PartialEq + std::fmt::Debug>() {
    let mut instance = P::default();
    scramble(&mut instance);
    instance.init(true);
    let fresh = P::default();
    for decl in P::DECLARATIONS {
        let expected = if decl.retain {
            odd_value(decl.kind)
        } else {
            fresh.read(decl.name).unwrap()
        };
        assert_eq!(instance.read(decl.name), Some(expected), "{}.{}", P::NAME, decl.name);
    }
}

fn check_idempotent_init<P: Pou + PartialEq + std::fmt::Debug>() {
    let mut once = P::default();
    scramble(&mut once);
    let mut twice = once.clone();
    once.init(false);
    twice.init(false);
    twice.init(false);
    assert_eq!(once, twice);
}

fn check_determinism<P: Pou>() {
    let run = || {
        let mut instance = P::default();
        instance.init(false);
        (1..=20)
            .map(|c| {
                instance.reset_temps();
                let _ = instance.body(&cx(c));
                state_hash(&instance)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run(), "{}: replay diverged", P::NAME);
}

/// The record is a fixed struct, so `body` cannot grow it or add fields.
/// What remains to check: every declared variable keeps its kind, and
/// inputs are never written by the body.
fn check_bounded_mutation<P: Pou>() {
    let mut instance = P::default();
    instance.init(false);
    for c in 1..=5 {
        let before = instance.clone();
        instance.body(&cx(c)).unwrap();
        for decl in P::DECLARATIONS {
            let after = instance.read(decl.name);
            assert_eq!(after.map(|v| v.kind()), Some(decl.kind), "{}.{}", P::NAME, decl.name);
            if decl.class == VarClass::Input {
                assert_eq!(after, before.read(decl.name), "{}.{} is an input", P::NAME, decl.name);
            }
        }
    }
}

macro_rules! contract_suite {
    ($($module:ident => $pou:ty),* $(,)?) => {
        $(
            mod $module {
                use super::*;

                #[test]
                fn cold_init_resets_every_variable() {
                    check_cold_init::<$pou>();
                }

                #[test]
                fn warm_init_keeps_only_retain() {
                    check_retain_init::<$pou>();
                }

                #[test]
                fn repeated_cold_init_is_idempotent() {
                    check_idempotent_init::<$pou>();
                }

                #[test]
                fn cycles_are_deterministic() {
                    check_determinism::<$pou>();
                }

                #[test]
                fn body_only_touches_declared_fields() {
                    check_bounded_mutation::<$pou>();
                }
            }
        )*
    };
}

contract_suite! {
    main_program => Main,
    batch_counter => BatchCounter,
    ratio => Ratio,
}

#[test]
fn main_scenario() {
    let mut m = Main::default();
    m.init(false);
    assert!(!m.x);
    for c in 1..=3 {
        m.body(&cx(c)).unwrap();
    }
    assert!(m.x);
    m.init(false);
    assert!(!m.x);
}

#[test]
fn warm_restart_through_image() {
    let mut before = BatchCounter::default();
    before.init(false);
    for (c, start) in [true, false, true, false].into_iter().enumerate() {
        before.start = start;
        before.body(&cx(c as u64 + 1)).unwrap();
    }
    assert_eq!((before.count, before.total), (2, 2));

    // power loss: a new allocation, retained data comes from the image
    let image = RetainImage::capture(&before);
    let mut after = BatchCounter::default();
    warm_init(&mut after, &image).unwrap();
    assert_eq!(after.total, 2);
    assert_eq!(after.count, 0);
    assert!(!after.start_prev);
}

#[test]
fn abi_version_is_one() {
    assert_eq!(ABI_VERSION, 1, "ABI_VERSION is part of every persisted fingerprint");
}
