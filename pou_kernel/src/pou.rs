//! The POU lifecycle contract.
//!
//! A POU is a fixed `#[repr(C)]` record plus two entry points:
//!
//!   - `PouLayout::init(retain)`: cold (`false`) resets every variable to
//!     its initializer; warm (`true`) keeps retain variables and resets the
//!     rest.
//!   - `Pou::body(cx)`: one scan cycle, mutating the record in place.
//!
//! `declare_pou!` generates the record and everything in `PouLayout`
//! from an explicit field list. Only `body` is written by hand.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arithmetic::{self, FaultPolicy, IecInt};
use crate::error::{AccessError, Fault};
use crate::types::Value;
use crate::vars::{find_decl, VarDecl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PouKind {
    Program,
    FunctionBlock,
}

/// Generated part of a POU: layout, initializers and by-name access.
pub trait PouLayout: Clone + Default {
    /// Declared IEC name, e.g. `"MAIN"`.
    const NAME: &'static str;
    const KIND: PouKind;
    /// Every field, in record order.
    const DECLARATIONS: &'static [VarDecl];

    fn init(&mut self, retain: bool);

    /// Re-apply initializers to `VAR_TEMP` variables only.
    fn reset_temps(&mut self);

    fn read(&self, name: &str) -> Option<Value>;

    fn write(&mut self, name: &str, value: Value) -> Result<(), AccessError>;

    fn declaration(name: &str) -> Option<&'static VarDecl> {
        find_decl(Self::DECLARATIONS, name)
    }

    fn has_retain() -> bool {
        Self::DECLARATIONS.iter().any(|d| d.retain)
    }
}

/// Hand-written part of a POU: the cyclic body.
pub trait Pou: PouLayout {
    /// Execute exactly one cycle.
    ///
    /// On `Err` the host discards every change made during the cycle.
    fn body(&mut self, cx: &CycleContext) -> Result<(), Fault>;
}

/// Object-safe view of an instance, used by I/O bindings and monitors.
pub trait VarAccess {
    fn pou_name(&self) -> &'static str;
    fn declarations(&self) -> &'static [VarDecl];
    fn read_var(&self, name: &str) -> Option<Value>;
    fn write_var(&mut self, name: &str, value: Value) -> Result<(), AccessError>;
}

impl<P: PouLayout> VarAccess for P {
    fn pou_name(&self) -> &'static str {
        P::NAME
    }

    fn declarations(&self) -> &'static [VarDecl] {
        P::DECLARATIONS
    }

    fn read_var(&self, name: &str) -> Option<Value> {
        self.read(name)
    }

    fn write_var(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        self.write(name, value)
    }
}

/// Per-cycle information handed to `Pou::body`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleContext {
    /// 1-based cycle number since the last `init`.
    pub cycle: u64,
    /// Nominal scan period.
    pub period: Duration,
    pub policy: FaultPolicy,
}

impl CycleContext {
    pub fn new(cycle: u64, period: Duration, policy: FaultPolicy) -> Self {
        Self { cycle, period, policy }
    }

    pub fn add<T: IecInt>(&self, a: T, b: T) -> Result<T, Fault> {
        arithmetic::add(self.policy, a, b)
    }

    pub fn sub<T: IecInt>(&self, a: T, b: T) -> Result<T, Fault> {
        arithmetic::sub(self.policy, a, b)
    }

    pub fn mul<T: IecInt>(&self, a: T, b: T) -> Result<T, Fault> {
        arithmetic::mul(self.policy, a, b)
    }

    pub fn div<T: IecInt>(&self, a: T, b: T) -> Result<T, Fault> {
        arithmetic::div(self.policy, a, b)
    }

    pub fn rem<T: IecInt>(&self, a: T, b: T) -> Result<T, Fault> {
        arithmetic::rem(self.policy, a, b)
    }

    pub fn convert<S, T>(&self, value: S) -> Result<T, Fault>
    where
        S: IecInt,
        T: IecInt + TryFrom<S>,
    {
        arithmetic::convert(self.policy, value)
    }
}

/// Declare a POU instance record.
///
/// ```
/// use pou_kernel::declare_pou;
///
/// declare_pou! {
///     /// PROGRAM PUMP
///     pub program Pump("PUMP") {
///         var_input {
///             demand: bool = false;
///         }
///         var_output {
///             running: bool = false;
///         }
///         var_retain {
///             starts: u32 = 0;
///         }
///     }
/// }
///
/// use pou_kernel::pou::PouLayout;
/// let mut pump = Pump::default();
/// pump.starts = 12;
/// pump.running = true;
/// pump.init(true);
/// assert_eq!((pump.starts, pump.running), (12, false));
/// ```
///
/// Sections: `var`, `var_retain`, `var_input`, `var_input_retain`,
/// `var_output`, `var_output_retain`, `var_in_out`, `var_temp`,
/// `var_located`. Kinds: `program`, `function_block`.
#[macro_export]
macro_rules! declare_pou {
    (
        $(#[$meta:meta])*
        $vis:vis $kind:ident $name:ident ($iec:literal) {
            $(
                $section:ident {
                    $( $(#[$fmeta:meta])* $field:ident : $ty:ty = $init:expr ; )*
                }
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        #[repr(C)]
        $vis struct $name {
            $( $( $(#[$fmeta])* pub $field: $ty, )* )*
        }

        impl ::core::default::Default for $name {
            fn default() -> Self {
                Self {
                    $( $( $field: $init, )* )*
                }
            }
        }

        impl $crate::pou::PouLayout for $name {
            const NAME: &'static str = $iec;
            const KIND: $crate::pou::PouKind = $crate::__pou_kind!($kind);
            const DECLARATIONS: &'static [$crate::vars::VarDecl] = &[
                $( $(
                    $crate::vars::VarDecl {
                        name: ::core::stringify!($field),
                        kind: <$ty as $crate::types::IecType>::KIND,
                        class: $crate::__pou_section!($section).0,
                        retain: $crate::__pou_section!($section).1,
                    },
                )* )*
            ];

            fn init(&mut self, retain: bool) {
                let _ = retain;
                $( $(
                    if !(retain && $crate::__pou_section!($section).1) {
                        self.$field = $init;
                    }
                )* )*
            }

            fn reset_temps(&mut self) {
                $( $(
                    if ::core::matches!(
                        $crate::__pou_section!($section).0,
                        $crate::vars::VarClass::Temp
                    ) {
                        self.$field = $init;
                    }
                )* )*
            }

            fn read(&self, name: &str) -> ::core::option::Option<$crate::types::Value> {
                $( $(
                    if name.eq_ignore_ascii_case(::core::stringify!($field)) {
                        return ::core::option::Option::Some(
                            $crate::types::IecType::into_value(self.$field),
                        );
                    }
                )* )*
                ::core::option::Option::None
            }

            fn write(
                &mut self,
                name: &str,
                value: $crate::types::Value,
            ) -> ::core::result::Result<(), $crate::error::AccessError> {
                $( $(
                    if name.eq_ignore_ascii_case(::core::stringify!($field)) {
                        return match <$ty as $crate::types::IecType>::from_value(value) {
                            ::core::option::Option::Some(v) => {
                                self.$field = v;
                                ::core::result::Result::Ok(())
                            }
                            ::core::option::Option::None => {
                                ::core::result::Result::Err($crate::error::AccessError::KindMismatch {
                                    name: ::core::stringify!($field).to_string(),
                                    expected: <$ty as $crate::types::IecType>::KIND,
                                    found: value.kind(),
                                })
                            }
                        };
                    }
                )* )*
                let _ = value;
                ::core::result::Result::Err($crate::error::AccessError::UnknownVariable(
                    name.to_string(),
                ))
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __pou_kind {
    (program) => {
        $crate::pou::PouKind::Program
    };
    (function_block) => {
        $crate::pou::PouKind::FunctionBlock
    };
    ($other:ident) => {
        ::core::compile_error!(::core::concat!("unknown POU kind `", ::core::stringify!($other), "`"))
    };
}

/// Section keyword to `(VarClass, retain)`.
#[doc(hidden)]
#[macro_export]
macro_rules! __pou_section {
    (var) => {
        ($crate::vars::VarClass::Private, false)
    };
    (var_retain) => {
        ($crate::vars::VarClass::Private, true)
    };
    (var_input) => {
        ($crate::vars::VarClass::Input, false)
    };
    (var_input_retain) => {
        ($crate::vars::VarClass::Input, true)
    };
    (var_output) => {
        ($crate::vars::VarClass::Output, false)
    };
    (var_output_retain) => {
        ($crate::vars::VarClass::Output, true)
    };
    (var_in_out) => {
        ($crate::vars::VarClass::InOut, false)
    };
    (var_temp) => {
        ($crate::vars::VarClass::Temp, false)
    };
    (var_located) => {
        ($crate::vars::VarClass::Located, false)
    };
    ($other:ident) => {
        ::core::compile_error!(::core::concat!(
            "unknown variable section `",
            ::core::stringify!($other),
            "`"
        ))
    };
}
