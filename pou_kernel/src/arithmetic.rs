//! Integer operators available to POU bodies.
//!
//! Every operator takes the host's `FaultPolicy`:
//!   - `Trap`:     overflow, division by zero and out-of-range conversion
//!                 return a `Fault`; the cycle is rolled back by the host.
//!   - `Saturate`: results clamp to the type's bounds and the cycle continues.
//!                 Division by zero yields the bound matching the dividend's
//!                 sign (zero for a zero dividend).
//!
//! Floating-point types follow IEEE 754 and never fault.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::types::IecType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    #[default]
    Trap,
    Saturate,
}

/// IEC integer types (`SINT` .. `ULINT`).
pub trait IecInt: IecType + Ord + fmt::Display {
    const ZERO: Self;
    const MIN: Self;
    const MAX: Self;

    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn checked_sub(self, rhs: Self) -> Option<Self>;
    fn checked_mul(self, rhs: Self) -> Option<Self>;
    fn checked_div(self, rhs: Self) -> Option<Self>;
    fn checked_rem(self, rhs: Self) -> Option<Self>;
    fn saturating_add(self, rhs: Self) -> Self;
    fn saturating_sub(self, rhs: Self) -> Self;
    fn saturating_mul(self, rhs: Self) -> Self;
}

macro_rules! impl_iec_int {
    ($($ty:ty),*) => {
        $(
            impl IecInt for $ty {
                const ZERO: Self = 0;
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;

                fn checked_add(self, rhs: Self) -> Option<Self> { <$ty>::checked_add(self, rhs) }
                fn checked_sub(self, rhs: Self) -> Option<Self> { <$ty>::checked_sub(self, rhs) }
                fn checked_mul(self, rhs: Self) -> Option<Self> { <$ty>::checked_mul(self, rhs) }
                fn checked_div(self, rhs: Self) -> Option<Self> { <$ty>::checked_div(self, rhs) }
                fn checked_rem(self, rhs: Self) -> Option<Self> { <$ty>::checked_rem(self, rhs) }
                fn saturating_add(self, rhs: Self) -> Self { <$ty>::saturating_add(self, rhs) }
                fn saturating_sub(self, rhs: Self) -> Self { <$ty>::saturating_sub(self, rhs) }
                fn saturating_mul(self, rhs: Self) -> Self { <$ty>::saturating_mul(self, rhs) }
            }
        )*
    };
}

impl_iec_int!(i8, i16, i32, i64, u8, u16, u32, u64);

fn overflowed<T>(policy: FaultPolicy, op: &'static str, saturated: T) -> Result<T, Fault> {
    match policy {
        FaultPolicy::Trap => Err(Fault::Overflow { op }),
        FaultPolicy::Saturate => Ok(saturated),
    }
}

fn toward_bound<T: IecInt>(sign_of: T) -> T {
    match sign_of.cmp(&T::ZERO) {
        std::cmp::Ordering::Less => T::MIN,
        std::cmp::Ordering::Equal => T::ZERO,
        std::cmp::Ordering::Greater => T::MAX,
    }
}

pub fn add<T: IecInt>(policy: FaultPolicy, a: T, b: T) -> Result<T, Fault> {
    match a.checked_add(b) {
        Some(r) => Ok(r),
        None => overflowed(policy, "ADD", a.saturating_add(b)),
    }
}

pub fn sub<T: IecInt>(policy: FaultPolicy, a: T, b: T) -> Result<T, Fault> {
    match a.checked_sub(b) {
        Some(r) => Ok(r),
        None => overflowed(policy, "SUB", a.saturating_sub(b)),
    }
}

pub fn mul<T: IecInt>(policy: FaultPolicy, a: T, b: T) -> Result<T, Fault> {
    match a.checked_mul(b) {
        Some(r) => Ok(r),
        None => overflowed(policy, "MUL", a.saturating_mul(b)),
    }
}

pub fn div<T: IecInt>(policy: FaultPolicy, a: T, b: T) -> Result<T, Fault> {
    if b == T::ZERO {
        return match policy {
            FaultPolicy::Trap => Err(Fault::DivisionByZero { op: "DIV" }),
            FaultPolicy::Saturate => Ok(toward_bound(a)),
        };
    }
    match a.checked_div(b) {
        Some(r) => Ok(r),
        // Only MIN / -1 overflows.
        None => overflowed(policy, "DIV", T::MAX),
    }
}

/// `MOD`. Saturates to zero on a zero divisor.
pub fn rem<T: IecInt>(policy: FaultPolicy, a: T, b: T) -> Result<T, Fault> {
    if b == T::ZERO {
        return match policy {
            FaultPolicy::Trap => Err(Fault::DivisionByZero { op: "MOD" }),
            FaultPolicy::Saturate => Ok(T::ZERO),
        };
    }
    Ok(a.checked_rem(b).unwrap_or(T::ZERO))
}

/// Integer type conversion (`DINT_TO_INT` and friends).
pub fn convert<S, T>(policy: FaultPolicy, value: S) -> Result<T, Fault>
where
    S: IecInt,
    T: IecInt + TryFrom<S>,
{
    match T::try_from(value) {
        Ok(v) => Ok(v),
        Err(_) => match policy {
            FaultPolicy::Trap => Err(Fault::OutOfRange {
                value: value.to_string(),
                target: T::KIND,
            }),
            FaultPolicy::Saturate => Ok(if value < S::ZERO { T::MIN } else { T::MAX }),
        },
    }
}
