//! Hand-written protobuf types for the durable retain frame.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//!
//! ```proto
//! message RetainFrame {
//!   string pou = 1;
//!   string layout = 2;
//!   uint64 cycle = 3;
//!   repeated RetainedVar vars = 4;
//! }
//! message RetainedVar { string name = 1; TypedValue value = 2; }
//! message TypedValue { oneof kind { ... } }
//! ```

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct ProtoRetainFrame {
    #[prost(string, tag = "1")]
    pub pou: String,
    #[prost(string, tag = "2")]
    pub layout: String,
    /// Cycle count at capture time. Informational.
    #[prost(uint64, tag = "3")]
    pub cycle: u64,
    #[prost(message, repeated, tag = "4")]
    pub vars: Vec<ProtoRetainedVar>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoRetainedVar {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ProtoTypedValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoTypedValue {
    #[prost(oneof = "TypedValueKind", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11")]
    pub kind: Option<TypedValueKind>,
}

/// Narrow integer types travel widened; the bridge range-checks them back.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum TypedValueKind {
    #[prost(bool, tag = "1")]
    Bool(bool),
    #[prost(sint32, tag = "2")]
    Sint(i32),
    #[prost(sint32, tag = "3")]
    Int(i32),
    #[prost(sint32, tag = "4")]
    Dint(i32),
    #[prost(sint64, tag = "5")]
    Lint(i64),
    #[prost(uint32, tag = "6")]
    Usint(u32),
    #[prost(uint32, tag = "7")]
    Uint(u32),
    #[prost(uint32, tag = "8")]
    Udint(u32),
    #[prost(uint64, tag = "9")]
    Ulint(u64),
    #[prost(float, tag = "10")]
    Real(f32),
    #[prost(double, tag = "11")]
    Lreal(f64),
}
