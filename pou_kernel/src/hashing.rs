//! Canonical hashing of layouts and instance states.
//!
//! Both hashes are SHA-256 over compact UTF-8 JSON built with an explicit
//! field order, lowercase hex.
//!
//! Layout fingerprint fields: abi_version, pou, kind, vars[name, type, class, located, retain].
//! State hash fields: abi_version, pou, layout, values[name, value].
//! Non-finite REAL/LREAL values hash as the strings "inf", "-inf" and "nan".

use serde_json::{Map, Value as Json};
use sha2::{Digest, Sha256};

use crate::pou::PouLayout;
use crate::vars::VarDecl;
use crate::ABI_VERSION;

pub fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn to_bytes(value: &Json) -> Vec<u8> {
    // A `Json` tree always serializes.
    serde_json::to_vec(value).unwrap_or_default()
}

fn decl_value(decl: &VarDecl) -> Json {
    let mut m = Map::new();
    m.insert("name".to_string(), Json::String(decl.name.to_ascii_uppercase()));
    m.insert("type".to_string(), Json::String(decl.kind.iec_name().to_string()));
    m.insert("class".to_string(), Json::String(decl.class.keyword().to_string()));
    m.insert("located".to_string(), Json::Bool(decl.class == crate::vars::VarClass::Located));
    m.insert("retain".to_string(), Json::Bool(decl.retain));
    Json::Object(m)
}

/// Canonical JSON describing the record layout of `P`.
pub fn canonical_layout<P: PouLayout>() -> Vec<u8> {
    let mut root = Map::new();
    root.insert("abi_version".to_string(), Json::Number(ABI_VERSION.into()));
    root.insert("pou".to_string(), Json::String(P::NAME.to_string()));
    root.insert(
        "kind".to_string(),
        serde_json::to_value(P::KIND).unwrap_or(Json::Null),
    );
    root.insert(
        "vars".to_string(),
        Json::Array(P::DECLARATIONS.iter().map(decl_value).collect()),
    );
    to_bytes(&Json::Object(root))
}

/// Identifies a record layout. Changes whenever a variable is added,
/// removed, reordered, retyped or reclassified.
pub fn layout_fingerprint<P: PouLayout>() -> String {
    hex_digest(&canonical_layout::<P>())
}

/// Canonical JSON of every variable value, in record order.
pub fn canonical_state<P: PouLayout>(instance: &P) -> Vec<u8> {
    let values: Vec<Json> = P::DECLARATIONS
        .iter()
        .map(|d| {
            let mut m = Map::new();
            m.insert("name".to_string(), Json::String(d.name.to_ascii_uppercase()));
            m.insert(
                "value".to_string(),
                instance
                    .read(d.name)
                    .and_then(|v| serde_json::to_value(v).ok())
                    .unwrap_or(Json::Null),
            );
            Json::Object(m)
        })
        .collect();

    let mut root = Map::new();
    root.insert("abi_version".to_string(), Json::Number(ABI_VERSION.into()));
    root.insert("pou".to_string(), Json::String(P::NAME.to_string()));
    root.insert("layout".to_string(), Json::String(layout_fingerprint::<P>()));
    root.insert("values".to_string(), Json::Array(values));
    to_bytes(&Json::Object(root))
}

pub fn state_hash<P: PouLayout>(instance: &P) -> String {
    hex_digest(&canonical_state(instance))
}
