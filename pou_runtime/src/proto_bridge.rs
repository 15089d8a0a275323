//! Conversion between kernel retain images and protobuf frames.

use pou_kernel::retain::{RetainImage, RetainedVar};
use pou_kernel::Value;

use crate::error::StoreError;
use crate::proto_types::{ProtoRetainFrame, ProtoRetainedVar, ProtoTypedValue, TypedValueKind};

pub fn value_to_proto(value: Value) -> ProtoTypedValue {
    let kind = match value {
        Value::Bool(v) => TypedValueKind::Bool(v),
        Value::Sint(v) => TypedValueKind::Sint(v.into()),
        Value::Int(v) => TypedValueKind::Int(v.into()),
        Value::Dint(v) => TypedValueKind::Dint(v),
        Value::Lint(v) => TypedValueKind::Lint(v),
        Value::Usint(v) => TypedValueKind::Usint(v.into()),
        Value::Uint(v) => TypedValueKind::Uint(v.into()),
        Value::Udint(v) => TypedValueKind::Udint(v),
        Value::Ulint(v) => TypedValueKind::Ulint(v),
        Value::Real(v) => TypedValueKind::Real(v),
        Value::Lreal(v) => TypedValueKind::Lreal(v),
    };
    ProtoTypedValue { kind: Some(kind) }
}

fn narrow<S, T>(name: &str, v: S) -> Result<T, StoreError>
where
    S: Copy + std::fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(v).map_err(|_| StoreError::Decode(format!("{}: value {} out of range", name, v)))
}

pub fn proto_to_value(name: &str, proto: &ProtoTypedValue) -> Result<Value, StoreError> {
    let kind = proto
        .kind
        .as_ref()
        .ok_or_else(|| StoreError::Decode(format!("{}: missing value", name)))?;

    Ok(match *kind {
        TypedValueKind::Bool(v) => Value::Bool(v),
        TypedValueKind::Sint(v) => Value::Sint(narrow(name, v)?),
        TypedValueKind::Int(v) => Value::Int(narrow(name, v)?),
        TypedValueKind::Dint(v) => Value::Dint(v),
        TypedValueKind::Lint(v) => Value::Lint(v),
        TypedValueKind::Usint(v) => Value::Usint(narrow(name, v)?),
        TypedValueKind::Uint(v) => Value::Uint(narrow(name, v)?),
        TypedValueKind::Udint(v) => Value::Udint(v),
        TypedValueKind::Ulint(v) => Value::Ulint(v),
        TypedValueKind::Real(v) => Value::Real(v),
        TypedValueKind::Lreal(v) => Value::Lreal(v),
    })
}

pub fn image_to_proto(image: &RetainImage, cycle: u64) -> ProtoRetainFrame {
    ProtoRetainFrame {
        pou: image.pou.clone(),
        layout: image.layout.clone(),
        cycle,
        vars: image
            .vars
            .iter()
            .map(|v| ProtoRetainedVar {
                name: v.name.clone(),
                value: Some(value_to_proto(v.value)),
            })
            .collect(),
    }
}

pub fn proto_to_image(frame: &ProtoRetainFrame) -> Result<RetainImage, StoreError> {
    let vars = frame
        .vars
        .iter()
        .map(|pv| {
            let value = pv
                .value
                .as_ref()
                .ok_or_else(|| StoreError::Decode(format!("{}: missing value", pv.name)))?;
            Ok(RetainedVar {
                name: pv.name.clone(),
                value: proto_to_value(&pv.name, value)?,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(RetainImage {
        pou: frame.pou.clone(),
        layout: frame.layout.clone(),
        vars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_types_are_range_checked() {
        let wide = ProtoTypedValue { kind: Some(TypedValueKind::Sint(300)) };
        assert!(matches!(proto_to_value("speed", &wide), Err(StoreError::Decode(_))));

        let ok = ProtoTypedValue { kind: Some(TypedValueKind::Uint(65_535)) };
        assert_eq!(proto_to_value("speed", &ok).unwrap(), Value::Uint(u16::MAX));
    }

    #[test]
    fn missing_value_is_a_decode_error() {
        let frame = ProtoRetainFrame {
            pou: "MAIN".to_string(),
            layout: "ab".to_string(),
            cycle: 0,
            vars: vec![ProtoRetainedVar { name: "x".to_string(), value: None }],
        };
        let err = proto_to_image(&frame).unwrap_err();
        assert!(err.to_string().contains("x: missing value"));
    }
}
