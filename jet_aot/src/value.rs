use std::fmt;

use crate::tree::language_types::{InitExpression, ValueType};

/// A typed scalar: a constant operand in jet code, or a slot on the VM stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match *self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// The zero every local and global of `value_type` starts out as.
    pub fn zero(value_type: ValueType) -> Value {
        match value_type {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }

    /// Parses `text` as a value of `value_type`.
    pub fn parse(value_type: ValueType, text: &str) -> Option<Value> {
        match value_type {
            ValueType::I32 => text.parse().ok().map(Value::I32),
            ValueType::I64 => text.parse().ok().map(Value::I64),
            ValueType::F32 => text.parse().ok().map(Value::F32),
            ValueType::F64 => text.parse().ok().map(Value::F64),
        }
    }

    /// Bit-exact comparison, so NaN payloads and signed zeros are told apart.
    pub fn same_bits(&self, other: &Value) -> bool {
        match (*self, *other) {
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Value {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Value {
        Value::I64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Value {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::F64(value)
    }
}

impl InitExpression {
    /// The literal of a constant expression; `None` for `get_global`.
    pub fn constant(&self) -> Option<Value> {
        match *self {
            InitExpression::I32Const(value) => Some(Value::I32(value)),
            InitExpression::I64Const(value) => Some(Value::I64(value)),
            InitExpression::F32Const(value) => Some(Value::F32(value)),
            InitExpression::F64Const(value) => Some(Value::F64(value)),
            InitExpression::GetGlobal(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::I32(value) => write!(f, "{}", value),
            Value::I64(value) => write!(f, "{}", value),
            Value::F32(value) => write!(f, "{:?}", value),
            Value::F64(value) => write!(f, "{:?}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments_by_type() {
        assert_eq!(Value::parse(ValueType::I32, "-7"), Some(Value::I32(-7)));
        assert_eq!(Value::parse(ValueType::F64, "2.5"), Some(Value::F64(2.5)));
        assert_eq!(Value::parse(ValueType::I64, "x"), None);
    }

    #[test]
    fn bitwise_equality_distinguishes_zeros() {
        assert!(!Value::F32(0.0).same_bits(&Value::F32(-0.0)));
        assert!(Value::F64(f64::NAN).same_bits(&Value::F64(f64::NAN)));
        assert!(Value::I32(3).same_bits(&Value::I32(3)));
    }

    #[test]
    fn display() {
        assert_eq!(Value::I64(-1).to_string(), "-1");
        assert_eq!(Value::F32(1.0).to_string(), "1.0");
    }
}
