//! Numeric semantics of jet operations.

use crate::emit::target::{ArithOp, CompareOp, ConvertOp, Intrinsic};
use crate::runtime::Trap;
use crate::tree::language_types::ValueType;
use crate::value::Value;

fn mismatch(value: Value) -> Trap {
    Trap::TypeMismatch {
        expected: value.value_type(),
    }
}

macro_rules! int_arith {
    ($op:expr, $a:expr, $b:expr, $unsigned:ty, $signed:ty) => {{
        let (a, b) = ($a, $b);
        match $op {
            ArithOp::Add => Ok(a.wrapping_add(b)),
            ArithOp::Sub => Ok(a.wrapping_sub(b)),
            ArithOp::Mul => Ok(a.wrapping_mul(b)),
            ArithOp::Div | ArithOp::DivUn | ArithOp::Rem | ArithOp::RemUn if b == 0 => {
                Err(Trap::IntegerDivideByZero)
            }
            ArithOp::Div => a.checked_div(b).ok_or(Trap::IntegerOverflow),
            ArithOp::DivUn => Ok(((a as $unsigned) / (b as $unsigned)) as $signed),
            ArithOp::Rem => Ok(a.wrapping_rem(b)),
            ArithOp::RemUn => Ok(((a as $unsigned) % (b as $unsigned)) as $signed),
            ArithOp::And => Ok(a & b),
            ArithOp::Or => Ok(a | b),
            ArithOp::Xor => Ok(a ^ b),
            // shift counts are always i32
            ArithOp::Shl | ArithOp::Shr | ArithOp::ShrUn | ArithOp::Neg => Err(Trap::TypeMismatch {
                expected: ValueType::I32,
            }),
        }
    }};
}

macro_rules! shift {
    ($op:expr, $a:expr, $count:expr, $unsigned:ty, $signed:ty) => {{
        let count = $count as u32;
        match $op {
            ArithOp::Shl => $a.wrapping_shl(count),
            ArithOp::Shr => $a.wrapping_shr(count),
            _ => ($a as $unsigned).wrapping_shr(count) as $signed,
        }
    }};
}

macro_rules! float_arith {
    ($op:expr, $a:expr, $b:expr) => {
        match $op {
            ArithOp::Add => Some($a + $b),
            ArithOp::Sub => Some($a - $b),
            ArithOp::Mul => Some($a * $b),
            ArithOp::Div => Some($a / $b),
            _ => None,
        }
    };
}

pub fn arith(op: ArithOp, a: Value, b: Value) -> Result<Value, Trap> {
    let is_shift = matches!(op, ArithOp::Shl | ArithOp::Shr | ArithOp::ShrUn);
    match (a, b) {
        (Value::I32(a), Value::I32(b)) if is_shift => Ok(Value::I32(shift!(op, a, b, u32, i32))),
        (Value::I64(a), Value::I32(b)) if is_shift => Ok(Value::I64(shift!(op, a, b, u64, i64))),
        (Value::I32(a), Value::I32(b)) => int_arith!(op, a, b, u32, i32).map(Value::I32),
        (Value::I64(a), Value::I64(b)) => int_arith!(op, a, b, u64, i64).map(Value::I64),
        (Value::F32(x), Value::F32(y)) => float_arith!(op, x, y).map(Value::F32).ok_or_else(|| mismatch(a)),
        (Value::F64(x), Value::F64(y)) => float_arith!(op, x, y).map(Value::F64).ok_or_else(|| mismatch(a)),
        _ => Err(mismatch(a)),
    }
}

pub fn negate(value: Value) -> Value {
    match value {
        Value::I32(v) => Value::I32(v.wrapping_neg()),
        Value::I64(v) => Value::I64(v.wrapping_neg()),
        Value::F32(v) => Value::F32(-v),
        Value::F64(v) => Value::F64(-v),
    }
}

pub fn compare(op: CompareOp, a: Value, b: Value) -> Result<Value, Trap> {
    macro_rules! ints {
        ($a:expr, $b:expr, $unsigned:ty) => {
            match op {
                CompareOp::Ceq => $a == $b,
                CompareOp::Cgt => $a > $b,
                CompareOp::CgtUn => ($a as $unsigned) > ($b as $unsigned),
                CompareOp::Clt => $a < $b,
                CompareOp::CltUn => ($a as $unsigned) < ($b as $unsigned),
            }
        };
    }
    // the `.un` forms are also true when either operand is NaN
    macro_rules! floats {
        ($a:expr, $b:expr) => {
            match op {
                CompareOp::Ceq => $a == $b,
                CompareOp::Cgt => $a > $b,
                CompareOp::CgtUn => !($a <= $b),
                CompareOp::Clt => $a < $b,
                CompareOp::CltUn => !($a >= $b),
            }
        };
    }
    let result = match (a, b) {
        (Value::I32(x), Value::I32(y)) => ints!(x, y, u32),
        (Value::I64(x), Value::I64(y)) => ints!(x, y, u64),
        (Value::F32(x), Value::F32(y)) => floats!(x, y),
        (Value::F64(x), Value::F64(y)) => floats!(x, y),
        _ => return Err(mismatch(a)),
    };
    Ok(Value::I32(result as i32))
}

/// Truncates toward zero, trapping on NaN and on results outside
/// `[min, max)`.
fn truncate(value: f64, min: f64, max: f64) -> Result<f64, Trap> {
    if value.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    let truncated = value.trunc();
    if truncated >= min && truncated < max {
        Ok(truncated)
    } else {
        Err(Trap::IntegerOverflow)
    }
}

const TWO_31: f64 = 2147483648.0;
const TWO_32: f64 = 4294967296.0;
const TWO_63: f64 = 9223372036854775808.0;
const TWO_64: f64 = 18446744073709551616.0;

pub fn convert(op: ConvertOp, value: Value) -> Result<Value, Trap> {
    let float = match value {
        Value::F32(v) => Some(f64::from(v)),
        Value::F64(v) => Some(v),
        _ => None,
    };
    let converted = match (op, value, float) {
        (ConvertOp::ConvI4, Value::I64(v), _) => Value::I32(v as i32),
        (ConvertOp::ConvI4, Value::I32(v), _) => Value::I32(v),
        (ConvertOp::ConvI8, Value::I32(v), _) => Value::I64(i64::from(v)),
        (ConvertOp::ConvU8, Value::I32(v), _) => Value::I64(i64::from(v as u32)),
        (ConvertOp::ConvR4, Value::I32(v), _) => Value::F32(v as f32),
        (ConvertOp::ConvR4, Value::I64(v), _) => Value::F32(v as f32),
        (ConvertOp::ConvR4, Value::F64(v), _) => Value::F32(v as f32),
        (ConvertOp::ConvR8, Value::I32(v), _) => Value::F64(f64::from(v)),
        (ConvertOp::ConvR8, Value::I64(v), _) => Value::F64(v as f64),
        (ConvertOp::ConvR8, Value::F32(v), _) => Value::F64(f64::from(v)),
        (ConvertOp::ConvR4Un, Value::I32(v), _) => Value::F32(v as u32 as f32),
        (ConvertOp::ConvR4Un, Value::I64(v), _) => Value::F32(v as u64 as f32),
        (ConvertOp::ConvR8Un, Value::I32(v), _) => Value::F64(f64::from(v as u32)),
        (ConvertOp::ConvR8Un, Value::I64(v), _) => Value::F64(v as u64 as f64),
        (ConvertOp::ConvOvfI4, _, Some(v)) => Value::I32(truncate(v, -TWO_31, TWO_31)? as i32),
        (ConvertOp::ConvOvfU4, _, Some(v)) => Value::I32(truncate(v, 0.0, TWO_32)? as u32 as i32),
        (ConvertOp::ConvOvfI8, _, Some(v)) => Value::I64(truncate(v, -TWO_63, TWO_63)? as i64),
        (ConvertOp::ConvOvfU8, _, Some(v)) => Value::I64(truncate(v, 0.0, TWO_64)? as u64 as i64),
        _ => return Err(mismatch(value)),
    };
    Ok(converted)
}

macro_rules! float_ops {
    ($min:ident, $max:ident, $float:ty) => {
        fn $min(a: $float, b: $float) -> $float {
            if a.is_nan() || b.is_nan() {
                <$float>::NAN
            } else if a == b {
                // -0 and +0 compare equal
                if a.is_sign_negative() { a } else { b }
            } else {
                a.min(b)
            }
        }

        fn $max(a: $float, b: $float) -> $float {
            if a.is_nan() || b.is_nan() {
                <$float>::NAN
            } else if a == b {
                if a.is_sign_positive() { a } else { b }
            } else {
                a.max(b)
            }
        }
    };
}

float_ops!(min_f32, max_f32, f32);
float_ops!(min_f64, max_f64, f64);

/// Intrinsics taking one operand.
pub fn unary(intrinsic: Intrinsic, value: Value) -> Result<Value, Trap> {
    let result = match (intrinsic, value) {
        (Intrinsic::Clz, Value::I32(v)) => Value::I32(v.leading_zeros() as i32),
        (Intrinsic::Clz, Value::I64(v)) => Value::I64(i64::from(v.leading_zeros())),
        (Intrinsic::Ctz, Value::I32(v)) => Value::I32(v.trailing_zeros() as i32),
        (Intrinsic::Ctz, Value::I64(v)) => Value::I64(i64::from(v.trailing_zeros())),
        (Intrinsic::Popcnt, Value::I32(v)) => Value::I32(v.count_ones() as i32),
        (Intrinsic::Popcnt, Value::I64(v)) => Value::I64(i64::from(v.count_ones())),
        (Intrinsic::Abs, Value::F32(v)) => Value::F32(v.abs()),
        (Intrinsic::Abs, Value::F64(v)) => Value::F64(v.abs()),
        (Intrinsic::Ceil, Value::F32(v)) => Value::F32(v.ceil()),
        (Intrinsic::Ceil, Value::F64(v)) => Value::F64(v.ceil()),
        (Intrinsic::Floor, Value::F32(v)) => Value::F32(v.floor()),
        (Intrinsic::Floor, Value::F64(v)) => Value::F64(v.floor()),
        (Intrinsic::Trunc, Value::F32(v)) => Value::F32(v.trunc()),
        (Intrinsic::Trunc, Value::F64(v)) => Value::F64(v.trunc()),
        (Intrinsic::Nearest, Value::F32(v)) => Value::F32(v.round_ties_even()),
        (Intrinsic::Nearest, Value::F64(v)) => Value::F64(v.round_ties_even()),
        (Intrinsic::Sqrt, Value::F32(v)) => Value::F32(v.sqrt()),
        (Intrinsic::Sqrt, Value::F64(v)) => Value::F64(v.sqrt()),
        (Intrinsic::Reinterpret, Value::I32(v)) => Value::F32(f32::from_bits(v as u32)),
        (Intrinsic::Reinterpret, Value::I64(v)) => Value::F64(f64::from_bits(v as u64)),
        (Intrinsic::Reinterpret, Value::F32(v)) => Value::I32(v.to_bits() as i32),
        (Intrinsic::Reinterpret, Value::F64(v)) => Value::I64(v.to_bits() as i64),
        _ => return Err(mismatch(value)),
    };
    Ok(result)
}

/// Intrinsics taking two operands.
pub fn binary(intrinsic: Intrinsic, a: Value, b: Value) -> Result<Value, Trap> {
    let result = match (intrinsic, a, b) {
        (Intrinsic::Rotl, Value::I32(x), Value::I32(y)) => Value::I32(x.rotate_left(y as u32 & 31)),
        (Intrinsic::Rotr, Value::I32(x), Value::I32(y)) => Value::I32(x.rotate_right(y as u32 & 31)),
        (Intrinsic::Rotl, Value::I64(x), Value::I64(y)) => Value::I64(x.rotate_left(y as u32 & 63)),
        (Intrinsic::Rotr, Value::I64(x), Value::I64(y)) => Value::I64(x.rotate_right(y as u32 & 63)),
        (Intrinsic::Min, Value::F32(x), Value::F32(y)) => Value::F32(min_f32(x, y)),
        (Intrinsic::Min, Value::F64(x), Value::F64(y)) => Value::F64(min_f64(x, y)),
        (Intrinsic::Max, Value::F32(x), Value::F32(y)) => Value::F32(max_f32(x, y)),
        (Intrinsic::Max, Value::F64(x), Value::F64(y)) => Value::F64(max_f64(x, y)),
        (Intrinsic::Copysign, Value::F32(x), Value::F32(y)) => Value::F32(x.copysign(y)),
        (Intrinsic::Copysign, Value::F64(x), Value::F64(y)) => Value::F64(x.copysign(y)),
        _ => return Err(mismatch(a)),
    };
    Ok(result)
}

pub fn is_binary(intrinsic: Intrinsic) -> bool {
    matches!(
        intrinsic,
        Intrinsic::Rotl | Intrinsic::Rotr | Intrinsic::Min | Intrinsic::Max | Intrinsic::Copysign
    )
}

pub fn expect_i32(value: Value) -> Result<i32, Trap> {
    match value {
        Value::I32(v) => Ok(v),
        _ => Err(Trap::TypeMismatch {
            expected: ValueType::I32,
        }),
    }
}
