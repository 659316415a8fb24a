//! Lowering of numeric opcodes to target operation sequences.

use crate::emit::target::{ArithOp, CompareOp, ConvertOp, Intrinsic};
use crate::tree::instructions::NumericOp;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Const(Value),
    Compare(CompareOp),
    Arith(ArithOp),
    Convert(ConvertOp),
    Intrinsic(Intrinsic),
}

use self::Step::{Arith, Compare, Const, Convert};

const FALSE: Step = Const(Value::I32(0));
const MASK_32: Step = Const(Value::I32(31));
const MASK_64: Step = Const(Value::I64(63));

fn intrinsic(intrinsic: Intrinsic) -> Vec<Step> {
    vec![Step::Intrinsic(intrinsic)]
}

/// A comparison followed by logical negation of its i32 result.
fn not(op: CompareOp) -> Vec<Step> {
    vec![Compare(op), FALSE, Compare(CompareOp::Ceq)]
}

/// Shift counts are taken modulo the operand width; the target expects an
/// i32 count.
fn shift_32(op: ArithOp) -> Vec<Step> {
    vec![MASK_32, Arith(ArithOp::And), Arith(op)]
}

fn shift_64(op: ArithOp) -> Vec<Step> {
    vec![MASK_64, Arith(ArithOp::And), Convert(ConvertOp::ConvI4), Arith(op)]
}

pub fn lower(op: NumericOp) -> Vec<Step> {
    use crate::tree::instructions::NumericOp::*;
    match op {
        I32Eqz => vec![FALSE, Compare(CompareOp::Ceq)],
        I64Eqz => vec![Const(Value::I64(0)), Compare(CompareOp::Ceq)],

        I32Eq | I64Eq | F32Eq | F64Eq => vec![Compare(CompareOp::Ceq)],
        I32Ne | I64Ne | F32Ne | F64Ne => not(CompareOp::Ceq),
        I32LtS | I64LtS | F32Lt | F64Lt => vec![Compare(CompareOp::Clt)],
        I32LtU | I64LtU => vec![Compare(CompareOp::CltUn)],
        I32GtS | I64GtS | F32Gt | F64Gt => vec![Compare(CompareOp::Cgt)],
        I32GtU | I64GtU => vec![Compare(CompareOp::CgtUn)],
        I32LeS | I64LeS => not(CompareOp::Cgt),
        // unordered operands make `cgt.un` true, so its negation is false
        I32LeU | I64LeU | F32Le | F64Le => not(CompareOp::CgtUn),
        I32GeS | I64GeS => not(CompareOp::Clt),
        I32GeU | I64GeU | F32Ge | F64Ge => not(CompareOp::CltUn),

        I32Clz | I64Clz => intrinsic(Intrinsic::Clz),
        I32Ctz | I64Ctz => intrinsic(Intrinsic::Ctz),
        I32Popcnt | I64Popcnt => intrinsic(Intrinsic::Popcnt),
        I32Rotl | I64Rotl => intrinsic(Intrinsic::Rotl),
        I32Rotr | I64Rotr => intrinsic(Intrinsic::Rotr),

        I32Add | I64Add | F32Add | F64Add => vec![Arith(ArithOp::Add)],
        I32Sub | I64Sub | F32Sub | F64Sub => vec![Arith(ArithOp::Sub)],
        I32Mul | I64Mul | F32Mul | F64Mul => vec![Arith(ArithOp::Mul)],
        I32DivS | I64DivS | F32Div | F64Div => vec![Arith(ArithOp::Div)],
        I32DivU | I64DivU => vec![Arith(ArithOp::DivUn)],
        I32RemS | I64RemS => vec![Arith(ArithOp::Rem)],
        I32RemU | I64RemU => vec![Arith(ArithOp::RemUn)],
        I32And | I64And => vec![Arith(ArithOp::And)],
        I32Or | I64Or => vec![Arith(ArithOp::Or)],
        I32Xor | I64Xor => vec![Arith(ArithOp::Xor)],
        I32Shl => shift_32(ArithOp::Shl),
        I32ShrS => shift_32(ArithOp::Shr),
        I32ShrU => shift_32(ArithOp::ShrUn),
        I64Shl => shift_64(ArithOp::Shl),
        I64ShrS => shift_64(ArithOp::Shr),
        I64ShrU => shift_64(ArithOp::ShrUn),

        F32Abs | F64Abs => intrinsic(Intrinsic::Abs),
        F32Neg | F64Neg => vec![Arith(ArithOp::Neg)],
        F32Ceil | F64Ceil => intrinsic(Intrinsic::Ceil),
        F32Floor | F64Floor => intrinsic(Intrinsic::Floor),
        F32Trunc | F64Trunc => intrinsic(Intrinsic::Trunc),
        F32Nearest | F64Nearest => intrinsic(Intrinsic::Nearest),
        F32Sqrt | F64Sqrt => intrinsic(Intrinsic::Sqrt),
        F32Min | F64Min => intrinsic(Intrinsic::Min),
        F32Max | F64Max => intrinsic(Intrinsic::Max),
        F32Copysign | F64Copysign => intrinsic(Intrinsic::Copysign),

        I32WrapI64 => vec![Convert(ConvertOp::ConvI4)],
        I32TruncSF32 | I32TruncSF64 => vec![Convert(ConvertOp::ConvOvfI4)],
        I32TruncUF32 | I32TruncUF64 => vec![Convert(ConvertOp::ConvOvfU4)],
        I64ExtendSI32 => vec![Convert(ConvertOp::ConvI8)],
        I64ExtendUI32 => vec![Convert(ConvertOp::ConvU8)],
        I64TruncSF32 | I64TruncSF64 => vec![Convert(ConvertOp::ConvOvfI8)],
        I64TruncUF32 | I64TruncUF64 => vec![Convert(ConvertOp::ConvOvfU8)],
        F32ConvertSI32 | F32ConvertSI64 | F32DemoteF64 => vec![Convert(ConvertOp::ConvR4)],
        F32ConvertUI32 | F32ConvertUI64 => vec![Convert(ConvertOp::ConvR4Un)],
        F64ConvertSI32 | F64ConvertSI64 | F64PromoteF32 => vec![Convert(ConvertOp::ConvR8)],
        F64ConvertUI32 | F64ConvertUI64 => vec![Convert(ConvertOp::ConvR8Un)],
        I32ReinterpretF32 | I64ReinterpretF64 | F32ReinterpretI32 | F64ReinterpretI64 => {
            intrinsic(Intrinsic::Reinterpret)
        }
    }
}

/// How many operands `op` pops. Every numeric op pushes one result.
pub fn operand_count(op: NumericOp) -> u32 {
    match op.opcode() {
        0x45 | 0x50 | 0x67..=0x69 | 0x79..=0x7b | 0x8b..=0x91 | 0x99..=0x9f | 0xa7..=0xbf => 1,
        _ => 2,
    }
}
