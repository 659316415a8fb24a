use std::fmt;

use crate::emit::target::{ArithOp, CompareOp, ConvertOp, Intrinsic};
use crate::memory::Accessor;
use crate::value::Value;

/// A branch target. Holds a label number while a function is being built
/// and the index of the target op once the function is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target(pub u32);

impl Target {
    pub fn position(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    LdArg(u32),
    StArg(u32),
    LdLoc(u32),
    StLoc(u32),
    LdGlobal(u32),
    StGlobal(u32),
    Ldc(Value),
    Pop,
    Select,
    Compare(CompareOp),
    Arith(ArithOp),
    Convert(ConvertOp),
    Intrinsic(Intrinsic),
    Br(Target),
    BrTrue(Target),
    BrFalse(Target),
    Switch { targets: Vec<Target>, default: Target },
    /// Removes `drop` values from under the top `keep`.
    Unwind { drop: u32, keep: u32 },
    Memory(Accessor, u32),
    CurrentMemory,
    GrowMemory,
    Call(u32),
    CallIndirect(u32),
    Ret,
    Trap,
}

impl Op {
    /// Rewrites every branch target through `patch`.
    pub fn map_targets<E>(&mut self, mut patch: impl FnMut(Target) -> Result<Target, E>) -> Result<(), E> {
        match *self {
            Op::Br(ref mut target) | Op::BrTrue(ref mut target) | Op::BrFalse(ref mut target) => {
                *target = patch(*target)?;
            }
            Op::Switch {
                ref mut targets,
                ref mut default,
            } => {
                for target in targets.iter_mut() {
                    *target = patch(*target)?;
                }
                *default = patch(*default)?;
            }
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Op::LdArg(index) => write!(f, "ldarg {}", index),
            Op::StArg(index) => write!(f, "starg {}", index),
            Op::LdLoc(index) => write!(f, "ldloc {}", index),
            Op::StLoc(index) => write!(f, "stloc {}", index),
            Op::LdGlobal(index) => write!(f, "ldsfld global{}", index),
            Op::StGlobal(index) => write!(f, "stsfld global{}", index),
            Op::Ldc(Value::I32(value)) => write!(f, "ldc.i4 {}", value),
            Op::Ldc(Value::I64(value)) => write!(f, "ldc.i8 {}", value),
            Op::Ldc(Value::F32(value)) => write!(f, "ldc.r4 {:?}", value),
            Op::Ldc(Value::F64(value)) => write!(f, "ldc.r8 {:?}", value),
            Op::Pop => f.write_str("pop"),
            Op::Select => f.write_str("select"),
            Op::Compare(op) => write!(f, "{}", op),
            Op::Arith(op) => write!(f, "{}", op),
            Op::Convert(op) => write!(f, "{}", op),
            Op::Intrinsic(intrinsic) => write!(f, "call {}", intrinsic),
            Op::Br(target) => write!(f, "br {}", target),
            Op::BrTrue(target) => write!(f, "brtrue {}", target),
            Op::BrFalse(target) => write!(f, "brfalse {}", target),
            Op::Switch { ref targets, default } => {
                f.write_str("switch (")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", target)?;
                }
                write!(f, ") {}", default)
            }
            Op::Unwind { drop, keep } => write!(f, "unwind {} keep {}", drop, keep),
            Op::Memory(accessor, 0) => write!(f, "call {}", accessor),
            Op::Memory(accessor, offset) => write!(f, "call {} offset={}", accessor, offset),
            Op::CurrentMemory => f.write_str("call CurrentMemory"),
            Op::GrowMemory => f.write_str("call GrowMemory"),
            Op::Call(index) => write!(f, "call func{}", index),
            Op::CallIndirect(type_index) => write!(f, "calli type{}", type_index),
            Op::Ret => f.write_str("ret"),
            Op::Trap => f.write_str("throw unreachable"),
        }
    }
}
