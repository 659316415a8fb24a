//! Decoded instructions, grouped into the five opcode families.
//!
//! A function body keeps its instructions in a flat arena. Structured control
//! flow is expressed through `InstrId` links into that arena: block openers
//! point forward to their `else`/`end`, and every `end`, `else` and branch
//! points back at the opener it closes or targets.

use std::fmt;
use std::ops::Index;

use crate::tree::language_types::{BlockType, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

impl InstrId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sequential identifier handed to every label-carrying instruction of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    pub label: LabelId,
    /// The matching `end`. Filled in once the block has been decoded.
    pub end: Option<InstrId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    /// Relative label index as encoded, 0 being the innermost open block.
    pub depth: u32,
    /// The block-opening instruction the branch resolves to.
    pub dest: InstrId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Unreachable,
    Nop,
    Block(Block),
    Loop(Block),
    If { block: Block, else_arm: Option<InstrId> },
    Else { label: LabelId, dest: InstrId },
    /// `dest` is `None` only for the end that terminates the function body.
    End { dest: Option<InstrId> },
    Br(Branch),
    BrIf(Branch),
    BrTable { targets: Vec<Branch>, default: Branch },
    Return,
    Call(u32),
    CallIndirect(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parametric {
    Drop,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    GetLocal(u32),
    SetLocal(u32),
    TeeLocal(u32),
    GetGlobal(u32),
    SetGlobal(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryImmediate {
    /// log2 of the alignment hint.
    pub flags: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    Access(MemoryOp, MemoryImmediate),
    CurrentMemory,
    GrowMemory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    Op(NumericOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Control(Control),
    Parametric(Parametric),
    Variable(Variable),
    Memory(Memory),
    Numeric(Numeric),
}

/// Opcode tables: each entry maps a variant to its byte and text name.
macro_rules! opcodes {
    ($name:ident { $($op:ident = $byte:literal, $text:literal;)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($op,)*
        }

        impl $name {
            pub fn from_opcode(opcode: u8) -> Option<$name> {
                match opcode {
                    $($byte => Some($name::$op),)*
                    _ => None,
                }
            }

            pub fn opcode(self) -> u8 {
                match self {
                    $($name::$op => $byte,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$op => $text,)*
                }
            }
        }
    };
}

opcodes!(MemoryOp {
    I32Load = 0x28, "i32.load";
    I64Load = 0x29, "i64.load";
    F32Load = 0x2A, "f32.load";
    F64Load = 0x2B, "f64.load";
    I32Load8S = 0x2C, "i32.load8_s";
    I32Load8U = 0x2D, "i32.load8_u";
    I32Load16S = 0x2E, "i32.load16_s";
    I32Load16U = 0x2F, "i32.load16_u";
    I64Load8S = 0x30, "i64.load8_s";
    I64Load8U = 0x31, "i64.load8_u";
    I64Load16S = 0x32, "i64.load16_s";
    I64Load16U = 0x33, "i64.load16_u";
    I64Load32S = 0x34, "i64.load32_s";
    I64Load32U = 0x35, "i64.load32_u";
    I32Store = 0x36, "i32.store";
    I64Store = 0x37, "i64.store";
    F32Store = 0x38, "f32.store";
    F64Store = 0x39, "f64.store";
    I32Store8 = 0x3A, "i32.store8";
    I32Store16 = 0x3B, "i32.store16";
    I64Store8 = 0x3C, "i64.store8";
    I64Store16 = 0x3D, "i64.store16";
    I64Store32 = 0x3E, "i64.store32";
});

opcodes!(NumericOp {
    I32Eqz = 0x45, "i32.eqz";
    I32Eq = 0x46, "i32.eq";
    I32Ne = 0x47, "i32.ne";
    I32LtS = 0x48, "i32.lt_s";
    I32LtU = 0x49, "i32.lt_u";
    I32GtS = 0x4A, "i32.gt_s";
    I32GtU = 0x4B, "i32.gt_u";
    I32LeS = 0x4C, "i32.le_s";
    I32LeU = 0x4D, "i32.le_u";
    I32GeS = 0x4E, "i32.ge_s";
    I32GeU = 0x4F, "i32.ge_u";
    I64Eqz = 0x50, "i64.eqz";
    I64Eq = 0x51, "i64.eq";
    I64Ne = 0x52, "i64.ne";
    I64LtS = 0x53, "i64.lt_s";
    I64LtU = 0x54, "i64.lt_u";
    I64GtS = 0x55, "i64.gt_s";
    I64GtU = 0x56, "i64.gt_u";
    I64LeS = 0x57, "i64.le_s";
    I64LeU = 0x58, "i64.le_u";
    I64GeS = 0x59, "i64.ge_s";
    I64GeU = 0x5A, "i64.ge_u";
    F32Eq = 0x5B, "f32.eq";
    F32Ne = 0x5C, "f32.ne";
    F32Lt = 0x5D, "f32.lt";
    F32Gt = 0x5E, "f32.gt";
    F32Le = 0x5F, "f32.le";
    F32Ge = 0x60, "f32.ge";
    F64Eq = 0x61, "f64.eq";
    F64Ne = 0x62, "f64.ne";
    F64Lt = 0x63, "f64.lt";
    F64Gt = 0x64, "f64.gt";
    F64Le = 0x65, "f64.le";
    F64Ge = 0x66, "f64.ge";
    I32Clz = 0x67, "i32.clz";
    I32Ctz = 0x68, "i32.ctz";
    I32Popcnt = 0x69, "i32.popcnt";
    I32Add = 0x6A, "i32.add";
    I32Sub = 0x6B, "i32.sub";
    I32Mul = 0x6C, "i32.mul";
    I32DivS = 0x6D, "i32.div_s";
    I32DivU = 0x6E, "i32.div_u";
    I32RemS = 0x6F, "i32.rem_s";
    I32RemU = 0x70, "i32.rem_u";
    I32And = 0x71, "i32.and";
    I32Or = 0x72, "i32.or";
    I32Xor = 0x73, "i32.xor";
    I32Shl = 0x74, "i32.shl";
    I32ShrS = 0x75, "i32.shr_s";
    I32ShrU = 0x76, "i32.shr_u";
    I32Rotl = 0x77, "i32.rotl";
    I32Rotr = 0x78, "i32.rotr";
    I64Clz = 0x79, "i64.clz";
    I64Ctz = 0x7A, "i64.ctz";
    I64Popcnt = 0x7B, "i64.popcnt";
    I64Add = 0x7C, "i64.add";
    I64Sub = 0x7D, "i64.sub";
    I64Mul = 0x7E, "i64.mul";
    I64DivS = 0x7F, "i64.div_s";
    I64DivU = 0x80, "i64.div_u";
    I64RemS = 0x81, "i64.rem_s";
    I64RemU = 0x82, "i64.rem_u";
    I64And = 0x83, "i64.and";
    I64Or = 0x84, "i64.or";
    I64Xor = 0x85, "i64.xor";
    I64Shl = 0x86, "i64.shl";
    I64ShrS = 0x87, "i64.shr_s";
    I64ShrU = 0x88, "i64.shr_u";
    I64Rotl = 0x89, "i64.rotl";
    I64Rotr = 0x8A, "i64.rotr";
    F32Abs = 0x8B, "f32.abs";
    F32Neg = 0x8C, "f32.neg";
    F32Ceil = 0x8D, "f32.ceil";
    F32Floor = 0x8E, "f32.floor";
    F32Trunc = 0x8F, "f32.trunc";
    F32Nearest = 0x90, "f32.nearest";
    F32Sqrt = 0x91, "f32.sqrt";
    F32Add = 0x92, "f32.add";
    F32Sub = 0x93, "f32.sub";
    F32Mul = 0x94, "f32.mul";
    F32Div = 0x95, "f32.div";
    F32Min = 0x96, "f32.min";
    F32Max = 0x97, "f32.max";
    F32Copysign = 0x98, "f32.copysign";
    F64Abs = 0x99, "f64.abs";
    F64Neg = 0x9A, "f64.neg";
    F64Ceil = 0x9B, "f64.ceil";
    F64Floor = 0x9C, "f64.floor";
    F64Trunc = 0x9D, "f64.trunc";
    F64Nearest = 0x9E, "f64.nearest";
    F64Sqrt = 0x9F, "f64.sqrt";
    F64Add = 0xA0, "f64.add";
    F64Sub = 0xA1, "f64.sub";
    F64Mul = 0xA2, "f64.mul";
    F64Div = 0xA3, "f64.div";
    F64Min = 0xA4, "f64.min";
    F64Max = 0xA5, "f64.max";
    F64Copysign = 0xA6, "f64.copysign";
    I32WrapI64 = 0xA7, "i32.wrap/i64";
    I32TruncSF32 = 0xA8, "i32.trunc_s/f32";
    I32TruncUF32 = 0xA9, "i32.trunc_u/f32";
    I32TruncSF64 = 0xAA, "i32.trunc_s/f64";
    I32TruncUF64 = 0xAB, "i32.trunc_u/f64";
    I64ExtendSI32 = 0xAC, "i64.extend_s/i32";
    I64ExtendUI32 = 0xAD, "i64.extend_u/i32";
    I64TruncSF32 = 0xAE, "i64.trunc_s/f32";
    I64TruncUF32 = 0xAF, "i64.trunc_u/f32";
    I64TruncSF64 = 0xB0, "i64.trunc_s/f64";
    I64TruncUF64 = 0xB1, "i64.trunc_u/f64";
    F32ConvertSI32 = 0xB2, "f32.convert_s/i32";
    F32ConvertUI32 = 0xB3, "f32.convert_u/i32";
    F32ConvertSI64 = 0xB4, "f32.convert_s/i64";
    F32ConvertUI64 = 0xB5, "f32.convert_u/i64";
    F32DemoteF64 = 0xB6, "f32.demote/f64";
    F64ConvertSI32 = 0xB7, "f64.convert_s/i32";
    F64ConvertUI32 = 0xB8, "f64.convert_u/i32";
    F64ConvertSI64 = 0xB9, "f64.convert_s/i64";
    F64ConvertUI64 = 0xBA, "f64.convert_u/i64";
    F64PromoteF32 = 0xBB, "f64.promote/f32";
    I32ReinterpretF32 = 0xBC, "i32.reinterpret/f32";
    I64ReinterpretF64 = 0xBD, "i64.reinterpret/f64";
    F32ReinterpretI32 = 0xBE, "f32.reinterpret/i32";
    F64ReinterpretI64 = 0xBF, "f64.reinterpret/i64";
});

/// The decoded, linked body of one function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionBody {
    pub locals: Vec<ValueType>,
    pub instructions: Vec<Instruction>,
    /// Absolute file offset of each instruction's opcode byte.
    pub offsets: Vec<usize>,
    pub label_count: u32,
}

impl FunctionBody {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get(id.index())
    }

    pub fn offset(&self, id: InstrId) -> usize {
        self.offsets.get(id.index()).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstrId, &Instruction)> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, instruction)| (InstrId(i as u32), instruction))
    }
}

impl Index<InstrId> for FunctionBody {
    type Output = Instruction;

    fn index(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.index()]
    }
}
