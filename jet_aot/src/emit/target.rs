//! Operation vocabulary of the target ISA, shared by every `CodeBuilder`.
//!
//! Comparison and arithmetic operations are untyped in the manner of a
//! managed stack machine: they act on whatever numeric type their operands
//! carry. Operations whose meaning depends on signedness come in `*Un`
//! variants.

use std::fmt;

macro_rules! mnemonics {
    ($name:ident { $($op:ident => $text:literal,)* }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($op,)*
        }

        impl $name {
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $($name::$op => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}

mnemonics!(CompareOp {
    Ceq => "ceq",
    Cgt => "cgt",
    CgtUn => "cgt.un",
    Clt => "clt",
    CltUn => "clt.un",
});

mnemonics!(ArithOp {
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    DivUn => "div.un",
    Rem => "rem",
    RemUn => "rem.un",
    And => "and",
    Or => "or",
    Xor => "xor",
    Shl => "shl",
    Shr => "shr",
    ShrUn => "shr.un",
    Neg => "neg",
});

mnemonics!(ConvertOp {
    ConvI4 => "conv.i4",
    ConvI8 => "conv.i8",
    ConvU8 => "conv.u8",
    ConvR4 => "conv.r4",
    ConvR8 => "conv.r8",
    ConvR4Un => "conv.r4.un",
    ConvR8Un => "conv.r8.un",
    ConvOvfI4 => "conv.ovf.i4",
    ConvOvfU4 => "conv.ovf.u4",
    ConvOvfI8 => "conv.ovf.i8",
    ConvOvfU8 => "conv.ovf.u8",
});

mnemonics!(Intrinsic {
    Clz => "clz",
    Ctz => "ctz",
    Popcnt => "popcnt",
    Rotl => "rotl",
    Rotr => "rotr",
    Abs => "abs",
    Ceil => "ceil",
    Floor => "floor",
    Trunc => "trunc",
    Nearest => "nearest",
    Sqrt => "sqrt",
    Min => "min",
    Max => "max",
    Copysign => "copysign",
    Reinterpret => "reinterpret",
});
