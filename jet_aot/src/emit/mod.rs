//! The code emission engine: lowers linked function bodies onto any backend
//! implementing `CodeBuilder`.

use log::{debug, info, trace};
use thiserror::Error;

use crate::memory::Accessor;
use crate::tree::instructions::{
    Block, Control, FunctionBody, InstrId, Instruction, LabelId, Memory, Numeric, Parametric, Variable,
};
use crate::tree::language_types::{BlockType, FunctionType, ValueType};
use crate::tree::Module;
use crate::value::Value;

pub mod numeric;
pub mod target;

use self::numeric::{lower, operand_count, Step};
use self::target::{ArithOp, CompareOp, ConvertOp, Intrinsic};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    #[error("function section declares {declared} functions but the code section has {bodies} bodies")]
    FunctionCountMismatch { declared: usize, bodies: usize },
    #[error("type index {index} is out of range")]
    TypeIndexOutOfRange { index: u32 },
    #[error("function {function}: call to undefined function {index}")]
    FunctionIndexOutOfRange { function: u32, index: u32 },
    #[error("function {function}: local {index} is out of range ({count} params and locals)")]
    LocalIndexOutOfRange { function: u32, index: u32, count: usize },
    #[error("function {function}: global {index} is out of range")]
    GlobalIndexOutOfRange { function: u32, index: u32 },
    #[error("function {function}: instruction {instruction} at offset {offset} was never linked")]
    UnlinkedInstruction { function: u32, instruction: InstrId, offset: usize },
    #[error("function {function}: label {label} used but never marked")]
    UnmarkedLabel { function: u32, label: u32 },
    #[error("function {function}: set_global on immutable global {index}")]
    ImmutableGlobal { function: u32, index: u32 },
}

/// The abstract target-code builder. Emission only ever sequences calls on
/// it; everything about the produced code belongs to the implementation.
pub trait CodeBuilder {
    type Label: Copy;

    /// Called once, before any function, with the whole decoded module.
    fn declare_module(&mut self, module: &Module);

    fn begin_function(&mut self, index: u32, signature: &FunctionType);
    fn declare_local(&mut self, value_type: ValueType);
    fn end_function(&mut self) -> Result<(), EmitError>;

    fn define_label(&mut self) -> Self::Label;
    fn mark_label(&mut self, label: Self::Label);
    fn jump(&mut self, label: Self::Label);
    /// Jumps when the popped i32 is non-zero.
    fn jump_if(&mut self, label: Self::Label);
    /// Jumps when the popped i32 is zero.
    fn jump_unless(&mut self, label: Self::Label);
    /// Pops an i32 and jumps to `targets[i]`, or to `default` when out of range.
    fn jump_table(&mut self, targets: &[Self::Label], default: Self::Label);
    /// Discards `drop` values lying beneath the top `keep` values.
    fn unwind(&mut self, drop: u32, keep: u32);

    fn load_arg(&mut self, index: u32);
    fn store_arg(&mut self, index: u32);
    fn load_local(&mut self, index: u32);
    fn store_local(&mut self, index: u32);
    fn load_global(&mut self, index: u32);
    fn store_global(&mut self, index: u32);

    fn drop_value(&mut self);
    fn select(&mut self);

    fn constant(&mut self, value: Value);
    fn compare(&mut self, op: CompareOp);
    fn arith(&mut self, op: ArithOp);
    fn convert(&mut self, op: ConvertOp);
    fn intrinsic(&mut self, intrinsic: Intrinsic);

    /// Pops the address (and for stores the value), adds `offset`, and calls
    /// the accessor.
    fn memory_access(&mut self, accessor: Accessor, offset: u32);
    fn current_memory(&mut self);
    fn grow_memory(&mut self);

    fn call(&mut self, index: u32, signature: &FunctionType);
    fn call_indirect(&mut self, type_index: u32, signature: &FunctionType);
    fn trap(&mut self);
    fn ret(&mut self);
}

/// Emits every function of `module` into `builder`.
pub fn emit_module<B: CodeBuilder>(module: &Module, builder: &mut B) -> Result<(), EmitError> {
    if module.functions.len() != module.bodies.len() {
        return Err(EmitError::FunctionCountMismatch {
            declared: module.functions.len(),
            bodies: module.bodies.len(),
        });
    }
    info!("Emitting {} functions", module.bodies.len());
    builder.declare_module(module);
    let imported = module.imported_function_count() as u32;
    for (position, (&type_index, body)) in module.functions.iter().zip(&module.bodies).enumerate() {
        let signature = module
            .types
            .get(type_index as usize)
            .ok_or(EmitError::TypeIndexOutOfRange { index: type_index })?;
        let index = imported + position as u32;
        debug!("Emitting function {} {}", index, signature);
        FunctionEmitter::new(module, index, signature, body, builder).emit()?;
    }
    Ok(())
}

/// An open block during emission.
#[derive(Debug, Clone, Copy)]
struct Frame {
    opener: InstrId,
    /// Operand height when the block was entered.
    base: u32,
    /// Values the block leaves behind when it ends.
    arity: u32,
    /// Values a branch to the block carries. Zero for loops.
    branch_arity: u32,
    /// Whether the opener itself was reachable.
    live: bool,
}

/// Values a taken branch discards from under the ones it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unwind {
    drop: u32,
    keep: u32,
}

struct FunctionEmitter<'m, 'b, B: CodeBuilder> {
    module: &'m Module,
    index: u32,
    signature: &'m FunctionType,
    body: &'m FunctionBody,
    builder: &'b mut B,
    /// Backend label for each `LabelId` of the body.
    labels: Vec<Option<B::Label>>,
    frames: Vec<Frame>,
    /// Operand stack height at the current instruction.
    height: u32,
    reachable: bool,
}

impl<'m, 'b, B: CodeBuilder> FunctionEmitter<'m, 'b, B> {
    fn new(
        module: &'m Module,
        index: u32,
        signature: &'m FunctionType,
        body: &'m FunctionBody,
        builder: &'b mut B,
    ) -> FunctionEmitter<'m, 'b, B> {
        FunctionEmitter {
            module,
            index,
            signature,
            body,
            builder,
            labels: vec![None; body.label_count as usize],
            frames: Vec::new(),
            height: 0,
            reachable: true,
        }
    }

    fn emit(mut self) -> Result<(), EmitError> {
        self.builder.begin_function(self.index, self.signature);
        for &local in &self.body.locals {
            self.builder.declare_local(local);
        }
        let body = self.body;
        for (id, instruction) in body.iter() {
            trace!("{} {:?} [height {}]", id, instruction, self.height);
            match *instruction {
                Instruction::Control(ref control) => self.control(id, control)?,
                Instruction::Parametric(Parametric::Drop) => {
                    self.pop(1);
                    self.builder.drop_value();
                }
                Instruction::Parametric(Parametric::Select) => {
                    self.pop(3);
                    self.push(1);
                    self.builder.select();
                }
                Instruction::Variable(variable) => self.variable(variable)?,
                Instruction::Memory(memory) => self.memory(memory),
                Instruction::Numeric(numeric) => self.numeric(numeric),
            }
        }
        self.builder.end_function()
    }

    fn pop(&mut self, count: u32) {
        self.height = self.height.saturating_sub(count);
    }

    fn push(&mut self, count: u32) {
        self.height += count;
    }

    /// Everything after an unconditional transfer is dead until the
    /// enclosing block ends or its else arm starts.
    fn transfer(&mut self) {
        self.height = self.frames.last().map_or(0, |frame| frame.base);
        self.reachable = false;
    }

    fn enter(&mut self, opener: InstrId, block: Block, is_loop: bool) {
        let arity = match block.block_type {
            BlockType::Value(_) => 1,
            BlockType::Empty => 0,
        };
        self.frames.push(Frame {
            opener,
            base: self.height,
            arity,
            branch_arity: if is_loop { 0 } else { arity },
            live: self.reachable,
        });
    }

    fn unlinked(&self, id: InstrId) -> EmitError {
        EmitError::UnlinkedInstruction {
            function: self.index,
            instruction: id,
            offset: self.body.offset(id),
        }
    }

    fn define(&mut self, label: LabelId) -> B::Label {
        let defined = self.builder.define_label();
        let index = label.0 as usize;
        if index >= self.labels.len() {
            self.labels.resize(index + 1, None);
        }
        self.labels[index] = Some(defined);
        defined
    }

    fn label(&self, id: InstrId, label: LabelId) -> Result<B::Label, EmitError> {
        self.labels
            .get(label.0 as usize)
            .copied()
            .flatten()
            .ok_or_else(|| self.unlinked(id))
    }

    /// The label defined by a block opener: its exit, or its top for a loop.
    fn block_label(&self, opener: InstrId) -> Result<B::Label, EmitError> {
        match self.body.get(opener) {
            Some(Instruction::Control(Control::Block(block)))
            | Some(Instruction::Control(Control::Loop(block)))
            | Some(Instruction::Control(Control::If { block, .. })) => self.label(opener, block.label),
            _ => Err(self.unlinked(opener)),
        }
    }

    /// Where a branch to `dest` lands, and what it must discard first.
    /// Inside an else arm the landing point is the end of the whole `if`.
    fn target(&self, dest: InstrId) -> Result<(B::Label, Unwind), EmitError> {
        let opener = match self.body.get(dest) {
            Some(Instruction::Control(Control::Else { dest: opener, .. })) => *opener,
            _ => dest,
        };
        let label = self.block_label(opener)?;
        let frame = self
            .frames
            .iter()
            .rev()
            .find(|frame| frame.opener == opener)
            .ok_or_else(|| self.unlinked(dest))?;
        let keep = frame.branch_arity;
        let drop = if self.reachable {
            self.height.saturating_sub(frame.base + keep)
        } else {
            0
        };
        Ok((label, Unwind { drop, keep }))
    }

    fn unwind(&mut self, unwind: Unwind) {
        if unwind.drop > 0 {
            self.builder.unwind(unwind.drop, unwind.keep);
        }
    }

    fn control(&mut self, id: InstrId, control: &Control) -> Result<(), EmitError> {
        match *control {
            Control::Unreachable => {
                self.builder.trap();
                self.transfer();
            }
            Control::Nop => {}
            Control::Block(block) => {
                if block.end.is_none() {
                    return Err(self.unlinked(id));
                }
                self.define(block.label);
                self.enter(id, block, false);
            }
            Control::Loop(block) => {
                let top = self.define(block.label);
                self.builder.mark_label(top);
                self.enter(id, block, true);
            }
            Control::If { block, else_arm } => {
                if block.end.is_none() {
                    return Err(self.unlinked(id));
                }
                self.pop(1);
                let exit = self.define(block.label);
                match else_arm {
                    Some(else_id) => {
                        let label = match self.body.get(else_id) {
                            Some(Instruction::Control(Control::Else { label, .. })) => *label,
                            _ => return Err(self.unlinked(else_id)),
                        };
                        let else_label = self.define(label);
                        self.builder.jump_unless(else_label);
                    }
                    None => self.builder.jump_unless(exit),
                }
                self.enter(id, block, false);
            }
            Control::Else { label, dest } => {
                let exit = self.block_label(dest)?;
                let else_label = self.label(id, label)?;
                self.builder.jump(exit);
                self.builder.mark_label(else_label);
                let frame = *self.frames.last().ok_or_else(|| self.unlinked(id))?;
                self.height = frame.base;
                self.reachable = frame.live;
            }
            Control::End { dest: None } => self.builder.ret(),
            Control::End { dest: Some(opener) } => {
                let frame = self.frames.pop().ok_or_else(|| self.unlinked(id))?;
                if !matches!(self.body.get(opener), Some(Instruction::Control(Control::Loop(_)))) {
                    let exit = self.block_label(opener)?;
                    self.builder.mark_label(exit);
                }
                self.height = frame.base + frame.arity;
                self.reachable = frame.live;
            }
            Control::Br(branch) => {
                let (label, unwind) = self.target(branch.dest)?;
                self.unwind(unwind);
                self.builder.jump(label);
                self.transfer();
            }
            Control::BrIf(branch) => {
                self.pop(1);
                let (label, unwind) = self.target(branch.dest)?;
                if unwind.drop == 0 {
                    self.builder.jump_if(label);
                } else {
                    let skip = self.builder.define_label();
                    self.builder.jump_unless(skip);
                    self.unwind(unwind);
                    self.builder.jump(label);
                    self.builder.mark_label(skip);
                }
            }
            Control::BrTable { ref targets, default } => {
                self.pop(1);
                let targets = targets
                    .iter()
                    .map(|branch| self.target(branch.dest))
                    .collect::<Result<Vec<_>, _>>()?;
                let (default_label, default_unwind) = self.target(default.dest)?;
                if targets.iter().all(|&(_, unwind)| unwind == default_unwind) {
                    // the selector still sits on top of the carried values
                    self.unwind(Unwind {
                        drop: default_unwind.drop,
                        keep: default_unwind.keep + 1,
                    });
                    let labels: Vec<B::Label> = targets.iter().map(|&(label, _)| label).collect();
                    self.builder.jump_table(&labels, default_label);
                } else {
                    // each entry unwinds to its own depth on a landing pad
                    let mut pads = Vec::with_capacity(targets.len() + 1);
                    for &target in targets.iter().chain(Some(&(default_label, default_unwind))) {
                        pads.push((self.builder.define_label(), target));
                    }
                    let entries: Vec<B::Label> = pads[..targets.len()].iter().map(|&(pad, _)| pad).collect();
                    self.builder.jump_table(&entries, pads[targets.len()].0);
                    for (pad, (label, unwind)) in pads {
                        self.builder.mark_label(pad);
                        self.unwind(unwind);
                        self.builder.jump(label);
                    }
                }
                self.transfer();
            }
            Control::Return => {
                self.builder.ret();
                self.transfer();
            }
            Control::Call(index) => {
                let signature = self.module.function_type(index).ok_or(EmitError::FunctionIndexOutOfRange {
                    function: self.index,
                    index,
                })?;
                self.pop(signature.params.len() as u32);
                self.push(signature.results.len() as u32);
                self.builder.call(index, signature);
            }
            Control::CallIndirect(type_index) => {
                let signature = self
                    .module
                    .types
                    .get(type_index as usize)
                    .ok_or(EmitError::TypeIndexOutOfRange { index: type_index })?;
                self.pop(signature.params.len() as u32 + 1);
                self.push(signature.results.len() as u32);
                self.builder.call_indirect(type_index, signature);
            }
        }
        Ok(())
    }

    /// Splits a local index into the argument or declared-local slot it names.
    fn slot(&self, index: u32) -> Result<Slot, EmitError> {
        let params = self.signature.params.len();
        let count = params + self.body.locals.len();
        let position = index as usize;
        if position < params {
            Ok(Slot::Arg(index))
        } else if position < count {
            Ok(Slot::Local((position - params) as u32))
        } else {
            Err(EmitError::LocalIndexOutOfRange {
                function: self.index,
                index,
                count,
            })
        }
    }

    fn load(&mut self, slot: Slot) {
        match slot {
            Slot::Arg(index) => self.builder.load_arg(index),
            Slot::Local(index) => self.builder.load_local(index),
        }
    }

    fn store(&mut self, slot: Slot) {
        match slot {
            Slot::Arg(index) => self.builder.store_arg(index),
            Slot::Local(index) => self.builder.store_local(index),
        }
    }

    fn global(&self, index: u32) -> Result<bool, EmitError> {
        self.module
            .global_type(index)
            .map(|global_type| global_type.mutable)
            .ok_or(EmitError::GlobalIndexOutOfRange {
                function: self.index,
                index,
            })
    }

    fn variable(&mut self, variable: Variable) -> Result<(), EmitError> {
        match variable {
            Variable::GetLocal(index) => {
                let slot = self.slot(index)?;
                self.push(1);
                self.load(slot);
            }
            Variable::SetLocal(index) => {
                let slot = self.slot(index)?;
                self.pop(1);
                self.store(slot);
            }
            Variable::TeeLocal(index) => {
                let slot = self.slot(index)?;
                self.store(slot);
                self.load(slot);
            }
            Variable::GetGlobal(index) => {
                self.global(index)?;
                self.push(1);
                self.builder.load_global(index);
            }
            Variable::SetGlobal(index) => {
                if !self.global(index)? {
                    return Err(EmitError::ImmutableGlobal {
                        function: self.index,
                        index,
                    });
                }
                self.pop(1);
                self.builder.store_global(index);
            }
        }
        Ok(())
    }

    fn memory(&mut self, memory: Memory) {
        match memory {
            Memory::Access(op, immediate) => {
                let accessor = Accessor::for_op(op);
                if accessor.is_store() {
                    self.pop(2);
                } else {
                    self.pop(1);
                    self.push(1);
                }
                self.builder.memory_access(accessor, immediate.offset);
            }
            Memory::CurrentMemory => {
                self.push(1);
                self.builder.current_memory();
            }
            Memory::GrowMemory => self.builder.grow_memory(),
        }
    }

    fn numeric(&mut self, numeric: Numeric) {
        match numeric {
            Numeric::Op(op) => {
                self.pop(operand_count(op));
                self.push(1);
            }
            _ => self.push(1),
        }
        match numeric {
            Numeric::I32Const(value) => self.builder.constant(Value::I32(value)),
            Numeric::I64Const(value) => self.builder.constant(Value::I64(value)),
            Numeric::F32Const(value) => self.builder.constant(Value::F32(value)),
            Numeric::F64Const(value) => self.builder.constant(Value::F64(value)),
            Numeric::Op(op) => {
                for step in lower(op) {
                    match step {
                        Step::Const(value) => self.builder.constant(value),
                        Step::Compare(op) => self.builder.compare(op),
                        Step::Arith(op) => self.builder.arith(op),
                        Step::Convert(op) => self.builder.convert(op),
                        Step::Intrinsic(intrinsic) => self.builder.intrinsic(intrinsic),
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Arg(u32),
    Local(u32),
}

#[cfg(test)]
mod tests;
