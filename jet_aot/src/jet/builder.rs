use log::{debug, trace};

use crate::emit::target::{ArithOp, CompareOp, ConvertOp, Intrinsic};
use crate::emit::{CodeBuilder, EmitError};
use crate::jet::{Assembly, CompiledFunction, Op, Target};
use crate::memory::Accessor;
use crate::tree::language_types::{FunctionType, ValueType};
use crate::tree::Module;
use crate::value::Value;

struct FunctionState {
    function: CompiledFunction,
    /// Op index each label was marked at.
    labels: Vec<Option<u32>>,
}

/// Builds a jet `Assembly`. Branches are emitted against label numbers and
/// patched to op positions when the function ends.
pub struct JetBuilder {
    assembly: Assembly,
    current: Option<FunctionState>,
}

impl JetBuilder {
    pub fn new(name: &str) -> JetBuilder {
        JetBuilder {
            assembly: Assembly {
                name: name.to_string(),
                ..Assembly::default()
            },
            current: None,
        }
    }

    pub fn finish(self) -> Assembly {
        self.assembly
    }

    fn emit(&mut self, op: Op) {
        if let Some(state) = self.current.as_mut() {
            trace!("  {:04x}: {}", state.function.code.len(), op);
            state.function.code.push(op);
        }
    }
}

impl CodeBuilder for JetBuilder {
    type Label = Target;

    fn declare_module(&mut self, module: &Module) {
        let assembly = &mut self.assembly;
        assembly.types = module.types.clone();
        assembly.imports = module.imports.clone();
        assembly.table = module.table;
        assembly.memory = module.memory;
        assembly.globals = module.globals.clone();
        assembly.exports = module.exports.clone();
        assembly.start = module.start;
        assembly.elements = module.elements.clone();
        assembly.data = module.data.clone();
    }

    fn begin_function(&mut self, index: u32, signature: &FunctionType) {
        self.current = Some(FunctionState {
            function: CompiledFunction {
                index,
                signature: signature.clone(),
                locals: vec![],
                code: vec![],
            },
            labels: vec![],
        });
    }

    fn declare_local(&mut self, value_type: ValueType) {
        if let Some(state) = self.current.as_mut() {
            state.function.locals.push(value_type);
        }
    }

    fn end_function(&mut self) -> Result<(), EmitError> {
        let FunctionState { mut function, labels } = match self.current.take() {
            Some(state) => state,
            None => return Ok(()),
        };
        let index = function.index;
        for op in function.code.iter_mut() {
            op.map_targets(|Target(label)| match labels.get(label as usize) {
                Some(&Some(position)) => Ok(Target(position)),
                _ => Err(EmitError::UnmarkedLabel { function: index, label }),
            })?;
        }
        debug!("Built func{}: {} ops, {} labels", index, function.code.len(), labels.len());
        self.assembly.functions.push(function);
        Ok(())
    }

    fn define_label(&mut self) -> Target {
        match self.current.as_mut() {
            Some(state) => {
                state.labels.push(None);
                Target(state.labels.len() as u32 - 1)
            }
            None => Target(0),
        }
    }

    fn mark_label(&mut self, label: Target) {
        if let Some(state) = self.current.as_mut() {
            let position = state.function.code.len() as u32;
            if let Some(slot) = state.labels.get_mut(label.position()) {
                *slot = Some(position);
            }
        }
    }

    fn jump(&mut self, label: Target) {
        self.emit(Op::Br(label));
    }

    fn jump_if(&mut self, label: Target) {
        self.emit(Op::BrTrue(label));
    }

    fn jump_unless(&mut self, label: Target) {
        self.emit(Op::BrFalse(label));
    }

    fn jump_table(&mut self, targets: &[Target], default: Target) {
        self.emit(Op::Switch {
            targets: targets.to_vec(),
            default,
        });
    }

    fn unwind(&mut self, drop: u32, keep: u32) {
        self.emit(Op::Unwind { drop, keep });
    }

    fn load_arg(&mut self, index: u32) {
        self.emit(Op::LdArg(index));
    }

    fn store_arg(&mut self, index: u32) {
        self.emit(Op::StArg(index));
    }

    fn load_local(&mut self, index: u32) {
        self.emit(Op::LdLoc(index));
    }

    fn store_local(&mut self, index: u32) {
        self.emit(Op::StLoc(index));
    }

    fn load_global(&mut self, index: u32) {
        self.emit(Op::LdGlobal(index));
    }

    fn store_global(&mut self, index: u32) {
        self.emit(Op::StGlobal(index));
    }

    fn drop_value(&mut self) {
        self.emit(Op::Pop);
    }

    fn select(&mut self) {
        self.emit(Op::Select);
    }

    fn constant(&mut self, value: Value) {
        self.emit(Op::Ldc(value));
    }

    fn compare(&mut self, op: CompareOp) {
        self.emit(Op::Compare(op));
    }

    fn arith(&mut self, op: ArithOp) {
        self.emit(Op::Arith(op));
    }

    fn convert(&mut self, op: ConvertOp) {
        self.emit(Op::Convert(op));
    }

    fn intrinsic(&mut self, intrinsic: Intrinsic) {
        self.emit(Op::Intrinsic(intrinsic));
    }

    fn memory_access(&mut self, accessor: Accessor, offset: u32) {
        self.emit(Op::Memory(accessor, offset));
    }

    fn current_memory(&mut self) {
        self.emit(Op::CurrentMemory);
    }

    fn grow_memory(&mut self) {
        self.emit(Op::GrowMemory);
    }

    fn call(&mut self, index: u32, _signature: &FunctionType) {
        self.emit(Op::Call(index));
    }

    fn call_indirect(&mut self, type_index: u32, _signature: &FunctionType) {
        self.emit(Op::CallIndirect(type_index));
    }

    fn trap(&mut self) {
        self.emit(Op::Trap);
    }

    fn ret(&mut self) {
        self.emit(Op::Ret);
    }
}
