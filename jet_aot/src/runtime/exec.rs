use log::trace;

use crate::emit::target::ArithOp;
use crate::jet::{CompiledFunction, Op};
use crate::runtime::numeric::{self, expect_i32};
use crate::runtime::{Instance, Trap};
use crate::tree::language_types::FunctionType;
use crate::value::Value;

/// Checks `args` against the parameters of `signature`.
fn check_args(signature: &FunctionType, args: &[Value]) -> Result<(), Trap> {
    for (&param, arg) in signature.params.iter().zip(args) {
        if arg.value_type() != param {
            return Err(Trap::TypeMismatch { expected: param });
        }
    }
    Ok(())
}

/// Replaces a slot's value, keeping the slot's type.
fn store(slot: Option<&mut Value>, value: Value) -> Result<(), Trap> {
    match slot {
        Some(slot) if slot.value_type() == value.value_type() => {
            *slot = value;
            Ok(())
        }
        Some(slot) => Err(Trap::TypeMismatch {
            expected: slot.value_type(),
        }),
        None => Err(Trap::StackUnderflow),
    }
}

impl<'a> Instance<'a> {
    pub(super) fn call(&mut self, index: u32, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        let assembly = self.assembly;
        if let Some((import, _)) = assembly.imported_function(index) {
            return Err(Trap::UnresolvedImport {
                module: import.module.clone(),
                field: import.field.clone(),
            });
        }
        let function = assembly.function(index).ok_or(Trap::UndefinedElement { index })?;
        if self.depth >= self.config.max_call_depth {
            return Err(Trap::CallStackExhausted { depth: self.depth });
        }
        self.depth += 1;
        let result = self.execute(function, args);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, function: &'a CompiledFunction, mut slots: Vec<Value>) -> Result<Option<Value>, Trap> {
        let assembly = self.assembly;
        let params = function.signature.params.len();
        slots.extend(function.locals.iter().map(|&local| Value::zero(local)));
        let limit = self.config.max_value_stack;
        let depth = self.depth;
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        macro_rules! pop {
            () => {
                stack.pop().ok_or(Trap::StackUnderflow)?
            };
        }

        macro_rules! push {
            ($value:expr) => {{
                let value = $value;
                if stack.len() >= limit {
                    return Err(Trap::CallStackExhausted { depth });
                }
                stack.push(value);
            }};
        }

        macro_rules! jump {
            ($target:expr) => {
                pc = $target.position()
            };
        }

        macro_rules! call {
            ($index:expr, $signature:expr) => {{
                let count = $signature.params.len();
                if stack.len() < count {
                    return Err(Trap::StackUnderflow);
                }
                let args = stack.split_off(stack.len() - count);
                check_args($signature, &args)?;
                if let Some(result) = self.call($index, args)? {
                    push!(result);
                }
            }};
        }

        while let Some(op) = function.code.get(pc) {
            trace!("func{} {:04x}: {} [{} on stack]", function.index, pc, op, stack.len());
            pc += 1;
            match *op {
                Op::LdArg(index) => push!(slots.get(index as usize).copied().ok_or(Trap::StackUnderflow)?),
                Op::StArg(index) => store(slots.get_mut(index as usize), pop!())?,
                Op::LdLoc(index) => {
                    push!(slots.get(params + index as usize).copied().ok_or(Trap::StackUnderflow)?)
                }
                Op::StLoc(index) => store(slots.get_mut(params + index as usize), pop!())?,
                Op::LdGlobal(index) => push!(self.globals.get(index as usize).copied().ok_or(Trap::StackUnderflow)?),
                Op::StGlobal(index) => {
                    let value = pop!();
                    store(self.globals.get_mut(index as usize), value)?
                }
                Op::Ldc(value) => push!(value),
                Op::Pop => {
                    pop!();
                }
                Op::Select => {
                    let condition = expect_i32(pop!())?;
                    let second = pop!();
                    let first = pop!();
                    push!(if condition != 0 { first } else { second });
                }
                Op::Compare(op) => {
                    let b = pop!();
                    let a = pop!();
                    push!(numeric::compare(op, a, b)?);
                }
                Op::Arith(ArithOp::Neg) => {
                    let value = pop!();
                    push!(numeric::negate(value));
                }
                Op::Arith(op) => {
                    let b = pop!();
                    let a = pop!();
                    push!(numeric::arith(op, a, b)?);
                }
                Op::Convert(op) => {
                    let value = pop!();
                    push!(numeric::convert(op, value)?);
                }
                Op::Intrinsic(intrinsic) if numeric::is_binary(intrinsic) => {
                    let b = pop!();
                    let a = pop!();
                    push!(numeric::binary(intrinsic, a, b)?);
                }
                Op::Intrinsic(intrinsic) => {
                    let value = pop!();
                    push!(numeric::unary(intrinsic, value)?);
                }
                Op::Br(target) => jump!(target),
                Op::BrTrue(target) => {
                    if expect_i32(pop!())? != 0 {
                        jump!(target);
                    }
                }
                Op::BrFalse(target) => {
                    if expect_i32(pop!())? == 0 {
                        jump!(target);
                    }
                }
                Op::Switch { ref targets, default } => {
                    let selector = expect_i32(pop!())? as u32 as usize;
                    jump!(targets.get(selector).copied().unwrap_or(default));
                }
                Op::Unwind { drop, keep } => {
                    let (drop, keep) = (drop as usize, keep as usize);
                    if stack.len() < drop + keep {
                        return Err(Trap::StackUnderflow);
                    }
                    let top = stack.len() - keep;
                    stack.drain(top - drop..top);
                }
                Op::Memory(accessor, offset) => {
                    if accessor.is_store() {
                        let value = pop!();
                        let address = expect_i32(pop!())?;
                        self.memory.store(accessor, address as u32, offset, value)?;
                    } else {
                        let address = expect_i32(pop!())?;
                        push!(self.memory.load(accessor, address as u32, offset)?);
                    }
                }
                Op::CurrentMemory => push!(Value::I32(self.memory.current_pages() as i32)),
                Op::GrowMemory => {
                    let delta = expect_i32(pop!())?;
                    let previous = self.memory.grow(delta as u32).map_or(-1, |pages| pages as i32);
                    push!(Value::I32(previous));
                }
                Op::Call(index) => {
                    let signature = assembly.signature(index).ok_or(Trap::UndefinedElement { index })?;
                    call!(index, signature);
                }
                Op::CallIndirect(type_index) => {
                    let expected = assembly
                        .types
                        .get(type_index as usize)
                        .ok_or(Trap::UndefinedElement { index: type_index })?;
                    let element = expect_i32(pop!())? as u32;
                    let callee = match self.table.get(element as usize) {
                        Some(&Some(callee)) => callee,
                        Some(&None) => return Err(Trap::UninitializedElement { index: element }),
                        None => return Err(Trap::UndefinedElement { index: element }),
                    };
                    match assembly.signature(callee) {
                        Some(signature) if signature == expected => call!(callee, signature),
                        _ => {
                            return Err(Trap::IndirectCallTypeMismatch {
                                index: element,
                                expected: expected.clone(),
                            })
                        }
                    }
                }
                Op::Ret => break,
                Op::Trap => return Err(Trap::Unreachable),
            }
        }

        match function.signature.result() {
            Some(result_type) => {
                let value = pop!();
                if value.value_type() != result_type {
                    return Err(Trap::TypeMismatch { expected: result_type });
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
