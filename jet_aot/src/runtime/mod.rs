//! A small managed VM that instantiates a jet `Assembly` and runs its
//! exports.

use log::{debug, info};
use thiserror::Error;

use crate::jet::Assembly;
use crate::memory::LinearMemory;
use crate::tree::imports::ImportDesc;
use crate::tree::language_types::{ExternalKind, FunctionType, InitExpression, ValueType};
use crate::value::Value;

mod exec;
mod numeric;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Trap {
    #[error("unreachable executed")]
    Unreachable,
    #[error("out of bounds memory access at {address} ({size} bytes)")]
    OutOfBoundsAccess { address: u64, size: usize },
    #[error("memory of {pages} pages exceeds its maximum of {maximum}")]
    MemoryLimitExceeded { pages: u32, maximum: u32 },
    #[error("table of {size} elements exceeds the limit of {maximum}")]
    TableLimitExceeded { size: u32, maximum: u32 },
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("value stack underflow")]
    StackUnderflow,
    #[error("type mismatch, expected {expected}")]
    TypeMismatch { expected: ValueType },
    #[error("undefined table element {index}")]
    UndefinedElement { index: u32 },
    #[error("uninitialized table element {index}")]
    UninitializedElement { index: u32 },
    #[error("indirect call through element {index} does not match {expected}")]
    IndirectCallTypeMismatch { index: u32, expected: FunctionType },
    #[error("import \"{module}\" \"{field}\" is not resolved")]
    UnresolvedImport { module: String, field: String },
    #[error("call stack exhausted at depth {depth}")]
    CallStackExhausted { depth: usize },
    #[error("no exported function named \"{name}\"")]
    NoSuchExport { name: String },
    #[error("arguments do not match {name}{signature}")]
    ArgumentMismatch { name: String, signature: FunctionType },
}

/// Resource limits of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    pub max_call_depth: usize,
    pub max_value_stack: usize,
    /// Largest table an instance will allocate.
    pub max_table_size: u32,
}

impl Default for InstanceConfig {
    fn default() -> InstanceConfig {
        InstanceConfig {
            max_call_depth: 1024,
            max_value_stack: 1 << 20,
            max_table_size: 1 << 20,
        }
    }
}

/// A running instance: memory, globals and table initialised, start
/// function already run.
pub struct Instance<'a> {
    assembly: &'a Assembly,
    config: InstanceConfig,
    memory: LinearMemory,
    globals: Vec<Value>,
    /// Function index held by each table slot.
    table: Vec<Option<u32>>,
    depth: usize,
}

impl<'a> Instance<'a> {
    pub fn instantiate(assembly: &'a Assembly, config: InstanceConfig) -> Result<Instance<'a>, Trap> {
        info!("Instantiating assembly {}", assembly.name);
        let mut memory_type = assembly.memory;
        let mut table_type = assembly.table;
        for import in &assembly.imports {
            match import.desc {
                ImportDesc::Memory(imported) => memory_type = Some(imported),
                ImportDesc::Table(imported) => table_type = Some(imported),
                ImportDesc::Global(_) => {
                    return Err(Trap::UnresolvedImport {
                        module: import.module.clone(),
                        field: import.field.clone(),
                    })
                }
                ImportDesc::Function(_) => {}
            }
        }

        let memory = match memory_type {
            Some(memory_type) => LinearMemory::new(memory_type.limits.initial, memory_type.limits.maximum)?,
            None => LinearMemory::new(0, Some(0))?,
        };
        let table_size = table_type.map_or(0, |table| table.limits.initial);
        if table_size > config.max_table_size {
            return Err(Trap::TableLimitExceeded {
                size: table_size,
                maximum: config.max_table_size,
            });
        }
        let mut instance = Instance {
            assembly,
            config,
            memory,
            globals: Vec::with_capacity(assembly.globals.len()),
            table: vec![None; table_size as usize],
            depth: 0,
        };

        for global in &assembly.globals {
            let value = instance.evaluate(&global.value)?;
            if value.value_type() != global.constraints.content_type {
                return Err(Trap::TypeMismatch {
                    expected: global.constraints.content_type,
                });
            }
            instance.globals.push(value);
        }
        for element in &assembly.elements {
            let offset = instance.offset(&element.offset)?;
            for (i, &function) in element.elements.iter().enumerate() {
                let index = offset.wrapping_add(i as u32);
                match instance.table.get_mut(index as usize) {
                    Some(slot) => *slot = Some(function),
                    None => return Err(Trap::UndefinedElement { index }),
                }
            }
        }
        for data in &assembly.data {
            let offset = instance.offset(&data.offset)?;
            instance.memory.write_bytes(offset, &data.data)?;
        }
        debug!(
            "Instance ready: {} pages, {} globals, {} table slots",
            instance.memory.current_pages(),
            instance.globals.len(),
            instance.table.len()
        );
        if let Some(start) = assembly.start {
            debug!("Running start function {}", start);
            instance.call(start, vec![])?;
        }
        Ok(instance)
    }

    fn evaluate(&self, expr: &InitExpression) -> Result<Value, Trap> {
        match *expr {
            InitExpression::GetGlobal(index) => match self.globals.get(index as usize) {
                Some(&value) => Ok(value),
                None => Err(Trap::UnresolvedImport {
                    module: String::new(),
                    field: format!("global{}", index),
                }),
            },
            ref constant => constant.constant().ok_or(Trap::TypeMismatch { expected: ValueType::I32 }),
        }
    }

    /// Segment offsets are i32 constant expressions.
    fn offset(&self, expr: &InitExpression) -> Result<u32, Trap> {
        match self.evaluate(expr)? {
            Value::I32(offset) => Ok(offset as u32),
            _ => Err(Trap::TypeMismatch { expected: ValueType::I32 }),
        }
    }

    /// Calls the function exported as `name`.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, Trap> {
        let index = match self.assembly.export(name) {
            Some(ExternalKind::Function(index)) => index,
            _ => return Err(Trap::NoSuchExport { name: name.to_string() }),
        };
        let signature = self.assembly.signature(index).ok_or(Trap::NoSuchExport {
            name: name.to_string(),
        })?;
        let matches = signature.params.len() == args.len()
            && signature
                .params
                .iter()
                .zip(args)
                .all(|(&param, arg)| arg.value_type() == param);
        if !matches {
            return Err(Trap::ArgumentMismatch {
                name: name.to_string(),
                signature: signature.clone(),
            });
        }
        info!("Invoking {} (func{})", name, index);
        self.call(index, args.to_vec())
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn global(&self, index: u32) -> Option<Value> {
        self.globals.get(index as usize).copied()
    }
}
