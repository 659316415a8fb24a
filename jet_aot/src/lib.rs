//! Ahead-of-time compiler from WebAssembly MVP modules to jet, a typed,
//! label-based stack bytecode, plus a small VM that runs the result.
//!
//! The pipeline is `parser` (sections, instruction decoding and control-flow
//! linking) feeding `emit`, which lowers every function body onto a
//! `CodeBuilder`. `jet::JetBuilder` is the bundled backend and
//! `runtime::Instance` executes what it builds.

use std::fs;
use std::path::Path;

use log::info;
use thiserror::Error;

pub mod emit;
pub mod jet;
pub mod memory;
pub mod parser;
pub mod runtime;
pub mod tree;
pub mod value;

pub use crate::emit::{CodeBuilder, EmitError};
pub use crate::jet::{Assembly, JetBuilder};
pub use crate::parser::ParseError;
pub use crate::runtime::{Instance, InstanceConfig, Trap};
pub use crate::tree::Module;
pub use crate::value::Value;

#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Parse(#[from] ParseError),
    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
    #[error("trap: {0}")]
    Trap(#[from] Trap),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name stamped on the produced assembly.
    pub assembly_name: String,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            assembly_name: "module".to_string(),
        }
    }
}

/// Decodes `bytes` and emits every function into `builder`, returning the
/// decoded module.
pub fn compile_with<B: CodeBuilder>(bytes: &[u8], builder: &mut B) -> Result<Module, Error> {
    let module = parser::parse(bytes)?;
    emit::emit_module(&module, builder)?;
    Ok(module)
}

/// Compiles a module binary to a jet assembly.
pub fn compile(bytes: &[u8], options: &CompileOptions) -> Result<Assembly, Error> {
    info!("Compiling {} ({} bytes)", options.assembly_name, bytes.len());
    let mut builder = JetBuilder::new(&options.assembly_name);
    compile_with(bytes, &mut builder)?;
    Ok(builder.finish())
}

pub fn compile_file<P: AsRef<Path>>(path: P, options: &CompileOptions) -> Result<Assembly, Error> {
    info!("Reading {}", path.as_ref().display());
    let bytes = fs::read(path)?;
    compile(&bytes, options)
}
