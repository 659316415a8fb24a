//! Command-line driver.
//!
//! - `jet compile <input.wasm> <output-name>` writes the jet listing to
//!   `<output-name>.jasm`
//! - `jet run <input.wasm> <export> [args...]` compiles, instantiates and
//!   calls an exported function

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use jet_aot::tree::language_types::ExternalKind;
use jet_aot::{compile_file, CompileOptions, Instance, InstanceConfig, Value};
use log::info;

#[derive(Parser)]
#[command(name = "jet")]
#[command(about = "WebAssembly to jet compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a module and write its listing
    Compile {
        input: PathBuf,
        /// Assembly name; the listing goes to `<output-name>.jasm`
        output_name: String,
    },

    /// Compile a module and call one of its exported functions
    Run {
        input: PathBuf,
        export: String,
        /// Arguments, parsed by the export's parameter types
        args: Vec<String>,
        /// Maximum call depth
        #[arg(long, default_value_t = 1024)]
        max_call_depth: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, output_name } => cmd_compile(input, &output_name),
        Commands::Run {
            input,
            export,
            args,
            max_call_depth,
        } => cmd_run(input, &export, &args, max_call_depth),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

fn cmd_compile(input: PathBuf, output_name: &str) -> Result<()> {
    let options = CompileOptions {
        assembly_name: output_name.to_string(),
    };
    let assembly = compile_file(&input, &options).with_context(|| format!("compiling {}", input.display()))?;
    let output = format!("{}.jasm", output_name);
    fs::write(&output, assembly.to_string()).with_context(|| format!("writing {}", output))?;
    info!("Wrote {} methods to {}", assembly.functions.len(), output);
    println!("{}", output);
    Ok(())
}

fn cmd_run(input: PathBuf, export: &str, args: &[String], max_call_depth: usize) -> Result<()> {
    let name = input
        .file_stem()
        .map_or_else(|| "module".to_string(), |stem| stem.to_string_lossy().into_owned());
    let options = CompileOptions { assembly_name: name };
    let assembly = compile_file(&input, &options).with_context(|| format!("compiling {}", input.display()))?;

    let signature = match assembly.export(export) {
        Some(ExternalKind::Function(index)) => assembly
            .signature(index)
            .ok_or_else(|| anyhow!("export {} names a missing function", export))?,
        _ => bail!("no exported function named {}", export),
    };
    if signature.params.len() != args.len() {
        bail!(
            "{}{} takes {} arguments, got {}",
            export,
            signature,
            signature.params.len(),
            args.len()
        );
    }
    let values = signature
        .params
        .iter()
        .zip(args)
        .map(|(&param, arg)| Value::parse(param, arg).ok_or_else(|| anyhow!("cannot read {:?} as {}", arg, param)))
        .collect::<Result<Vec<_>>>()?;

    let config = InstanceConfig {
        max_call_depth,
        ..InstanceConfig::default()
    };
    let mut instance = Instance::instantiate(&assembly, config).context("instantiating")?;
    match instance.invoke(export, &values).with_context(|| format!("calling {}", export))? {
        Some(value) => println!("{}", value),
        None => println!("()"),
    }
    Ok(())
}
