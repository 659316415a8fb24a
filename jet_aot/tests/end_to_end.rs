mod common;

use common::{header, section, ModuleBuilder, F32, F64, I32, I64};
use jet_aot::{
    compile, Assembly, CompileOptions, EmitError, Error, Instance, InstanceConfig, ParseError, Trap, Value,
};

fn assemble(bytes: &[u8]) -> Assembly {
    compile(bytes, &CompileOptions::default()).unwrap()
}

fn invoke(assembly: &Assembly, name: &str, args: &[Value]) -> Result<Option<Value>, Trap> {
    let mut instance = Instance::instantiate(assembly, InstanceConfig::default())?;
    instance.invoke(name, args)
}

fn add_module() -> Vec<u8> {
    ModuleBuilder::new()
        .signature(&[I32, I32], &[I32])
        .function(0, &[], &[0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b])
        .export_function("add", 0)
        .build()
}

#[test]
fn header_only_module_compiles_to_an_empty_assembly() {
    let assembly = assemble(&header());
    assert!(assembly.functions.is_empty());
    assert!(assembly.exports.is_empty());
}

#[test]
fn truncated_section_is_rejected() {
    let mut bytes = header();
    bytes.extend_from_slice(&[0x01, 0x05, 0x01]);
    match compile(&bytes, &CompileOptions::default()) {
        Err(Error::Parse(ParseError::UnexpectedEof { .. })) => {}
        other => panic!("expected eof, got {:?}", other),
    }
}

#[test]
fn illegal_opcode_is_rejected() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[])
        .function(0, &[], &[0xff, 0x0b])
        .build();
    match compile(&bytes, &CompileOptions::default()) {
        Err(Error::Parse(ParseError::IllegalOpcode { opcode: 0xff, .. })) => {}
        other => panic!("expected illegal opcode, got {:?}", other),
    }
}

#[test]
fn call_to_a_missing_function_is_an_emit_error() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[])
        .function(0, &[], &[0x10, 0x05, 0x0b])
        .build();
    match compile(&bytes, &CompileOptions::default()) {
        Err(Error::Emit(EmitError::FunctionIndexOutOfRange { function: 0, index: 5 })) => {}
        other => panic!("expected emit error, got {:?}", other),
    }
}

#[test]
fn adds_two_numbers() {
    let assembly = assemble(&add_module());
    assert_eq!(
        invoke(&assembly, "add", &[Value::I32(3), Value::I32(4)]),
        Ok(Some(Value::I32(7)))
    );
    assert_eq!(
        invoke(&assembly, "add", &[Value::I32(i32::MAX), Value::I32(1)]),
        Ok(Some(Value::I32(i32::MIN)))
    );
}

#[test]
fn listing_shows_each_method() {
    let listing = assemble(&add_module()).to_string();
    assert!(listing.contains(".method func0 (i32, i32) -> i32"));
    assert!(listing.contains(".export \"add\""));
    assert!(listing.contains("add"));
}

#[test]
fn stores_then_loads_memory() {
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .memory(1, None)
        .function(
            0,
            &[],
            &[
                0x20, 0x00, 0x41, 0x2a, 0x36, 0x02, 0x00, // i32.store [addr] 42
                0x20, 0x00, 0x28, 0x02, 0x00, // i32.load [addr]
                0x0b,
            ],
        )
        .export_function("roundtrip", 0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "roundtrip", &[Value::I32(0)]), Ok(Some(Value::I32(42))));
    assert_eq!(invoke(&assembly, "roundtrip", &[Value::I32(100)]), Ok(Some(Value::I32(42))));
    assert_eq!(
        invoke(&assembly, "roundtrip", &[Value::I32(65534)]),
        Err(Trap::OutOfBoundsAccess { address: 65534, size: 4 })
    );
}

#[test]
fn data_segments_initialise_memory() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[I32])
        .memory(1, None)
        .function(0, &[], &[0x41, 0x10, 0x28, 0x02, 0x00, 0x0b])
        .export_function("word", 0)
        .data(16, &[1, 2, 3, 4])
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "word", &[]), Ok(Some(Value::I32(0x0403_0201))));
}

#[test]
fn grow_memory_then_query_the_size() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[I32])
        .memory(1, Some(3))
        .function(0, &[], &[0x41, 0x02, 0x40, 0x00, 0x1a, 0x3f, 0x00, 0x0b])
        .export_function("grow", 0)
        .build();
    let assembly = assemble(&bytes);
    let mut instance = Instance::instantiate(&assembly, InstanceConfig::default()).unwrap();
    assert_eq!(instance.invoke("grow", &[]), Ok(Some(Value::I32(3))));
    // a second grow would exceed the maximum, so the size stays put
    assert_eq!(instance.invoke("grow", &[]), Ok(Some(Value::I32(3))));
}

#[test]
fn if_else_picks_an_arm() {
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .function(
            0,
            &[],
            &[0x20, 0x00, 0x04, I32, 0x41, 0x0a, 0x05, 0x41, 0x14, 0x0b, 0x0b],
        )
        .export_function("pick", 0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "pick", &[Value::I32(1)]), Ok(Some(Value::I32(10))));
    assert_eq!(invoke(&assembly, "pick", &[Value::I32(0)]), Ok(Some(Value::I32(20))));
}

#[test]
fn loop_computes_a_factorial() {
    let code = [
        0x41, 0x01, 0x21, 0x01, // acc = 1
        0x02, 0x40, // block
        0x03, 0x40, // loop
        0x20, 0x00, 0x45, 0x0d, 0x01, // br_if 1 when n == 0
        0x20, 0x01, 0x20, 0x00, 0x6c, 0x21, 0x01, // acc *= n
        0x20, 0x00, 0x41, 0x01, 0x6b, 0x21, 0x00, // n -= 1
        0x0c, 0x00, // br 0
        0x0b, 0x0b, // end loop, end block
        0x20, 0x01, 0x0b,
    ];
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .function(0, &[(1, I32)], &code)
        .export_function("fac", 0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "fac", &[Value::I32(5)]), Ok(Some(Value::I32(120))));
    assert_eq!(invoke(&assembly, "fac", &[Value::I32(0)]), Ok(Some(Value::I32(1))));
}

#[test]
fn looping_branch_does_not_accumulate_stack_values() {
    // loop (i32.const 99) (tee_local 0 (i32.sub (get_local 0) (i32.const 1))) br_if 0 drop end (i32.const 7)
    let code = [
        0x03, 0x40, 0x41, 0xe3, 0x00, 0x20, 0x00, 0x41, 0x01, 0x6b, 0x22, 0x00, 0x0d, 0x00, 0x1a, 0x0b, 0x41, 0x07,
        0x0b,
    ];
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .function(0, &[], &code)
        .export_function("spin", 0)
        .build();
    let assembly = assemble(&bytes);
    let config = InstanceConfig {
        max_value_stack: 16,
        ..InstanceConfig::default()
    };
    let mut instance = Instance::instantiate(&assembly, config).unwrap();
    assert_eq!(instance.invoke("spin", &[Value::I32(10_000)]), Ok(Some(Value::I32(7))));
}

#[test]
fn branch_out_of_a_block_carries_its_result() {
    // block (result i32) (i32.const 1) (i32.const 2) (get_local 0) br_if 0 drop end
    let code = [0x02, I32, 0x41, 0x01, 0x41, 0x02, 0x20, 0x00, 0x0d, 0x00, 0x1a, 0x0b, 0x0b];
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .function(0, &[], &code)
        .export_function("pick", 0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "pick", &[Value::I32(1)]), Ok(Some(Value::I32(2))));
    assert_eq!(invoke(&assembly, "pick", &[Value::I32(0)]), Ok(Some(Value::I32(1))));
}

#[test]
fn br_table_dispatches_on_its_operand() {
    let code = [
        0x02, 0x40, 0x02, 0x40, 0x02, 0x40, // three nested blocks
        0x20, 0x00, 0x0e, 0x02, 0x00, 0x01, 0x02, // br_table [0 1] 2
        0x0b, 0x41, 0xe4, 0x00, 0x0f, // end; return 100
        0x0b, 0x41, 0xc8, 0x01, 0x0f, // end; return 200
        0x0b, 0x41, 0xac, 0x02, // end; 300
        0x0b,
    ];
    let bytes = ModuleBuilder::new()
        .signature(&[I32], &[I32])
        .function(0, &[], &code)
        .export_function("switch", 0)
        .build();
    let assembly = assemble(&bytes);
    for &(selector, expected) in &[(0, 100), (1, 200), (2, 300), (-1, 300)] {
        assert_eq!(
            invoke(&assembly, "switch", &[Value::I32(selector)]),
            Ok(Some(Value::I32(expected)))
        );
    }
}

#[test]
fn start_function_updates_a_global() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[])
        .signature(&[], &[I32])
        .global_i32(5)
        .function(0, &[], &[0x23, 0x00, 0x41, 0x02, 0x6a, 0x24, 0x00, 0x0b])
        .function(1, &[], &[0x23, 0x00, 0x0b])
        .export_function("get", 1)
        .start(0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(assembly.start, Some(0));
    assert_eq!(invoke(&assembly, "get", &[]), Ok(Some(Value::I32(7))));
}

#[test]
fn calling_an_import_is_unresolved() {
    let bytes = ModuleBuilder::new()
        .signature(&[], &[])
        .import_function("env", "log", 0)
        .function(0, &[], &[0x10, 0x00, 0x0b])
        .export_function("run", 1)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(
        invoke(&assembly, "run", &[]),
        Err(Trap::UnresolvedImport {
            module: "env".to_string(),
            field: "log".to_string(),
        })
    );
}

#[test]
fn integer_division_traps() {
    let bytes = ModuleBuilder::new()
        .signature(&[I32, I32], &[I32])
        .function(0, &[], &[0x20, 0x00, 0x20, 0x01, 0x6d, 0x0b])
        .export_function("div", 0)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(invoke(&assembly, "div", &[Value::I32(7), Value::I32(2)]), Ok(Some(Value::I32(3))));
    assert_eq!(
        invoke(&assembly, "div", &[Value::I32(7), Value::I32(0)]),
        Err(Trap::IntegerDivideByZero)
    );
    assert_eq!(
        invoke(&assembly, "div", &[Value::I32(i32::MIN), Value::I32(-1)]),
        Err(Trap::IntegerOverflow)
    );
}

#[test]
fn i64_and_float_arithmetic() {
    let bytes = ModuleBuilder::new()
        .signature(&[I64, I64], &[I64])
        .signature(&[F32], &[F32])
        .signature(&[F64], &[I32])
        .function(0, &[], &[0x20, 0x00, 0x20, 0x01, 0x7c, 0x0b])
        .function(1, &[], &[0x20, 0x00, 0x90, 0x0b])
        .function(2, &[], &[0x20, 0x00, 0xaa, 0x0b])
        .export_function("add64", 0)
        .export_function("nearest", 1)
        .export_function("truncate", 2)
        .build();
    let assembly = assemble(&bytes);
    assert_eq!(
        invoke(&assembly, "add64", &[Value::I64(1 << 40), Value::I64(5)]),
        Ok(Some(Value::I64((1 << 40) + 5)))
    );
    assert_eq!(invoke(&assembly, "nearest", &[Value::F32(2.5)]), Ok(Some(Value::F32(2.0))));
    assert_eq!(invoke(&assembly, "truncate", &[Value::F64(-7.9)]), Ok(Some(Value::I32(-7))));
    assert_eq!(
        invoke(&assembly, "truncate", &[Value::F64(f64::NAN)]),
        Err(Trap::InvalidConversionToInteger)
    );
}

#[test]
fn custom_sections_are_ignored() {
    let mut bytes = add_module();
    section(&mut bytes, 0, |payload| {
        payload.extend_from_slice(&[0x04, b'n', b'a', b'm', b'e', 0xde, 0xad]);
    });
    let assembly = assemble(&bytes);
    assert_eq!(assembly.functions.len(), 1);
}
