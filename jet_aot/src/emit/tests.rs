use super::*;
use crate::parser::{decode_function_body, Reader};
use crate::tree::globals::Global;
use crate::tree::language_types::{GlobalType, InitExpression};

/// Records builder calls as listing lines.
#[derive(Default)]
struct Recorder {
    lines: Vec<String>,
    labels: u32,
}

impl Recorder {
    fn push(&mut self, line: String) {
        self.lines.push(line);
    }
}

impl CodeBuilder for Recorder {
    type Label = u32;

    fn declare_module(&mut self, _module: &Module) {}

    fn begin_function(&mut self, index: u32, signature: &FunctionType) {
        self.push(format!("func {} {}", index, signature));
    }

    fn declare_local(&mut self, value_type: ValueType) {
        self.push(format!("local {}", value_type));
    }

    fn end_function(&mut self) -> Result<(), EmitError> {
        self.push("endfunc".to_string());
        Ok(())
    }

    fn define_label(&mut self) -> u32 {
        self.labels += 1;
        self.labels - 1
    }

    fn mark_label(&mut self, label: u32) {
        self.push(format!("L{}:", label));
    }

    fn jump(&mut self, label: u32) {
        self.push(format!("br L{}", label));
    }

    fn jump_if(&mut self, label: u32) {
        self.push(format!("brtrue L{}", label));
    }

    fn jump_unless(&mut self, label: u32) {
        self.push(format!("brfalse L{}", label));
    }

    fn jump_table(&mut self, targets: &[u32], default: u32) {
        self.push(format!("switch {:?} L{}", targets, default));
    }

    fn unwind(&mut self, drop: u32, keep: u32) {
        self.push(format!("unwind {} keep {}", drop, keep));
    }

    fn load_arg(&mut self, index: u32) {
        self.push(format!("ldarg {}", index));
    }

    fn store_arg(&mut self, index: u32) {
        self.push(format!("starg {}", index));
    }

    fn load_local(&mut self, index: u32) {
        self.push(format!("ldloc {}", index));
    }

    fn store_local(&mut self, index: u32) {
        self.push(format!("stloc {}", index));
    }

    fn load_global(&mut self, index: u32) {
        self.push(format!("ldglobal {}", index));
    }

    fn store_global(&mut self, index: u32) {
        self.push(format!("stglobal {}", index));
    }

    fn drop_value(&mut self) {
        self.push("pop".to_string());
    }

    fn select(&mut self) {
        self.push("select".to_string());
    }

    fn constant(&mut self, value: Value) {
        self.push(format!("ldc {}", value));
    }

    fn compare(&mut self, op: CompareOp) {
        self.push(op.to_string());
    }

    fn arith(&mut self, op: ArithOp) {
        self.push(op.to_string());
    }

    fn convert(&mut self, op: ConvertOp) {
        self.push(op.to_string());
    }

    fn intrinsic(&mut self, intrinsic: Intrinsic) {
        self.push(intrinsic.to_string());
    }

    fn memory_access(&mut self, accessor: Accessor, offset: u32) {
        self.push(format!("call {} +{}", accessor, offset));
    }

    fn current_memory(&mut self) {
        self.push("current_memory".to_string());
    }

    fn grow_memory(&mut self) {
        self.push("grow_memory".to_string());
    }

    fn call(&mut self, index: u32, _signature: &FunctionType) {
        self.push(format!("call {}", index));
    }

    fn call_indirect(&mut self, type_index: u32, _signature: &FunctionType) {
        self.push(format!("calli {}", type_index));
    }

    fn trap(&mut self) {
        self.push("trap".to_string());
    }

    fn ret(&mut self) {
        self.push("ret".to_string());
    }
}

fn module_with(signature: FunctionType, body: &[u8]) -> Module {
    Module {
        types: vec![signature],
        functions: vec![0],
        bodies: vec![decode_function_body(Reader::new(body)).unwrap()],
        ..Module::default()
    }
}

fn void() -> FunctionType {
    FunctionType::default()
}

fn emit_lines(module: &Module) -> Result<Vec<String>, EmitError> {
    let mut recorder = Recorder::default();
    emit_module(module, &mut recorder)?;
    Ok(recorder.lines)
}

macro_rules! lines {
    ($($line:expr),* $(,)*) => {
        vec![$($line.to_string()),*]
    };
}

#[test]
fn if_else_emission_order() {
    // (i32.const 1) if (nop) else (unreachable) end end
    let module = module_with(void(), &[0x00, 0x41, 0x01, 0x04, 0x40, 0x01, 0x05, 0x00, 0x0b, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines![
            "func 0 ()",
            "ldc 1",
            "brfalse L1",
            "br L0",
            "L1:",
            "trap",
            "L0:",
            "ret",
            "endfunc",
        ]
    );
}

#[test]
fn if_without_else_falls_through_to_its_end() {
    let module = module_with(void(), &[0x00, 0x41, 0x00, 0x04, 0x40, 0x01, 0x0b, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines!["func 0 ()", "ldc 0", "brfalse L0", "L0:", "ret", "endfunc"]
    );
}

#[test]
fn br_zero_targets_its_own_block_end() {
    // block block br 0 end end end
    let module = module_with(void(), &[0x00, 0x02, 0x40, 0x02, 0x40, 0x0c, 0x00, 0x0b, 0x0b, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines!["func 0 ()", "br L1", "L1:", "L0:", "ret", "endfunc"]
    );
}

#[test]
fn br_one_targets_the_outer_block() {
    let module = module_with(void(), &[0x00, 0x02, 0x40, 0x02, 0x40, 0x0c, 0x01, 0x0b, 0x0b, 0x0b]);
    assert_eq!(emit_lines(&module).unwrap()[1], "br L0");
}

#[test]
fn loops_branch_backwards() {
    // loop (i32.const 1) br_if 0 end end
    let module = module_with(void(), &[0x00, 0x03, 0x40, 0x41, 0x01, 0x0d, 0x00, 0x0b, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines!["func 0 ()", "L0:", "ldc 1", "brtrue L0", "ret", "endfunc"]
    );
}

#[test]
fn branch_out_of_an_else_arm_lands_after_the_if() {
    // i32.const 0 if else br 0 end end
    let module = module_with(void(), &[0x00, 0x41, 0x00, 0x04, 0x40, 0x05, 0x0c, 0x00, 0x0b, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines!["func 0 ()", "ldc 0", "brfalse L1", "br L0", "L1:", "br L0", "L0:", "ret", "endfunc"]
    );
}

#[test]
fn br_table_lowers_to_a_switch() {
    // block block (i32.const 0) br_table 0 1 1 end end end
    let module = module_with(
        void(),
        &[0x00, 0x02, 0x40, 0x02, 0x40, 0x41, 0x00, 0x0e, 0x02, 0x00, 0x01, 0x01, 0x0b, 0x0b, 0x0b],
    );
    assert_eq!(emit_lines(&module).unwrap()[2], "switch [1, 0] L0");
}

#[test]
fn locals_follow_params() {
    let signature = FunctionType {
        params: vec![ValueType::I32],
        results: vec![ValueType::I32],
    };
    // local i64; get_local 0; get_local 1; tee_local 1; drop; end
    let module = module_with(signature, &[0x01, 0x01, 0x7e, 0x20, 0x00, 0x20, 0x01, 0x22, 0x01, 0x1a, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines![
            "func 0 (i32) -> i32",
            "local i64",
            "ldarg 0",
            "ldloc 0",
            "stloc 0",
            "ldloc 0",
            "pop",
            "ret",
            "endfunc",
        ]
    );
}

#[test]
fn local_index_out_of_range() {
    let module = module_with(void(), &[0x00, 0x20, 0x00, 0x0b]);
    assert_eq!(
        emit_lines(&module),
        Err(EmitError::LocalIndexOutOfRange { function: 0, index: 0, count: 0 })
    );
}

#[test]
fn immutable_globals_cannot_be_set() {
    let mut module = module_with(void(), &[0x00, 0x41, 0x05, 0x24, 0x00, 0x0b]);
    module.globals.push(Global {
        constraints: GlobalType { content_type: ValueType::I32, mutable: false },
        value: InitExpression::I32Const(0),
    });
    assert_eq!(
        emit_lines(&module),
        Err(EmitError::ImmutableGlobal { function: 0, index: 0 })
    );
}

#[test]
fn memory_access_carries_the_static_offset() {
    // i32.const 0; i32.load offset=16; drop; end
    let module = module_with(void(), &[0x00, 0x41, 0x00, 0x28, 0x02, 0x10, 0x1a, 0x0b]);
    assert_eq!(emit_lines(&module).unwrap()[2], "call Load32BitAsSigned32 +16");
}

#[test]
fn comparisons_lower_to_compare_sequences() {
    // get_local 0; get_local 1; i32.ge_u; end
    let signature = FunctionType {
        params: vec![ValueType::I32, ValueType::I32],
        results: vec![ValueType::I32],
    };
    let module = module_with(signature, &[0x00, 0x20, 0x00, 0x20, 0x01, 0x4f, 0x0b]);
    assert_eq!(
        emit_lines(&module).unwrap()[3..6].to_vec(),
        lines!["clt.un", "ldc 0", "ceq"]
    );
}

#[test]
fn calls_need_a_known_callee() {
    let module = module_with(void(), &[0x00, 0x10, 0x03, 0x0b]);
    assert_eq!(
        emit_lines(&module),
        Err(EmitError::FunctionIndexOutOfRange { function: 0, index: 3 })
    );
}

#[test]
fn function_and_code_counts_must_agree() {
    let mut module = module_with(void(), &[0x00, 0x0b]);
    module.functions.push(0);
    assert_eq!(
        emit_lines(&module),
        Err(EmitError::FunctionCountMismatch { declared: 2, bodies: 1 })
    );
}

#[test]
fn taken_branch_discards_values_left_in_a_loop() {
    // loop (i32.const 99) (tee_local 0 (i32.sub (get_local 0) (i32.const 1))) br_if 0 drop end (i32.const 7) end
    let signature = FunctionType {
        params: vec![ValueType::I32],
        results: vec![ValueType::I32],
    };
    let module = module_with(
        signature,
        &[
            0x00, 0x03, 0x40, 0x41, 0xe3, 0x00, 0x20, 0x00, 0x41, 0x01, 0x6b, 0x22, 0x00, 0x0d, 0x00, 0x1a, 0x0b,
            0x41, 0x07, 0x0b,
        ],
    );
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines![
            "func 0 (i32) -> i32",
            "L0:",
            "ldc 99",
            "ldarg 0",
            "ldc 1",
            "sub",
            "starg 0",
            "ldarg 0",
            "brfalse L1",
            "unwind 1 keep 0",
            "br L0",
            "L1:",
            "pop",
            "ldc 7",
            "ret",
            "endfunc",
        ]
    );
}

#[test]
fn branch_keeps_the_block_result() {
    // block (result i32) (i32.const 1) (i32.const 2) br 0 end drop end
    let module = module_with(
        void(),
        &[0x00, 0x02, 0x7f, 0x41, 0x01, 0x41, 0x02, 0x0c, 0x00, 0x0b, 0x1a, 0x0b],
    );
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines!["func 0 ()", "ldc 1", "ldc 2", "unwind 1 keep 1", "br L0", "L0:", "pop", "ret", "endfunc"]
    );
}

#[test]
fn br_table_targets_at_different_depths_get_landing_pads() {
    // block (i32.const 5) block (i32.const 6) (i32.const 0) br_table 0 1 end drop end end
    let module = module_with(
        void(),
        &[
            0x00, 0x02, 0x40, 0x41, 0x05, 0x02, 0x40, 0x41, 0x06, 0x41, 0x00, 0x0e, 0x01, 0x00, 0x01, 0x0b, 0x1a,
            0x0b, 0x0b,
        ],
    );
    assert_eq!(
        emit_lines(&module).unwrap(),
        lines![
            "func 0 ()",
            "ldc 5",
            "ldc 6",
            "ldc 0",
            "switch [2] L3",
            "L2:",
            "unwind 1 keep 0",
            "br L1",
            "L3:",
            "unwind 2 keep 0",
            "br L0",
            "L1:",
            "pop",
            "L0:",
            "ret",
            "endfunc",
        ]
    );
}
