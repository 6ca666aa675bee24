// ABOUTME: Target-dispatched code generation entry point

pub mod c;
pub mod x86;

use crate::config::Target;
use crate::diagnostics::Diagnostic;
use crate::ir::IrProgram;

/// Splits a function-free instruction stream into `(name, body)` groups
/// bounded by `FUNC_BEGIN`/`FUNC_END`, shared by both backends. Any
/// instructions outside a function body are top-level statements the
/// grammar permits but neither backend emits (see DESIGN.md).
pub(crate) fn function_groups(
    ir: &IrProgram,
) -> Vec<(String, Vec<crate::ir::Instruction>)> {
    let mut groups = Vec::new();
    let mut current: Option<(String, Vec<crate::ir::Instruction>)> = None;

    for instr in &ir.instructions {
        match instr.op {
            crate::ir::Op::FuncBegin => {
                let name = instr.arg1.clone().expect("FUNC_BEGIN has a name");
                current = Some((name, Vec::new()));
            }
            crate::ir::Op::FuncEnd => {
                if let Some(group) = current.take() {
                    groups.push(group);
                }
            }
            _ => {
                if let Some((_, body)) = current.as_mut() {
                    body.push(instr.clone());
                }
            }
        }
    }
    groups
}

pub fn generate(ir: &IrProgram, target: Target) -> Result<String, Vec<Diagnostic>> {
    match target {
        Target::C => c::generate(ir),
        Target::X86 => x86::generate(ir),
    }
}
