// ABOUTME: IR -> portable C source code generator

use std::collections::BTreeSet;

use crate::diagnostics::Diagnostic;
use crate::ir::{function_return_key, is_temp, Instruction, IrProgram, Op};

use super::function_groups;

fn op_symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Mod => "%",
        Op::Eq => "==",
        Op::Ne => "!=",
        Op::Lt => "<",
        Op::Gt => ">",
        Op::Le => "<=",
        Op::Ge => ">=",
        Op::And => "&&",
        Op::Or => "||",
        _ => unreachable!("op_symbol called on a non-binary opcode"),
    }
}

/// Substitutes a `STR<n>` operand with its interned raw-quoted lexeme; any
/// other operand (variable, temp, numeric literal) passes through verbatim.
fn resolve(operand: &str, ir: &IrProgram) -> String {
    ir.strings.get(operand).map(|s| s.to_string()).unwrap_or_else(|| operand.to_string())
}

/// A `void`-returning call must be emitted as a bare statement, not an
/// assignment — C has no value to bind. Declared Mini-C functions carry
/// their return type under `fn_return:<name>` in `var_types`; the seeded
/// stdlib symbol `free` is the one built-in that returns `void`.
fn callee_returns_void(ir: &IrProgram, callee: &str) -> bool {
    match ir.var_types.get(&function_return_key(callee)) {
        Some(ty) => ty == "void",
        None => callee == "free",
    }
}

pub fn generate(ir: &IrProgram) -> Result<String, Vec<Diagnostic>> {
    let mut out = String::new();
    out.push_str("#include <stdio.h>\n#include <stdlib.h>\n\n");

    for (name, body) in function_groups(ir) {
        emit_function(&mut out, ir, &name, &body);
    }

    Ok(out)
}

fn emit_function(out: &mut String, ir: &IrProgram, name: &str, body: &[Instruction]) {
    let return_type = ir
        .var_types
        .get(&function_return_key(name))
        .cloned()
        .unwrap_or_else(|| "int".to_string());

    let mut params: Vec<(String, String)> = Vec::new();
    let mut locals: Vec<(String, String)> = Vec::new();
    let mut seen_locals: BTreeSet<String> = BTreeSet::new();
    let mut temps: BTreeSet<String> = BTreeSet::new();
    let mut param_names: BTreeSet<String> = BTreeSet::new();

    for instr in body {
        match instr.op {
            Op::ParamDeclare => {
                let ty = instr.arg1.clone().unwrap_or_default();
                let n = instr.result.clone().unwrap_or_default();
                param_names.insert(n.clone());
                params.push((ty, n));
            }
            Op::Declare => {
                let ty = instr.arg1.clone().unwrap_or_default();
                let n = instr.result.clone().unwrap_or_default();
                if seen_locals.insert(n.clone()) {
                    locals.push((ty, n));
                }
            }
            _ => {}
        }
    }

    for instr in body {
        for operand in [&instr.arg1, &instr.arg2, &instr.result] {
            if let Some(name) = operand {
                if is_temp(name) && !param_names.contains(name) && !seen_locals.contains(name) {
                    temps.insert(name.clone());
                }
            }
        }
    }

    let sig_params = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|(ty, n)| format!("{} {}", ty, n))
            .collect::<Vec<_>>()
            .join(", ")
    };
    out.push_str(&format!("{} {}({}) {{\n", return_type, name, sig_params));

    for (ty, n) in &locals {
        out.push_str(&format!("    {} {};\n", ty, n));
    }
    for t in &temps {
        out.push_str(&format!("    int {};\n", t));
    }

    let mut pending_args: Vec<String> = Vec::new();
    for instr in body {
        match instr.op {
            Op::ParamDeclare | Op::Declare => {}
            Op::Label => {
                out.push_str(&format!("{}:;\n", instr.label.as_deref().unwrap_or_default()));
            }
            Op::Goto => {
                out.push_str(&format!("    goto {};\n", instr.label.as_deref().unwrap_or_default()));
            }
            Op::IfFalse => {
                let cond = resolve(instr.arg1.as_deref().unwrap_or_default(), ir);
                out.push_str(&format!(
                    "    if (!({})) goto {};\n",
                    cond,
                    instr.label.as_deref().unwrap_or_default()
                ));
            }
            Op::IfTrue => {
                let cond = resolve(instr.arg1.as_deref().unwrap_or_default(), ir);
                out.push_str(&format!(
                    "    if ({}) goto {};\n",
                    cond,
                    instr.label.as_deref().unwrap_or_default()
                ));
            }
            Op::Param => {
                pending_args.push(resolve(instr.arg1.as_deref().unwrap_or_default(), ir));
            }
            Op::Call => {
                let callee = instr.arg1.clone().unwrap_or_default();
                let dest = instr.result.clone().unwrap_or_default();
                let args = pending_args.join(", ");
                pending_args.clear();
                if callee_returns_void(ir, &callee) {
                    out.push_str(&format!("    {}({});\n", callee, args));
                } else {
                    out.push_str(&format!("    {} = {}({});\n", dest, callee, args));
                }
            }
            Op::Return => match &instr.arg1 {
                Some(v) => out.push_str(&format!("    return {};\n", resolve(v, ir))),
                None => out.push_str("    return;\n"),
            },
            Op::Assign => {
                let value = resolve(instr.arg1.as_deref().unwrap_or_default(), ir);
                let dest = instr.result.as_deref().unwrap_or_default();
                out.push_str(&format!("    {} = {};\n", dest, value));
            }
            Op::Not => {
                let a = resolve(instr.arg1.as_deref().unwrap_or_default(), ir);
                let dest = instr.result.as_deref().unwrap_or_default();
                out.push_str(&format!("    {} = !{};\n", dest, a));
            }
            _ if instr.op.is_arithmetic() || instr.op.is_comparison() || instr.op.is_logical() => {
                let a = resolve(instr.arg1.as_deref().unwrap_or_default(), ir);
                let b = resolve(instr.arg2.as_deref().unwrap_or_default(), ir);
                let dest = instr.result.as_deref().unwrap_or_default();
                out.push_str(&format!("    {} = {} {} {};\n", dest, a, op_symbol(instr.op), b));
            }
            _ => {}
        }
    }

    out.push_str("}\n\n");
}
