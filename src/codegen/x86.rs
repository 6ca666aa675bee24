// ABOUTME: IR -> x86-64 NASM (System V AMD64) code generator

use std::collections::{BTreeSet, HashMap};

use crate::diagnostics::{Diagnostic, Phase};
use crate::ir::{is_temp, Instruction, IrProgram, Op};

use super::function_groups;

const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

/// Per-function scratch state: temporaries get a stack slot lazily
/// allocated in multiples of 8 bytes, growing only — there is no real
/// register allocator, just this fixed layout.
struct FrameLayout {
    offsets: HashMap<String, i32>,
    next_offset: i32,
}

impl FrameLayout {
    fn new() -> Self {
        FrameLayout {
            offsets: HashMap::new(),
            next_offset: 0,
        }
    }

    fn offset_of(&mut self, temp: &str) -> i32 {
        if let Some(o) = self.offsets.get(temp) {
            return *o;
        }
        self.next_offset += 8;
        self.offsets.insert(temp.to_string(), self.next_offset);
        self.next_offset
    }
}

fn str_label(handle: &str) -> String {
    format!("str{}", handle.trim_start_matches("STR"))
}

/// Converts an interned raw-quoted lexeme into a NASM `db` operand list:
/// `\n`/`\t` escapes split the string into quoted chunks spliced with their
/// numeric byte values.
fn nasm_string_body(raw: &str) -> String {
    let inner = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(raw);
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => {
                    parts.push(format!("\"{}\"", current));
                    current.clear();
                    parts.push("10".to_string());
                }
                Some('t') => {
                    parts.push(format!("\"{}\"", current));
                    current.clear();
                    parts.push("9".to_string());
                }
                Some('"') => current.push('"'),
                Some('\\') => current.push('\\'),
                Some(other) => current.push(other),
                None => {}
            }
        } else {
            current.push(c);
        }
    }
    parts.push(format!("\"{}\"", current));
    parts.retain(|p| p != "\"\"");
    parts.join(", ")
}

fn is_numeric_literal(s: &str) -> bool {
    !s.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
}

/// Maps an IR operand to its x86 addressing form.
fn operand(name: &str, frame: &mut FrameLayout) -> String {
    if is_numeric_literal(name) {
        name.to_string()
    } else if name.starts_with("STR") && name[3..].chars().all(|c| c.is_ascii_digit()) {
        str_label(name)
    } else if is_temp(name) {
        format!("qword [rbp-{}]", frame.offset_of(name))
    } else {
        format!("qword [{}]", name)
    }
}

pub fn generate(ir: &IrProgram) -> Result<String, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    let mut out = String::new();

    out.push_str("bits 64\ndefault rel\n\n");
    out.push_str("extern printf\nextern scanf\nextern exit\n\n");

    out.push_str("section .data\n");
    out.push_str("fmt_int: db \"%d\", 0\n");
    out.push_str("fmt_str: db \"%s\", 0\n");
    for (handle, raw) in ir.strings.iter() {
        out.push_str(&format!("{}: db {}, 0\n", str_label(&handle), nasm_string_body(raw)));
    }
    out.push('\n');

    out.push_str("section .bss\n");
    let mut bss_vars: BTreeSet<&str> = BTreeSet::new();
    for name in ir.var_types.keys() {
        if !name.starts_with("fn_return:") {
            bss_vars.insert(name.as_str());
        }
    }
    for name in &bss_vars {
        out.push_str(&format!("{}: resq 1\n", name));
    }
    out.push('\n');

    out.push_str("section .text\nglobal main\n\n");

    for (name, body) in function_groups(ir) {
        emit_function(&mut out, ir, &name, &body, &mut diagnostics);
    }

    if diagnostics.is_empty() {
        Ok(out)
    } else {
        Err(diagnostics)
    }
}

fn emit_function(
    out: &mut String,
    ir: &IrProgram,
    name: &str,
    body: &[Instruction],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut frame = FrameLayout::new();

    out.push_str(&format!("{}:\n", name));
    out.push_str("    push rbp\n    mov rbp, rsp\n    sub rsp, 256\n");

    // System V passes the first six integer arguments in registers; spill
    // each into its parameter's memory slot before the body runs, in
    // declaration order (PARAM_DECLARE order matches the call-site PARAM
    // order per spec.md's IR invariants).
    let mut param_index = 0usize;
    for instr in body {
        if instr.op == Op::ParamDeclare {
            if let Some(reg) = ARG_REGS.get(param_index) {
                let dest = operand(instr.result.as_deref().unwrap_or_default(), &mut frame);
                out.push_str(&format!("    mov {}, {}\n", dest, reg));
            }
            param_index += 1;
        }
    }

    let mut pending_args: Vec<String> = Vec::new();
    for instr in body {
        match instr.op {
            Op::ParamDeclare | Op::Declare => {}
            Op::Label => out.push_str(&format!("{}:\n", instr.label.as_deref().unwrap_or_default())),
            Op::Goto => out.push_str(&format!("    jmp {}\n", instr.label.as_deref().unwrap_or_default())),
            Op::IfFalse | Op::IfTrue => {
                let cond = operand(instr.arg1.as_deref().unwrap_or_default(), &mut frame);
                let target = instr.label.as_deref().unwrap_or_default();
                out.push_str(&format!("    mov rax, {}\n    cmp rax, 0\n", cond));
                if instr.op == Op::IfFalse {
                    out.push_str(&format!("    je {}\n", target));
                } else {
                    out.push_str(&format!("    jne {}\n", target));
                }
            }
            Op::Param => {
                pending_args.push(instr.arg1.clone().unwrap_or_default());
            }
            Op::Call => {
                let callee = instr.arg1.clone().unwrap_or_default();
                let args = std::mem::take(&mut pending_args);
                if args.len() > ARG_REGS.len() {
                    diagnostics.push(Diagnostic::new(
                        Phase::CodeGen,
                        format!(
                            "call to '{}' passes {} arguments, exceeding the six-register x86-64 limit",
                            callee,
                            args.len()
                        ),
                    ));
                    continue;
                }
                for (reg, arg) in ARG_REGS.iter().zip(args.iter()) {
                    if arg.starts_with("STR") && arg[3..].chars().all(|c| c.is_ascii_digit()) {
                        out.push_str(&format!("    lea {}, [{}]\n", reg, str_label(arg)));
                    } else {
                        let src = operand(arg, &mut frame);
                        out.push_str(&format!("    mov {}, {}\n", reg, src));
                    }
                }
                out.push_str("    xor rax, rax\n");
                out.push_str(&format!("    call {}\n", callee));
                if let Some(dest) = &instr.result {
                    let dest_operand = operand(dest, &mut frame);
                    out.push_str(&format!("    mov {}, rax\n", dest_operand));
                }
            }
            Op::Return => {
                if let Some(v) = &instr.arg1 {
                    let src = operand(v, &mut frame);
                    out.push_str(&format!("    mov rax, {}\n", src));
                }
                out.push_str("    mov rsp, rbp\n    pop rbp\n    ret\n");
            }
            Op::Assign => {
                let value = instr.arg1.clone().unwrap_or_default();
                let dest = operand(instr.result.as_deref().unwrap_or_default(), &mut frame);
                if value.starts_with("STR") && value[3..].chars().all(|c| c.is_ascii_digit()) {
                    out.push_str(&format!("    lea rax, [{}]\n    mov {}, rax\n", str_label(&value), dest));
                } else {
                    let src = operand(&value, &mut frame);
                    out.push_str(&format!("    mov rax, {}\n    mov {}, rax\n", src, dest));
                }
            }
            Op::Not => {
                let a = operand(instr.arg1.as_deref().unwrap_or_default(), &mut frame);
                let dest = operand(instr.result.as_deref().unwrap_or_default(), &mut frame);
                out.push_str(&format!(
                    "    mov rax, {}\n    cmp rax, 0\n    sete al\n    movzx rax, al\n    mov {}, rax\n",
                    a, dest
                ));
            }
            op if op.is_arithmetic() => emit_arithmetic(out, op, instr, &mut frame),
            op if op.is_comparison() => emit_comparison(out, op, instr, &mut frame),
            op if op.is_logical() => emit_logical(out, op, instr, &mut frame),
            _ => {}
        }
    }
}

fn emit_arithmetic(out: &mut String, op: Op, instr: &Instruction, frame: &mut FrameLayout) {
    let a = operand(instr.arg1.as_deref().unwrap_or_default(), frame);
    let b = operand(instr.arg2.as_deref().unwrap_or_default(), frame);
    let dest = operand(instr.result.as_deref().unwrap_or_default(), frame);

    match op {
        Op::Div | Op::Mod => {
            out.push_str(&format!(
                "    mov rax, {}\n    cqo\n    mov rbx, {}\n    idiv rbx\n",
                a, b
            ));
            let result_reg = if op == Op::Div { "rax" } else { "rdx" };
            out.push_str(&format!("    mov {}, {}\n", dest, result_reg));
        }
        _ => {
            let mnemonic = match op {
                Op::Add => "add",
                Op::Sub => "sub",
                Op::Mul => "imul",
                _ => unreachable!(),
            };
            out.push_str(&format!(
                "    mov rax, {}\n    {} rax, {}\n    mov {}, rax\n",
                a, mnemonic, b, dest
            ));
        }
    }
}

fn emit_comparison(out: &mut String, op: Op, instr: &Instruction, frame: &mut FrameLayout) {
    let a = operand(instr.arg1.as_deref().unwrap_or_default(), frame);
    let b = operand(instr.arg2.as_deref().unwrap_or_default(), frame);
    let dest = operand(instr.result.as_deref().unwrap_or_default(), frame);
    let cc = match op {
        Op::Eq => "e",
        Op::Ne => "ne",
        Op::Lt => "l",
        Op::Gt => "g",
        Op::Le => "le",
        Op::Ge => "ge",
        _ => unreachable!(),
    };
    out.push_str(&format!(
        "    mov rax, {}\n    mov rbx, {}\n    cmp rax, rbx\n    set{} al\n    movzx rax, al\n    mov {}, rax\n",
        a, b, cc, dest
    ));
}

fn emit_logical(out: &mut String, op: Op, instr: &Instruction, frame: &mut FrameLayout) {
    let a = operand(instr.arg1.as_deref().unwrap_or_default(), frame);
    let b = operand(instr.arg2.as_deref().unwrap_or_default(), frame);
    let dest = operand(instr.result.as_deref().unwrap_or_default(), frame);
    let mnemonic = if op == Op::And { "and" } else { "or" };
    out.push_str(&format!(
        "    mov rax, {}\n    cmp rax, 0\n    setne al\n    movzx rax, al\n    mov rcx, rax\n",
        a
    ));
    out.push_str(&format!(
        "    mov rax, {}\n    cmp rax, 0\n    setne al\n    movzx rax, al\n    {} rax, rcx\n    mov {}, rax\n",
        b, mnemonic, dest
    ));
}
