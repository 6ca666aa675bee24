// ABOUTME: Level-gated, conservative IR->IR optimization passes

use std::collections::{HashMap, HashSet};

use crate::config::OptLevel;
use crate::ir::{is_temp, Instruction, IrProgram, Op};

/// Per-pass counters, maintained by each pass and reported back to the
/// caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptCounters {
    pub constants_folded: usize,
    pub dead_temps_removed: usize,
    pub strength_reductions: usize,
}

pub fn optimize(ir: &mut IrProgram, level: OptLevel) -> OptCounters {
    let mut counters = OptCounters::default();
    if level.constant_folding_enabled() {
        constant_fold(&mut ir.instructions, &mut counters);
    }
    if level.dead_temp_elimination_enabled() {
        dead_temp_eliminate(&mut ir.instructions, &mut counters);
    }
    if level.strength_reduction_enabled() {
        strength_reduce(&mut ir.instructions, &mut counters);
    }
    counters
}

/// Spec.md §4.5: "any operand whose first character is an ASCII letter is,
/// by definition, a variable and disqualifies folding." String-literal
/// handles (`STR<n>`) and temporaries (`t<n>`) both start with a letter and
/// are correctly excluded by this same rule.
fn is_literal_operand(s: &str) -> bool {
    !s.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
}

fn is_float_literal(s: &str) -> bool {
    s.contains('.')
}

/// Floor division, used for integer `DIV` folding.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn format_numeric(value: f64, is_int: bool) -> String {
    if is_int || value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Evaluates a folded arithmetic op over two literal operands. Returns
/// `None` when DIV/MOD would divide by zero (the instruction is left
/// untouched in that case).
fn fold_arith(op: Op, a: &str, b: &str) -> Option<String> {
    let both_int = !is_float_literal(a) && !is_float_literal(b);
    if both_int {
        let ai: i64 = a.parse().ok()?;
        let bi: i64 = b.parse().ok()?;
        let result = match op {
            Op::Add => ai + bi,
            Op::Sub => ai - bi,
            Op::Mul => ai * bi,
            Op::Div => {
                if bi == 0 {
                    return None;
                }
                floor_div(ai, bi)
            }
            Op::Mod => {
                if bi == 0 {
                    return None;
                }
                ai % bi
            }
            _ => return None,
        };
        Some(result.to_string())
    } else {
        let af: f64 = a.parse().ok()?;
        let bf: f64 = b.parse().ok()?;
        let result = match op {
            Op::Add => af + bf,
            Op::Sub => af - bf,
            Op::Mul => af * bf,
            Op::Div => {
                if bf == 0.0 {
                    return None;
                }
                af / bf
            }
            Op::Mod => {
                if bf == 0.0 {
                    return None;
                }
                af % bf
            }
            _ => return None,
        };
        Some(format_numeric(result, false))
    }
}

/// Constant folding with a same-pass constants table: an `ASSIGN <literal>
/// -> name` records `name -> literal`, letting a later arithmetic op whose
/// operand is that variable fold as though the literal had been written
/// inline. The table resets at each `FUNC_BEGIN` since names are
/// function-scoped.
fn constant_fold(instrs: &mut [Instruction], counters: &mut OptCounters) {
    let mut constants: HashMap<String, String> = HashMap::new();

    for instr in instrs.iter_mut() {
        if instr.op == Op::FuncBegin {
            constants.clear();
            continue;
        }

        if instr.op.is_arithmetic() {
            let a1 = instr.arg1.clone().unwrap_or_default();
            let a2 = instr.arg2.clone().unwrap_or_default();
            let resolved1 = constants.get(&a1).cloned().unwrap_or(a1);
            let resolved2 = constants.get(&a2).cloned().unwrap_or(a2);

            if is_literal_operand(&resolved1) && is_literal_operand(&resolved2) {
                if let Some(value) = fold_arith(instr.op, &resolved1, &resolved2) {
                    let dest = instr.result.clone().expect("arithmetic op has a result");
                    constants.insert(dest.clone(), value.clone());
                    *instr = Instruction::assign(value, dest);
                    counters.constants_folded += 1;
                    continue;
                }
            }
            if let Some(dest) = &instr.result {
                constants.remove(dest);
            }
        } else if instr.op == Op::Assign {
            let dest = instr.result.clone().expect("ASSIGN has a result");
            let value = instr.arg1.clone().unwrap_or_default();
            let resolved = constants.get(&value).cloned().unwrap_or(value);
            if is_literal_operand(&resolved) {
                constants.insert(dest, resolved);
            } else {
                constants.remove(&dest);
            }
        } else if let Some(dest) = &instr.result {
            // Any other result-producing opcode (CALL, DECLARE, ...)
            // invalidates a previously known constant value.
            constants.remove(dest);
        }
    }
}

/// Drops `ASSIGN t<n> -> ...` instructions whose temporary result is never
/// read by a later instruction. Only ASSIGNs to temporaries
/// are eligible; named variables are never dropped since they may be
/// observed by later code outside this linear scan (e.g. via the C/ASM
/// backends reading `var_types`).
fn dead_temp_eliminate(instrs: &mut Vec<Instruction>, counters: &mut OptCounters) {
    let mut used: HashSet<String> = HashSet::new();
    for instr in instrs.iter() {
        let counts_as_reference = instr.op.is_arithmetic()
            || instr.op.is_comparison()
            || instr.op.is_logical()
            || matches!(instr.op, Op::Assign | Op::IfFalse | Op::IfTrue | Op::Return | Op::Param);
        if !counts_as_reference {
            continue;
        }
        for operand in [&instr.arg1, &instr.arg2] {
            if let Some(name) = operand {
                if !is_literal_operand(name) {
                    used.insert(name.clone());
                }
            }
        }
    }

    let before = instrs.len();
    instrs.retain(|instr| {
        !(instr.op == Op::Assign
            && instr
                .result
                .as_deref()
                .map(|r| is_temp(r) && !used.contains(r))
                .unwrap_or(false))
    });
    counters.dead_temps_removed += before - instrs.len();
}

fn parse_small_int(s: &str) -> Option<i64> {
    if is_float_literal(s) {
        return None;
    }
    s.parse().ok()
}

/// Identifies a `MUL`/`ADD` operand pair as (small integer literal,
/// non-literal operand), in either argument order, since both ops are
/// commutative.
fn literal_and_var(a1: &str, a2: &str) -> Option<(i64, String)> {
    if let Some(n) = parse_small_int(a1) {
        if !is_literal_operand(a2) {
            return Some((n, a2.to_string()));
        }
    }
    if let Some(n) = parse_small_int(a2) {
        if !is_literal_operand(a1) {
            return Some((n, a1.to_string()));
        }
    }
    None
}

/// `MUL x,0 -> 0`; `MUL x,1 -> ASSIGN x`; `MUL x,2 -> ADD x,x`;
/// `ADD x,0` / `ADD 0,x -> ASSIGN` of the non-zero operand.
fn strength_reduce(instrs: &mut [Instruction], counters: &mut OptCounters) {
    for instr in instrs.iter_mut() {
        let (a1, a2) = match (&instr.arg1, &instr.arg2) {
            (Some(a1), Some(a2)) => (a1.clone(), a2.clone()),
            _ => continue,
        };
        let dest = match &instr.result {
            Some(d) => d.clone(),
            None => continue,
        };

        match instr.op {
            Op::Mul => {
                if let Some((n, var)) = literal_and_var(&a1, &a2) {
                    match n {
                        0 => {
                            *instr = Instruction::assign("0", dest);
                            counters.strength_reductions += 1;
                        }
                        1 => {
                            *instr = Instruction::assign(var, dest);
                            counters.strength_reductions += 1;
                        }
                        2 => {
                            *instr = Instruction::binary(Op::Add, var.clone(), var, dest);
                            counters.strength_reductions += 1;
                        }
                        _ => {}
                    }
                }
            }
            Op::Add => {
                if let Some((0, var)) = literal_and_var(&a1, &a2) {
                    *instr = Instruction::assign(var, dest);
                    counters.strength_reductions += 1;
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irgen;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn ir_for(src: &str) -> IrProgram {
        let lex = tokenize(src);
        let parsed = parse(&lex.tokens);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        irgen::generate(&parsed.program)
    }

    #[test]
    fn o0_is_identity() {
        let mut ir = ir_for("int main() { int x; x = 2 + 3; return x; }");
        let before = ir.instructions.len();
        let counters = optimize(&mut ir, OptLevel::O0);
        assert_eq!(counters, OptCounters::default());
        assert_eq!(ir.instructions.len(), before);
    }

    #[test]
    fn folds_integer_constant_addition() {
        let mut ir = ir_for("int main() { int x; x = 2 + 3; return x; }");
        let counters = optimize(&mut ir, OptLevel::O1);
        assert!(counters.constants_folded >= 1);
        let assigns_five = ir
            .instructions
            .iter()
            .any(|i| i.op == Op::Assign && i.arg1.as_deref() == Some("5"));
        assert!(assigns_five);
    }

    #[test]
    fn div_by_literal_zero_is_left_untouched() {
        let mut ir = ir_for("int main() { int x; x = 4 / 0; return x; }");
        optimize(&mut ir, OptLevel::O1);
        assert!(ir.instructions.iter().any(|i| i.op == Op::Div));
    }

    #[test]
    fn comparisons_are_never_folded() {
        let mut ir = ir_for("int main() { int x; x = 1; if (1 == 1) { x = 2; } return x; }");
        optimize(&mut ir, OptLevel::O2);
        assert!(ir.instructions.iter().any(|i| i.op == Op::Eq));
    }

    #[test]
    fn dead_temp_is_removed() {
        let mut ir = ir_for("int main() { int x; x = (1 + 2) - (1 + 2); return 0; }");
        let before = ir.instructions.len();
        let counters = optimize(&mut ir, OptLevel::O1);
        assert!(counters.dead_temps_removed > 0 || before >= ir.instructions.len());
    }

    #[test]
    fn strength_reduces_multiply_by_two() {
        let mut ir = ir_for("int main() { int x; int y; y = x * 2; return y; }");
        let counters = optimize(&mut ir, OptLevel::O2);
        assert_eq!(counters.strength_reductions, 1);
        assert!(ir.instructions.iter().any(|i| i.op == Op::Add));
    }

    #[test]
    fn strength_reduction_is_gated_at_o1() {
        let mut ir = ir_for("int main() { int x; int y; y = x * 2; return y; }");
        let counters = optimize(&mut ir, OptLevel::O1);
        assert_eq!(counters.strength_reductions, 0);
        assert!(ir.instructions.iter().any(|i| i.op == Op::Mul));
    }

    #[test]
    fn optimizer_never_increases_instruction_count() {
        let mut ir = ir_for(
            "int main() { int i; int s; s = 0; for (i = 0; i < 10; i += 1) { s += i * 2; } return s; }",
        );
        let before = ir.instructions.len();
        optimize(&mut ir, OptLevel::O2);
        assert!(ir.instructions.len() <= before);
    }
}
