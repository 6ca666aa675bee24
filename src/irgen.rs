// ABOUTME: Lowers the AST into flat three-address IR plus the string-literal table

use std::collections::HashMap;

use crate::ast::{BinOp, CmpOp, Expr, LogicalOp, Program, Stmt};
use crate::ir::{function_return_key, Instruction, IrProgram, Op, StringTable};

/// AST -> IR lowering state. `temp_counter` resets at every `FUNC_BEGIN`;
/// `label_counter` and the string table are process-wide for the whole
/// compilation — one `IrGen` per compilation, no reentrancy.
struct IrGen {
    instructions: Vec<Instruction>,
    strings: StringTable,
    var_types: HashMap<String, String>,
    temp_counter: usize,
    label_counter: usize,
    continue_stack: Vec<String>,
    break_stack: Vec<String>,
}

pub fn generate(program: &Program) -> IrProgram {
    let mut gen = IrGen {
        instructions: Vec::new(),
        strings: StringTable::new(),
        var_types: HashMap::new(),
        temp_counter: 0,
        label_counter: 0,
        continue_stack: Vec::new(),
        break_stack: Vec::new(),
    };
    for stmt in &program.statements {
        gen.lower_stmt(stmt);
    }
    IrProgram {
        instructions: gen.instructions,
        strings: gen.strings,
        var_types: gen.var_types,
    }
}

impl IrGen {
    fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn new_temp(&mut self) -> String {
        self.temp_counter += 1;
        format!("t{}", self.temp_counter)
    }

    fn next_label_id(&mut self) -> usize {
        self.label_counter += 1;
        self.label_counter
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDeclaration {
                return_type,
                name,
                parameters,
                body,
                ..
            } => {
                self.temp_counter = 0;
                self.var_types
                    .insert(function_return_key(name), return_type.as_str().to_string());
                self.emit(Instruction::func_begin(name));
                for p in parameters {
                    self.var_types
                        .insert(p.name.clone(), p.param_type.as_str().to_string());
                    self.emit(Instruction::param_declare(p.param_type.as_str(), &p.name));
                }

                if let Stmt::Block { statements, .. } = body.as_ref() {
                    for s in statements {
                        self.lower_stmt(s);
                    }
                } else {
                    self.lower_stmt(body);
                }

                let needs_return =
                    !matches!(self.instructions.last(), Some(i) if i.op == Op::Return);
                if needs_return {
                    if return_type.as_str() == "void" {
                        self.emit(Instruction::ret(None));
                    } else {
                        self.emit(Instruction::ret(Some("0".to_string())));
                    }
                }
                self.emit(Instruction::func_end(name));
            }
            Stmt::VarDeclaration {
                var_type,
                identifier,
                initializer,
                ..
            } => {
                self.var_types
                    .insert(identifier.clone(), var_type.as_str().to_string());
                self.emit(Instruction::declare(var_type.as_str(), identifier));
                let value = match initializer {
                    Some(e) => self.lower_expr(e),
                    None => {
                        if var_type.as_str() == "float" {
                            "0.0".to_string()
                        } else {
                            "0".to_string()
                        }
                    }
                };
                self.emit(Instruction::assign(value, identifier));
            }
            Stmt::Assignment {
                identifier, value, ..
            } => {
                let v = self.lower_expr(value);
                self.emit(Instruction::assign(v, identifier));
            }
            Stmt::CompoundAssignment {
                identifier,
                op,
                value,
                ..
            } => {
                let rhs = self.lower_expr(value);
                let t = self.new_temp();
                let arith_op = binop_to_ir(op.as_binop());
                self.emit(Instruction::binary(arith_op, identifier.clone(), rhs, t.clone()));
                self.emit(Instruction::assign(t, identifier));
            }
            Stmt::Block { statements, .. } => {
                for s in statements {
                    self.lower_stmt(s);
                }
            }
            Stmt::IfStatement {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let n = self.next_label_id();
                let c = self.lower_expr(condition);
                match else_branch {
                    None => {
                        let end = format!("ENDIF{}", n);
                        self.emit(Instruction::if_false(c, end.clone()));
                        self.lower_stmt(then_branch);
                        self.emit(Instruction::label(end));
                    }
                    Some(else_b) => {
                        let else_label = format!("ELSE{}", n);
                        let end = format!("ENDIF{}", n);
                        self.emit(Instruction::if_false(c, else_label.clone()));
                        self.lower_stmt(then_branch);
                        self.emit(Instruction::goto(end.clone()));
                        self.emit(Instruction::label(else_label));
                        self.lower_stmt(else_b);
                        self.emit(Instruction::label(end));
                    }
                }
            }
            Stmt::WhileStatement { condition, body, .. } => {
                let n = self.next_label_id();
                let start = format!("WHILE_START{}", n);
                let end = format!("WHILE_END{}", n);
                self.emit(Instruction::label(start.clone()));
                let c = self.lower_expr(condition);
                self.emit(Instruction::if_false(c, end.clone()));
                self.continue_stack.push(start.clone());
                self.break_stack.push(end.clone());
                self.lower_stmt(body);
                self.continue_stack.pop();
                self.break_stack.pop();
                self.emit(Instruction::goto(start));
                self.emit(Instruction::label(end));
            }
            Stmt::ForStatement {
                init,
                condition,
                update,
                body,
                ..
            } => {
                let n = self.next_label_id();
                let start = format!("FOR_START{}", n);
                let update_label = format!("FOR_UPDATE{}", n);
                let end = format!("FOR_END{}", n);

                if let Some(init) = init {
                    self.lower_stmt(init);
                }
                self.emit(Instruction::label(start.clone()));
                if let Some(cond) = condition {
                    let c = self.lower_expr(cond);
                    self.emit(Instruction::if_false(c, end.clone()));
                }

                // `continue` inside a for-loop jumps to the update clause,
                // not back to the top.
                self.continue_stack.push(update_label.clone());
                self.break_stack.push(end.clone());
                self.lower_stmt(body);
                self.continue_stack.pop();
                self.break_stack.pop();

                self.emit(Instruction::label(update_label));
                if let Some(update) = update {
                    self.lower_stmt(update);
                }
                self.emit(Instruction::goto(start));
                self.emit(Instruction::label(end));
            }
            Stmt::BreakStatement { .. } => {
                if let Some(target) = self.break_stack.last().cloned() {
                    self.emit(Instruction::goto(target));
                }
            }
            Stmt::ContinueStatement { .. } => {
                if let Some(target) = self.continue_stack.last().cloned() {
                    self.emit(Instruction::goto(target));
                }
            }
            Stmt::ReturnStatement { value, .. } => {
                let v = value.as_ref().map(|e| self.lower_expr(e));
                self.emit(Instruction::ret(v));
            }
            Stmt::ExprStatement { expr, .. } => {
                self.lower_expr(expr);
            }
        }
    }

    fn lower_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Number { lexeme, .. } => lexeme.clone(),
            Expr::StringLiteral { raw, .. } => self.strings.intern(raw.clone()),
            Expr::Identifier { name, .. } => name.clone(),
            Expr::FunctionCall { name, args, .. } => {
                let operands: Vec<String> = args.iter().map(|a| self.lower_expr(a)).collect();
                for operand in &operands {
                    self.emit(Instruction::param(operand.clone()));
                }
                let t = self.new_temp();
                self.emit(Instruction::call(name.clone(), operands.len(), t.clone()));
                t
            }
            Expr::BinaryOp { op, left, right, .. } => {
                let l = self.lower_expr(left);
                let r = self.lower_expr(right);
                let t = self.new_temp();
                self.emit(Instruction::binary(binop_to_ir(*op), l, r, t.clone()));
                t
            }
            Expr::ComparisonOp { op, left, right, .. } => {
                let l = self.lower_expr(left);
                let r = self.lower_expr(right);
                let t = self.new_temp();
                self.emit(Instruction::binary(cmpop_to_ir(*op), l, r, t.clone()));
                t
            }
            Expr::LogicalOp { op, left, right, .. } => {
                let l = self.lower_expr(left);
                let t = self.new_temp();
                match op {
                    LogicalOp::Not => {
                        self.emit(Instruction::unary(Op::Not, l, t.clone()));
                    }
                    LogicalOp::And | LogicalOp::Or => {
                        let r = self.lower_expr(right.as_ref().expect("and/or has a right operand"));
                        let irop = if *op == LogicalOp::And { Op::And } else { Op::Or };
                        self.emit(Instruction::binary(irop, l, r, t.clone()));
                    }
                }
                t
            }
        }
    }
}

fn binop_to_ir(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
    }
}

fn cmpop_to_ir(op: CmpOp) -> Op {
    match op {
        CmpOp::Eq => Op::Eq,
        CmpOp::Ne => Op::Ne,
        CmpOp::Lt => Op::Lt,
        CmpOp::Gt => Op::Gt,
        CmpOp::Le => Op::Le,
        CmpOp::Ge => Op::Ge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use std::collections::HashSet;

    fn gen(src: &str) -> IrProgram {
        let lex = tokenize(src);
        let parsed = parse(&lex.tokens);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        generate(&parsed.program)
    }

    fn labels_referenced(ir: &IrProgram) -> HashSet<&str> {
        ir.instructions
            .iter()
            .filter(|i| matches!(i.op, Op::Goto | Op::IfFalse | Op::IfTrue))
            .filter_map(|i| i.label.as_deref())
            .collect()
    }

    fn labels_defined(ir: &IrProgram) -> Vec<&str> {
        ir.instructions
            .iter()
            .filter(|i| i.op == Op::Label)
            .filter_map(|i| i.label.as_deref())
            .collect()
    }

    #[test]
    fn every_referenced_label_is_defined_exactly_once() {
        let ir = gen(
            "int main() { int i; int s; s = 0; for (i = 0; i < 5; i += 1) { if (i == 2) { continue; } s += i; } return s; }",
        );
        let defined = labels_defined(&ir);
        for referenced in labels_referenced(&ir) {
            let count = defined.iter().filter(|d| **d == referenced).count();
            assert_eq!(count, 1, "label {} defined {} times", referenced, count);
        }
    }

    #[test]
    fn function_stream_starts_and_ends_correctly() {
        let ir = gen("int main() { return 0; }");
        assert_eq!(ir.instructions.first().unwrap().op, Op::FuncBegin);
        assert_eq!(ir.instructions.last().unwrap().op, Op::FuncEnd);
        let return_idx = ir.instructions.iter().position(|i| i.op == Op::Return).unwrap();
        assert_eq!(return_idx, ir.instructions.len() - 2);
    }

    #[test]
    fn missing_return_is_synthesized() {
        let ir = gen("void f() { int x; x = 1; }");
        let last_two: Vec<Op> = ir.instructions[ir.instructions.len() - 2..]
            .iter()
            .map(|i| i.op)
            .collect();
        assert_eq!(last_two, vec![Op::Return, Op::FuncEnd]);
    }

    #[test]
    fn temp_counter_resets_per_function() {
        let ir = gen("int f() { return 1 + 2; } int g() { return 3 + 4; }");
        let temps: Vec<&str> = ir
            .instructions
            .iter()
            .filter(|i| i.op == Op::Add)
            .filter_map(|i| i.result.as_deref())
            .collect();
        assert_eq!(temps, vec!["t1", "t1"]);
    }

    #[test]
    fn string_literals_intern_sequentially() {
        let ir = gen(r#"int main() { printf("a"); printf("b"); return 0; }"#);
        assert_eq!(ir.strings.get("STR1"), Some(r#""a""#));
        assert_eq!(ir.strings.get("STR2"), Some(r#""b""#));
    }

    #[test]
    fn continue_in_for_jumps_to_update_not_start() {
        let ir = gen("int main() { int i; for (i = 0; i < 5; i += 1) { continue; } return 0; }");
        let continue_goto = ir
            .instructions
            .iter()
            .find(|i| i.op == Op::Goto && i.label.as_deref() != Some("FOR_START1"))
            .expect("continue goto");
        assert_eq!(continue_goto.label.as_deref(), Some("FOR_UPDATE1"));
    }
}
