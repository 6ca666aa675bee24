// ABOUTME: Scope-stack semantic analyzer: declaration and type checking over the AST

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{Expr, LogicalOp, Program, Stmt};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Variable '{0}' already declared")]
    AlreadyDeclared(String),

    #[error("Variable '{0}' not declared")]
    NotDeclared(String),

    #[error("Variable '{0}' used before declaration")]
    UsedBeforeDeclaration(String),

    #[error("Function '{0}' not declared")]
    FunctionNotDeclared(String),

    #[error("type mismatch: cannot assign {actual} to {expected}")]
    TypeMismatch { expected: String, actual: String },

    #[error("non-numeric operand '{type_name}' in arithmetic expression")]
    NonNumericOperand { type_name: String },

    #[error("mismatched comparison operand types: {left} vs {right}")]
    ComparisonMismatch { left: String, right: String },
}

/// A stack of scopes, each a name -> type mapping. Enter/exit is strictly
/// LIFO. `with_scope` is a scoped-acquisition guard: the scope is popped
/// when the closure returns, on every control-flow path inside it.
struct Analyzer {
    scopes: Vec<HashMap<String, String>>,
    errors: Vec<SemanticError>,
    current_return_type: Option<String>,
}

pub fn analyze(program: &Program) -> Result<(), Vec<SemanticError>> {
    let mut analyzer = Analyzer {
        scopes: Vec::new(),
        errors: Vec::new(),
        current_return_type: None,
    };
    analyzer.scopes.push(HashMap::new());
    analyzer.declare_current("printf", "function:int");
    analyzer.declare_current("scanf", "function:int");

    for stmt in &program.statements {
        analyzer.visit_stmt(stmt);
    }
    analyzer.scopes.pop();

    if analyzer.errors.is_empty() {
        Ok(())
    } else {
        Err(analyzer.errors)
    }
}

fn is_numeric(type_name: &str) -> bool {
    type_name == "int" || type_name == "float"
}

/// Implicit widening: declared `float` accepts an `int` initializer/value.
fn types_compatible(declared: &str, actual: &str) -> bool {
    declared == actual || (declared == "float" && actual == "int")
}

impl Analyzer {
    fn with_scope<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.scopes.push(HashMap::new());
        f(self);
        self.scopes.pop();
    }

    fn declare_current(&mut self, name: &str, type_name: &str) -> bool {
        let scope = self.scopes.last_mut().expect("at least one scope");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), type_name.to_string());
        true
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            if let Some(t) = scope.get(name) {
                return Some(t.as_str());
            }
        }
        None
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDeclaration {
                return_type,
                name,
                parameters,
                body,
                ..
            } => {
                self.declare_current(name, &format!("function:{}", return_type.as_str()));
                self.with_scope(|me| {
                    for p in parameters {
                        me.declare_current(&p.name, p.param_type.as_str());
                    }
                    let saved_return = me.current_return_type.take();
                    me.current_return_type = Some(return_type.as_str().to_string());

                    // The block body shares this scope; it does not open a
                    // second one.
                    if let Stmt::Block { statements, .. } = body.as_ref() {
                        for s in statements {
                            me.visit_stmt(s);
                        }
                    } else {
                        me.visit_stmt(body);
                    }

                    me.current_return_type = saved_return;
                });
            }
            Stmt::VarDeclaration {
                var_type,
                identifier,
                initializer,
                ..
            } => {
                if !self.declare_current(identifier, var_type.as_str()) {
                    self.errors
                        .push(SemanticError::AlreadyDeclared(identifier.clone()));
                }
                if let Some(init) = initializer {
                    if let Ok(actual) = self.visit_expr(init) {
                        if !types_compatible(var_type.as_str(), &actual) {
                            self.errors.push(SemanticError::TypeMismatch {
                                expected: var_type.as_str().to_string(),
                                actual,
                            });
                        }
                    }
                }
            }
            Stmt::Assignment {
                identifier, value, ..
            } => match self.lookup(identifier).map(|s| s.to_string()) {
                None => self
                    .errors
                    .push(SemanticError::NotDeclared(identifier.clone())),
                Some(declared) => {
                    if let Ok(actual) = self.visit_expr(value) {
                        if !types_compatible(&declared, &actual) {
                            self.errors.push(SemanticError::TypeMismatch {
                                expected: declared,
                                actual,
                            });
                        }
                    }
                }
            },
            Stmt::CompoundAssignment {
                identifier, value, ..
            } => match self.lookup(identifier).map(|s| s.to_string()) {
                None => self
                    .errors
                    .push(SemanticError::NotDeclared(identifier.clone())),
                Some(declared) => {
                    if !is_numeric(&declared) {
                        self.errors.push(SemanticError::NonNumericOperand {
                            type_name: declared.clone(),
                        });
                    }
                    if let Ok(actual) = self.visit_expr(value) {
                        if !types_compatible(&declared, &actual) {
                            self.errors.push(SemanticError::TypeMismatch {
                                expected: declared,
                                actual,
                            });
                        }
                    }
                }
            },
            Stmt::Block { statements, .. } => {
                self.with_scope(|me| {
                    for s in statements {
                        me.visit_stmt(s);
                    }
                });
            }
            Stmt::IfStatement {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let _ = self.visit_expr(condition);
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            Stmt::WhileStatement {
                condition, body, ..
            } => {
                let _ = self.visit_expr(condition);
                self.visit_stmt(body);
            }
            Stmt::ForStatement {
                init,
                condition,
                update,
                body,
                ..
            } => {
                self.with_scope(|me| {
                    if let Some(init) = init {
                        me.visit_stmt(init);
                    }
                    if let Some(condition) = condition {
                        let _ = me.visit_expr(condition);
                    }
                    me.visit_stmt(body);
                    if let Some(update) = update {
                        me.visit_stmt(update);
                    }
                });
            }
            Stmt::BreakStatement { .. } | Stmt::ContinueStatement { .. } => {
                // Loop-context validity is enforced by the parser.
            }
            Stmt::ReturnStatement { value, .. } => {
                if let Some(value) = value {
                    if let Ok(actual) = self.visit_expr(value) {
                        if let Some(expected) = self.current_return_type.clone() {
                            if !types_compatible(&expected, &actual) {
                                self.errors
                                    .push(SemanticError::TypeMismatch { expected, actual });
                            }
                        }
                    }
                }
            }
            Stmt::ExprStatement { expr, .. } => {
                let _ = self.visit_expr(expr);
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result<String, ()> {
        match expr {
            Expr::Number { lexeme, .. } => {
                Ok(if lexeme.contains('.') { "float" } else { "int" }.to_string())
            }
            Expr::StringLiteral { .. } => Ok("string".to_string()),
            Expr::Identifier { name, .. } => match self.lookup(name) {
                None => {
                    self.errors
                        .push(SemanticError::UsedBeforeDeclaration(name.clone()));
                    Err(())
                }
                Some(t) => {
                    if let Some(ret) = t.strip_prefix("function:") {
                        Ok(ret.to_string())
                    } else {
                        Ok(t.to_string())
                    }
                }
            },
            Expr::FunctionCall { name, args, .. } => {
                let found = self.lookup(name).map(|s| s.to_string());
                for arg in args {
                    // Arity/type checking is deliberately not performed here,
                    // only visited for nested errors.
                    let _ = self.visit_expr(arg);
                }
                match found {
                    None => {
                        self.errors
                            .push(SemanticError::FunctionNotDeclared(name.clone()));
                        Err(())
                    }
                    Some(t) => Ok(t.strip_prefix("function:").unwrap_or("int").to_string()),
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                let lt = self.visit_expr(left);
                let rt = self.visit_expr(right);
                let (lt, rt) = match (lt, rt) {
                    (Ok(l), Ok(r)) => (l, r),
                    _ => return Err(()),
                };
                if !is_numeric(&lt) {
                    self.errors.push(SemanticError::NonNumericOperand {
                        type_name: lt.clone(),
                    });
                }
                if !is_numeric(&rt) {
                    self.errors.push(SemanticError::NonNumericOperand {
                        type_name: rt.clone(),
                    });
                }
                if lt == rt {
                    Ok(lt)
                } else if is_numeric(&lt) && is_numeric(&rt) {
                    Ok("float".to_string())
                } else {
                    Ok(lt)
                }
            }
            Expr::ComparisonOp { left, right, .. } => {
                let lt = self.visit_expr(left);
                let rt = self.visit_expr(right);
                let (lt, rt) = match (lt, rt) {
                    (Ok(l), Ok(r)) => (l, r),
                    _ => return Ok("int".to_string()),
                };
                let mixed_numeric = is_numeric(&lt) && is_numeric(&rt);
                if lt != rt && !mixed_numeric {
                    self.errors.push(SemanticError::ComparisonMismatch {
                        left: lt,
                        right: rt,
                    });
                }
                Ok("int".to_string())
            }
            Expr::LogicalOp { op, left, right, .. } => {
                let _ = self.visit_expr(left);
                if *op != LogicalOp::Not {
                    if let Some(right) = right {
                        let _ = self.visit_expr(right);
                    }
                }
                Ok("int".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn analyze_src(src: &str) -> Result<(), Vec<SemanticError>> {
        let lex = tokenize(src);
        let parsed = parse(&lex.tokens);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        analyze(&parsed.program)
    }

    #[test]
    fn accepts_well_formed_program() {
        assert!(analyze_src("int main() { int x; x = 2 + 3; return x; }").is_ok());
    }

    #[test]
    fn rejects_undeclared_variable_use() {
        let err = analyze_src("int main() { y = 1; return 0; }").unwrap_err();
        assert!(err
            .iter()
            .any(|e| e.to_string() == "Variable 'y' not declared"));
    }

    #[test]
    fn rejects_redeclaration_in_same_scope() {
        let err = analyze_src("int main() { int x; int x; return 0; }").unwrap_err();
        assert!(err
            .iter()
            .any(|e| matches!(e, SemanticError::AlreadyDeclared(n) if n == "x")));
    }

    #[test]
    fn allows_int_to_float_widening() {
        assert!(analyze_src("int main() { float x; x = 2; return 0; }").is_ok());
    }

    #[test]
    fn function_body_shares_parameter_scope() {
        // `x` the parameter must be visible directly in the body block
        // without being shadowed by an extra scope.
        assert!(analyze_src("int id(int x) { return x; }").is_ok());
    }

    #[test]
    fn scopes_are_lifo_block_locals_do_not_leak() {
        let err = analyze_src(
            "int main() { if (1) { int x; } return x; }",
        )
        .unwrap_err();
        assert!(err
            .iter()
            .any(|e| matches!(e, SemanticError::UsedBeforeDeclaration(n) if n == "x")));
    }
}
