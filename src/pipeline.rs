// ABOUTME: Sequences lex, parse, analyze, lower, optimize, and codegen over a uniform Result<Artifact, Vec<Diagnostic>> contract

use crate::ast::Program;
use crate::codegen;
use crate::config::{OptLevel, Target};
use crate::diagnostics::{Diagnostic, Phase};
use crate::ir::IrProgram;
use crate::irgen;
use crate::lexer;
use crate::optimizer::{self, OptCounters};
use crate::parser;
use crate::semantic;
use crate::token::Token;

/// Every side artifact a caller (the CLI) may want to write to disk. This
/// module never touches the filesystem itself — it only renders text the
/// caller can choose to persist.
pub struct CompileArtifacts {
    pub tokens: Vec<Token>,
    pub symbols: std::collections::HashSet<String>,
    pub ast: Program,
    pub ir_unoptimized: IrProgram,
    pub ir_optimized: IrProgram,
    pub opt_counters: OptCounters,
    pub generated_code: String,
}

/// Runs the full lex -> parse -> analyze -> lower -> optimize -> codegen
/// pipeline. A non-empty error list from the lexer, parser, or semantic
/// stage halts it before the next stage runs; the optimizer and code
/// generator are the only stages reached with already-validated input.
pub fn compile(source: &str, level: OptLevel, target: Target) -> Result<CompileArtifacts, Vec<Diagnostic>> {
    let lexed = lexer::tokenize(source);
    if !lexed.errors.is_empty() {
        return Err(lexed
            .errors
            .into_iter()
            .map(|e| Diagnostic::new(Phase::Lexer, e.to_string()))
            .collect());
    }
    let symbols = lexed.symbols.clone();

    let parsed = parser::parse(&lexed.tokens);
    if !parsed.errors.is_empty() {
        return Err(parsed
            .errors
            .into_iter()
            .map(|e| Diagnostic::new(Phase::Parser, e.to_string()))
            .collect());
    }

    if let Err(errors) = semantic::analyze(&parsed.program) {
        return Err(errors
            .into_iter()
            .map(|e| Diagnostic::new(Phase::Semantic, e.to_string()))
            .collect());
    }

    let ir_unoptimized = irgen::generate(&parsed.program);
    let mut ir_optimized = ir_unoptimized.clone();
    let opt_counters = optimizer::optimize(&mut ir_optimized, level);

    let generated_code = codegen::generate(&ir_optimized, target)?;

    Ok(CompileArtifacts {
        tokens: lexed.tokens,
        symbols,
        ast: parsed.program,
        ir_unoptimized,
        ir_optimized,
        opt_counters,
        generated_code,
    })
}

/// Renders `tokens.txt` content: one token per line.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for t in tokens {
        out.push_str(&format!("{:?}\t{:?}\t{}:{}\n", t.kind, t.lexeme, t.line, t.col));
    }
    out
}

/// Renders `symbol_table.txt` content from the raw lexed symbol set.
pub fn render_symbols(symbols: &std::collections::HashSet<String>) -> String {
    let mut names: Vec<&String> = symbols.iter().collect();
    names.sort();
    names.into_iter().map(|n| format!("{}\n", n)).collect()
}

/// Renders a `<base>_ir.txt`-style textual dump of an IR stream.
pub fn render_ir(ir: &IrProgram) -> String {
    let mut out = String::new();
    for instr in &ir.instructions {
        let arg1 = instr.arg1.as_deref().unwrap_or("");
        let arg2 = instr.arg2.as_deref().unwrap_or("");
        let result = instr.result.as_deref().unwrap_or("");
        let label = instr.label.as_deref().unwrap_or("");
        out.push_str(&format!(
            "{:<12} {:<10} {:<10} {:<10} {}\n",
            instr.op.mnemonic(),
            arg1,
            arg2,
            result,
            label
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exits_via_semantic_error_before_codegen() {
        let result = compile("int main(){ y = 1; return 0; }", OptLevel::O2, Target::C);
        let errors = result.unwrap_err();
        assert!(errors
            .iter()
            .any(|d| d.phase == Phase::Semantic && d.message.contains("not declared")));
    }

    #[test]
    fn compiles_simple_program_to_c() {
        let artifacts = compile("int main(){ return 0; }", OptLevel::O2, Target::C).unwrap();
        assert!(artifacts.generated_code.contains("int main(void)"));
    }

    #[test]
    fn o2_folds_constant_addition_out_of_the_optimized_ir() {
        let artifacts =
            compile("int main(){ int x; x = 2 + 3; return x; }", OptLevel::O2, Target::C).unwrap();
        assert!(artifacts
            .ir_optimized
            .instructions
            .iter()
            .all(|i| i.op != crate::ir::Op::Add));
    }
}
