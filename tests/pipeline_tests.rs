// ABOUTME: End-to-end pipeline scenarios driven through the public compile() API

use minic::config::{OptLevel, Target};
use minic::ir::Op;
use minic::pipeline::compile;

#[test]
fn empty_return_compiles_cleanly_on_both_targets() {
    let src = "int main(){ return 0; }";
    assert!(compile(src, OptLevel::O2, Target::C).is_ok());
    assert!(compile(src, OptLevel::O2, Target::X86).is_ok());
}

#[test]
fn constant_addition_folds_out_of_optimized_ir_but_not_unoptimized() {
    let src = "int main(){ int x; x = 2 + 3; return x; }";
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.ir_unoptimized.instructions.iter().any(|i| i.op == Op::Add));
    assert!(!artifacts.ir_optimized.instructions.iter().any(|i| i.op == Op::Add));
}

#[test]
fn for_loop_accumulator_lowers_without_errors() {
    let src = "int main(){ int i; int s; s=0; for(i=0;i<5;i+=1){s+=i;} return s; }";
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.generated_code.contains("int main(void)"));
}

#[test]
fn constant_comparison_is_never_folded_even_at_o2() {
    let src = "int main(){ int x; x=0; if(x==0){ return 1; } return 2; }";
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.ir_optimized.instructions.iter().any(|i| i.op == Op::Eq));
}

#[test]
fn printf_call_interns_a_string_literal_handle() {
    let src = r#"int main(){ printf("hi\n"); return 0; }"#;
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert_eq!(artifacts.ir_optimized.strings.get("STR1"), Some(r#""hi\n""#));
    assert!(artifacts.generated_code.contains("printf"));
}

#[test]
fn undeclared_variable_use_halts_before_codegen() {
    let src = "int main(){ y = 1; return 0; }";
    let errors = compile(src, OptLevel::O2, Target::C).unwrap_err();
    assert!(errors.iter().any(|d| d.message == "Variable 'y' not declared"));
}

#[test]
fn lexer_error_halts_before_parsing() {
    let src = "int main(){ int x = 1 @ 2; return 0; }";
    let errors = compile(src, OptLevel::O2, Target::C).unwrap_err();
    assert!(errors.iter().any(|d| d.message.contains("Invalid character '@'")));
}

#[test]
fn syntax_error_halts_before_semantic_analysis() {
    let src = "int main(){ int x = ; return 0; }";
    let errors = compile(src, OptLevel::O2, Target::C).unwrap_err();
    assert!(errors.iter().any(|d| d.message.contains("Syntax Error")));
}

#[test]
fn o0_never_folds_constants() {
    let src = "int main(){ int x; x = 2 + 3; return x; }";
    let artifacts = compile(src, OptLevel::O0, Target::C).unwrap();
    assert!(artifacts.ir_optimized.instructions.iter().any(|i| i.op == Op::Add));
    assert_eq!(artifacts.opt_counters.constants_folded, 0);
}

#[test]
fn recursive_function_call_round_trips_through_both_backends() {
    let src = "int fact(int n){ if(n<=1){ return 1; } return n * fact(n-1); } int main(){ return fact(5); }";
    assert!(compile(src, OptLevel::O2, Target::C).is_ok());
    assert!(compile(src, OptLevel::O2, Target::X86).is_ok());
}
