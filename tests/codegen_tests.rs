// ABOUTME: Backend-specific invariants for the C and x86-64 code generators

use minic::config::{OptLevel, Target};
use minic::pipeline::compile;

#[test]
fn c_backend_declares_every_temporary_exactly_once() {
    let src = "int main(){ int x; x = (1 + 2) * (3 + 4); return x; }";
    let artifacts = compile(src, OptLevel::O0, Target::C).unwrap();
    let occurrences = artifacts.generated_code.matches("int t1;").count();
    assert!(occurrences <= 1);
}

#[test]
fn c_backend_preserves_declared_return_type_instead_of_forcing_int() {
    let src = "float half(int x) { return x / 2; } int main(){ return 0; }";
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.generated_code.contains("float half(int x)"));
}

#[test]
fn c_backend_emits_void_signature_and_return_for_void_functions() {
    let src = "void noop() { return; } int main(){ noop(); return 0; }";
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.generated_code.contains("void noop(void)"));
}

#[test]
fn c_backend_substitutes_interned_string_literals_at_call_sites() {
    let src = r#"int main(){ printf("hello\n"); return 0; }"#;
    let artifacts = compile(src, OptLevel::O2, Target::C).unwrap();
    assert!(artifacts.generated_code.contains(r#"printf("hello\n")"#));
}

#[test]
fn x86_backend_reserves_bss_storage_for_every_named_variable() {
    let src = "int main(){ int counter; counter = 0; return counter; }";
    let artifacts = compile(src, OptLevel::O2, Target::X86).unwrap();
    assert!(artifacts.generated_code.contains("counter: resq 1"));
}

#[test]
fn x86_backend_emits_data_section_string_with_null_terminator() {
    let src = r#"int main(){ printf("ok"); return 0; }"#;
    let artifacts = compile(src, OptLevel::O2, Target::X86).unwrap();
    assert!(artifacts.generated_code.contains("str1: db \"ok\", 0"));
}

#[test]
fn x86_backend_flags_calls_with_more_than_six_arguments() {
    let src = r#"int main(){ int a; a = printf("%d %d %d %d %d %d %d", 1,2,3,4,5,6,7); return a; }"#;
    let errors = compile(src, OptLevel::O2, Target::X86).unwrap_err();
    assert!(errors
        .iter()
        .any(|d| d.message.contains("exceeding the six-register")));
}

#[test]
fn x86_backend_spills_incoming_register_arguments_to_their_parameter_slots() {
    let src = "int inc(int x) { return x + 1; } int main(){ return inc(41); }";
    let artifacts = compile(src, OptLevel::O2, Target::X86).unwrap();
    let inc_body = artifacts
        .generated_code
        .split("inc:\n")
        .nth(1)
        .expect("inc label");
    assert!(inc_body.contains("mov qword [x], rdi"));
}

#[test]
fn x86_backend_emits_prologue_and_epilogue_per_function() {
    let src = "int main(){ return 0; }";
    let artifacts = compile(src, OptLevel::O2, Target::X86).unwrap();
    assert!(artifacts.generated_code.contains("push rbp"));
    assert!(artifacts.generated_code.contains("mov rbp, rsp"));
    assert!(artifacts.generated_code.contains("pop rbp"));
    assert!(artifacts.generated_code.contains("ret"));
}
