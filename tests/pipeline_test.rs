/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::fs;

use viperc::Compiler;
use viperc::diagnostics::DiagnosticRegistry;
use viperc::lexer::{self, TokenKind};
use viperc::parser::Parser;

fn compile(code: &str) -> String {
    let outcome = Compiler::new(false).compile(code).unwrap();
    assert!(
        outcome.succeeded(),
        "compilation rejected:\n{}",
        outcome.registry.display()
    );
    outcome.output.unwrap()
}

fn ordered(asm: &str, needles: &[&str]) {
    let mut cursor = 0;
    for needle in needles {
        match asm[cursor..].find(needle) {
            Some(position) => cursor += position + needle.len(),
            None => panic!("missing (or out of order) {:?} in:\n{}", needle, asm),
        }
    }
}

// --- end-to-end scenarios ---

#[test]
fn test_simple_store() {
    let asm = compile("x = 1\n");
    ordered(
        &asm,
        &[
            "    mov rax, 1\n",
            "    push rax\n",
            "    mov rax, 60\n",
            "    mov rdi, 0\n",
            "    syscall\n",
        ],
    );
}

#[test]
fn test_left_to_right_arithmetic_with_precedence() {
    let asm = compile("x = 1 + 2 * 3 - 4 * 5\n");
    // (2*3) first, then 1 + _, then (4*5), then the subtraction, then the
    // store
    ordered(
        &asm,
        &[
            "    mov rax, 2\n    mov rbx, 3\n    mul rbx\n    mov r8, rax\n",
            "    mov r9, 1\n    add r9, r8\n    mov r8, r9\n",
            "    mov rax, 4\n    mov rbx, 5\n    mul rbx\n    mov r9, rax\n",
            "    sub r8, r9\n",
            "    push r8\n",
        ],
    );
}

#[test]
fn test_multiple_target_assignment() {
    let asm = compile("x, y = 34 + 35, 190 + 230\n");
    ordered(
        &asm,
        &[
            "    mov r8, 34\n    mov r9, 35\n    add r8, r9\n    push r8\n",
            "    mov r8, 190\n    mov r9, 230\n    add r8, r9\n    push r8\n",
        ],
    );
}

#[test]
fn test_variable_before_declaration_is_rejected() {
    let outcome = Compiler::new(false).compile("x = y + 1\n").unwrap();
    assert!(!outcome.succeeded());
    assert!(outcome.registry.is_blocking());
    let bundle = outcome.registry.display();
    assert!(bundle.starts_with("Compilation stopped due to several messages:"));
    assert!(bundle.contains("Variable y used before assignment"));
    assert!(bundle.contains("x = y + 1"));
}

#[test]
fn test_if_elif_else() {
    let code = "x = 1\ny = 2\nif x == y:\n    x = 2\nelif x > y:\n    x -= y\nelse:\n    x += y\n";
    let asm = compile(code);
    ordered(
        &asm,
        &[
            "    jne main_if_0\n",
            "    jmp main_if_end_0\n",
            "main_if_0:\n",
            "    jle main_elif_0\n",
            "    jmp main_if_end_0\n",
            "main_elif_0:\n",
            "main_if_end_0:\n",
        ],
    );
}

#[test]
fn test_while_with_break_and_continue() {
    let code = "x = 0\nwhile x < 10:\n    if x == 5:\n        break\n    x += 1\n";
    let asm = compile(code);
    // while_begin precedes the condition compare
    ordered(
        &asm,
        &[
            "main_while_begin_0:\n",
            "    cmp r8, r9\n",
            "    jge main_while_end_0\n",
            "    jmp main_while_end_0\n", // the break site
            "    jmp main_while_begin_0\n",
            "main_while_end_0:\n",
        ],
    );
}

#[test]
fn test_continue_jumps_to_loop_head() {
    let code = "x = 0\nwhile x < 10:\n    x += 1\n    if x == 2:\n        continue\n    x += 1\n";
    let asm = compile(code);
    assert!(asm.matches("    jmp main_while_begin_0\n").count() >= 2);
}

// --- boundary behaviors ---

#[test]
fn test_whitespace_only_file() {
    let outcome = Compiler::new(false).compile("\n   \n\n").unwrap();
    assert!(outcome.succeeded());
    assert!(outcome.registry.is_empty());
}

#[test]
fn test_empty_if_body_is_rejected() {
    let outcome = Compiler::new(false).compile("x = 1\nif x == 1:\nx = 2\n").unwrap();
    assert!(!outcome.succeeded());
    assert!(
        outcome
            .registry
            .display()
            .contains("Missing scope declarations for the if statement")
    );
}

#[test]
fn test_orphan_elif_is_rejected() {
    let outcome = Compiler::new(false)
        .compile("elif 1 == 2:\n    x = 1\n")
        .unwrap();
    assert!(!outcome.succeeded());
    assert!(
        outcome
            .registry
            .display()
            .contains("If-statement set up incorrectly")
    );
}

#[test]
fn test_break_outside_loop_is_rejected() {
    let outcome = Compiler::new(false).compile("x = 1\nbreak\n").unwrap();
    assert!(!outcome.succeeded());
    assert!(
        outcome
            .registry
            .display()
            .contains("'break' used outside of a loop")
    );
}

// --- round trips ---

#[test]
fn test_lex_render_lex_round_trip() {
    let code = "x = 1 + 2 * 3\nif x >= 5:\n    y = x << 2\n    z = not y\n";
    let mut registry = DiagnosticRegistry::new(code);
    let tokens = lexer::tokenize(code, &mut registry);
    assert!(!registry.is_blocking());

    let mut rendered = String::new();
    for token in &tokens {
        match token.kind {
            TokenKind::Newline => rendered.push('\n'),
            TokenKind::Eof => {}
            _ => {
                rendered.push_str(token.spelling());
                rendered.push(' ');
            }
        }
    }

    let mut registry_again = DiagnosticRegistry::new(&rendered);
    let tokens_again = lexer::tokenize(&rendered, &mut registry_again);
    assert!(!registry_again.is_blocking());
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    let kinds_again: Vec<TokenKind> = tokens_again.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, kinds_again);
    let contents: Vec<_> = tokens.iter().map(|t| t.content.clone()).collect();
    let contents_again: Vec<_> = tokens_again.iter().map(|t| t.content.clone()).collect();
    assert_eq!(contents, contents_again);
}

#[test]
fn test_parse_is_deterministic() {
    let code = "x = 1\nif x == 1:\n    y = 2\nelse:\n    y = 3\n";
    let parse = |code: &str| {
        let mut registry = DiagnosticRegistry::new(code);
        let tokens = lexer::tokenize(code, &mut registry);
        Parser::new(tokens, &mut registry).parse()
    };
    assert_eq!(parse(code), parse(code));
}

#[test]
fn test_compilation_is_deterministic() {
    let code = "x = 0\nwhile x < 4:\n    if x == 2:\n        x += 2\n    else:\n        x += 1\n";
    assert_eq!(compile(code), compile(code));
}

// --- larger programs ---

#[test]
fn test_fibonacci_program_compiles() {
    let code = "a, b = 0, 1\ncount = 0\nwhile a <= 10:\n    c = a + b\n    a = b\n    b = c\n    count += 1\n";
    let asm = compile(code);
    assert!(asm.contains("main_while_begin_0:"));
    assert!(asm.contains("    jg main_while_end_0\n"));
    assert!(asm.contains("    jmp main_while_begin_0\n"));
}

#[test]
fn test_nested_loops_get_distinct_labels() {
    let code = "x = 0\nwhile x < 3:\n    y = 0\n    while y < 3:\n        y += 1\n    x += 1\n";
    let asm = compile(code);
    assert!(asm.contains("main_while_begin_0:"));
    assert!(asm.contains("main_while_begin_1:"));
    assert!(asm.contains("main_while_end_0:"));
    assert!(asm.contains("main_while_end_1:"));
}

#[test]
fn test_record_program_end_to_end() {
    let code = "class Point:\n    x\n    y\nclass Line:\n    start: Point\n    finish: Point\na = Point(0, 0)\nb = Point(3, 4)\nl = Line(a, b)\n";
    let asm = compile(code);
    // scalar fields push values, record fields push pointers into the stack
    ordered(
        &asm,
        &[
            "    mov rax, 0\n    push rax\n",
            "    mov rax, 3\n    push rax\n",
            "    mov rax, rsp\n    add rax, ",
            "    push rax\n",
        ],
    );
}

#[test]
fn test_debug_mode_program() {
    let outcome = Compiler::new(true).compile("x = 1\ny = 2\n").unwrap();
    let asm = outcome.output.unwrap();
    assert!(asm.contains("global main"));
    assert!(asm.contains("extern printf"));
    assert_eq!(asm.matches("    call printf\n").count(), 2);
    assert!(asm.trim_end().ends_with("formatString: db '%llu', 10, 0"));
}

// --- output artifact ---

#[test]
fn test_assembly_file_is_written_like_the_cli_does() {
    let asm = compile("x = 1\n");
    let dir = tempfile::tempdir().unwrap();
    let asm_path = dir.path().join("out").with_extension("asm");
    fs::write(&asm_path, &asm).unwrap();

    let written = fs::read_to_string(&asm_path).unwrap();
    assert!(written.starts_with("section .text\nglobal _start\n\n_start:\n"));
    assert!(written.ends_with("    syscall\n"));
}
