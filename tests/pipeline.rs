use std::collections::HashMap;

use agarc::{
    codegen::{self, AsmOptions, LoweringWarning},
    ir::{Instruction, Label},
    lex::{self, Token},
    translate,
};

const PROGRAM: &str = r#"
#include <iostream>

int counter = 0;

void main() {
    int i;
    int total = 0;

    /* ciclo principal */
    for (i = 0; i < 10; i++) {
        if (i == 5) { continue; }

        agar (total > 100) {
            break;
        } magar {
            total = total + i * 2;
        }
    }

    while (total > 0) { total = total - 3; }
    do { i = i - 1; } while (i > 0);

    switch (total) {
        case 0: cout << "zero"; break;
        case 1: total = 2;
        default: total = 3;
    }

    cin >> counter;
    return total;
}
"#;

fn lower(tac: &[String], options: AsmOptions) -> (String, Vec<LoweringWarning>) {
    let mut output = Vec::new();
    let warnings = codegen::emit(tac, options, &mut output).unwrap();

    (String::from_utf8(output).unwrap(), warnings)
}

#[test]
fn scenario_tokens_and_tac() {
    let source = "int x; x = 2 + 3;";

    let tokens: Vec<_> = lex::tokenize(source, "<test>")
        .unwrap()
        .into_iter()
        .map(|token| token.val().text().into_owned())
        .collect();

    assert_eq!(tokens, ["int", "x", ";", "x", "=", "2", "+", "3", ";", ""]);

    let translation = translate("<test>", source).unwrap();
    assert_eq!(translation.compilation.program.lines(), ["t0 = 2 + 3", "x = t0"]);
    assert_eq!(translation.tokens.last().map(|token| token.val()), Some(&Token::Eof));
}

#[test]
fn lexing_is_deterministic() {
    let first = lex::tokenize(PROGRAM, "main.agar").unwrap();
    let second = lex::tokenize(PROGRAM, "main.agar").unwrap();

    let first: Vec<_> = first.iter().map(|token| (token.val().clone(), token.line())).collect();
    let second: Vec<_> = second.iter().map(|token| (token.val().clone(), token.line())).collect();

    assert_eq!(first, second);
}

#[test]
fn every_jump_has_exactly_one_label() {
    let translation = translate("main.agar", PROGRAM).unwrap();
    let instructions = translation.compilation.program.instructions();

    let mut definitions: HashMap<&Label, usize> = HashMap::new();
    for instruction in instructions {
        if let Instruction::Label(label) = instruction {
            *definitions.entry(label).or_default() += 1;
        }
    }

    assert!(definitions.values().all(|&count| count == 1));

    let targets = instructions.iter().filter_map(|instruction| match instruction {
        Instruction::Goto(target) | Instruction::Branch { target, .. } => Some(target),
        _ => None,
    });

    for target in targets {
        assert_eq!(definitions.get(target), Some(&1), "dangling jump to {}", target);
    }
}

#[test]
fn tac_text_reparses() {
    let translation = translate("main.agar", PROGRAM).unwrap();
    let program = &translation.compilation.program;

    for (line, instruction) in program.lines().iter().zip(program.instructions()) {
        assert_eq!(&line.parse::<Instruction>().unwrap(), instruction);
    }
}

#[test]
fn whole_program_lowers() {
    let translation = translate("main.agar", PROGRAM).unwrap();
    let tac = translation.compilation.program.lines();

    let (asm, warnings) = lower(&tac, AsmOptions::EXIT);

    assert_eq!(warnings, [LoweringWarning::Unsupported(String::from("return total"))]);
    assert!(asm.starts_with("section .data\n    counter dd 0\n"));
    assert!(asm.contains("\nsection .text\n    global _start\n_start:\n"));
    assert!(asm.ends_with("    mov eax, 1\n    xor ebx, ebx\n    int 0x80\n"));

    // Una declaración por variable, sin importar cuántas veces aparezca
    assert_eq!(asm.matches("    total dd 0").count(), 1);
    assert!(!asm.contains("10 dd 0"));
}

#[test]
fn sum_is_stored_in_destination() {
    let tac = vec![String::from("t0 = a + b"), String::from("x = t0")];
    let (asm, _) = lower(&tac, AsmOptions::empty());

    let text: Vec<_> = asm.lines().skip_while(|line| *line != "_start:").collect();
    let load = text.iter().position(|line| *line == "    mov eax, [a]").unwrap();
    let add = text.iter().position(|line| *line == "    add eax, [b]").unwrap();
    let store = text.iter().position(|line| *line == "    mov dword [x], eax").unwrap();

    assert!(load < add && add < store);
}

#[test]
fn fatal_errors_are_classified() {
    let lexical = translate("bad.agar", "int x = 3 $ 4;").err().unwrap().to_string();
    assert!(lexical.starts_with("lexical error: Unexpected character '$'"));

    let syntax = translate("bad.agar", "int x = (1 + 2;").err().unwrap().to_string();
    assert!(syntax.starts_with("syntax error: Expected `)`, found `;` instead"));
    assert!(syntax.contains(" --> bad.agar:1:15"));

    let semantic = translate("bad.agar", "bool b;\nb = 5;").err().unwrap().to_string();
    assert!(semantic.starts_with("semantic error: Type mismatch: cannot assign an integer literal to `bool`"));
    assert!(semantic.contains("2 | b = 5;"));
}

#[test]
fn independent_conditionals_do_not_share_labels() {
    let source = "int x; x = 5; if (x > 3) { x = 1; } else { x = 0; } if (x < 2) { x = 7; }";
    let lines = translate("<test>", source).unwrap().compilation.program.lines();

    let labels: Vec<_> = lines.iter().filter(|line| line.ends_with(':')).collect();
    let mut unique = labels.clone();
    unique.sort();
    unique.dedup();

    assert_eq!(labels.len(), unique.len());
    assert!(lines.contains(&String::from("t0 = x > 3")));
    assert!(lines.contains(&String::from("x = 1")));
    assert!(lines.contains(&String::from("x = 0")));
}

#[test]
fn string_cases_survive_the_text_form() {
    let source = "string s = \"a\"; switch (s) { case \"hello world\": s = \"b\"; }";
    let translation = translate("<test>", source).unwrap();
    let program = &translation.compilation.program;
    let tac = program.lines();

    assert!(tac.contains(&String::from(r#"t1 = s != "hello world""#)));
    for (line, instruction) in tac.iter().zip(program.instructions()) {
        assert_eq!(&line.parse::<Instruction>().unwrap(), instruction);
    }

    let (_, warnings) = lower(&tac, AsmOptions::empty());
    assert!(warnings.is_empty(), "{:?}", warnings);
}

#[test]
fn multiline_strings_stay_on_one_line() {
    let translation = translate("<test>", "string s = \"a\nb\";").unwrap();
    let text = translation.compilation.program.to_string();

    assert_eq!(text, "s = \"a\\nb\"\n");
    assert_eq!(text.lines().count(), 1);
}

#[test]
fn generated_names_cannot_be_declared() {
    let error = translate("bad.agar", "int t0 = 1;\nint x;\nx = t0 + 2 * 3;")
        .err()
        .unwrap()
        .to_string();

    assert!(error.starts_with("semantic error: Name `t0` is reserved for temporaries and labels"));

    let error = translate("bad.agar", "int L0 = 1; while (L0 < 2) { L0 = L0 + 1; }").err().unwrap();
    assert_eq!(error.len(), 1);
}

#[test]
fn bare_exponent_is_a_lexical_error() {
    let error = translate("bad.agar", "float f = 7e;").err().unwrap().to_string();
    assert!(error.starts_with("lexical error: Malformed numeric literal `7e`"));
}
