//! Generación de ensamblador a partir de TAC.
//!
//! La entrada es la forma textual del programa, una instrucción por
//! línea. Primero se recolectan todas las variables mencionadas para
//! reservarles almacenamiento en `.data`, y luego cada línea se
//! traduce por separado en `.text`. Una línea que no puede traducirse
//! no aborta la generación: se reporta como [`LoweringWarning`] y se
//! omite.

use std::{
    collections::HashSet,
    io::{self, Write},
};

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ir::{Instruction, Operand};

mod x86;

bitflags! {
    /// Opciones de generación.
    pub struct AsmOptions: u32 {
        /// Termina el programa con la llamada al sistema `exit(0)`.
        const EXIT = 1 << 0;
    }
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringWarning {
    #[error("Unsupported TAC instruction: {0}")]
    Unsupported(String),
}

/// Traduce un programa TAC completo a ensamblador NASM de 32 bits.
pub fn emit<W: Write>(
    tac: &[String],
    options: AsmOptions,
    output: &mut W,
) -> io::Result<Vec<LoweringWarning>> {
    let instructions: Vec<_> = tac
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| (line, line.parse::<Instruction>()))
        .collect();

    writeln!(output, "section .data")?;

    let parsed = instructions.iter().filter_map(|(_, parsed)| parsed.as_ref().ok());
    for variable in variables(parsed) {
        writeln!(output, "    {} dd 0", variable)?;
    }

    writeln!(output)?;
    writeln!(output, "section .text")?;
    writeln!(output, "    global _start")?;
    writeln!(output, "_start:")?;

    let mut emitter = x86::Emitter::new(output);
    let mut warnings = Vec::new();

    for (line, parsed) in instructions {
        let instruction = match parsed {
            Ok(Instruction::Return(_)) | Err(_) => {
                let warning = LoweringWarning::Unsupported(line.to_string());
                warn!("{}", warning);

                warnings.push(warning);
                continue;
            }

            Ok(instruction) => instruction,
        };

        emitter.instruction(&instruction)?;
    }

    if options.contains(AsmOptions::EXIT) {
        emitter.exit()?;
    }

    debug!("Lowered {} TAC lines, {} skipped", tac.len(), warnings.len());
    Ok(warnings)
}

/// Nombres de variables en orden de primera aparición.
fn variables<'a, I>(instructions: I) -> Vec<String>
where
    I: Iterator<Item = &'a Instruction>,
{
    let mut seen = HashSet::new();
    let mut variables = Vec::new();

    let operands = instructions.flat_map(Instruction::operands);
    for operand in operands {
        if let Operand::Name(name) = operand {
            if seen.insert(name.clone()) {
                variables.push(name);
            }
        }
    }

    variables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(tac: &[&str], options: AsmOptions) -> (String, Vec<LoweringWarning>) {
        let tac: Vec<String> = tac.iter().map(|line| line.to_string()).collect();

        let mut output = Vec::new();
        let warnings = emit(&tac, options, &mut output).unwrap();

        (String::from_utf8(output).unwrap(), warnings)
    }

    fn text_section(asm: &str) -> Vec<&str> {
        asm.lines().skip_while(|line| *line != "_start:").skip(1).collect()
    }

    #[test]
    fn sum_then_copy() {
        let (asm, warnings) = lower(&["t0 = a + b", "x = t0"], AsmOptions::empty());

        assert!(warnings.is_empty());
        assert_eq!(
            asm,
            "section .data\n\
             \x20   t0 dd 0\n\
             \x20   a dd 0\n\
             \x20   b dd 0\n\
             \x20   x dd 0\n\
             \n\
             section .text\n\
             \x20   global _start\n\
             _start:\n\
             \x20   mov eax, [a]\n\
             \x20   add eax, [b]\n\
             \x20   mov dword [t0], eax\n\
             \x20   mov eax, [t0]\n\
             \x20   mov dword [x], eax\n"
        );
    }

    #[test]
    fn literals_are_immediates() {
        let (asm, _) = lower(&["x = 5", "b = true", "t1 = x * 3", "t2 = x / t1"], AsmOptions::empty());

        assert!(!asm.contains("5 dd 0"));
        assert_eq!(
            text_section(&asm),
            [
                "    mov dword [x], 5",
                "    mov dword [b], 1",
                "    mov eax, [x]",
                "    imul eax, 3",
                "    mov dword [t1], eax",
                "    mov eax, [x]",
                "    mov ebx, [t1]",
                "    cdq",
                "    idiv ebx",
                "    mov dword [t2], eax",
            ]
        );
    }

    #[test]
    fn control_flow() {
        let tac = [
            "t0 = x > 3",
            "if t0 goto L1",
            "goto L2",
            "L1:",
            "agar x <= 10 goto L2",
            "L2:",
        ];

        let (asm, _) = lower(&tac, AsmOptions::empty());
        assert_eq!(
            text_section(&asm),
            [
                "    mov eax, [x]",
                "    cmp eax, 3",
                "    setg al",
                "    movzx eax, al",
                "    mov dword [t0], eax",
                "    cmp dword [t0], 1",
                "    je L1",
                "    jmp L2",
                "",
                "L1:",
                "    mov eax, [x]",
                "    cmp eax, 10",
                "    jle L2",
                "",
                "L2:",
            ]
        );
    }

    #[test]
    fn every_comparison_has_its_condition_code() {
        let cases = [
            ("<", "l"),
            (">", "g"),
            ("<=", "le"),
            (">=", "ge"),
            ("==", "e"),
            ("!=", "ne"),
        ];

        for (op, code) in cases {
            let assign = format!("t0 = x {} 1", op);
            let branch = format!("if x {} 1 goto L1", op);
            let (asm, warnings) = lower(&[assign.as_str(), branch.as_str(), "L1:"], AsmOptions::empty());

            assert!(warnings.is_empty());
            assert!(asm.contains(&format!("    set{} al\n", code)), "{}", asm);
            assert!(asm.contains(&format!("    j{} L1\n", code)), "{}", asm);
        }
    }

    #[test]
    fn logical_operators_normalize_operands() {
        let (asm, _) = lower(&["t2 = t0 && t1"], AsmOptions::empty());
        assert_eq!(
            text_section(&asm),
            [
                "    mov eax, [t0]",
                "    cmp eax, 0",
                "    setne al",
                "    movzx eax, al",
                "    mov ebx, [t1]",
                "    cmp ebx, 0",
                "    setne bl",
                "    movzx ebx, bl",
                "    and eax, ebx",
                "    mov dword [t2], eax",
            ]
        );
    }

    #[test]
    fn unsupported_lines_are_skipped() {
        let (asm, warnings) = lower(&["return t0", "print x", "", "x = 1"], AsmOptions::empty());

        assert_eq!(
            warnings,
            [
                LoweringWarning::Unsupported("return t0".into()),
                LoweringWarning::Unsupported("print x".into()),
            ]
        );

        assert_eq!(text_section(&asm), ["    mov dword [x], 1"]);
        assert!(asm.contains("    t0 dd 0"));
    }

    #[test]
    fn exit_sequence() {
        let (asm, _) = lower(&[], AsmOptions::EXIT);
        assert_eq!(
            text_section(&asm),
            ["    mov eax, 1", "    xor ebx, ebx", "    int 0x80"]
        );

        let (asm, _) = lower(&[], AsmOptions::empty());
        assert!(text_section(&asm).is_empty());
    }
}
