//! Traducción de instrucciones individuales a x86 de 32 bits.
//!
//! Todas las variables residen en memoria. `eax` es el registro de
//! trabajo; `ebx` solo se usa como segundo operando de divisiones y
//! operadores lógicos.

use std::{
    fmt,
    io::{self, Write},
};

use crate::ir::{BinOp, Condition, Instruction, Label, Operand, Rvalue};

#[derive(Copy, Clone)]
enum Reg {
    Eax,
    Ebx,
    Al,
    Bl,
}

impl Reg {
    /// Byte bajo de un registro de 32 bits.
    fn low_byte(self) -> Reg {
        match self {
            Reg::Eax | Reg::Al => Reg::Al,
            Reg::Ebx | Reg::Bl => Reg::Bl,
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Eax => "eax",
            Reg::Ebx => "ebx",
            Reg::Al => "al",
            Reg::Bl => "bl",
        };

        formatter.write_str(name)
    }
}

pub struct Emitter<'a, W> {
    output: &'a mut W,
}

impl<'a, W: Write> Emitter<'a, W> {
    pub fn new(output: &'a mut W) -> Self {
        Emitter { output }
    }

    /// Traduce una instrucción. `return` no tiene traducción y se ignora.
    pub fn instruction(&mut self, instruction: &Instruction) -> io::Result<()> {
        match instruction {
            Instruction::Assign { target, value } => self.assign(target, value),
            Instruction::Branch {
                condition, target, ..
            } => self.branch(condition, target),

            Instruction::Goto(label) => emit!(self, "jmp", "{}", label),
            Instruction::Label(label) => {
                writeln!(self.output)?;
                writeln!(self.output, "{}:", label)
            }

            Instruction::Return(_) => Ok(()),
        }
    }

    /// Llamada al sistema `exit(0)` de Linux.
    pub fn exit(&mut self) -> io::Result<()> {
        emit!(self, "mov", "{}, 1", Reg::Eax)?;
        emit!(self, "xor", "{0}, {0}", Reg::Ebx)?;
        emit!(self, "int", "0x80")
    }

    fn assign(&mut self, target: &str, value: &Rvalue) -> io::Result<()> {
        match value {
            Rvalue::Copy(Operand::Name(source)) => {
                emit!(self, "mov", "{}, [{}]", Reg::Eax, source)?;
            }

            Rvalue::Copy(literal) => {
                return emit!(self, "mov", "dword [{}], {}", target, operand(literal));
            }

            Rvalue::Binary(lhs, op, rhs) => self.binary(lhs, *op, rhs)?,
        }

        emit!(self, "mov", "dword [{}], {}", target, Reg::Eax)
    }

    /// Deja el resultado de `lhs op rhs` en `eax`.
    fn binary(&mut self, lhs: &Operand, op: BinOp, rhs: &Operand) -> io::Result<()> {
        let rhs = operand(rhs);
        self.load(Reg::Eax, lhs)?;

        match op {
            BinOp::Add => emit!(self, "add", "{}, {}", Reg::Eax, rhs),
            BinOp::Sub => emit!(self, "sub", "{}, {}", Reg::Eax, rhs),
            BinOp::Mul => emit!(self, "imul", "{}, {}", Reg::Eax, rhs),
            BinOp::Div => {
                emit!(self, "mov", "{}, {}", Reg::Ebx, rhs)?;
                emit!(self, "cdq")?;
                emit!(self, "idiv", "{}", Reg::Ebx)
            }

            BinOp::And | BinOp::Or => {
                self.normalize(Reg::Eax)?;
                emit!(self, "mov", "{}, {}", Reg::Ebx, rhs)?;
                self.normalize(Reg::Ebx)?;

                let opcode = if op == BinOp::And { "and" } else { "or" };
                emit!(self, opcode, "{}, {}", Reg::Eax, Reg::Ebx)
            }

            comparison => {
                emit!(self, "cmp", "{}, {}", Reg::Eax, rhs)?;
                emit!(self, format!("set{}", condition_code(comparison)), "{}", Reg::Al)?;
                emit!(self, "movzx", "{}, {}", Reg::Eax, Reg::Al)
            }
        }
    }

    fn branch(&mut self, condition: &Condition, target: &Label) -> io::Result<()> {
        match condition {
            Condition::Flag(Operand::Name(flag)) => {
                emit!(self, "cmp", "dword [{}], 1", flag)?;
                emit!(self, "je", "{}", target)
            }

            Condition::Flag(literal) => {
                self.load(Reg::Eax, literal)?;
                emit!(self, "cmp", "{}, 1", Reg::Eax)?;
                emit!(self, "je", "{}", target)
            }

            Condition::Compare(lhs, op, rhs) => {
                self.load(Reg::Eax, lhs)?;
                emit!(self, "cmp", "{}, {}", Reg::Eax, operand(rhs))?;
                emit!(self, format!("j{}", condition_code(*op)), "{}", target)
            }
        }
    }

    fn load(&mut self, register: Reg, value: &Operand) -> io::Result<()> {
        emit!(self, "mov", "{}, {}", register, operand(value))
    }

    /// Reduce un registro a 0 o 1 según sea cero o no.
    fn normalize(&mut self, register: Reg) -> io::Result<()> {
        emit!(self, "cmp", "{}, 0", register)?;
        emit!(self, "setne", "{}", register.low_byte())?;
        emit!(self, "movzx", "{}, {}", register, register.low_byte())
    }
}

/// Variables en memoria, literales como inmediatos.
fn operand(value: &Operand) -> String {
    match value {
        Operand::Name(name) => format!("[{}]", name),
        Operand::Int(text) => text.clone(),
        Operand::Float(text) => format!("__float32__({})", text),
        Operand::Bool(true) => String::from("1"),
        Operand::Bool(false) => String::from("0"),
        Operand::Str(_) => value.to_string(),
    }
}

/// Sufijo de condición para `j<cc>` y `set<cc>`.
fn condition_code(op: BinOp) -> &'static str {
    match op {
        BinOp::Greater => "g",
        BinOp::Less => "l",
        BinOp::GreaterOrEqual => "ge",
        BinOp::LessOrEqual => "le",
        BinOp::Equal => "e",
        BinOp::NotEqual => "ne",

        // `Condition::Compare` y la rama de comparación de `binary()`
        // solo admiten operadores relacionales y de igualdad
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::And | BinOp::Or => {
            unreachable!()
        }
    }
}
