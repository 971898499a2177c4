//! Código de tres direcciones (TAC).
//!
//! El parser emite instrucciones estructuradas, pero la frontera con
//! las fases posteriores es su forma textual: una instrucción por línea,
//! con separadores exactos (` = `, `if `, ` goto `, `:` final). Por esta
//! razón cada instrucción implementa tanto [`Display`] como [`FromStr`],
//! y ambos deben mantenerse en sincronía.
//!
//! ```text
//! t0 = x > 3
//! if t0 goto L1
//! goto L2
//! L1:
//! x = 1
//! ```

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

use crate::semantic::LiteralKind;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TacError {
    #[error("Unsupported TAC instruction: {0}")]
    Unsupported(String),

    #[error("Malformed operand `{0}`")]
    BadOperand(String),

    #[error("Unknown operator `{0}`")]
    BadOperator(String),
}

/// Un programa completo en TAC.
///
/// Temporales (`t<N>`) y etiquetas (`L<N>`) se numeran con un mismo
/// contador monótono, por lo cual ningún nombre sintético se repite.
#[derive(Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    counter: u32,
}

impl Program {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Reserva un nombre de temporal nuevo.
    pub fn temp(&mut self) -> String {
        format!("t{}", self.next_id())
    }

    /// Reserva una etiqueta nueva.
    pub fn label(&mut self) -> Label {
        Label(format!("L{}", self.next_id()))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Retira las instrucciones emitidas a partir de `at`.
    ///
    /// Permite emitir código fuera del orden en que se analizó, como
    /// el paso de un `for`, que aparece antes del cuerpo en el código
    /// fuente pero se ejecuta después de este.
    pub fn detach(&mut self, at: usize) -> Vec<Instruction> {
        self.instructions.split_off(at)
    }

    pub fn attach(&mut self, instructions: Vec<Instruction>) {
        self.instructions.extend(instructions);
    }

    /// Forma textual, una instrucción por elemento.
    pub fn lines(&self) -> Vec<String> {
        self.instructions.iter().map(ToString::to_string).collect()
    }

    fn next_id(&mut self) -> u32 {
        let id = self.counter;
        self.counter += 1;
        id
    }
}

/// Determina si un nombre tiene la forma de un temporal o una etiqueta.
pub fn is_synthetic(name: &str) -> bool {
    match name.strip_prefix(&['t', 'L'][..]) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

impl Display for Program {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in &self.instructions {
            writeln!(fmt, "{}", instruction)?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Label(pub String);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Operando de una instrucción.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Variable del programa o temporal.
    Name(String),

    /// Literal entero, posiblemente negativo.
    Int(String),

    /// Literal de punto flotante, posiblemente negativo.
    Float(String),

    Bool(bool),

    Str(String),
}

impl Operand {
    /// Categoría del literal, o `None` si el operando es un nombre.
    pub fn literal_kind(&self) -> Option<LiteralKind> {
        match self {
            Operand::Name(_) => None,
            Operand::Int(_) => Some(LiteralKind::Int),
            Operand::Float(_) => Some(LiteralKind::Float),
            Operand::Bool(_) => Some(LiteralKind::Bool),
            Operand::Str(_) => Some(LiteralKind::Str),
        }
    }

    /// Texto del operando sin comillas ni escapes.
    pub fn text(&self) -> String {
        match self {
            Operand::Name(text) | Operand::Int(text) | Operand::Float(text) => text.clone(),
            Operand::Str(text) => text.clone(),
            Operand::Bool(value) => value.to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Operand::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Name(text) | Operand::Int(text) | Operand::Float(text) => fmt.write_str(text),
            Operand::Bool(value) => write!(fmt, "{}", value),
            Operand::Str(text) => {
                // Un salto de línea crudo partiría la instrucción en dos
                fmt.write_str("\"")?;
                for c in text.chars() {
                    match c {
                        '"' | '\\' => write!(fmt, "\\{}", c)?,
                        '\n' => fmt.write_str("\\n")?,
                        '\r' => fmt.write_str("\\r")?,
                        _ => write!(fmt, "{}", c)?,
                    }
                }

                fmt.write_str("\"")
            }
        }
    }
}

impl FromStr for Operand {
    type Err = TacError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bad = || TacError::BadOperand(text.to_string());

        if let Some(quoted) = text.strip_prefix('"') {
            let body = quoted.strip_suffix('"').ok_or_else(bad)?;

            let mut unescaped = String::with_capacity(body.len());
            let mut chars = body.chars();
            while let Some(c) = chars.next() {
                match (c, chars.clone().next()) {
                    ('\\', Some(next @ ('"' | '\\' | 'n' | 'r'))) => {
                        let next = match next {
                            'n' => '\n',
                            'r' => '\r',
                            other => other,
                        };

                        unescaped.push(next);
                        chars.next();
                    }

                    _ => unescaped.push(c),
                }
            }

            return Ok(Operand::Str(unescaped));
        }

        match text {
            "true" => return Ok(Operand::Bool(true)),
            "false" => return Ok(Operand::Bool(false)),
            _ => (),
        }

        let unsigned = text.strip_prefix('-').unwrap_or(text);
        match unsigned.chars().next() {
            Some(c) if c.is_ascii_digit() => {
                if unsigned.chars().all(|c| c.is_ascii_digit()) {
                    Ok(Operand::Int(text.to_string()))
                } else {
                    Ok(Operand::Float(text.to_string()))
                }
            }

            Some(c) if unsigned.len() == text.len() && (c.is_ascii_alphabetic() || c == '_') => {
                if text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    Ok(Operand::Name(text.to_string()))
                } else {
                    Err(bad())
                }
            }

            _ => Err(bad()),
        }
    }
}

/// Operador binario.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

const OPERATORS: &[(&str, BinOp)] = &[
    ("+",  BinOp::Add),
    ("-",  BinOp::Sub),
    ("*",  BinOp::Mul),
    ("/",  BinOp::Div),
    ("<",  BinOp::Less),
    (">",  BinOp::Greater),
    ("<=", BinOp::LessOrEqual),
    (">=", BinOp::GreaterOrEqual),
    ("==", BinOp::Equal),
    ("!=", BinOp::NotEqual),
    ("&&", BinOp::And),
    ("||", BinOp::Or),
];

impl BinOp {
    /// Determina si el operador es relacional o de igualdad.
    pub fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(
            self,
            Less | Greater | LessOrEqual | GreaterOrEqual | Equal | NotEqual
        )
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = OPERATORS
            .iter()
            .find(|&&(_, op)| op == *self)
            .map(|&(symbol, _)| symbol)
            .unwrap_or_default();

        fmt.write_str(symbol)
    }
}

impl FromStr for BinOp {
    type Err = TacError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        OPERATORS
            .iter()
            .find(|&&(symbol, _)| symbol == text)
            .map(|&(_, op)| op)
            .ok_or_else(|| TacError::BadOperator(text.to_string()))
    }
}

/// Lado derecho de una asignación.
#[derive(Clone, Debug, PartialEq)]
pub enum Rvalue {
    Copy(Operand),
    Binary(Operand, BinOp, Operand),
}

impl Display for Rvalue {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rvalue::Copy(operand) => write!(fmt, "{}", operand),
            Rvalue::Binary(lhs, op, rhs) => write!(fmt, "{} {} {}", lhs, op, rhs),
        }
    }
}

impl FromStr for Rvalue {
    type Err = TacError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let parts = words(text)?;
        match parts.as_slice() {
            [operand] => Ok(Rvalue::Copy(operand.parse()?)),
            [lhs, op, rhs] => Ok(Rvalue::Binary(lhs.parse()?, op.parse()?, rhs.parse()?)),
            _ => Err(TacError::Unsupported(text.to_string())),
        }
    }
}

/// Condición de un salto condicional.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Se salta si el operando es verdadero.
    Flag(Operand),

    /// Se salta si la comparación se cumple.
    Compare(Operand, BinOp, Operand),
}

impl Display for Condition {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Flag(operand) => write!(fmt, "{}", operand),
            Condition::Compare(lhs, op, rhs) => write!(fmt, "{} {} {}", lhs, op, rhs),
        }
    }
}

impl FromStr for Condition {
    type Err = TacError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.parse::<Rvalue>()? {
            Rvalue::Copy(operand) => Ok(Condition::Flag(operand)),
            Rvalue::Binary(lhs, op, rhs) if op.is_comparison() => {
                Ok(Condition::Compare(lhs, op, rhs))
            }

            Rvalue::Binary(..) => Err(TacError::Unsupported(text.to_string())),
        }
    }
}

/// Ortografía de un salto condicional.
///
/// Las construcciones `agar` conservan su palabra clave localizada
/// en el TAC emitido.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Conditional {
    If,
    Agar,
}

impl Display for Conditional {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conditional::If => fmt.write_str("if"),
            Conditional::Agar => fmt.write_str("agar"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// `target = value`
    Assign { target: String, value: Rvalue },

    /// `label:`
    Label(Label),

    /// `if condition goto target`
    Branch {
        keyword: Conditional,
        condition: Condition,
        target: Label,
    },

    /// `goto target`
    Goto(Label),

    /// `return value`
    Return(Operand),
}

impl Instruction {
    /// Todos los operandos que la instrucción lee o escribe.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Instruction::Assign { target, value } => {
                let mut operands = vec![Operand::Name(target.clone())];
                match value {
                    Rvalue::Copy(operand) => operands.push(operand.clone()),
                    Rvalue::Binary(lhs, _, rhs) => operands.extend([lhs.clone(), rhs.clone()]),
                }

                operands
            }

            Instruction::Branch { condition, .. } => match condition {
                Condition::Flag(operand) => vec![operand.clone()],
                Condition::Compare(lhs, _, rhs) => vec![lhs.clone(), rhs.clone()],
            },

            Instruction::Return(operand) => vec![operand.clone()],
            Instruction::Label(_) | Instruction::Goto(_) => Vec::new(),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assign { target, value } => write!(fmt, "{} = {}", target, value),
            Instruction::Label(label) => write!(fmt, "{}:", label),
            Instruction::Branch {
                keyword,
                condition,
                target,
            } => write!(fmt, "{} {} goto {}", keyword, condition, target),

            Instruction::Goto(label) => write!(fmt, "goto {}", label),
            Instruction::Return(operand) => write!(fmt, "return {}", operand),
        }
    }
}

impl FromStr for Instruction {
    type Err = TacError;

    /// Reconoce la forma de una línea en el mismo orden en que lo hace
    /// la generación de ensamblador: asignación, salto condicional,
    /// salto incondicional, etiqueta y por último `return`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let unsupported = || TacError::Unsupported(line.to_string());

        // Un ` = ` dentro de un literal de string no separa una asignación
        let assignment = line
            .split_once(" = ")
            .filter(|(target, _)| !target.contains(char::is_whitespace));

        if let Some((target, value)) = assignment {
            let target = match target.trim().parse::<Operand>()? {
                Operand::Name(name) => name,
                _ => return Err(unsupported()),
            };

            let value: Rvalue = value.trim().parse()?;
            return Ok(Instruction::Assign { target, value });
        }

        let conditional = [("if ", Conditional::If), ("agar ", Conditional::Agar)]
            .into_iter()
            .find_map(|(prefix, keyword)| line.strip_prefix(prefix).map(|rest| (keyword, rest)));

        if let Some((keyword, rest)) = conditional {
            let (condition, target) = rest.rsplit_once(" goto ").ok_or_else(unsupported)?;
            return Ok(Instruction::Branch {
                keyword,
                condition: condition.trim().parse()?,
                target: label(target).ok_or_else(unsupported)?,
            });
        }

        if let Some(target) = line.strip_prefix("goto ") {
            return label(target).map(Instruction::Goto).ok_or_else(unsupported);
        }

        if let Some(name) = line.strip_suffix(':') {
            return label(name).map(Instruction::Label).ok_or_else(unsupported);
        }

        if let Some(operand) = line.strip_prefix("return ") {
            return operand.trim().parse().map(Instruction::Return);
        }

        Err(unsupported())
    }
}

/// Separa por espacios en blanco, excepto dentro de literales de string.
fn words(text: &str) -> Result<Vec<&str>, TacError> {
    let mut words = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let end = if rest.starts_with('"') {
            quoted_len(rest).ok_or_else(|| TacError::BadOperand(rest.to_string()))?
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };

        let (word, tail) = rest.split_at(end);
        words.push(word);
        rest = tail.trim_start();
    }

    Ok(words)
}

/// Longitud en bytes de un literal de string al inicio del texto,
/// incluyendo ambas comillas.
fn quoted_len(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (index, c) in text.char_indices().skip(1) {
        match (escaped, c) {
            (false, '\\') => escaped = true,
            (false, '"') => return Some(index + 1),
            _ => escaped = false,
        }
    }

    None
}

fn label(text: &str) -> Option<Label> {
    let text = text.trim();
    let valid = !text.is_empty()
        && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

    valid.then(|| Label(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(name: &str) -> Operand {
        Operand::Name(name.to_string())
    }

    #[test]
    fn counter_is_shared() {
        let mut program = Program::new();

        assert_eq!(program.temp(), "t0");
        assert_eq!(program.label(), Label("L1".into()));
        assert_eq!(program.temp(), "t2");
    }

    #[test]
    fn synthetic_names() {
        assert!(is_synthetic("t0"));
        assert!(is_synthetic("L17"));
        assert!(!is_synthetic("t"));
        assert!(!is_synthetic("total"));
        assert!(!is_synthetic("l0"));
        assert!(!is_synthetic("t1a"));
    }

    #[test]
    fn text_form() {
        let instructions = [
            Instruction::Assign {
                target: "t0".into(),
                value: Rvalue::Binary(name("a"), BinOp::Add, Operand::Int("2".into())),
            },
            Instruction::Branch {
                keyword: Conditional::Agar,
                condition: Condition::Flag(name("t0")),
                target: Label("L1".into()),
            },
            Instruction::Goto(Label("L2".into())),
            Instruction::Label(Label("L1".into())),
            Instruction::Assign {
                target: "s".into(),
                value: Rvalue::Copy(Operand::Str("a = \"b\"".into())),
            },
            Instruction::Return(Operand::Bool(false)),
        ];

        let text: Vec<_> = instructions.iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            [
                "t0 = a + 2",
                "agar t0 goto L1",
                "goto L2",
                "L1:",
                r#"s = "a = \"b\"""#,
                "return false",
            ]
        );

        for (line, instruction) in text.iter().zip(&instructions) {
            assert_eq!(&line.parse::<Instruction>().unwrap(), instruction);
        }
    }

    #[test]
    fn strings_with_spaces_and_newlines() {
        let compare: Instruction = r#"t1 = s != "hello world""#.parse().unwrap();
        assert_eq!(
            compare,
            Instruction::Assign {
                target: "t1".into(),
                value: Rvalue::Binary(name("s"), BinOp::NotEqual, Operand::Str("hello world".into())),
            }
        );

        let branch: Instruction = r#"if s == "a = b goto c" goto L3"#.parse().unwrap();
        assert_eq!(
            branch,
            Instruction::Branch {
                keyword: Conditional::If,
                condition: Condition::Compare(name("s"), BinOp::Equal, Operand::Str("a = b goto c".into())),
                target: Label("L3".into()),
            }
        );

        let multiline = Instruction::Assign {
            target: "s".into(),
            value: Rvalue::Copy(Operand::Str("a\nb\\n".into())),
        };

        let line = multiline.to_string();
        assert_eq!(line, r#"s = "a\nb\\n""#);
        assert_eq!(line.lines().count(), 1);
        assert_eq!(line.parse::<Instruction>(), Ok(multiline));

        assert!(r#"t0 = "open + 1"#.parse::<Instruction>().is_err());
    }

    #[test]
    fn comparison_conditions() {
        let branch: Instruction = "if a <= 10 goto L4".parse().unwrap();

        assert_eq!(
            branch,
            Instruction::Branch {
                keyword: Conditional::If,
                condition: Condition::Compare(name("a"), BinOp::LessOrEqual, Operand::Int("10".into())),
                target: Label("L4".into()),
            }
        );

        assert!("if a + 1 goto L4".parse::<Instruction>().is_err());
    }

    #[test]
    fn operands() {
        assert_eq!("-3".parse(), Ok(Operand::Int("-3".into())));
        assert_eq!("2.5e3".parse(), Ok(Operand::Float("2.5e3".into())));
        assert_eq!("true".parse(), Ok(Operand::Bool(true)));
        assert_eq!("t12".parse(), Ok(name("t12")));
        assert!("-x".parse::<Operand>().is_err());
        assert!("a$".parse::<Operand>().is_err());
    }

    #[test]
    fn garbage_is_unsupported() {
        assert_eq!(
            "print x".parse::<Instruction>(),
            Err(TacError::Unsupported("print x".into()))
        );

        assert!("x = a + b + c".parse::<Instruction>().is_err());
        assert!("goto".parse::<Instruction>().is_err());
    }
}
