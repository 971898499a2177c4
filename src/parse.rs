//! Análisis sintáctico y emisión de código de tres direcciones.
//!
//! El parser es de descenso recursivo y de una sola pasada. Conforme
//! reconoce construcciones emite instrucciones TAC (ver [`crate::ir`])
//! y registra declaraciones en la tabla de símbolos, por lo cual no
//! existe un AST intermedio. Normalmente basta un token de lookahead;
//! los pasos `i++` e `i--` de un `for` requieren dos.
//!
//! # Precedencia
//! De menor a mayor: `||`, `&&`, igualdad, relacionales, aditivos,
//! multiplicativos y por último el menos unario. Todos los niveles
//! binarios asocian a la izquierda y cada operación produce un
//! temporal nuevo.
//!
//! # Errores
//! El primer error, sintáctico o semántico, aborta el análisis.

use std::collections::HashSet;
use thiserror::Error;

use crate::{
    ir::{self, BinOp, Condition, Conditional, Instruction, Label, Operand, Program, Rvalue},
    lex::{Identifier, Keyword, Token},
    semantic::{Scope, Semantic, SemanticError, SymbolTable, Type, Value},
    source::{Located, Location},
};

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected a statement, found {0} instead")]
    ExpectedStatement(Token),

    #[error("Expected identifier, found {0} instead")]
    ExpectedId(Token),

    #[error("Expected an expression, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Expected a literal, found {0} instead")]
    ExpectedLiteral(Token),

    #[error("Expected any of `case`, `default` or `}}`, found {0} instead")]
    ExpectedCase(Token),

    #[error("Expected `++`, `--` or an assignment as loop step, found {0} instead")]
    ExpectedStep(Token),

    #[error("Multiple `default` labels in the same switch")]
    MultipleDefaults,

    #[error("`break` outside of a loop or switch")]
    BreakOutsideLoop,

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,
}

/// Error fatal durante el análisis.
#[derive(Debug, PartialEq)]
pub enum Failure {
    Syntax(Located<ParserError>),
    Semantic(Located<SemanticError>),
}

impl Failure {
    pub fn location(&self) -> &Location {
        match self {
            Failure::Syntax(error) => error.location(),
            Failure::Semantic(error) => error.location(),
        }
    }
}

/// Resultado de un análisis exitoso.
///
/// El llamador es dueño de ambas partes. La generación de código solo
/// necesita el programa.
#[derive(Debug, Default)]
pub struct Compilation {
    pub symbols: SymbolTable,
    pub program: Program,
}

pub fn parse(tokens: &[Located<Token>]) -> Result<Compilation, Failure> {
    let last_known = match tokens.first() {
        Some(first) => first.location().clone(),
        None => return Ok(Compilation::default()),
    };

    let mut parser = Parser {
        tokens,
        cursor: 0,
        last_known,
        compilation: Compilation::default(),
        jumps: Vec::new(),
        procedures: HashSet::new(),
    };

    parser.program()?;
    Ok(parser.compilation)
}

type Parse<T> = Result<T, Failure>;

struct Parser<'a> {
    tokens: &'a [Located<Token>],
    cursor: usize,
    last_known: Location,
    compilation: Compilation,
    jumps: Vec<Jumps>,
    procedures: HashSet<Identifier>,
}

/// Destinos de `break` y `continue` para la construcción más interna.
struct Jumps {
    exit: Label,

    /// Un `switch` no tiene punto de continuación.
    resume: Option<Label>,
}

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<()> {
        while *self.peek().val() != Token::Eof {
            self.statement()?;
        }

        Ok(())
    }

    fn statement(&mut self) -> Parse<()> {
        match self.peek().val() {
            Token::Keyword(keyword) if Type::from_keyword(*keyword).is_some() => {
                self.declaration()
            }

            Token::Id(_) => self.assignment(),
            Token::OpenCurly => self.block(),
            Token::Directive(_) => {
                self.next();
                Ok(())
            }

            Token::Keyword(Keyword::If) => self.conditional(Conditional::If),
            Token::Keyword(Keyword::Agar) => self.conditional(Conditional::Agar),
            Token::Keyword(Keyword::While) => self.while_loop(),
            Token::Keyword(Keyword::Do) => self.do_while_loop(),
            Token::Keyword(Keyword::For) => self.for_loop(),
            Token::Keyword(Keyword::Switch) => self.switch(),
            Token::Keyword(Keyword::Break) => self.break_statement(),
            Token::Keyword(Keyword::Continue) => self.continue_statement(),
            Token::Keyword(Keyword::Return) => self.return_statement(),
            Token::Keyword(Keyword::Void) => self.procedure(),
            Token::Keyword(Keyword::Cout) => self.print(),
            Token::Keyword(Keyword::Cin) => self.input(),

            _ => {
                let found = self.next().val().clone();
                self.fail(ParserError::ExpectedStatement(found))
            }
        }
    }

    fn block(&mut self) -> Parse<()> {
        self.expect(Token::OpenCurly)?;
        while !matches!(self.peek().val(), Token::CloseCurly | Token::Eof) {
            self.statement()?;
        }

        self.expect(Token::CloseCurly)
    }

    fn declaration(&mut self) -> Parse<()> {
        let token = self.next().val();
        let typ = match token {
            Token::Keyword(keyword) => Type::from_keyword(*keyword),
            _ => None,
        };

        let typ = match typ {
            Some(typ) => typ,
            None => return self.fail(ParserError::ExpectedStatement(token.clone())),
        };

        let (location, name) = self.id()?.split();
        if ir::is_synthetic(name.as_ref()) {
            let error = SemanticError::ReservedName(name.to_string());
            return self.check(Err(error), &location);
        }

        if self.procedures.contains(&name) {
            let error = SemanticError::DuplicateDeclaration(name.to_string());
            return self.check(Err(error), &location);
        }

        let declared = self.compilation.symbols.declare(name.as_ref(), typ, Scope::Global);
        self.check(declared, &location)?;

        if *self.peek().val() == Token::Assign {
            self.next();

            let value = self.initializer()?;
            self.store(&name, value, &location)?;
        }

        self.expect(Token::Semicolon)
    }

    fn assignment(&mut self) -> Parse<()> {
        let (location, name) = self.id()?.split();
        self.declared(&name, &location)?;

        self.expect(Token::Assign)?;
        let value = self.initializer()?;
        self.store(&name, value, &location)?;

        self.expect(Token::Semicolon)
    }

    /// Lado derecho de una declaración o asignación.
    fn initializer(&mut self) -> Parse<Operand> {
        match self.peek().val() {
            Token::StrLiteral(text) => {
                let text = text.clone();
                self.next();

                Ok(Operand::Str(text))
            }

            _ => self.expr(),
        }
    }

    /// Asigna a una variable ya declarada y emite `name = value`.
    ///
    /// Los literales se validan contra el tipo declarado y se almacenan
    /// con su valor tipado. Cualquier otro resultado se almacena
    /// textualmente.
    fn store(&mut self, name: &Identifier, value: Operand, at: &Location) -> Parse<()> {
        let symbols = &mut self.compilation.symbols;
        let stored = symbols.lookup_type(name.as_ref()).and_then(|typ| {
            let stored = match value.literal_kind() {
                Some(kind) => {
                    let text = value.text();
                    if !typ.accepts(kind, &text) {
                        return Err(SemanticError::TypeMismatch(typ, kind));
                    }

                    Value::parse_literal(typ, &text)?
                }

                None => Value::Str(value.text()),
            };

            symbols.set(name.as_ref(), stored)
        });

        self.check(stored, at)?;
        self.emit(Instruction::Assign {
            target: name.to_string(),
            value: Rvalue::Copy(value),
        });

        Ok(())
    }

    fn conditional(&mut self, keyword: Conditional) -> Parse<()> {
        let (opening, alternative) = match keyword {
            Conditional::If => (Keyword::If, Keyword::Else),
            Conditional::Agar => (Keyword::Agar, Keyword::Magar),
        };

        self.keyword(opening)?;
        let condition = self.condition()?;

        let then = self.compilation.program.label();
        let otherwise = self.compilation.program.label();
        let join = self.compilation.program.label();

        self.emit(Instruction::Branch {
            keyword,
            condition,
            target: then.clone(),
        });

        self.emit(Instruction::Goto(otherwise.clone()));
        self.emit(Instruction::Label(then));
        self.statement()?;

        if *self.peek().val() == Token::Keyword(alternative) {
            self.next();

            self.emit(Instruction::Goto(join.clone()));
            self.emit(Instruction::Label(otherwise));
            self.statement()?;
            self.emit(Instruction::Label(join));
        } else {
            self.emit(Instruction::Label(otherwise));
        }

        Ok(())
    }

    fn while_loop(&mut self) -> Parse<()> {
        self.keyword(Keyword::While)?;

        let start = self.compilation.program.label();
        self.emit(Instruction::Label(start.clone()));

        let condition = self.condition()?;
        let body = self.compilation.program.label();
        let end = self.compilation.program.label();

        self.branch(condition, body.clone());
        self.emit(Instruction::Goto(end.clone()));
        self.emit(Instruction::Label(body));

        self.nested(end.clone(), Some(start.clone()), Parser::block)?;

        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));

        Ok(())
    }

    fn do_while_loop(&mut self) -> Parse<()> {
        self.keyword(Keyword::Do)?;

        let start = self.compilation.program.label();
        let check = self.compilation.program.label();
        let end = self.compilation.program.label();

        self.emit(Instruction::Label(start.clone()));
        self.nested(end.clone(), Some(check.clone()), Parser::block)?;

        self.keyword(Keyword::While)?;
        self.emit(Instruction::Label(check));

        let condition = self.condition()?;
        self.expect(Token::Semicolon)?;

        self.branch(condition, start);
        self.emit(Instruction::Label(end));

        Ok(())
    }

    fn for_loop(&mut self) -> Parse<()> {
        self.keyword(Keyword::For)?;
        self.expect(Token::OpenParen)?;

        match self.peek().val() {
            Token::Id(_) => self.assignment()?,
            _ => self.declaration()?,
        }

        let test = self.compilation.program.label();
        self.emit(Instruction::Label(test.clone()));

        let condition = self.expr()?;
        self.expect(Token::Semicolon)?;
        let condition = self.flag(condition);

        let body = self.compilation.program.label();
        let step = self.compilation.program.label();
        let end = self.compilation.program.label();

        self.branch(condition, body.clone());
        self.emit(Instruction::Goto(end.clone()));

        // El paso se analiza aquí, pero se ejecuta después del cuerpo
        let mark = self.compilation.program.len();
        self.step()?;
        let step_code = self.compilation.program.detach(mark);

        self.expect(Token::CloseParen)?;

        self.emit(Instruction::Label(body));
        self.nested(end.clone(), Some(step.clone()), Parser::block)?;

        self.emit(Instruction::Label(step));
        self.compilation.program.attach(step_code);
        self.emit(Instruction::Goto(test));
        self.emit(Instruction::Label(end));

        Ok(())
    }

    /// `id++`, `id--` o `id = expr`.
    fn step(&mut self) -> Parse<()> {
        let (location, name) = self.id()?.split();
        self.declared(&name, &location)?;

        let op = match (self.peek().val(), self.peek_second()) {
            (Token::Plus, Some(Token::Plus)) => BinOp::Add,
            (Token::Minus, Some(Token::Minus)) => BinOp::Sub,

            (Token::Assign, _) => {
                self.next();

                let value = self.initializer()?;
                return self.store(&name, value, &location);
            }

            _ => {
                let found = self.next().val().clone();
                return self.fail(ParserError::ExpectedStep(found));
            }
        };

        self.next();
        self.next();

        let variable = Operand::Name(name.to_string());
        self.emit(Instruction::Assign {
            target: name.to_string(),
            value: Rvalue::Binary(variable, op, Operand::Int(String::from("1"))),
        });

        Ok(())
    }

    fn switch(&mut self) -> Parse<()> {
        self.keyword(Keyword::Switch)?;
        self.expect(Token::OpenParen)?;
        let subject = self.expr()?;
        self.expect(Token::CloseParen)?;
        self.expect(Token::OpenCurly)?;

        let end = self.compilation.program.label();
        self.nested(end.clone(), None, |parser| parser.cases(&subject, &end))?;

        self.emit(Instruction::Label(end));
        Ok(())
    }

    fn cases(&mut self, subject: &Operand, end: &Label) -> Parse<()> {
        let mut has_default = false;

        loop {
            match self.next().val() {
                Token::Keyword(Keyword::Case) => {
                    let literal = self.literal()?;
                    self.expect(Token::Colon)?;

                    let mismatch = self.compilation.program.temp();
                    self.emit(Instruction::Assign {
                        target: mismatch.clone(),
                        value: Rvalue::Binary(subject.clone(), BinOp::NotEqual, literal),
                    });

                    let next = self.compilation.program.label();
                    self.branch(Condition::Flag(Operand::Name(mismatch)), next.clone());

                    self.case_body()?;
                    self.emit(Instruction::Goto(end.clone()));
                    self.emit(Instruction::Label(next));
                }

                Token::Keyword(Keyword::Default) => {
                    if has_default {
                        return self.fail(ParserError::MultipleDefaults);
                    }

                    has_default = true;
                    self.expect(Token::Colon)?;

                    self.case_body()?;
                    self.emit(Instruction::Goto(end.clone()));
                }

                Token::CloseCurly => break Ok(()),

                found => {
                    let found = found.clone();
                    break self.fail(ParserError::ExpectedCase(found));
                }
            }
        }
    }

    fn case_body(&mut self) -> Parse<()> {
        loop {
            match self.peek().val() {
                Token::Keyword(Keyword::Case | Keyword::Default) | Token::CloseCurly | Token::Eof => {
                    break Ok(())
                }

                _ => self.statement()?,
            }
        }
    }

    fn break_statement(&mut self) -> Parse<()> {
        self.keyword(Keyword::Break)?;

        let exit = match self.jumps.last() {
            Some(jumps) => jumps.exit.clone(),
            None => return self.fail(ParserError::BreakOutsideLoop),
        };

        self.expect(Token::Semicolon)?;
        self.emit(Instruction::Goto(exit));

        Ok(())
    }

    fn continue_statement(&mut self) -> Parse<()> {
        self.keyword(Keyword::Continue)?;

        let resume = self.jumps.iter().rev().find_map(|jumps| jumps.resume.clone());
        let resume = match resume {
            Some(resume) => resume,
            None => return self.fail(ParserError::ContinueOutsideLoop),
        };

        self.expect(Token::Semicolon)?;
        self.emit(Instruction::Goto(resume));

        Ok(())
    }

    fn return_statement(&mut self) -> Parse<()> {
        self.keyword(Keyword::Return)?;
        let value = self.expr()?;
        self.expect(Token::Semicolon)?;

        self.emit(Instruction::Return(value));
        Ok(())
    }

    /// Procedimiento sin parámetros. Su cuerpo se emite en línea.
    fn procedure(&mut self) -> Parse<()> {
        self.keyword(Keyword::Void)?;

        let (location, name) = self.id()?.split();
        if self.compilation.symbols.is_declared(name.as_ref()) || !self.procedures.insert(name.clone()) {
            let error = SemanticError::DuplicateDeclaration(name.to_string());
            return self.check(Err(error), &location);
        }

        self.expect(Token::OpenParen)?;
        self.expect(Token::CloseParen)?;
        self.block()
    }

    fn print(&mut self) -> Parse<()> {
        self.keyword(Keyword::Cout)?;
        self.expect(Token::Insert)?;

        match self.next().val() {
            Token::StrLiteral(_) => (),
            found => {
                let found = found.clone();
                return self.fail(ParserError::ExpectedLiteral(found));
            }
        }

        self.expect(Token::Semicolon)
    }

    fn input(&mut self) -> Parse<()> {
        self.keyword(Keyword::Cin)?;
        self.expect(Token::Extract)?;

        let (location, name) = self.id()?.split();
        self.declared(&name, &location)?;

        self.expect(Token::Semicolon)
    }

    /// `( expr )` como condición de salto.
    fn condition(&mut self) -> Parse<Condition> {
        self.expect(Token::OpenParen)?;
        let value = self.expr()?;
        self.expect(Token::CloseParen)?;

        Ok(self.flag(value))
    }

    /// Los literales se materializan en un temporal antes de saltar.
    fn flag(&mut self, value: Operand) -> Condition {
        match value {
            Operand::Name(_) => Condition::Flag(value),
            literal => {
                let temp = self.compilation.program.temp();
                self.emit(Instruction::Assign {
                    target: temp.clone(),
                    value: Rvalue::Copy(literal),
                });

                Condition::Flag(Operand::Name(temp))
            }
        }
    }

    /// Etiqueta de un `case`.
    fn literal(&mut self) -> Parse<Operand> {
        let negative = *self.peek().val() == Token::Minus;
        if negative {
            self.next();
        }

        let literal = match self.next().val() {
            Token::IntLiteral(text) => Operand::Int(text.clone()),
            Token::FloatLiteral(text) => Operand::Float(text.clone()),
            Token::StrLiteral(text) if !negative => Operand::Str(text.clone()),
            Token::Keyword(Keyword::True) if !negative => Operand::Bool(true),
            Token::Keyword(Keyword::False) if !negative => Operand::Bool(false),

            found => {
                let found = found.clone();
                return self.fail(ParserError::ExpectedLiteral(found));
            }
        };

        Ok(if negative { negate(literal) } else { literal })
    }

    fn expr(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::and, |token| match token {
            Token::Or => Some(BinOp::Or),
            _ => None,
        })
    }

    fn and(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::equality, |token| match token {
            Token::And => Some(BinOp::And),
            _ => None,
        })
    }

    fn equality(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::relation, |token| match token {
            Token::Equal => Some(BinOp::Equal),
            Token::NotEqual => Some(BinOp::NotEqual),
            _ => None,
        })
    }

    fn relation(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::additive, |token| match token {
            Token::Less => Some(BinOp::Less),
            Token::Greater => Some(BinOp::Greater),
            Token::LessOrEqual => Some(BinOp::LessOrEqual),
            Token::GreaterOrEqual => Some(BinOp::GreaterOrEqual),
            _ => None,
        })
    }

    fn additive(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::term, |token| match token {
            Token::Plus => Some(BinOp::Add),
            Token::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn term(&mut self) -> Parse<Operand> {
        self.left_associative(Parser::unary, |token| match token {
            Token::Times => Some(BinOp::Mul),
            Token::Slash => Some(BinOp::Div),
            _ => None,
        })
    }

    fn unary(&mut self) -> Parse<Operand> {
        if *self.peek().val() != Token::Minus {
            return self.factor();
        }

        self.next();
        match self.unary()? {
            literal @ (Operand::Int(_) | Operand::Float(_)) => Ok(negate(literal)),
            value => {
                let zero = Operand::Int(String::from("0"));
                Ok(self.binary(zero, BinOp::Sub, value))
            }
        }
    }

    fn factor(&mut self) -> Parse<Operand> {
        let (location, token) = self.next().clone().split();
        match token {
            Token::IntLiteral(text) => Ok(Operand::Int(text)),
            Token::FloatLiteral(text) => Ok(Operand::Float(text)),
            Token::Keyword(Keyword::True) => Ok(Operand::Bool(true)),
            Token::Keyword(Keyword::False) => Ok(Operand::Bool(false)),

            Token::Id(name) => {
                self.declared(&name, &location)?;
                Ok(Operand::Name(name.to_string()))
            }

            Token::OpenParen => {
                let value = self.expr()?;
                self.expect(Token::CloseParen)?;

                Ok(value)
            }

            found => self.fail(ParserError::ExpectedExpr(found)),
        }
    }

    fn left_associative<F, O>(&mut self, mut operand: F, operator: O) -> Parse<Operand>
    where
        F: FnMut(&mut Self) -> Parse<Operand>,
        O: Fn(&Token) -> Option<BinOp>,
    {
        let mut lhs = operand(self)?;
        while let Some(op) = operator(self.peek().val()) {
            self.next();

            let rhs = operand(self)?;
            lhs = self.binary(lhs, op, rhs);
        }

        Ok(lhs)
    }

    fn binary(&mut self, lhs: Operand, op: BinOp, rhs: Operand) -> Operand {
        let temp = self.compilation.program.temp();
        self.emit(Instruction::Assign {
            target: temp.clone(),
            value: Rvalue::Binary(lhs, op, rhs),
        });

        Operand::Name(temp)
    }

    /// Analiza el cuerpo de un ciclo o `switch` con sus destinos de salto.
    fn nested<F>(&mut self, exit: Label, resume: Option<Label>, rule: F) -> Parse<()>
    where
        F: FnOnce(&mut Self) -> Parse<()>,
    {
        self.jumps.push(Jumps { exit, resume });
        let result = rule(self);
        self.jumps.pop();

        result
    }

    fn branch(&mut self, condition: Condition, target: Label) {
        self.emit(Instruction::Branch {
            keyword: Conditional::If,
            condition,
            target,
        });
    }

    fn emit(&mut self, instruction: Instruction) {
        self.compilation.program.push(instruction);
    }

    fn declared(&self, name: &Identifier, at: &Location) -> Parse<()> {
        let symbol = self.compilation.symbols.lookup(name.as_ref());
        self.check(symbol.map(drop), at)
    }

    fn check<T>(&self, result: Semantic<T>, at: &Location) -> Parse<T> {
        result.map_err(|error| Failure::Semantic(Located::at(error, at.clone())))
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next().clone().split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            found => self.fail(ParserError::ExpectedId(found)),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        let found = self.next().val();
        if *found == token {
            Ok(())
        } else {
            let found = found.clone();
            self.fail(ParserError::UnexpectedToken(token, found))
        }
    }

    fn peek(&self) -> &'a Located<Token> {
        let tokens: &'a [Located<Token>] = self.tokens;
        let last = tokens.len().saturating_sub(1);

        &tokens[self.cursor.min(last)]
    }

    fn peek_second(&self) -> Option<&'a Token> {
        let tokens: &'a [Located<Token>] = self.tokens;
        tokens.get(self.cursor + 1).map(Located::val)
    }

    /// Consume un token. Al final del flujo se repite `Eof`.
    fn next(&mut self) -> &'a Located<Token> {
        let token = self.peek();
        self.cursor += 1;
        self.last_known = token.location().clone();

        token
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Syntax(Located::at(error, self.last_known.clone())))
    }
}

fn negate(literal: Operand) -> Operand {
    let flip = |text: String| match text.strip_prefix('-') {
        Some(positive) => positive.to_string(),
        None => format!("-{}", text),
    };

    match literal {
        Operand::Int(text) => Operand::Int(flip(text)),
        Operand::Float(text) => Operand::Float(flip(text)),
        other => other,
    }
}
