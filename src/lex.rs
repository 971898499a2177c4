//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un flujo de
//! caracteres (ver [`crate::source::consume`]) en unidades léxicas
//! denominadas tokens. Los espacios en blanco y los comentarios se
//! descartan durante esta operación. Cada token emitido esta asociado a
//! una ubicación en el código fuente original, lo cual permite rastrear
//! errores tanto en los mismos como en constructos de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por lo que son
//! y su lexema es fijo. Identificadores, literales y directivas de
//! preprocesador conservan su lexema original; en el caso de literales
//! de string se conserva el contenido ya sin comillas ni escapes.
//! Las constantes numéricas no se resuelven aquí, ya que el código de
//! tres direcciones las utiliza textualmente.
//!
//! # Reglas importantes del lenguaje
//! - El lenguaje es case-sensitive.
//! - `agar` y `magar` son sinónimos localizados de `if` y `else`.
//! - Los identificadores son corridas alfanuméricas que inician con una letra.
//! - Una línea que inicia con `#` es una directiva de preprocesador que
//!   no se interpreta.
//!
//! # Errores
//! Cualquier error léxico es fatal. El lexer no intenta recuperarse.

use crate::source::{self, Located, Location};
use std::{
    borrow::Cow,
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Unexpected character {0:?}")]
    BadChar(char),

    /// Un literal de string llegó al final de la entrada sin cerrarse.
    #[error("Unterminated string literal")]
    UnterminatedString,

    /// Un exponente sin dígitos, como en `7e` o `1e+`.
    #[error("Malformed numeric literal `{0}`")]
    MalformedNumber(String),
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal entero, tal como aparece en el código.
    IntLiteral(String),

    /// Literal de punto flotante, tal como aparece en el código.
    FloatLiteral(String),

    /// Literal de string, sin comillas y con escapes resueltos.
    StrLiteral(String),

    /// Línea completa de preprocesador, incluyendo `#`.
    Directive(String),

    /// `=`
    Assign,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `;`
    Semicolon,

    /// `:`
    Colon,

    /// `>`
    Greater,

    /// `<`
    Less,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<=`
    LessOrEqual,

    /// `>=`
    GreaterOrEqual,

    /// `&&`
    And,

    /// `||`
    Or,

    /// `<<`
    Insert,

    /// `>>`
    Extract,

    /// Fin de la entrada. Todo flujo de tokens termina con este.
    Eof,
}

impl Token {
    /// Lexema del token.
    pub fn text(&self) -> Cow<'_, str> {
        use Token::*;

        let fixed = match self {
            Id(id) => return Cow::Borrowed(id.as_ref()),
            Keyword(keyword) => keyword.as_str(),
            IntLiteral(text) | FloatLiteral(text) | StrLiteral(text) | Directive(text) => {
                return Cow::Borrowed(text)
            }

            Assign => "=",
            Plus => "+",
            Minus => "-",
            Times => "*",
            Slash => "/",
            OpenParen => "(",
            CloseParen => ")",
            OpenCurly => "{",
            CloseCurly => "}",
            Semicolon => ";",
            Colon => ":",
            Greater => ">",
            Less => "<",
            Equal => "==",
            NotEqual => "!=",
            LessOrEqual => "<=",
            GreaterOrEqual => ">=",
            And => "&&",
            Or => "||",
            Insert => "<<",
            Extract => ">>",
            Eof => "",
        };

        Cow::Borrowed(fixed)
    }

    /// Nombre de la categoría léxica, tal como se muestra en la tabla de tokens.
    pub fn kind_name(&self) -> Cow<'static, str> {
        use Token::*;

        let name = match self {
            Keyword(keyword) => return Cow::Owned(keyword.as_str().to_uppercase()),

            Id(_) => "IDENTIFIER",
            IntLiteral(_) => "NUMBER",
            FloatLiteral(_) => "FLOAT_LITERAL",
            StrLiteral(_) => "STRING_LITERAL",
            Directive(_) => "PREPROCESSOR",
            Assign => "ASSIGN",
            Plus => "PLUS",
            Minus => "MINUS",
            Times => "MULTIPLY",
            Slash => "DIVIDE",
            OpenParen => "LEFT_PAREN",
            CloseParen => "RIGHT_PAREN",
            OpenCurly => "LEFT_BRACE",
            CloseCurly => "RIGHT_BRACE",
            Semicolon => "SEMICOLON",
            Colon => "COLON",
            Greater => "GREATER_THAN",
            Less => "LESS_THAN",
            Equal => "EQUALS",
            NotEqual => "NOT_EQUALS",
            LessOrEqual => "LESS_OR_EQUAL",
            GreaterOrEqual => "GREATER_OR_EQUAL",
            And => "LOGICAL_AND",
            Or => "LOGICAL_OR",
            Insert => "S_I_O",
            Extract => "E_O",
            Eof => "EOF",
        };

        Cow::Borrowed(name)
    }
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(text) | FloatLiteral(text) => write!(fmt, "literal `{}`", text),
            StrLiteral(text) => write!(fmt, "string {:?}", text),
            Directive(text) => write!(fmt, "directive `{}`", text),
            Eof => fmt.write_str("end of input"),
            other => write!(fmt, "`{}`", other.text()),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Float,
    Double,
    String,
    Bool,
    Char,
    True,
    False,
    If,
    Else,
    Return,
    Agar,
    Magar,
    While,
    For,
    Switch,
    Case,
    Break,
    Continue,
    Default,
    Do,
    Void,
    Cout,
    Cin,
}

const KEYWORDS: &[(&str, Keyword)] = &[
    ("int",      Keyword::Int),
    ("float",    Keyword::Float),
    ("double",   Keyword::Double),
    ("string",   Keyword::String),
    ("bool",     Keyword::Bool),
    ("char",     Keyword::Char),
    ("true",     Keyword::True),
    ("false",    Keyword::False),
    ("if",       Keyword::If),
    ("else",     Keyword::Else),
    ("return",   Keyword::Return),
    ("agar",     Keyword::Agar),
    ("magar",    Keyword::Magar),
    ("while",    Keyword::While),
    ("for",      Keyword::For),
    ("switch",   Keyword::Switch),
    ("case",     Keyword::Case),
    ("break",    Keyword::Break),
    ("continue", Keyword::Continue),
    ("default",  Keyword::Default),
    ("do",       Keyword::Do),
    ("void",     Keyword::Void),
    ("cout",     Keyword::Cout),
    ("cin",      Keyword::Cin),
];

impl Keyword {
    /// Ortografía de la palabra clave en el código fuente.
    pub fn as_str(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|&&(_, keyword)| keyword == self)
            .map(|&(name, _)| name)
            .unwrap_or_default()
    }
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: Peekable<S>,
    state: State,
    start: Location,
    last: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Se emitió [`Token::Eof`] o un error; no hay más tokens.
    Finished,

    /// Estado de completitud; siempre emite el token incluido
    /// sin consumir la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró el primer carácter de un posible operador de
    /// dos caracteres (`=`, `!`, `<`, `>`, `&` o `|`).
    Prefix(char),

    /// Se encontró `/`. Puede ser división o el inicio de un comentario.
    AfterSlash,

    /// Comentario de línea, vuelve a [`State::Start`] al encontrar `'\n'`.
    LineComment,

    /// Comentario de bloque.
    BlockComment,

    /// Se encontró `*` dentro de un comentario de bloque.
    BlockCommentStar,

    /// Directiva de preprocesador, se extiende hasta el fin de línea.
    Preprocessor(String),

    /// Constante numérica.
    Number(String, NumberPhase),

    /// Contenido de un literal de string.
    Str(String),

    /// Se encontró `\` dentro de un literal de string.
    StrEscape(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

/// Parte de una constante numérica que se está escaneando.
#[derive(Copy, Clone)]
enum NumberPhase {
    Integral,
    Fraction,
    ExponentStart,
    ExponentSign,
    ExponentDigits,
}

impl<S> Lexer<S>
where
    S: Iterator<Item = (char, Location)>,
{
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let last = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            last,
        }
    }

    /// Cierra una constante numérica. Un exponente debe tener dígitos.
    fn number(&self, text: String, phase: NumberPhase) -> Result<Token, Located<LexerError>> {
        match phase {
            NumberPhase::Integral => Ok(Token::IntLiteral(text)),
            NumberPhase::Fraction | NumberPhase::ExponentDigits => Ok(Token::FloatLiteral(text)),
            NumberPhase::ExponentStart | NumberPhase::ExponentSign => {
                let location = Location::span(self.start.clone(), &self.last);
                Err(Located::at(LexerError::MalformedNumber(text), location))
            }
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, Located<LexerError>> {
        use {NumberPhase::*, State::*, Token::*};

        loop {
            let (next_char, here) = match self.source.peek() {
                Some((c, location)) => (Some(*c), location.clone()),
                None => (None, self.last.clone()),
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = here.clone();
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                (Finished, _) => return Ok(None),

                (Start, None) => return Ok(Some(Eof)),

                // Espacios en blanco
                (Start, Some(c)) if c.is_whitespace() => (),

                (Start, Some('#')) => self.state = Preprocessor(String::from("#")),

                (Start, Some(c @ ('=' | '!' | '<' | '>' | '&' | '|'))) => self.state = Prefix(c),
                (Start, Some('/')) => self.state = AfterSlash,

                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Number(String::new(), Integral);
                    continue;
                }

                (Start, Some('"')) => self.state = Str(String::new()),
                (Start, Some(c)) if c.is_ascii_alphabetic() => self.state = Word(c.to_string()),

                // Tokens triviales
                (Start, Some(':')) => self.state = Complete(Colon),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('(')) => self.state = Complete(OpenParen),
                (Start, Some(')')) => self.state = Complete(CloseParen),
                (Start, Some('{')) => self.state = Complete(OpenCurly),
                (Start, Some('}')) => self.state = Complete(CloseCurly),
                (Start, Some(';')) => self.state = Complete(Semicolon),

                (Start, Some(c)) => return Err(Located::at(LexerError::BadChar(c), here)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => return Ok(Some(std::mem::replace(token, Eof))),

                // Operadores de dos caracteres tienen prioridad sobre sus prefijos
                (Prefix(prefix), next) => {
                    let pair = match (*prefix, next) {
                        ('=', Some('=')) => Some(Equal),
                        ('!', Some('=')) => Some(NotEqual),
                        ('<', Some('=')) => Some(LessOrEqual),
                        ('>', Some('=')) => Some(GreaterOrEqual),
                        ('<', Some('<')) => Some(Insert),
                        ('>', Some('>')) => Some(Extract),
                        ('&', Some('&')) => Some(And),
                        ('|', Some('|')) => Some(Or),
                        _ => None,
                    };

                    match (pair, *prefix) {
                        (Some(token), _) => self.state = Complete(token),
                        (None, '=') => return Ok(Some(Assign)),
                        (None, '<') => return Ok(Some(Less)),
                        (None, '>') => return Ok(Some(Greater)),
                        (None, lone) => {
                            let error = LexerError::BadChar(lone);
                            return Err(Located::at(error, self.start.clone()));
                        }
                    }
                }

                // `/` inicia un comentario o es el operador de división
                (AfterSlash, Some('/')) => self.state = LineComment,
                (AfterSlash, Some('*')) => self.state = BlockComment,
                (AfterSlash, _) => return Ok(Some(Slash)),

                // Los comentarios no producen tokens
                (LineComment, Some('\n')) => self.state = Start,
                (LineComment, Some(_)) => (),
                (BlockComment, Some('*')) => self.state = BlockCommentStar,
                (BlockComment, Some(_)) => (),
                (BlockCommentStar, Some('/')) => self.state = Start,
                (BlockCommentStar, Some('*')) => (),
                (BlockCommentStar, Some(_)) => self.state = BlockComment,
                (LineComment | BlockComment | BlockCommentStar, None) => {
                    self.state = Start;
                    continue;
                }

                (Preprocessor(line), Some(c)) if c != '\n' => line.push(c),
                (Preprocessor(line), _) => {
                    let line = line.trim_end().to_string();
                    return Ok(Some(Directive(line)));
                }

                // Constantes numéricas: dígitos, a lo sumo un punto y un exponente opcional
                (Number(text, phase), Some(c)) => match (*phase, c) {
                    (Integral | Fraction, '0'..='9') => text.push(c),
                    (Integral, '.') => {
                        text.push(c);
                        *phase = Fraction;
                    }

                    (Integral | Fraction, 'e' | 'E') => {
                        text.push(c);
                        *phase = ExponentStart;
                    }

                    (ExponentStart, '+' | '-') => {
                        text.push(c);
                        *phase = ExponentSign;
                    }

                    (ExponentStart | ExponentSign | ExponentDigits, '0'..='9') => {
                        text.push(c);
                        *phase = ExponentDigits;
                    }

                    (phase, _) => {
                        let text = std::mem::take(text);
                        return self.number(text, phase).map(Some);
                    }
                },

                (Number(text, phase), None) => {
                    let (text, phase) = (std::mem::take(text), *phase);
                    return self.number(text, phase).map(Some);
                }

                // Literales de string, solo `\"` y `\\` son secuencias de escape
                (Str(text), Some('"')) => self.state = Complete(StrLiteral(std::mem::take(text))),
                (Str(text), Some('\\')) => self.state = StrEscape(std::mem::take(text)),
                (Str(text), Some(c)) => text.push(c),
                (StrEscape(text), Some(c)) => {
                    if !matches!(c, '"' | '\\') {
                        text.push('\\');
                    }

                    text.push(c);
                    self.state = Str(std::mem::take(text));
                }

                (Str(_) | StrEscape(_), None) => {
                    let error = LexerError::UnterminatedString;
                    return Err(Located::at(error, self.start.clone()));
                }

                // Extensión de términos
                (Word(word), Some(c)) if c.is_ascii_alphanumeric() => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let token = match self::Keyword::from_str(word) {
                        Ok(keyword) => Keyword(keyword),
                        Err(()) => Id(Identifier::from(word.as_str())),
                    };

                    return Ok(Some(token));
                }
            }

            // Si no hubo `continue` ni retorno, aquí se consume el carácter
            // que se observó con lookahead anteriormente
            if let Some((_, location)) = self.source.next() {
                self.last = location;
            }
        }
    }
}

impl<S> Iterator for Lexer<S>
where
    S: Iterator<Item = (char, Location)>,
{
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,

            Ok(Some(token)) => {
                self.state = match token {
                    Token::Eof => State::Finished,
                    _ => State::Start,
                };

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Finished;
                Some(Err(error))
            }
        }
    }
}

/// Reduce un texto fuente completo a su secuencia de tokens.
///
/// La secuencia siempre termina con [`Token::Eof`]. El primer error
/// léxico aborta el análisis.
pub fn tokenize<N>(text: &str, name: N) -> Result<Vec<Located<Token>>, Located<LexerError>>
where
    N: Into<String>,
{
    let (start, chars) = source::consume(text, name);
    Lexer::new(start, chars).collect()
}
