//! Tabla de símbolos y errores semánticos.
//!
//! Toda variable declarada por el programa vive en una única tabla
//! durante la compilación completa. Cada entrada conoce su tipo
//! declarado, su ámbito y, si ya fue asignada, su valor más reciente.
//! La tabla no realiza coerciones de tipo; eso es responsabilidad de
//! quien la invoca (ver [`Type::accepts`]).

use thiserror::Error;

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

use crate::lex::Keyword;

pub type Semantic<T> = Result<T, SemanticError>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Variable `{0}` is already declared")]
    DuplicateDeclaration(String),

    #[error("Name `{0}` is reserved for temporaries and labels")]
    ReservedName(String),

    #[error("Variable `{0}` is not declared")]
    UndeclaredVariable(String),

    #[error("Variable `{0}` is not initialized")]
    Uninitialized(String),

    #[error("Variable `{name}` holds a `{found}` value, not `{expected}`")]
    ValueMismatch {
        name: String,
        expected: Type,
        found: Type,
    },

    #[error("Type mismatch: cannot assign {1} to `{0}`")]
    TypeMismatch(Type, LiteralKind),

    #[error("Literal `{0}` is not a valid `{1}`")]
    BadLiteral(String, Type),
}

/// Tipo declarado de una variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Float,
    Double,
    String,
    Char,
    Bool,
}

impl Type {
    /// Obtiene el tipo nombrado por una palabra clave de declaración.
    pub fn from_keyword(keyword: Keyword) -> Option<Type> {
        let typ = match keyword {
            Keyword::Int => Type::Int,
            Keyword::Float => Type::Float,
            Keyword::Double => Type::Double,
            Keyword::String => Type::String,
            Keyword::Char => Type::Char,
            Keyword::Bool => Type::Bool,
            _ => return None,
        };

        Some(typ)
    }

    /// Determina si un literal puede asignarse a una variable de este tipo.
    ///
    /// Los enteros se amplían a `float` y `double`, los flotantes a
    /// `double`, y un string de exactamente un carácter puede ser `char`.
    pub fn accepts(self, literal: LiteralKind, text: &str) -> bool {
        use {LiteralKind as L, Type as T};

        match (self, literal) {
            (T::Int | T::Float | T::Double, L::Int) => true,
            (T::Float | T::Double, L::Float) => true,
            (T::String, L::Str) => true,
            (T::Char, L::Str) => text.chars().count() == 1,
            (T::Bool, L::Bool) => true,
            _ => false,
        }
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Double => "double",
            Type::String => "string",
            Type::Char => "char",
            Type::Bool => "bool",
        };

        fmt.write_str(name)
    }
}

/// Categoría de un literal en el código fuente.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Float,
    Str,
    Bool,
}

impl Display for LiteralKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LiteralKind::Int => "an integer literal",
            LiteralKind::Float => "a floating-point literal",
            LiteralKind::Str => "a string literal",
            LiteralKind::Bool => "a boolean literal",
        };

        fmt.write_str(name)
    }
}

/// Ámbito de una variable.
///
/// El parser solamente produce variables globales.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Parameter,
    Temporary,
}

impl Display for Scope {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Global => "GLOBAL",
            Scope::Local => "LOCAL",
            Scope::Parameter => "PARAMETER",
            Scope::Temporary => "TEMPORARY",
        };

        fmt.write_str(name)
    }
}

/// Valor almacenado para una variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Double(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

impl Value {
    /// Tipo que corresponde a este valor.
    pub fn typ(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Double(_) => Type::Double,
            Value::Str(_) => Type::String,
            Value::Char(_) => Type::Char,
            Value::Bool(_) => Type::Bool,
        }
    }

    /// Construye el valor de un literal para una variable de tipo `typ`.
    ///
    /// Se asume que `typ` ya aceptó al literal.
    pub fn parse_literal(typ: Type, text: &str) -> Semantic<Value> {
        let bad = || SemanticError::BadLiteral(text.to_string(), typ);

        let value = match typ {
            Type::Int => Value::Int(text.parse().map_err(|_| bad())?),
            Type::Float => Value::Float(text.parse().map_err(|_| bad())?),
            Type::Double => Value::Double(text.parse().map_err(|_| bad())?),
            Type::String => Value::Str(text.to_string()),
            Type::Char => Value::Char(text.chars().next().ok_or_else(bad)?),
            Type::Bool => match text {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(bad()),
            },
        };

        Ok(value)
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(fmt, "{}", value),
            Value::Float(value) => write!(fmt, "{}", value),
            Value::Double(value) => write!(fmt, "{}", value),
            Value::Str(value) => fmt.write_str(value),
            Value::Char(value) => write!(fmt, "{}", value),
            Value::Bool(value) => write!(fmt, "{}", value),
        }
    }
}

/// Tipos primitivos de Rust que corresponden a algún caso de [`Value`].
pub trait Primitive: Sized {
    /// Tipo del lenguaje que representa a `Self`.
    const TYPE: Type;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! primitive {
    ($rust:ty, $variant:ident) => {
        impl Primitive for $rust {
            const TYPE: Type = Type::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(value) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    };
}

primitive!(i32, Int);
primitive!(f32, Float);
primitive!(f64, Double);
primitive!(char, Char);
primitive!(bool, Bool);

impl Primitive for String {
    const TYPE: Type = Type::String;

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Entrada de la tabla de símbolos.
#[derive(Clone, Debug)]
pub struct Symbol {
    name: String,
    typ: Type,
    scope: Scope,
    value: Option<Value>,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn typ(&self) -> Type {
        self.typ
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Valor actual, si la variable ya fue inicializada.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Default, Debug)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Declara una variable nueva, que inicialmente no tiene valor.
    pub fn declare(&mut self, name: &str, typ: Type, scope: Scope) -> Semantic<()> {
        if self.symbols.contains_key(name) {
            return Err(SemanticError::DuplicateDeclaration(name.to_string()));
        }

        let symbol = Symbol {
            name: name.to_string(),
            typ,
            scope,
            value: None,
        };

        self.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Semantic<&Symbol> {
        self.symbols
            .get(name)
            .ok_or_else(|| SemanticError::UndeclaredVariable(name.to_string()))
    }

    pub fn lookup_type(&self, name: &str) -> Semantic<Type> {
        self.lookup(name).map(Symbol::typ)
    }

    pub fn lookup_scope(&self, name: &str) -> Semantic<Scope> {
        self.lookup(name).map(Symbol::scope)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn is_initialized(&self, name: &str) -> Semantic<bool> {
        self.lookup(name).map(Symbol::is_initialized)
    }

    /// Reemplaza el valor de una variable y la marca como inicializada.
    pub fn set(&mut self, name: &str, value: Value) -> Semantic<()> {
        let symbol = self
            .symbols
            .get_mut(name)
            .ok_or_else(|| SemanticError::UndeclaredVariable(name.to_string()))?;

        symbol.value = Some(value);
        Ok(())
    }

    pub fn set_value<T: Primitive>(&mut self, name: &str, value: T) -> Semantic<()> {
        self.set(name, value.into_value())
    }

    /// Obtiene el valor de una variable como un primitivo específico.
    ///
    /// Falla si la variable no ha sido inicializada o si el caso de
    /// [`Value`] almacenado no corresponde a `T`.
    pub fn get_value<T: Primitive>(&self, name: &str) -> Semantic<T> {
        let value = self
            .lookup(name)?
            .value()
            .ok_or_else(|| SemanticError::Uninitialized(name.to_string()))?;

        T::from_value(value).ok_or_else(|| SemanticError::ValueMismatch {
            name: name.to_string(),
            expected: T::TYPE,
            found: value.typ(),
        })
    }

    /// Itera sobre todas las entradas, ordenadas por nombre.
    pub fn entries(&self) -> impl Iterator<Item = &Symbol> {
        let mut symbols: Vec<_> = self.symbols.values().collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name));
        symbols.into_iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
