//! Compilador para un lenguaje de enseñanza tipo C con palabras clave
//! localizadas (`agar`/`magar` como sinónimos de `if`/`else`).
//!
//! # Front end
//! Cada programa deriva de un único texto fuente. Este texto se somete
//! primero a análisis léxico en [`lex`], de lo cual se obtiene un flujo
//! de tokens. El parser de [`parse`] recorre el flujo una sola vez,
//! registra declaraciones en la tabla de símbolos de [`semantic`] y
//! emite directamente código de tres direcciones, descrito en [`ir`].
//! No existe un AST intermedio.
//!
//! # Back end
//! El código de tres direcciones se persiste en forma textual, una
//! instrucción por línea, y es esa misma forma textual la que consume
//! [`codegen`] para producir ensamblador NASM de 32 bits. Esta fase no
//! asigna registros ni enlaza; todas las variables residen en memoria.
//!
//! # Errores
//! Los errores léxicos, sintácticos y semánticos son fatales y se
//! reportan por medio de [`error::Diagnostics`]. Las instrucciones que
//! la generación de ensamblador no reconoce solo producen advertencias.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod report;
pub mod semantic;
pub mod source;

use error::Diagnostics;
use lex::Token;
use parse::{Compilation, Failure};
use source::Located;
use tracing::debug;

/// Resultado del front end completo.
pub struct Translation {
    pub tokens: Vec<Located<Token>>,
    pub compilation: Compilation,
}

/// Analiza un texto fuente hasta obtener su código de tres direcciones.
pub fn translate<N>(name: N, text: &str) -> Result<Translation, Diagnostics>
where
    N: Into<String>,
{
    let tokens =
        lex::tokenize(text, name).map_err(|error| Diagnostics::from(error).kind("lexical error"))?;

    debug!("Scanned {} tokens", tokens.len());

    let compilation = parse::parse(&tokens).map_err(|failure| {
        let kind = match failure {
            Failure::Syntax(_) => "syntax error",
            Failure::Semantic(_) => "semantic error",
        };

        Diagnostics::from(failure).kind(kind)
    })?;

    debug!(
        "Parsed {} symbols into {} TAC instructions",
        compilation.symbols.len(),
        compilation.program.len()
    );

    Ok(Translation {
        tokens,
        compilation,
    })
}
