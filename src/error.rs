//! Reporte de errores fatales.
//!
//! Todo error fatal del front end está asociado a una ubicación. Un
//! [`Diagnostics`] agrupa estos errores y los muestra junto con la
//! línea original del código fuente, señalando la región culpable.

use crate::{
    parse::Failure,
    source::{Located, Location},
};

use std::{
    error::Error,
    fmt::{self, Debug, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    /// Cambia la categoría con la que se titula cada error.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let (first, last) = (location.start().line(), location.end().line());
            let digits = last.to_string().len();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in first..=last {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            // El fin del rango es exclusivo
            let from = location.start().column();
            let to = location.end().column().saturating_sub(1);

            let skip = from.min(to).saturating_sub(1) as usize;
            let highlight = (from.max(to) - from.min(to) + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Compilation failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl Debug for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, fmt)
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

impl sealed::Sealed for Failure {}

impl LocatedError for Failure {
    fn source(&self) -> &dyn Error {
        match self {
            Failure::Syntax(error) => error.as_ref(),
            Failure::Semantic(error) => error.as_ref(),
        }
    }

    fn location(&self) -> &Location {
        Failure::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex, parse};

    #[test]
    fn renders_source_line_and_caret() {
        let tokens = lex::tokenize("int x;\nx = y + 1;\n", "demo.c").unwrap();
        let failure = parse::parse(&tokens).unwrap_err();

        let report = Diagnostics::from(failure).kind("semantic error").to_string();
        let lines: Vec<_> = report.lines().collect();

        assert_eq!(lines[0], "semantic error: Variable `y` is not declared");
        assert_eq!(lines[1], " --> demo.c:2:5");
        assert_eq!(lines[3], "2 | x = y + 1;");
        assert_eq!(lines[4], "  |     ^");
        assert_eq!(lines.last(), Some(&"Compilation failed with 1 error"));
    }

    #[test]
    fn lexer_errors_are_reported() {
        let error = lex::tokenize("int a = 1 @ 2;", "demo.c").unwrap_err();
        let report = Diagnostics::from(error).to_string();

        assert!(report.starts_with("error: Unexpected character '@'\n --> demo.c:1:11\n"));
    }

    #[test]
    fn empty_report() {
        let diagnostics = Diagnostics::default();

        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.to_string(), "No errors were reported\n");
    }
}
