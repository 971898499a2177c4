//! Tablas de consola para tokens y símbolos.

use std::fmt::{self, Display};

use crate::{
    lex::Token,
    semantic::SymbolTable,
    source::Located,
};

/// Tabla de tokens: categoría, lexema entre comillas y línea.
pub struct TokenTable<'a>(pub &'a [Located<Token>]);

/// Volcado de la tabla de símbolos, ordenado por nombre.
pub struct SymbolDump<'a>(pub &'a SymbolTable);

impl Display for TokenTable<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Table(&[20, 30, 10]);
        table.header(fmt, &["Token Type", "Token Value", "Line No."])?;

        if self.0.is_empty() {
            table.notice(fmt, "No tokens available.")?;
        }

        for token in self.0 {
            let kind = token.val().kind_name();
            let text = format!("\"{}\"", token.val().text());
            let line = token.line().to_string();

            table.row(fmt, &[kind.as_ref(), text.as_str(), line.as_str()])?;
        }

        table.border(fmt)
    }
}

impl Display for SymbolDump<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Table(&[20, 15, 15, 20]);
        table.header(fmt, &["Variable Name", "Type", "Scope", "Value"])?;

        if self.0.is_empty() {
            table.notice(fmt, "No symbols declared.")?;
        }

        for symbol in self.0.entries() {
            let typ = symbol.typ().to_string();
            let scope = symbol.scope().to_string();
            let value = match symbol.value() {
                Some(value) => value.to_string(),
                None => String::from("Uninitialized"),
            };

            table.row(fmt, &[symbol.name(), typ.as_str(), scope.as_str(), value.as_str()])?;
        }

        table.border(fmt)
    }
}

/// Anchos de columna, sin contar el relleno de un espacio por lado.
struct Table(&'static [usize]);

impl Table {
    fn border(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for width in self.0 {
            write!(fmt, "+{}", "-".repeat(width + 2))?;
        }

        writeln!(fmt, "+")
    }

    fn header(&self, fmt: &mut fmt::Formatter<'_>, titles: &[&str]) -> fmt::Result {
        self.border(fmt)?;
        self.row(fmt, titles)?;
        self.border(fmt)
    }

    fn row(&self, fmt: &mut fmt::Formatter<'_>, cells: &[&str]) -> fmt::Result {
        for (cell, width) in cells.iter().zip(self.0) {
            write!(fmt, "| {:<width$} ", cell, width = width)?;
        }

        writeln!(fmt, "|")
    }

    /// Una sola celda que abarca todas las columnas.
    fn notice(&self, fmt: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
        let width = self.0.iter().map(|width| width + 3).sum::<usize>() - 3;
        writeln!(fmt, "| {:<width$} |", text, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex, parse};

    #[test]
    fn token_rows() {
        let tokens = lex::tokenize("int x;\nx = \"hi\";", "<test>").unwrap();
        let table = TokenTable(&tokens).to_string();
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines[0], format!("+{}+{}+{}+", "-".repeat(22), "-".repeat(32), "-".repeat(12)));
        assert_eq!(
            lines[1],
            format!("| {:<20} | {:<30} | {:<10} |", "Token Type", "Token Value", "Line No.")
        );

        assert_eq!(
            lines[3],
            format!("| {:<20} | {:<30} | {:<10} |", "INT", "\"int\"", "1")
        );

        assert_eq!(
            lines[8],
            format!("| {:<20} | {:<30} | {:<10} |", "STRING_LITERAL", "\"hi\"", "2")
        );

        assert_eq!(lines.len(), 3 + tokens.len() + 1);
    }

    #[test]
    fn symbol_rows() {
        let tokens = lex::tokenize("int b = 4; bool a;", "<test>").unwrap();
        let compilation = parse::parse(&tokens).unwrap();

        let dump = SymbolDump(&compilation.symbols).to_string();
        let lines: Vec<_> = dump.lines().collect();

        assert_eq!(
            lines[3],
            format!("| {:<20} | {:<15} | {:<15} | {:<20} |", "a", "bool", "GLOBAL", "Uninitialized")
        );

        assert_eq!(
            lines[4],
            format!("| {:<20} | {:<15} | {:<15} | {:<20} |", "b", "int", "GLOBAL", "4")
        );
    }

    #[test]
    fn empty_tables() {
        let tokens = TokenTable(&[]).to_string();
        let symbols = SymbolDump(&SymbolTable::new()).to_string();

        assert!(tokens.contains("| No tokens available."));
        assert!(symbols.contains("| No symbols declared."));

        let rows: Vec<_> = symbols.lines().collect();
        assert_eq!(rows[3].len(), rows[0].len());
    }
}
