//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los tokens, los errores y las instrucciones que el compilador
//! construye llevan cuenta de la posición o rango de posiciones del
//! código fuente de donde provienen, lo cual permite señalar con
//! exactitud la línea y columna en donde ocurre un error.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
    str::Chars as StrChars,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Número de línea (base 1) donde inicia el objeto.
    pub fn line(&self) -> u32 {
        self.location.start().line()
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
///
/// El rango es semiabierto: `end` es la posición inmediatamente
/// posterior al último carácter cubierto.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene el origen de la ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.from, &other.from) && self.position == other.position
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() || end == start {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column.max(2) - 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen y contenido original, línea por línea.
pub struct Source {
    name: String,
    lines: Vec<String>,
}

impl Source {
    /// Nombre del origen, usualmente una ruta.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoca `callback` con el texto de la línea indicada (base 1).
    ///
    /// Una línea inexistente se trata como vacía.
    pub fn with_line<R, F>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let index = (line as usize).saturating_sub(1);
        callback(self.lines.get(index).map(String::as_str).unwrap_or(""))
    }
}

/// Flujo de entrada carácter por carácter.
///
/// Cada carácter emitido viene acompañado de su propia ubicación.
pub struct Chars<'a> {
    source: Rc<Source>,
    chars: StrChars<'a>,
    next: Position,
}

impl Iterator for Chars<'_> {
    type Item = (char, Location);

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.chars.next()?;

        let here = self.next;
        self.next = match c {
            '\n' => here.newline(),
            '\t' => here.tab(),
            _ => here.advance(),
        };

        let location = Location {
            from: Rc::clone(&self.source),
            position: here..self.next,
        };

        Some((c, location))
    }
}

/// Prepara un texto fuente completo para ser consumido por el lexer.
///
/// La ubicación que se encuentra en la tupla de retorno corresponde
/// al inicio del texto, la cual es útil para errores que no tienen
/// una posición más precisa.
pub fn consume<'a, S>(text: &'a str, name: S) -> (Location, Chars<'a>)
where
    S: Into<String>,
{
    let source = Rc::new(Source {
        name: name.into(),
        lines: text.lines().map(String::from).collect(),
    });

    let start = Location {
        from: Rc::clone(&source),
        position: Position::default()..Position::default().advance(),
    };

    let chars = Chars {
        source,
        chars: text.chars(),
        next: Position::default(),
    };

    (start, chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_and_tabs() {
        let (_, chars) = consume("a\n\tb", "<test>");
        let positions: Vec<_> = chars.map(|(c, at)| (c, at.start())).collect();

        assert_eq!(positions[0].1, Position { line: 1, column: 1 });
        assert_eq!(positions[1].1, Position { line: 1, column: 2 });
        assert_eq!(positions[2].1, Position { line: 2, column: 1 });
        assert_eq!(positions[3], ('b', Position { line: 2, column: 5 }));
    }

    #[test]
    fn span_covers_both_ends() {
        let (_, chars) = consume("abc", "<test>");
        let locations: Vec<_> = chars.map(|(_, at)| at).collect();

        let span = Location::span(locations[0].clone(), &locations[2]);
        assert_eq!(span.to_string(), "<test>:[1:1-1:3]");
        assert_eq!(locations[1].to_string(), "<test>:1:2");
    }

    #[test]
    fn reads_source_lines() {
        let (start, _) = consume("first\nsecond\n", "<test>");
        let source = start.source();

        assert_eq!(source.name(), "<test>");
        source.with_line(2, |line| assert_eq!(line, "second"));
        source.with_line(9, |line| assert_eq!(line, ""));
    }
}
