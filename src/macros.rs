/// Escribe una instrucción de ensamblador con sangría.
///
/// El primer argumento debe exponer un campo `output` que implemente
/// [`std::io::Write`]. Los operandos, si los hay, siguen la sintaxis
/// de `format!()`.
macro_rules! emit {
    ($context:expr, $opcode:expr) => {
        writeln!($context.output, "    {}", $opcode)
    };

    ($context:expr, $opcode:expr, $($format:tt)*) => {{
        write!($context.output, "    {} ", $opcode)?;
        writeln!($context.output, $($format)*)
    }};
}
