//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use agarc::{
    codegen::{self, AsmOptions},
    report::{SymbolDump, TokenTable},
};

use anyhow::{self, Context};
use clap::{crate_version, Arg, Command};
use tracing::{info, Level};

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
    process,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("agarc")
        .version(crate_version!())
        .about("Translates agar source into three-address code and x86 assembly")
        .arg(
            Arg::new("input")
                .required(true)
                .value_name("INPUT")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("tac")
                .long("tac")
                .takes_value(true)
                .value_name("FILE")
                .default_value("target/icg.obj")
                .help("Output file for three-address code"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("target/assembly.asm")
                .help("Output file for assembly ('-' for stdout)"),
        )
        .arg(
            Arg::new("exit")
                .long("exit")
                .help("Terminate the generated program with an exit syscall"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .conflicts_with("verbose")
                .help("Do not print token and symbol tables"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log every compilation stage"),
        )
        .get_matches();

    let quiet = args.is_present("quiet");
    let level = match (quiet, args.is_present("verbose")) {
        (_, true) => Level::DEBUG,
        (true, _) => Level::WARN,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or("-");
    let tac_path = args.value_of("tac").unwrap_or("target/icg.obj");
    let asm_path = args.value_of("output").unwrap_or("target/assembly.asm");

    let mut options = AsmOptions::empty();
    if args.is_present("exit") {
        options |= AsmOptions::EXIT;
    }

    let (name, text) = read_source(input)?;
    let translation = match agarc::translate(name, &text) {
        Ok(translation) => translation,
        Err(diagnostics) => {
            eprint!("{}", diagnostics);
            process::exit(1);
        }
    };

    if !quiet {
        print!("{}", TokenTable(&translation.tokens));
        print!("{}", SymbolDump(&translation.compilation.symbols));
    }

    let tac = translation.compilation.program.lines();
    let mut tac_file = create(tac_path)?;
    for line in &tac {
        writeln!(tac_file, "{}", line)
            .with_context(|| format!("Failed to write TAC to file: {}", tac_path))?;
    }

    tac_file
        .flush()
        .with_context(|| format!("Failed to write TAC to file: {}", tac_path))?;

    info!("Generated TAC saved to file: {}", tac_path);

    let warnings = match asm_path {
        // Salida a stdout
        "-" => {
            let mut stdout = io::stdout();
            codegen::emit(&tac, options, &mut stdout).context("Failed to emit to stdout")?
        }

        // Salida a archivo
        path => {
            let mut file = create(path)?;
            let warnings = codegen::emit(&tac, options, &mut file)
                .and_then(|warnings| file.flush().map(|()| warnings))
                .with_context(|| format!("Failed to emit to file: {}", path))?;

            info!("Generated Assembly Code saved to file: {}", path);
            warnings
        }
    };

    if !warnings.is_empty() {
        info!("{} TAC lines were not lowered", warnings.len());
    }

    Ok(())
}

/// Lee el código fuente de un archivo o de la entrada estándar.
fn read_source(input: &str) -> anyhow::Result<(String, String)> {
    if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read source from stdin")?;

        return Ok((String::from("<stdin>"), text));
    }

    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read source file: {}", input))?;

    Ok((input.to_string(), text))
}

/// Crea un archivo de salida junto con sus directorios ancestros.
fn create(path: &str) -> anyhow::Result<BufWriter<File>> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let file =
        File::create(path).with_context(|| format!("Failed to open for writing: {}", path))?;

    Ok(BufWriter::new(file))
}
