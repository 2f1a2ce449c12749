#[macro_use]
extern crate clap;

use clap::Arg;

use fexparse::Parser;

#[derive(Debug)]
enum Error {
    BadBinding(String),
    Parse(fexparse::ParseError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadBinding(arg) => write!(
                f,
                "Invalid variable binding \"{}\" (expected name=value)",
                arg
            ),
            Error::Parse(err) => write!(f, "{}", err),
        }
    }
}

fn main() {
    env_logger::init();

    // Parse command line arguments
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("EXPR")
                .help("The expression to evaluate")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("var")
                .short("v")
                .long("var")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .value_name("NAME=VALUE")
                .help("Binds a variable for the evaluation"),
        )
        .arg(
            Arg::with_name("native")
                .short("n")
                .long("native")
                .help("Evaluates through the native code compiler instead of the interpreter"),
        )
        .arg(
            Arg::with_name("registers")
                .short("r")
                .long("registers")
                .takes_value(true)
                .value_name("COUNT")
                .help("Highest SSE register used for the evaluation stack (0-5, default 5)"),
        )
        .get_matches();

    let expr = matches.value_of("EXPR").unwrap();
    let bindings: Vec<&str> = matches.values_of("var").map(|v| v.collect()).unwrap_or_default();
    let native = matches.is_present("native");
    let registers = matches
        .value_of("registers")
        .and_then(|r| r.parse::<u8>().ok())
        .unwrap_or(5)
        .min(5);

    match run(expr, &bindings, native, registers) {
        Ok(value) => println!("{}", value),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

fn run(expr: &str, bindings: &[&str], native: bool, registers: u8) -> Result<f32, Error> {
    // The cells must outlive the evaluation, so they are kept in a vec
    // the parser borrows from.
    let mut cells: Vec<(String, Box<f32>)> = Vec::new();
    for binding in bindings {
        let mut parts = binding.splitn(2, '=');
        let name = parts.next().unwrap_or("");
        let value = parts
            .next()
            .and_then(|v| v.parse::<f32>().ok())
            .ok_or_else(|| Error::BadBinding((*binding).to_owned()))?;
        cells.push((name.to_owned(), Box::new(value)));
    }

    let mut parser = Parser::new();
    for (name, cell) in &mut cells {
        parser
            .define_var(name, &mut **cell)
            .map_err(Error::Parse)?;
    }

    parser.set_expr(expr);

    if native {
        let compiled = parser.compile(registers).map_err(Error::Parse)?;
        Ok(compiled.eval())
    } else {
        parser.eval().map_err(Error::Parse)
    }
}
