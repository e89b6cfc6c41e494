use log::LevelFilter;
use onnx_cgen::{init_log, CGen};

const USAGE: &str = "Usage: onnx-cgen [--quantize] [--options <file.json>] [--verbose] <model.json> [output.c]";

/// Takes a JSON model description and generates a C source file from it
fn main() {
    let mut positional = Vec::new();
    let mut quantize = false;
    let mut options = None;
    let mut verbose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quantize" => quantize = true,
            "--verbose" => verbose = true,
            "--options" => match args.next() {
                Some(path) => options = Some(path),
                None => exit_with_usage("--options needs a file"),
            },
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            flag if flag.starts_with("--") => exit_with_usage(&format!("unknown flag {flag}")),
            _ => positional.push(arg),
        }
    }

    let Some(input) = positional.first() else {
        exit_with_usage("no input file provided");
    };

    if verbose {
        init_log(LevelFilter::Debug).ok();
    }

    let mut cgen = CGen::new();
    cgen.input(input);
    if let Some(output) = positional.get(1) {
        cgen.output(output);
    }
    if let Some(options) = &options {
        cgen.options(options);
    }
    if quantize {
        cgen.quantize(true);
    }

    if let Err(err) = cgen.run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn exit_with_usage(reason: &str) -> ! {
    eprintln!("{reason}\n{USAGE}");
    std::process::exit(2);
}
