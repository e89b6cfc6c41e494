use std::env;
use std::path::PathBuf;

use onnx_cgen::CGen;

/// Models compiled for the tests, each once per output mode.
const MODELS: [&str; 2] = ["conv_integer", "padded"];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    for model in MODELS {
        let input = format!("models/{model}.json");
        println!("cargo:rerun-if-changed={input}");

        for (quantize, suffix) in [(false, "int32"), (true, "int8")] {
            let source = out_dir.join(format!("{model}_{suffix}.c"));
            CGen::new()
                .input(&input)
                .output(source.to_str().expect("OUT_DIR is valid UTF-8"))
                .quantize(quantize)
                .run()
                .expect("code generation failed");

            // Every generated file defines `entry`: give each one its own symbol.
            let library = format!("{model}_{suffix}");
            cc::Build::new()
                .file(&source)
                .define("entry", format!("{library}_entry").as_str())
                .compile(&library);
        }
    }
}
