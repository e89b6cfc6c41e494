use std::fs;
use std::path::PathBuf;

use onnx_cgen::{CGen, CGraph, CompileContext, Error, ModelDescription};
use onnx_cgen_ir::ProcessError;
use pretty_assertions::assert_eq;

fn data_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
        .display()
        .to_string()
}

fn out_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("onnx-cgen-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn generates_int32_convolution() {
    let output = out_file("int32.c");

    let written = CGen::new()
        .input(&data_file("conv_integer.json"))
        .output(output.to_str().unwrap())
        .run()
        .unwrap();

    let code = fs::read_to_string(written).unwrap();
    assert!(code.starts_with("/* conv_integer: generated from conv_integer.json by onnx-cgen */\n#include <stdint.h>\n"));
    assert!(code.contains("static const int8_t tensor_x_zero_point[1] = {1};"));
    assert!(code.contains(
        "static inline void node_conv(const int8_t x[1][1][5][5], const int8_t w[1][1][3][3], const int8_t x_zero_point[1], int32_t y[1][1][3][3]) {"
    ));
    assert!(code.contains("y[b][m][o0][o1] = 0;"));
    assert!(!code.contains("int32_t cell"));
    assert!(code.contains("void entry(const int8_t x[1][1][5][5], int32_t y[1][1][3][3]) {"));
    assert!(code.contains("node_conv(x, tensor_w, tensor_x_zero_point, y);"));
}

#[test]
fn options_file_enables_quantization() {
    let output = out_file("quantized.c");

    CGen::new()
        .input(&data_file("conv_integer.json"))
        .output(output.to_str().unwrap())
        .options(&data_file("options.json"))
        .run()
        .unwrap();

    let code = fs::read_to_string(output).unwrap();
    assert!(code.contains("int8_t y[1][1][3][3]"));
    assert!(code.contains("int32_t cell = 0;"));
    assert!(code.contains("int32_t tmp = cell / 144;"));
    assert!(code.contains("y[b][m][o0][o1] = (int8_t)tmp;"));
}

#[test]
fn quantize_flag_overrides_options() {
    let mut cgen = CGen::new();
    cgen.options(&data_file("options.json")).quantize(false);

    assert_eq!(cgen.context().unwrap(), CompileContext::new(false));
}

#[test]
fn failed_resolution_writes_nothing() {
    let output = out_file("grouped.c");
    let _ = fs::remove_file(&output);

    let result = CGen::new()
        .input(&data_file("grouped.json"))
        .output(output.to_str().unwrap())
        .run();

    assert!(matches!(
        result,
        Err(Error::Resolve {
            source: ProcessError::UnsupportedGrouping { group: 2 },
            ..
        })
    ));
    assert!(!output.exists());
}

#[test]
fn graph_output_is_registered_with_selected_type() {
    let model = ModelDescription::load(data_file("conv_integer.json")).unwrap();

    for (quantize, dtype) in [(false, "int32"), (true, "int8")] {
        let graph = CGraph::build(&model, &CompileContext::new(quantize)).unwrap();
        let y = graph.registry().tensor("y").unwrap();

        assert_eq!(y.elem_type.to_string(), dtype);
        assert_eq!(y.shape, vec![1, 1, 3, 3]);
    }
}
