//! Shared fixtures for node code generation tests.

use onnx_cgen_ir::node::builder::NodeBuilder;
use onnx_cgen_ir::NodeType;

use super::{ConvIntegerNode, NodeCodegen};
use crate::context::CompileContext;
use crate::writer::CodeWriter;

/// Print a node body at indentation level zero.
pub fn codegen_body<T: NodeCodegen>(node: &T) -> String {
    let mut writer = CodeWriter::new();
    node.print(&mut writer);
    writer.finish()
}

/// A 3x3 ConvInteger over a single-channel 5x5 `int8` image.
pub fn conv_integer_node(quantize: bool, with_zero_point: bool) -> ConvIntegerNode {
    let mut builder = NodeBuilder::new(NodeType::ConvInteger, "conv")
        .input_tensor_i8("x", vec![1, 1, 5, 5])
        .input_tensor_i8("w", vec![1, 1, 3, 3]);
    if with_zero_point {
        builder = builder.input_tensor_i8("x_zero_point", vec![1]);
    }
    let node = builder.output("y").build();

    ConvIntegerNode::resolve(&node, &CompileContext::new(quantize)).unwrap()
}
