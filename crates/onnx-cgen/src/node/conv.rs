use onnx_cgen_ir::node::conv::{conv2d_config, Conv2dConfig};
use onnx_cgen_ir::{NodeType, ProcessError, Tensor};

use super::{Binding, NodeCodegen};
use crate::loop_nest::{
    print_header_info_comment, print_loop_with_padding_checks, CellComputation, W_CELL, X_CELL,
    Y_CELL,
};
use crate::writer::CodeWriter;

/// ONNX Conv on `float` tensors, with an optional bias.
#[derive(Debug, Clone)]
pub struct ConvNode {
    /// Node name.
    pub name: String,
    /// Data input, bound as `x`.
    pub data: Tensor,
    /// Weights input, bound as `w`.
    pub weights: Tensor,
    /// Resolved attributes and output.
    pub config: Conv2dConfig,
}

impl ConvNode {
    /// Resolve the node, failing on unsupported features.
    pub fn resolve(node: &onnx_cgen_ir::Node) -> Result<Self, ProcessError> {
        let config = conv2d_config(node)?;
        let data = node
            .input(0)
            .ok_or(ProcessError::MissingInput { index: 0, name: "X" })?;
        let weights = node
            .input(1)
            .ok_or(ProcessError::MissingInput { index: 1, name: "W" })?;

        Ok(Self {
            name: node.name.clone(),
            data: data.clone(),
            weights: weights.clone(),
            config,
        })
    }
}

impl CellComputation for ConvNode {
    fn print_output_cell_init(&self, writer: &mut CodeWriter) {
        if self.config.bias.is_some() {
            writer.line(format!("{Y_CELL} = bias[m];"));
        } else {
            writer.line(format!("{Y_CELL} = 0.0f;"));
        }
    }

    fn print_output_cell_calc(&self, writer: &mut CodeWriter) {
        writer.line(format!("{Y_CELL} += {X_CELL} * {W_CELL};"));
    }

    fn print_output_cell_finalize(&self, _writer: &mut CodeWriter) {}
}

impl NodeCodegen for ConvNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> NodeType {
        NodeType::Conv
    }

    fn bindings(&self) -> Vec<Binding> {
        let mut bindings = vec![
            Binding::input(&self.data, "x"),
            Binding::input(&self.weights, "w"),
        ];
        if let Some(bias) = &self.config.bias {
            bindings.push(Binding::input(bias, "bias"));
        }
        bindings.push(Binding::output(&self.config.output, "y"));
        bindings
    }

    fn output(&self) -> &Tensor {
        &self.config.output
    }

    fn print(&self, writer: &mut CodeWriter) {
        print_header_info_comment(NodeType::Conv, &self.name, &self.config.params, writer);
        print_loop_with_padding_checks(&self.config.params, self, writer);
    }
}
