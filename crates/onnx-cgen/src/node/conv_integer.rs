use onnx_cgen_ir::node::conv_integer::{
    conv_integer_config, ConvIntegerConfig, DataZeroPoint, QUANTIZATION_LIMIT,
};
use onnx_cgen_ir::{NodeType, ProcessError, Tensor};

use super::{Binding, NodeCodegen};
use crate::context::CompileContext;
use crate::loop_nest::{
    print_header_info_comment, print_loop_with_padding_checks, CellComputation, W_CELL, X_CELL,
    Y_CELL,
};
use crate::writer::CodeWriter;

/// Rescale an accumulator to the quantized `int8` output.
///
/// `divisor` is the resolved [quantization divisor](onnx_cgen_ir::node::conv_integer::quantization_divisor).
/// Division truncates toward zero, as in the generated C code.
pub fn requantize(accumulator: i32, divisor: i32) -> i8 {
    let scaled = accumulator / divisor;
    scaled.clamp(-QUANTIZATION_LIMIT, QUANTIZATION_LIMIT) as i8
}

/// ONNX ConvInteger, printed as a C loop nest.
#[derive(Debug, Clone)]
pub struct ConvIntegerNode {
    /// Node name.
    pub name: String,
    /// Data input, bound as `x`.
    pub data: Tensor,
    /// Weights input, bound as `w`.
    pub weights: Tensor,
    /// Resolved attributes and output.
    pub config: ConvIntegerConfig,
    /// Rescale to `int8` in the finalize phase.
    pub quantize: bool,
}

impl ConvIntegerNode {
    /// Resolve the node, failing on unsupported features.
    pub fn resolve(node: &onnx_cgen_ir::Node, context: &CompileContext) -> Result<Self, ProcessError> {
        let config = conv_integer_config(node, context.quantize)?;
        let data = node
            .input(0)
            .ok_or(ProcessError::MissingInput { index: 0, name: "x" })?;
        let weights = node
            .input(1)
            .ok_or(ProcessError::MissingInput { index: 1, name: "w" })?;

        Ok(Self {
            name: node.name.clone(),
            data: data.clone(),
            weights: weights.clone(),
            config,
            quantize: context.quantize,
        })
    }

    /// The data zero-point as a C expression.
    fn x_zero(&self) -> String {
        match &self.config.zero_points.data {
            DataZeroPoint::Tensor(_) => "(int32_t)x_zero_point[0]".to_string(),
            DataZeroPoint::Literal(value) => value.to_string(),
        }
    }

    /// Where the products are summed.
    fn accumulator(&self) -> &'static str {
        if self.quantize {
            "cell"
        } else {
            Y_CELL
        }
    }
}

impl CellComputation for ConvIntegerNode {
    fn print_output_cell_init(&self, writer: &mut CodeWriter) {
        if self.quantize {
            writer.line("int32_t cell = 0;");
        } else {
            writer.line(format!("{Y_CELL} = 0;"));
        }
    }

    fn print_output_cell_calc(&self, writer: &mut CodeWriter) {
        writer.line(format!(
            "{} += ((int32_t){X_CELL} - {}) * (int32_t){W_CELL};",
            self.accumulator(),
            self.x_zero()
        ));
    }

    fn print_output_cell_finalize(&self, writer: &mut CodeWriter) {
        let Some(divisor) = self.config.divisor else {
            return;
        };
        let limit = QUANTIZATION_LIMIT;
        writer.line(format!("int32_t tmp = cell / {divisor};"));
        writer.line(format!("tmp = tmp > {limit} ? {limit} : tmp;"));
        writer.line(format!("tmp = tmp < -{limit} ? -{limit} : tmp;"));
        writer.line(format!("{Y_CELL} = (int8_t)tmp;"));
    }
}

impl NodeCodegen for ConvIntegerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> NodeType {
        NodeType::ConvInteger
    }

    fn bindings(&self) -> Vec<Binding> {
        let mut bindings = vec![
            Binding::input(&self.data, "x"),
            Binding::input(&self.weights, "w"),
        ];
        if let DataZeroPoint::Tensor(x_zero_point) = &self.config.zero_points.data {
            bindings.push(Binding::input(x_zero_point, "x_zero_point"));
        }
        bindings.push(Binding::output(&self.config.output, "y"));
        bindings
    }

    fn output(&self) -> &Tensor {
        &self.config.output
    }

    fn print(&self, writer: &mut CodeWriter) {
        print_header_info_comment(NodeType::ConvInteger, &self.name, &self.config.params, writer);
        print_loop_with_padding_checks(&self.config.params, self, writer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::test_helpers::{codegen_body, conv_integer_node};
    use insta::assert_snapshot;
    use onnx_cgen_ir::ElementType;
    use rstest::rstest;

    #[rstest]
    #[case::below_one_step(9, 144, 0)]
    #[case::exact(144, 144, 1)]
    #[case::truncates_toward_zero(-150, 144, -1)]
    #[case::saturates_high(1_000_000, 16, 127)]
    #[case::saturates_low(-1_000_000, 16, -127)]
    #[case::never_reaches_min(i32::MIN, 16, -127)]
    fn requantize_scales_and_clamps(
        #[case] accumulator: i32,
        #[case] divisor: i32,
        #[case] expected: i8,
    ) {
        assert_eq!(requantize(accumulator, divisor), expected);
    }

    #[test]
    fn oversized_quantized_kernel_fails_to_resolve() {
        let node = onnx_cgen_ir::node::builder::NodeBuilder::new(NodeType::ConvInteger, "conv")
            .input_tensor_i8("x", vec![1, 1, 16384, 16384])
            .input_tensor_i8("w", vec![1, 1, 16384, 16384])
            .output("y")
            .build();

        let result = ConvIntegerNode::resolve(&node, &CompileContext::new(true));

        assert!(matches!(result, Err(ProcessError::InvalidShape(_))));
    }

    #[test]
    fn codegen_int32_accumulator() {
        let node = conv_integer_node(false, true);
        let code = codegen_body(&node);

        assert_snapshot!(code, @r"
        /* ConvInteger
         * name: conv
         * auto_pad: NOTSET
         * kernel_shape: [3, 3]
         * strides: [1, 1]
         * dilations: [1, 1]
         * pads: [0, 0, 0, 0]
         * group: 1
         */
        for (uint32_t b = 0; b < 1; b++) {
            for (uint32_t m = 0; m < 1; m++) {
                for (int32_t o0 = 0, i0 = 0; o0 < 3; o0++, i0 += 1) {
                    for (int32_t o1 = 0, i1 = 0; o1 < 3; o1++, i1 += 1) {
                        y[b][m][o0][o1] = 0;
                        for (uint32_t c = 0; c < 1; c++) {
                            for (int32_t k0 = 0; k0 < 3; k0++) {
                                int32_t ii0 = i0 + k0;
                                if (ii0 < 0 || ii0 >= 5) continue;
                                for (int32_t k1 = 0; k1 < 3; k1++) {
                                    int32_t ii1 = i1 + k1;
                                    if (ii1 < 0 || ii1 >= 5) continue;
                                    y[b][m][o0][o1] += ((int32_t)x[b][c][ii0][ii1] - (int32_t)x_zero_point[0]) * (int32_t)w[m][c][k0][k1];
                                }
                            }
                        }
                    }
                }
            }
        }
        ");
    }

    #[test]
    fn codegen_quantized_without_zero_point() {
        let node = conv_integer_node(true, false);
        let code = codegen_body(&node);

        assert_snapshot!(code, @r"
        /* ConvInteger
         * name: conv
         * auto_pad: NOTSET
         * kernel_shape: [3, 3]
         * strides: [1, 1]
         * dilations: [1, 1]
         * pads: [0, 0, 0, 0]
         * group: 1
         */
        for (uint32_t b = 0; b < 1; b++) {
            for (uint32_t m = 0; m < 1; m++) {
                for (int32_t o0 = 0, i0 = 0; o0 < 3; o0++, i0 += 1) {
                    for (int32_t o1 = 0, i1 = 0; o1 < 3; o1++, i1 += 1) {
                        int32_t cell = 0;
                        for (uint32_t c = 0; c < 1; c++) {
                            for (int32_t k0 = 0; k0 < 3; k0++) {
                                int32_t ii0 = i0 + k0;
                                if (ii0 < 0 || ii0 >= 5) continue;
                                for (int32_t k1 = 0; k1 < 3; k1++) {
                                    int32_t ii1 = i1 + k1;
                                    if (ii1 < 0 || ii1 >= 5) continue;
                                    cell += ((int32_t)x[b][c][ii0][ii1] - 0) * (int32_t)w[m][c][k0][k1];
                                }
                            }
                        }
                        int32_t tmp = cell / 144;
                        tmp = tmp > 127 ? 127 : tmp;
                        tmp = tmp < -127 ? -127 : tmp;
                        y[b][m][o0][o1] = (int8_t)tmp;
                    }
                }
            }
        }
        ");
    }

    #[test]
    fn bindings_follow_zero_point_presence() {
        let locals = |node: &ConvIntegerNode| {
            node.bindings()
                .into_iter()
                .map(|binding| binding.local)
                .collect::<Vec<_>>()
        };

        assert_eq!(
            locals(&conv_integer_node(false, true)),
            vec!["x", "w", "x_zero_point", "y"]
        );
        assert_eq!(locals(&conv_integer_node(false, false)), vec!["x", "w", "y"]);
    }

    #[test]
    fn output_type_follows_quantization() {
        assert_eq!(
            conv_integer_node(false, false).output().elem_type,
            ElementType::Int32
        );
        assert_eq!(
            conv_integer_node(true, false).output().elem_type,
            ElementType::Int8
        );
    }
}
