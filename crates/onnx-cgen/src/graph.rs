use std::collections::HashSet;
use std::str::FromStr;

use onnx_cgen_ir::node::builder::NodeBuilder;
use onnx_cgen_ir::{ElementType, NodeType};

use crate::context::CompileContext;
use crate::error::{Error, Result};
use crate::model::{ModelDescription, TensorData};
use crate::node::{Node, NodeCodegen};
use crate::registry::{RegisteredTensor, TensorKind, TensorRegistry};
use crate::ty::{c_declaration, c_identifier};
use crate::writer::CodeWriter;

/// A resolved graph, ready to be printed as a C source file.
#[derive(Debug, Clone)]
pub struct CGraph {
    registry: TensorRegistry,
    nodes: Vec<Node>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    top_comment: Option<String>,
}

impl CGraph {
    /// Register the model tensors and resolve every node, in order.
    ///
    /// The first failing node aborts the build.
    pub fn build(model: &ModelDescription, context: &CompileContext) -> Result<Self> {
        let mut registry = TensorRegistry::new();
        for input in model.inputs.iter() {
            registry.register(input.clone(), TensorKind::Input)?;
        }
        for initializer in model.initializers.iter() {
            registry.register(
                initializer.tensor.clone(),
                TensorKind::Initializer(initializer.data.clone()),
            )?;
        }

        let mut nodes = Vec::with_capacity(model.nodes.len());
        let mut function_names = HashSet::new();

        for (position, description) in model.nodes.iter().enumerate() {
            let name = if description.name.is_empty() {
                format!("{}_{position}", description.op_type)
            } else {
                description.name.clone()
            };

            let node_type = NodeType::from_str(&description.op_type).map_err(|_| {
                Error::UnsupportedOperator {
                    op_type: description.op_type.clone(),
                    node: name.clone(),
                }
            })?;

            if !function_names.insert(c_identifier(&name)) {
                return Err(Error::DuplicateNode(name));
            }

            let mut builder = NodeBuilder::new(node_type, name.as_str());
            for input in description.inputs.iter() {
                let tensor = if input.is_empty() {
                    None
                } else {
                    Some(registry.tensor(input)?.clone())
                };
                builder = builder.input(tensor);
            }
            for output in description.outputs.iter() {
                builder = builder.output(output);
            }
            let ir_node = builder.attrs(description.attributes.clone()).build();

            let node = Node::resolve(&ir_node, context).map_err(|source| Error::Resolve {
                node: name.clone(),
                source,
            })?;
            log::info!(
                "Resolved {} node '{name}' -> {} {:?}",
                node.node_type(),
                node.output().elem_type,
                node.output().shape
            );

            registry.register(node.output().clone(), TensorKind::Intermediate)?;
            nodes.push(node);
        }

        for output in model.outputs.iter() {
            registry.mark_output(output)?;
        }

        // An `entry` parameter must not hide a node function.
        for node in nodes.iter() {
            let function = function_name(node);
            if let Some(registered) = registry.get_by_c_name(&function) {
                return Err(Error::NameCollision {
                    first: node.name().to_string(),
                    second: registered.tensor.name.clone(),
                    c_name: function,
                });
            }
        }

        Ok(Self {
            registry,
            nodes,
            inputs: model.inputs.iter().map(|t| t.name.clone()).collect(),
            outputs: model.outputs.clone(),
            top_comment: None,
        })
    }

    /// Set a comment printed at the top of the file.
    pub fn with_top_comment(mut self, top_comment: Option<String>) -> Self {
        self.top_comment = top_comment;
        self
    }

    /// The resolved nodes, in execution order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every tensor of the graph.
    pub fn registry(&self) -> &TensorRegistry {
        &self.registry
    }

    /// Print the C source file.
    pub fn codegen(&self) -> String {
        let mut writer = CodeWriter::new();

        if let Some(top_comment) = &self.top_comment {
            writer.line(format!("/* {top_comment} */"));
        }
        writer.line("#include <stdint.h>");

        let mut initializers = self.registry.initializers().peekable();
        if initializers.peek().is_some() {
            writer.blank();
        }
        for (tensor, data) in initializers {
            let name = self.c_name(&tensor.name);
            let values = c_values(tensor.elem_type, data);
            let dims = if tensor.shape.is_empty() {
                vec![1]
            } else {
                tensor.shape.clone()
            };
            writer.line(format!(
                "static const {} = {};",
                c_declaration(tensor.elem_type, &name, &tensor.shape),
                nested_initializer(&dims, &values)
            ));
        }

        let mut intermediates = self.registry.intermediates().peekable();
        if intermediates.peek().is_some() {
            writer.blank();
        }
        for registered in intermediates {
            let tensor = &registered.tensor;
            writer.line(format!(
                "static {};",
                c_declaration(tensor.elem_type, &registered.c_name(), &tensor.shape)
            ));
        }

        for node in self.nodes.iter() {
            let parameters: Vec<String> = node
                .bindings()
                .iter()
                .map(|binding| binding.parameter())
                .collect();

            writer.blank();
            writer.open(format!(
                "static inline void {}({})",
                function_name(node),
                parameters.join(", ")
            ));
            node.print(&mut writer);
            writer.close();
        }

        let parameters: Vec<String> = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .filter_map(|name| self.registry.get(name))
            .map(entry_parameter)
            .collect();

        writer.blank();
        writer.open(format!("void entry({})", parameters.join(", ")));
        for node in self.nodes.iter() {
            let arguments: Vec<String> = node
                .bindings()
                .iter()
                .map(|binding| self.c_name(&binding.tensor.name))
                .collect();
            writer.line(format!("{}({});", function_name(node), arguments.join(", ")));
        }
        writer.close();

        log::debug!("Generated {} node functions", self.nodes.len());

        writer.finish()
    }

    fn c_name(&self, name: &str) -> String {
        self.registry
            .get(name)
            .map(RegisteredTensor::c_name)
            .unwrap_or_else(|| c_identifier(name))
    }
}

fn function_name(node: &Node) -> String {
    format!("node_{}", c_identifier(node.name()))
}

fn entry_parameter(registered: &RegisteredTensor) -> String {
    let tensor = &registered.tensor;
    let declaration = c_declaration(tensor.elem_type, &registered.c_name(), &tensor.shape);
    match registered.kind {
        TensorKind::Output => declaration,
        _ => format!("const {declaration}"),
    }
}

/// C literals for initializer values.
fn c_values(elem_type: ElementType, data: &TensorData) -> Vec<String> {
    match (elem_type, data) {
        (ElementType::Float32, TensorData::Ints(values)) => values
            .iter()
            .map(|&value| float_literal(value as f32))
            .collect(),
        (ElementType::Float32, TensorData::Floats(values)) => {
            values.iter().map(|&value| float_literal(value)).collect()
        }
        (_, TensorData::Ints(values)) => values.iter().map(i64::to_string).collect(),
        (_, TensorData::Floats(values)) => values.iter().map(f32::to_string).collect(),
    }
}

fn float_literal(value: f32) -> String {
    format!("{value:?}f")
}

/// Brace-nested initializer list following `dims`.
fn nested_initializer(dims: &[usize], values: &[String]) -> String {
    match dims.split_first() {
        None => values.first().cloned().unwrap_or_else(|| "0".to_string()),
        Some((_, inner)) => {
            let stride = inner.iter().product::<usize>().max(1);
            let items: Vec<String> = values
                .chunks(stride)
                .map(|chunk| nested_initializer(inner, chunk))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use onnx_cgen_ir::ProcessError;

    fn model(json: &str) -> ModelDescription {
        ModelDescription::from_json(json).unwrap()
    }

    fn single_conv_integer() -> ModelDescription {
        model(
            r#"{
                "name": "single",
                "inputs": [
                    {"name": "x", "dtype": "int8", "shape": [1, 1, 3, 3]},
                    {"name": "x_zero_point", "dtype": "int8", "shape": []}
                ],
                "initializers": [
                    {"name": "w", "dtype": "int8", "shape": [1, 1, 2, 2], "data": [1, 0, 0, -1]}
                ],
                "nodes": [{
                    "op_type": "ConvInteger",
                    "name": "conv/1",
                    "inputs": ["x", "w", "x_zero_point"],
                    "outputs": ["y"]
                }],
                "outputs": ["y"]
            }"#,
        )
    }

    #[test]
    fn codegen_single_node() {
        let graph = CGraph::build(&single_conv_integer(), &CompileContext::default()).unwrap();

        assert_snapshot!(graph.codegen(), @r"
        #include <stdint.h>

        static const int8_t tensor_w[1][1][2][2] = {{{{1, 0}, {0, -1}}}};

        static inline void node_conv_1(const int8_t x[1][1][3][3], const int8_t w[1][1][2][2], const int8_t x_zero_point[1], int32_t y[1][1][2][2]) {
            /* ConvInteger
             * name: conv/1
             * auto_pad: NOTSET
             * kernel_shape: [2, 2]
             * strides: [1, 1]
             * dilations: [1, 1]
             * pads: [0, 0, 0, 0]
             * group: 1
             */
            for (uint32_t b = 0; b < 1; b++) {
                for (uint32_t m = 0; m < 1; m++) {
                    for (int32_t o0 = 0, i0 = 0; o0 < 2; o0++, i0 += 1) {
                        for (int32_t o1 = 0, i1 = 0; o1 < 2; o1++, i1 += 1) {
                            y[b][m][o0][o1] = 0;
                            for (uint32_t c = 0; c < 1; c++) {
                                for (int32_t k0 = 0; k0 < 2; k0++) {
                                    int32_t ii0 = i0 + k0;
                                    if (ii0 < 0 || ii0 >= 3) continue;
                                    for (int32_t k1 = 0; k1 < 2; k1++) {
                                        int32_t ii1 = i1 + k1;
                                        if (ii1 < 0 || ii1 >= 3) continue;
                                        y[b][m][o0][o1] += ((int32_t)x[b][c][ii0][ii1] - (int32_t)x_zero_point[0]) * (int32_t)w[m][c][k0][k1];
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        void entry(const int8_t x[1][1][3][3], const int8_t x_zero_point[1], int32_t y[1][1][2][2]) {
            node_conv_1(x, tensor_w, x_zero_point, y);
        }
        ");
    }

    #[test]
    fn chained_nodes_share_an_intermediate_buffer() {
        let model = model(
            r#"{
                "inputs": [{"name": "x", "dtype": "int8", "shape": [1, 1, 5, 5]}],
                "initializers": [
                    {"name": "w", "dtype": "int8", "shape": [1, 1, 1, 1], "data": [2]}
                ],
                "nodes": [
                    {"op_type": "ConvInteger", "inputs": ["x", "w"], "outputs": ["hidden"]},
                    {"op_type": "ConvInteger", "inputs": ["hidden", "w"], "outputs": ["y"]}
                ],
                "outputs": ["y"]
            }"#,
        );

        let code = CGraph::build(&model, &CompileContext::new(true))
            .unwrap()
            .codegen();

        assert!(code.contains("static const int8_t tensor_w[1][1][1][1] = {{{{2}}}};"));
        assert!(code.contains("static int8_t tensor_hidden[1][1][5][5];"));
        assert!(code.contains("static inline void node_ConvInteger_0("));
        assert!(code.contains("void entry(const int8_t x[1][1][5][5], int8_t y[1][1][5][5]) {"));
        assert!(code.contains("    node_ConvInteger_0(x, tensor_w, tensor_hidden);\n"));
        assert!(code.contains("    node_ConvInteger_1(tensor_hidden, tensor_w, y);\n"));
    }

    #[test]
    fn float_initializers_use_float_literals() {
        let model = model(
            r#"{
                "inputs": [{"name": "x", "dtype": "float32", "shape": [1, 1, 2, 2]}],
                "initializers": [
                    {"name": "w", "dtype": "float32", "shape": [1, 1, 1, 1], "data": [0.5]},
                    {"name": "b", "dtype": "float32", "shape": [1], "data": [1]}
                ],
                "nodes": [{"op_type": "Conv", "name": "conv", "inputs": ["x", "w", "b"], "outputs": ["y"]}],
                "outputs": ["y"]
            }"#,
        );

        let code = CGraph::build(&model, &CompileContext::default())
            .unwrap()
            .codegen();

        assert!(code.contains("static const float tensor_w[1][1][1][1] = {{{{0.5f}}}};"));
        assert!(code.contains("static const float tensor_b[1] = {1.0f};"));
        assert!(code.contains("y[b][m][o0][o1] = bias[m];"));
    }

    #[test]
    fn resolve_errors_name_the_node() {
        let mut model = single_conv_integer();
        model.nodes[0].attributes.insert(
            "group".to_string(),
            onnx_cgen_ir::AttributeValue::Int64(2),
        );

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(
            error,
            Error::Resolve {
                ref node,
                source: ProcessError::UnsupportedGrouping { group: 2 },
            } if node == "conv/1"
        ));
    }

    #[test]
    fn unsupported_operator() {
        let mut model = single_conv_integer();
        model.nodes[0].op_type = "QLinearConv".to_string();

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(error, Error::UnsupportedOperator { op_type, .. } if op_type == "QLinearConv"));
    }

    #[test]
    fn unknown_input_tensor() {
        let mut model = single_conv_integer();
        model.nodes[0].inputs[0] = "missing".to_string();

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(error, Error::UnknownTensor(name) if name == "missing"));
    }

    #[test]
    fn input_named_like_an_initializer_is_rejected() {
        let mut model = single_conv_integer();
        model.inputs[0].name = "tensor_w".to_string();
        model.nodes[0].inputs[0] = "tensor_w".to_string();

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(
            error,
            Error::NameCollision { ref c_name, .. } if c_name == "tensor_w"
        ));
    }

    #[test]
    fn input_named_like_a_node_function_is_rejected() {
        let mut model = single_conv_integer();
        model.inputs[1].name = "node_conv_1".to_string();
        model.nodes[0].inputs[2] = "node_conv_1".to_string();

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(
            error,
            Error::NameCollision { ref first, .. } if first == "conv/1"
        ));
    }

    #[test]
    fn repeated_graph_output_is_rejected() {
        let mut model = single_conv_integer();
        model.outputs.push("y".to_string());

        let error = CGraph::build(&model, &CompileContext::default()).unwrap_err();

        assert!(matches!(error, Error::DuplicateOutput(name) if name == "y"));
    }

    #[test]
    fn nested_initializer_follows_shape() {
        let values: Vec<String> = (1..=6).map(|v| v.to_string()).collect();

        assert_eq!(nested_initializer(&[2, 3], &values), "{{1, 2, 3}, {4, 5, 6}}");
        assert_eq!(nested_initializer(&[6], &values), "{1, 2, 3, 4, 5, 6}");
    }
}
