pub(crate) mod conv;
pub(crate) mod conv_integer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use conv::ConvNode;
pub use conv_integer::{requantize, ConvIntegerNode};
pub use onnx_cgen_ir::node::conv_integer::{QUANTIZATION_LIMIT, QUANTIZATION_SCALE};

use onnx_cgen_ir::{NodeType, ProcessError, Tensor};

use crate::context::CompileContext;
use crate::ty::c_declaration;
use crate::writer::CodeWriter;

/// A tensor as seen from inside a node function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// The name the node body uses, e.g. `x` or `x_zero_point`.
    pub local: String,
    /// The graph tensor behind it.
    pub tensor: Tensor,
    /// Whether the node writes the tensor.
    pub writable: bool,
}

impl Binding {
    /// Bind a tensor the node reads.
    pub fn input(tensor: &Tensor, local: &str) -> Self {
        Self {
            local: local.to_string(),
            tensor: tensor.clone(),
            writable: false,
        }
    }

    /// Bind the tensor the node writes.
    pub fn output(tensor: &Tensor, local: &str) -> Self {
        Self {
            local: local.to_string(),
            tensor: tensor.clone(),
            writable: true,
        }
    }

    /// The parameter declaration in the node function signature.
    pub fn parameter(&self) -> String {
        let declaration = c_declaration(self.tensor.elem_type, &self.local, &self.tensor.shape);
        if self.writable {
            declaration
        } else {
            format!("const {declaration}")
        }
    }
}

/// Code generation for a resolved node.
pub trait NodeCodegen: std::fmt::Debug {
    /// The node name.
    fn name(&self) -> &str;

    /// The operator.
    fn node_type(&self) -> NodeType;

    /// Every tensor the node body refers to, inputs first, then the output.
    fn bindings(&self) -> Vec<Binding>;

    /// The tensor created during resolution.
    fn output(&self) -> &Tensor;

    /// Print the node function body: a header comment and the computation.
    fn print(&self, writer: &mut CodeWriter);
}

/// The operators the code generator implements.
#[derive(Debug, Clone)]
pub enum Node {
    /// Floating point convolution.
    Conv(ConvNode),
    /// Integer convolution.
    ConvInteger(ConvIntegerNode),
}

impl Node {
    /// Resolve an IR node. This runs once per node and compilation.
    pub fn resolve(node: &onnx_cgen_ir::Node, context: &CompileContext) -> Result<Self, ProcessError> {
        match node.node_type {
            NodeType::Conv => ConvNode::resolve(node).map(Node::Conv),
            NodeType::ConvInteger => ConvIntegerNode::resolve(node, context).map(Node::ConvInteger),
        }
    }

    fn codegen(&self) -> &dyn NodeCodegen {
        match self {
            Node::Conv(node) => node,
            Node::ConvInteger(node) => node,
        }
    }
}

impl NodeCodegen for Node {
    fn name(&self) -> &str {
        self.codegen().name()
    }

    fn node_type(&self) -> NodeType {
        self.codegen().node_type()
    }

    fn bindings(&self) -> Vec<Binding> {
        self.codegen().bindings()
    }

    fn output(&self) -> &Tensor {
        self.codegen().output()
    }

    fn print(&self, writer: &mut CodeWriter) {
        self.codegen().print(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onnx_cgen_ir::node::builder::NodeBuilder;
    use onnx_cgen_ir::ElementType;

    #[test]
    fn dispatch_on_node_type() {
        let node = NodeBuilder::new(NodeType::ConvInteger, "conv")
            .input_tensor_i8("x", vec![1, 1, 5, 5])
            .input_tensor_i8("w", vec![1, 1, 3, 3])
            .output("y")
            .build();

        let resolved = Node::resolve(&node, &CompileContext::new(true)).unwrap();

        assert!(matches!(resolved, Node::ConvInteger(_)));
        assert_eq!(resolved.node_type(), NodeType::ConvInteger);
        assert_eq!(resolved.output().elem_type, ElementType::Int8);
    }

    #[test]
    fn input_parameters_are_const() {
        let tensor = Tensor::new("input.1", ElementType::Uint8, vec![1, 2, 3, 3]);

        assert_eq!(
            Binding::input(&tensor, "x").parameter(),
            "const uint8_t x[1][2][3][3]"
        );
        assert_eq!(
            Binding::output(&tensor, "y").parameter(),
            "uint8_t y[1][2][3][3]"
        );
    }
}
