use crate::ir::{AttributeValue, Attributes, ElementType, Node, NodeType, Tensor};

/// Builder for [Node]s.
///
/// Used by the graph loader and by tests to assemble nodes input by input.
#[derive(Debug)]
pub struct NodeBuilder {
    node_type: NodeType,
    name: String,
    inputs: Vec<Option<Tensor>>,
    outputs: Vec<String>,
    attrs: Attributes,
}

impl NodeBuilder {
    /// Create a new builder with the specified node type and name
    pub fn new<S: Into<String>>(node_type: NodeType, name: S) -> Self {
        Self {
            node_type,
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: Attributes::new(),
        }
    }

    /// Append an input, `None` for an omitted optional input.
    pub fn input(mut self, tensor: Option<Tensor>) -> Self {
        self.inputs.push(tensor);
        self
    }

    /// Append a tensor input.
    pub fn input_tensor(self, name: &str, elem_type: ElementType, shape: Vec<usize>) -> Self {
        self.input(Some(Tensor::new(name, elem_type, shape)))
    }

    /// Append an `int8` tensor input.
    pub fn input_tensor_i8(self, name: &str, shape: Vec<usize>) -> Self {
        self.input_tensor(name, ElementType::Int8, shape)
    }

    /// Append a `uint8` tensor input.
    pub fn input_tensor_u8(self, name: &str, shape: Vec<usize>) -> Self {
        self.input_tensor(name, ElementType::Uint8, shape)
    }

    /// Append a `float32` tensor input.
    pub fn input_tensor_f32(self, name: &str, shape: Vec<usize>) -> Self {
        self.input_tensor(name, ElementType::Float32, shape)
    }

    /// Append an empty optional input slot.
    pub fn input_none(self) -> Self {
        self.input(None)
    }

    /// Declare an output name.
    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    /// Set an attribute.
    pub fn attr(mut self, name: &str, value: AttributeValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Set an integer attribute.
    pub fn attr_int(self, name: &str, value: i64) -> Self {
        self.attr(name, AttributeValue::Int64(value))
    }

    /// Set an integer list attribute.
    pub fn attr_ints(self, name: &str, values: Vec<i64>) -> Self {
        self.attr(name, AttributeValue::Int64s(values))
    }

    /// Set a string attribute.
    pub fn attr_string(self, name: &str, value: &str) -> Self {
        self.attr(name, AttributeValue::String(value.to_string()))
    }

    /// Set every attribute of a map.
    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs.extend(attrs);
        self
    }

    /// Build the node
    pub fn build(self) -> Node {
        Node {
            node_type: self.node_type,
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            attrs: self.attrs,
        }
    }
}
