use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::processor::ProcessError;

pub type Rank = usize;
pub type Shape = Vec<usize>;

/// The type of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ElementType {
    Float32,
    Int8,
    Uint8,
    Int32,
    Int64,
}

impl ElementType {
    /// Whether the element type is an integer kind.
    pub fn is_int(&self) -> bool {
        !matches!(self, ElementType::Float32)
    }
}

/// A tensor description: name, element type and static shape.
///
/// Tensors never carry values here; initializer data lives in the code generator's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tensor {
    /// The name used to bind the tensor in generated code.
    pub name: String,

    /// The element type of the tensor values.
    #[serde(rename = "dtype")]
    pub elem_type: ElementType,

    /// Dimension sizes, outermost first.
    pub shape: Shape,
}

impl Tensor {
    pub fn new<S: Into<String>>(name: S, elem_type: ElementType, shape: Shape) -> Self {
        Self {
            name: name.into(),
            elem_type,
            shape,
        }
    }

    pub fn rank(&self) -> Rank {
        self.shape.len()
    }

    /// Number of scalar elements.
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }
}

/// The value of a node attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int64(i64),
    Float32(f32),
    Int64s(Vec<i64>),
    Float32s(Vec<f32>),
    String(String),
}

pub type Attributes = HashMap<String, AttributeValue>;

impl AttributeValue {
    pub fn to_i64(&self, name: &str) -> Result<i64, ProcessError> {
        match self {
            AttributeValue::Int64(value) => Ok(*value),
            other => Err(type_mismatch(name, "int", other)),
        }
    }

    pub fn to_i64s(&self, name: &str) -> Result<Vec<i64>, ProcessError> {
        match self {
            AttributeValue::Int64s(values) => Ok(values.clone()),
            other => Err(type_mismatch(name, "ints", other)),
        }
    }

    pub fn to_text(&self, name: &str) -> Result<String, ProcessError> {
        match self {
            AttributeValue::String(value) => Ok(value.clone()),
            other => Err(type_mismatch(name, "string", other)),
        }
    }
}

fn type_mismatch(name: &str, expected: &str, actual: &AttributeValue) -> ProcessError {
    ProcessError::InvalidAttribute {
        name: name.to_string(),
        reason: format!("expected {expected}, got {actual:?}"),
    }
}

/// Operators the code generator knows how to resolve.
///
/// See: <https://onnx.ai/onnx/operators/index.html>
#[derive(Debug, Hash, Eq, PartialEq, EnumString, Clone, Copy, Display)]
pub enum NodeType {
    Conv,
    ConvInteger,
}

/// A graph node as seen by operator resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The type of the node.
    pub node_type: NodeType,

    /// The name of the node.
    pub name: String,

    /// The ordered inputs of the node. `None` marks an omitted optional input.
    pub inputs: Vec<Option<Tensor>>,

    /// Names given to the tensors the node produces.
    pub outputs: Vec<String>,

    /// ONNX attributes.
    pub attrs: Attributes,
}

impl Node {
    /// The input at `index`, if the node has one there.
    pub fn input(&self, index: usize) -> Option<&Tensor> {
        self.inputs.get(index).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn node_type_from_op_type() {
        assert_eq!(NodeType::from_str("ConvInteger"), Ok(NodeType::ConvInteger));
        assert_eq!(NodeType::from_str("Conv"), Ok(NodeType::Conv));
        assert!(NodeType::from_str("ConvTranspose").is_err());
    }

    #[test]
    fn attribute_type_mismatch_is_an_error() {
        let value = AttributeValue::Int64(2);
        assert_eq!(value.to_i64("group"), Ok(2));
        assert!(matches!(
            value.to_i64s("strides"),
            Err(ProcessError::InvalidAttribute { name, .. }) if name == "strides"
        ));
    }

    #[test]
    fn attributes_deserialize_untagged() {
        let attrs: Attributes =
            serde_json::from_str(r#"{"group": 1, "pads": [0, 1, 0, 1], "auto_pad": "VALID"}"#)
                .unwrap();

        assert_eq!(attrs["group"], AttributeValue::Int64(1));
        assert_eq!(attrs["pads"], AttributeValue::Int64s(vec![0, 1, 0, 1]));
        assert_eq!(attrs["auto_pad"], AttributeValue::String("VALID".into()));
    }

    #[test]
    fn tensor_element_count() {
        let tensor = Tensor::new("x", ElementType::Int8, vec![1, 3, 4, 4]);
        assert_eq!(tensor.rank(), 4);
        assert_eq!(tensor.num_elements(), 48);
    }
}
