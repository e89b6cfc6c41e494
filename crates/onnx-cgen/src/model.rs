use std::fs;
use std::path::Path;

use onnx_cgen_ir::{Attributes, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A graph to compile, as read from JSON.
///
/// ```json
/// {
///   "name": "quantized",
///   "inputs": [{"name": "x", "dtype": "int8", "shape": [1, 1, 5, 5]}],
///   "initializers": [
///     {"name": "w", "dtype": "int8", "shape": [1, 1, 3, 3], "data": [1, 1, 1, 1, 1, 1, 1, 1, 1]}
///   ],
///   "nodes": [
///     {"op_type": "ConvInteger", "name": "conv", "inputs": ["x", "w"], "outputs": ["y"]}
///   ],
///   "outputs": ["y"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Name of the graph, printed in the top comment of the generated file.
    #[serde(default)]
    pub name: String,

    /// Tensors supplied by the caller of the generated `entry` function.
    pub inputs: Vec<Tensor>,

    /// Constant tensors with their values.
    #[serde(default)]
    pub initializers: Vec<Initializer>,

    /// Nodes in execution order.
    pub nodes: Vec<NodeDescription>,

    /// Names of the tensors the generated `entry` function writes.
    pub outputs: Vec<String>,
}

impl ModelDescription {
    /// Parse a model from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// A constant tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initializer {
    /// Name, element type and shape.
    #[serde(flatten)]
    pub tensor: Tensor,

    /// Values in row-major order.
    pub data: TensorData,
}

/// Initializer values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TensorData {
    /// Integer values. Also accepted for float tensors.
    Ints(Vec<i64>),
    /// Floating point values.
    Floats(Vec<f32>),
}

impl TensorData {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            TensorData::Ints(values) => values.len(),
            TensorData::Floats(values) => values.len(),
        }
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// ONNX operator type, e.g. `ConvInteger`.
    pub op_type: String,

    /// Node name. Unnamed nodes are named after their operator and position.
    #[serde(default)]
    pub name: String,

    /// Input tensor names. An empty name marks an omitted optional input.
    pub inputs: Vec<String>,

    /// Output tensor names.
    pub outputs: Vec<String>,

    /// ONNX attributes.
    #[serde(default)]
    pub attributes: Attributes,
}
