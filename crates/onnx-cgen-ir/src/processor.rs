//! Errors raised while resolving a node.

use crate::ir::Node;

/// A node could not be resolved.
///
/// Every variant aborts the compilation of the whole graph: no code is emitted for a
/// node that failed to resolve.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The data tensor is not 4-D (batch, channel, height, width).
    #[error("unsupported data tensor rank {rank}: only 2D images (rank 4) are supported")]
    UnsupportedRank {
        /// Rank of the data tensor.
        rank: usize,
    },

    /// The `group` attribute is not 1.
    #[error("unsupported group {group}: only group 1 is supported")]
    UnsupportedGrouping {
        /// Resolved group count.
        group: i64,
    },

    /// At least one resolved dilation is not 1.
    #[error("unsupported dilations {dilations:?}: only dilation 1 is supported")]
    UnsupportedDilation {
        /// Resolved dilations, one per spatial axis.
        dilations: Vec<i64>,
    },

    /// A weight zero-point input was given.
    #[error("unsupported weight zero point: only data zero points are implemented")]
    UnsupportedWeightZeroPoint,

    /// The node has too few or too many inputs.
    #[error("expected {min}..={max} inputs, got {actual}")]
    InvalidInputCount {
        /// Minimum number of inputs.
        min: usize,
        /// Maximum number of inputs.
        max: usize,
        /// Number of inputs on the node.
        actual: usize,
    },

    /// The node does not have exactly one output.
    #[error("expected 1 output, got {actual}")]
    InvalidOutputCount {
        /// Number of outputs on the node.
        actual: usize,
    },

    /// A mandatory input was left empty.
    #[error("missing mandatory input {index} ({name})")]
    MissingInput {
        /// Position in the input list.
        index: usize,
        /// Operator-level name of the input.
        name: &'static str,
    },

    /// An attribute has the wrong type, length or value.
    #[error("invalid attribute '{name}': {reason}")]
    InvalidAttribute {
        /// Attribute name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A tensor has an element type the operator does not accept.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Accepted element type(s).
        expected: String,
        /// Element type found on the node.
        actual: String,
    },

    /// Tensor shapes are inconsistent with each other.
    #[error("invalid shape: {0}")]
    InvalidShape(String),
}

/// Check that the node input count lies in `min..=max`.
pub fn validate_input_count(node: &Node, min: usize, max: usize) -> Result<(), ProcessError> {
    let actual = node.inputs.len();
    if actual < min || actual > max {
        return Err(ProcessError::InvalidInputCount { min, max, actual });
    }
    Ok(())
}

/// Check that the node declares exactly one output.
pub fn validate_single_output(node: &Node) -> Result<(), ProcessError> {
    if node.outputs.len() != 1 {
        return Err(ProcessError::InvalidOutputCount {
            actual: node.outputs.len(),
        });
    }
    Ok(())
}
