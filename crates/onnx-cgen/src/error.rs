use onnx_cgen_ir::ProcessError;

/// An error that aborts a compilation run.
///
/// No output is written once an error is raised.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A node failed to resolve.
    #[error("failed to resolve node '{node}': {source}")]
    Resolve {
        /// Name of the node.
        node: String,
        /// Why resolution failed.
        #[source]
        source: ProcessError,
    },

    /// The model uses an operator the compiler does not implement.
    #[error("unsupported operator '{op_type}' (node '{node}')")]
    UnsupportedOperator {
        /// ONNX operator type.
        op_type: String,
        /// Name of the node.
        node: String,
    },

    /// A name does not refer to any tensor of the graph.
    #[error("unknown tensor '{0}'")]
    UnknownTensor(String),

    /// A graph output is not produced by any node.
    #[error("graph output '{0}' must be produced by a node")]
    InvalidOutput(String),

    /// Two nodes map to the same C function name.
    #[error("node name '{0}' is used more than once")]
    DuplicateNode(String),

    /// Two tensors share a name.
    #[error("tensor '{0}' is defined more than once")]
    DuplicateTensor(String),

    /// Two distinct names map to the same identifier in the generated code.
    #[error("'{first}' and '{second}' both map to the C identifier '{c_name}'")]
    NameCollision {
        /// The name registered first.
        first: String,
        /// The name that collides with it.
        second: String,
        /// The shared C identifier.
        c_name: String,
    },

    /// A graph output is listed more than once.
    #[error("graph output '{0}' is listed more than once")]
    DuplicateOutput(String),

    /// Initializer data does not fit its declared type or shape.
    #[error("invalid initializer '{name}': {reason}")]
    InvalidInitializer {
        /// Name of the initializer.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Reading the model or writing the generated file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The model or the options file is not valid JSON for its schema.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type of the compiler.
pub type Result<T> = core::result::Result<T, Error>;
