//! `onnx-cgen-ir` holds the node representation consumed by the C code generator and the
//! attribute resolution shared by the convolution-family operators.
//!
//! Resolution never allocates generated code: it turns a [Node](ir::Node) into immutable
//! parameter values (such as [ConvParams](node::conv::ConvParams)) or a [ProcessError].

pub mod ir;
pub mod node;
pub mod padding;
pub mod processor;

pub use ir::*;
pub use processor::ProcessError;
