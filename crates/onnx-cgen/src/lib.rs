#![warn(missing_docs)]

//! `onnx-cgen` turns a small ONNX graph description into a standalone C source file.
//!
//! Each node is resolved once against a [CompileContext], then printed as a
//! `static inline` C function built around a padding-aware loop nest. A graph-level
//! `entry` function calls the node functions in order.

mod cgen;
mod logger;

/// Errors surfaced to the caller of the compiler.
pub mod error;

/// Compiler options shared by every node of a run.
pub mod context;

/// The JSON model description read by the compiler.
pub mod model;

pub mod registry;

/// Mapping from element types and names to C.
pub mod ty;

/// Indented text output.
pub mod writer;

pub mod loop_nest;

/// Code generation for individual nodes.
pub mod node;

/// Graph assembly and C file emission.
pub mod graph;

pub mod reference;

pub use cgen::CGen;
pub use context::CompileContext;
pub use error::Error;
pub use graph::CGraph;
pub use logger::init_log;
pub use model::ModelDescription;
