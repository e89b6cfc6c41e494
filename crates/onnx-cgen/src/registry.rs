//! Graph-wide tensor registry.
//!
//! Every tensor of a graph is registered once under its name: graph inputs and
//! initializers when the model is loaded, node outputs when the node that creates them
//! resolves. The registry owns the tensors from then on.
//!
//! Names are unique twice over: as given in the model, and as C identifiers once
//! sanitized and prefixed.

use std::collections::HashMap;

use onnx_cgen_ir::{ElementType, Tensor};

use crate::error::{Error, Result};
use crate::model::TensorData;
use crate::ty::c_identifier;

/// Where a tensor comes from and where it lives in the generated code.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorKind {
    /// Parameter of the `entry` function, read only.
    Input,
    /// `static const` array holding the given values.
    Initializer(TensorData),
    /// `static` buffer written by one node and read by later ones.
    Intermediate,
    /// Parameter of the `entry` function, written by a node.
    Output,
}

/// A tensor owned by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTensor {
    /// Name, element type and shape.
    pub tensor: Tensor,
    /// Role in the generated code.
    pub kind: TensorKind,
}

impl RegisteredTensor {
    /// The C name of the tensor at graph level.
    ///
    /// Graph inputs and outputs keep their sanitized name as `entry` parameters; other
    /// tensors are file-scope variables and get a `tensor_` prefix.
    pub fn c_name(&self) -> String {
        match self.kind {
            TensorKind::Input | TensorKind::Output => c_identifier(&self.tensor.name),
            TensorKind::Initializer(_) | TensorKind::Intermediate => {
                format!("tensor_{}", c_identifier(&self.tensor.name))
            }
        }
    }
}

/// Central storage for the tensors of a graph, in registration order.
#[derive(Debug, Default, Clone)]
pub struct TensorRegistry {
    tensors: Vec<RegisteredTensor>,
    index: HashMap<String, usize>,
    c_names: HashMap<String, usize>,
}

impl TensorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tensor under its name.
    ///
    /// Fails when the name, or the C identifier it maps to, is already taken.
    pub fn register(&mut self, tensor: Tensor, kind: TensorKind) -> Result<()> {
        if self.index.contains_key(&tensor.name) {
            return Err(Error::DuplicateTensor(tensor.name));
        }
        if let TensorKind::Initializer(data) = &kind {
            check_initializer(&tensor, data)?;
        }

        let registered = RegisteredTensor { tensor, kind };
        let c_name = registered.c_name();
        self.check_c_name(&c_name, &registered.tensor.name)?;

        log::debug!(
            "Registering {} tensor '{}' as {c_name}: {} {:?}",
            kind_name(&registered.kind),
            registered.tensor.name,
            registered.tensor.elem_type,
            registered.tensor.shape
        );

        let index = self.tensors.len();
        self.index.insert(registered.tensor.name.clone(), index);
        self.c_names.insert(c_name, index);
        self.tensors.push(registered);
        Ok(())
    }

    /// The tensor whose C identifier is `c_name`.
    pub fn get_by_c_name(&self, c_name: &str) -> Option<&RegisteredTensor> {
        self.c_names.get(c_name).map(|&i| &self.tensors[i])
    }

    /// Fail when `c_name` already belongs to a tensor other than `name`.
    fn check_c_name(&self, c_name: &str, name: &str) -> Result<()> {
        match self.get_by_c_name(c_name) {
            Some(existing) if existing.tensor.name != name => Err(Error::NameCollision {
                first: existing.tensor.name.clone(),
                second: name.to_string(),
                c_name: c_name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Look a tensor up by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTensor> {
        self.index.get(name).map(|&i| &self.tensors[i])
    }

    /// The tensor registered under `name`.
    pub fn tensor(&self, name: &str) -> Result<&Tensor> {
        self.get(name)
            .map(|registered| &registered.tensor)
            .ok_or_else(|| Error::UnknownTensor(name.to_string()))
    }

    /// Turn an intermediate tensor into a graph output.
    ///
    /// The tensor moves from a `tensor_` buffer to an `entry` parameter, so its C
    /// identifier changes and is checked again.
    pub fn mark_output(&mut self, name: &str) -> Result<()> {
        let index = *self
            .index
            .get(name)
            .ok_or_else(|| Error::UnknownTensor(name.to_string()))?;

        match self.tensors[index].kind {
            TensorKind::Intermediate => {}
            TensorKind::Output => return Err(Error::DuplicateOutput(name.to_string())),
            _ => return Err(Error::InvalidOutput(name.to_string())),
        }

        let old_c_name = self.tensors[index].c_name();
        let c_name = c_identifier(name);
        self.check_c_name(&c_name, name)?;

        self.c_names.remove(&old_c_name);
        self.c_names.insert(c_name, index);
        self.tensors[index].kind = TensorKind::Output;
        Ok(())
    }

    /// All tensors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTensor> {
        self.tensors.iter()
    }

    /// Graph inputs, in registration order.
    pub fn inputs(&self) -> impl Iterator<Item = &RegisteredTensor> {
        self.iter().filter(|t| t.kind == TensorKind::Input)
    }

    /// Graph outputs, in registration order.
    pub fn outputs(&self) -> impl Iterator<Item = &RegisteredTensor> {
        self.iter().filter(|t| t.kind == TensorKind::Output)
    }

    /// Initializers with their values, in registration order.
    pub fn initializers(&self) -> impl Iterator<Item = (&Tensor, &TensorData)> {
        self.iter().filter_map(|t| match &t.kind {
            TensorKind::Initializer(data) => Some((&t.tensor, data)),
            _ => None,
        })
    }

    /// Node outputs that are not graph outputs, in registration order.
    pub fn intermediates(&self) -> impl Iterator<Item = &RegisteredTensor> {
        self.iter().filter(|t| t.kind == TensorKind::Intermediate)
    }

    /// Number of registered tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether no tensor is registered.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

fn kind_name(kind: &TensorKind) -> &'static str {
    match kind {
        TensorKind::Input => "input",
        TensorKind::Initializer(_) => "initializer",
        TensorKind::Intermediate => "intermediate",
        TensorKind::Output => "output",
    }
}

fn check_initializer(tensor: &Tensor, data: &TensorData) -> Result<()> {
    let invalid = |reason: String| Error::InvalidInitializer {
        name: tensor.name.clone(),
        reason,
    };

    if data.len() != tensor.num_elements() {
        return Err(invalid(format!(
            "{} values for shape {:?}",
            data.len(),
            tensor.shape
        )));
    }

    let range = match tensor.elem_type {
        ElementType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
        ElementType::Uint8 => Some((u8::MIN as i64, u8::MAX as i64)),
        ElementType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
        ElementType::Int64 => Some((i64::MIN, i64::MAX)),
        ElementType::Float32 => None,
    };

    match (data, range) {
        (TensorData::Ints(values), Some((min, max))) => {
            if let Some(value) = values.iter().find(|&&v| v < min || v > max) {
                return Err(invalid(format!(
                    "{value} is out of range for {}",
                    tensor.elem_type
                )));
            }
        }
        (TensorData::Floats(_), Some(_)) => {
            return Err(invalid(format!(
                "floating point values for {} tensor",
                tensor.elem_type
            )));
        }
        (TensorData::Floats(values), None) => {
            if let Some(value) = values.iter().find(|v| !v.is_finite()) {
                return Err(invalid(format!("{value} has no C literal")));
            }
        }
        (TensorData::Ints(_), None) => {}
    }

    Ok(())
}
