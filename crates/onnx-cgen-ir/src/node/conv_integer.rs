//! # ConvInteger (2D)
//!
//! Integer convolution with an optional data zero-point.
//!
//! **ONNX Spec**: <https://onnx.ai/onnx/operators/onnx__ConvInteger.html>
//!
//! ## Inputs
//! - `x` (T1): Input tensor (N x C x H x W)
//! - `w` (T2): Weights (M x C x kH x kW)
//! - `x_zero_point` (T1, optional): Data zero-point, a single value
//! - `w_zero_point` (T2, optional): Weight zero-point, rejected
//!
//! ## Outputs
//! - `y` (T3): `int32`, or `int8` when the compiler quantizes
//!
//! Attributes are those of [Conv](super::conv), resolved by [conv2d_params].

use crate::ir::{ElementType, Node, Tensor};
use crate::node::conv::{conv2d_params, ConvParams};
use crate::processor::{validate_input_count, validate_single_output, ProcessError};

/// Per-kernel-position scale of the quantized output: the accumulator is divided by
/// `kernel_area * QUANTIZATION_SCALE`.
pub const QUANTIZATION_SCALE: i32 = 16;

/// Quantized outputs saturate to `[-QUANTIZATION_LIMIT, QUANTIZATION_LIMIT]`.
pub const QUANTIZATION_LIMIT: i32 = 127;

/// The value subtracted from every data element before multiplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataZeroPoint {
    /// A one-element tensor, read as `x_zero_point[0]`.
    Tensor(Tensor),
    /// No zero-point input: the arithmetic uses a literal.
    Literal(i32),
}

/// Zero-points of a resolved ConvInteger node.
///
/// There is no weight zero-point: its presence fails resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroPoints {
    pub data: DataZeroPoint,
}

/// Bind the optional 3rd and 4th inputs.
pub fn conv_integer_zero_points(node: &Node) -> Result<ZeroPoints, ProcessError> {
    if node.input(3).is_some() {
        return Err(ProcessError::UnsupportedWeightZeroPoint);
    }

    let data = match node.input(2) {
        Some(tensor) => DataZeroPoint::Tensor(tensor.clone()),
        None => DataZeroPoint::Literal(0),
    };

    Ok(ZeroPoints { data })
}

/// Declare the output tensor: `int8` when quantizing, `int32` otherwise.
///
/// The `int8` output departs from ONNX, where ConvInteger always yields `int32`.
pub fn conv_integer_output(node: &Node, params: &ConvParams, quantize: bool) -> Tensor {
    let elem_type = if quantize {
        ElementType::Int8
    } else {
        ElementType::Int32
    };

    Tensor::new(
        node.outputs[0].clone(),
        elem_type,
        params.output_shape().to_vec(),
    )
}

/// The divisor applied to a quantized accumulator: `kernel_area * QUANTIZATION_SCALE`.
///
/// Fails when it does not fit the 32-bit arithmetic of the generated code.
pub fn quantization_divisor(params: &ConvParams) -> Result<i32, ProcessError> {
    i32::try_from(params.kernel_area())
        .ok()
        .and_then(|area| area.checked_mul(QUANTIZATION_SCALE))
        .ok_or_else(|| {
            ProcessError::InvalidShape(format!(
                "kernel area {} is too large to requantize",
                params.kernel_area()
            ))
        })
}

/// Configuration of a ConvInteger node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvIntegerConfig {
    pub params: ConvParams,
    pub zero_points: ZeroPoints,
    pub output: Tensor,
    /// Requantization divisor, present when the output is quantized.
    pub divisor: Option<i32>,
}

/// Create a [ConvIntegerConfig] from a ConvInteger node.
pub fn conv_integer_config(node: &Node, quantize: bool) -> Result<ConvIntegerConfig, ProcessError> {
    validate_input_count(node, 2, 4)?;
    validate_single_output(node)?;

    let params = conv2d_params(node)?;
    let zero_points = conv_integer_zero_points(node)?;

    for (index, name) in [(0, "x"), (1, "w")] {
        if let Some(tensor) = node.input(index) {
            if !tensor.elem_type.is_int() {
                return Err(ProcessError::TypeMismatch {
                    expected: format!("{name}: integer"),
                    actual: tensor.elem_type.to_string(),
                });
            }
        }
    }

    let divisor = if quantize {
        Some(quantization_divisor(&params)?)
    } else {
        None
    };
    let output = conv_integer_output(node, &params, quantize);

    Ok(ConvIntegerConfig {
        params,
        zero_points,
        output,
        divisor,
    })
}
