//! # Conv (2D)
//!
//! Parameter resolution shared by the 2D convolution-family operators, and the
//! configuration of the plain floating point convolution.
//!
//! **ONNX Spec**: <https://onnx.ai/onnx/operators/onnx__Conv.html>
//!
//! ## Attributes
//! - `kernel_shape` (ints, default from weights): Kernel size
//! - `strides` (ints, default=1): Stride
//! - `pads` (ints, default=0): Padding, `[h_begin, w_begin, h_end, w_end]`
//! - `dilations` (ints, default=1): Dilation (only 1 is supported)
//! - `auto_pad` (string, default="NOTSET"): `NOTSET`, `SAME_UPPER`, `SAME_LOWER` or `VALID`
//! - `group` (int, default=1): Number of groups (only 1 is supported)
//!
//! ## Inputs
//! - `X` (T): Input tensor (N x C x H x W)
//! - `W` (T): Weights (M x C x kH x kW)
//! - `B` (T, optional): Bias (M), plain `Conv` only
//!
//! ## Outputs
//! - `Y` (T): Output tensor (N x M x oH x oW)

use std::str::FromStr;

use crate::ir::{ElementType, Node, Tensor};
use crate::padding::{resolve_pads_2d, AutoPad};
use crate::processor::{validate_input_count, validate_single_output, ProcessError};

/// Resolved geometry of a 2D convolution.
///
/// Only [conv2d_params] creates values of this type, so the output size derived from the
/// fields is always at least one cell per spatial axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvParams {
    input_shape: [usize; 4],
    channels_out: usize,
    kernel_shape: [usize; 2],
    strides: [usize; 2],
    dilations: [usize; 2],
    pads: [usize; 4],
    group: usize,
    auto_pad: AutoPad,
}

impl ConvParams {
    /// Batch size of the data tensor.
    pub fn batch(&self) -> usize {
        self.input_shape[0]
    }

    /// Channels of the data tensor.
    pub fn channels_in(&self) -> usize {
        self.input_shape[1]
    }

    /// Channels of the output tensor, the leading dimension of the weights.
    pub fn channels_out(&self) -> usize {
        self.channels_out
    }

    /// Height and width of the unpadded data tensor.
    pub fn input_spatial(&self) -> [usize; 2] {
        [self.input_shape[2], self.input_shape[3]]
    }

    pub fn kernel_shape(&self) -> [usize; 2] {
        self.kernel_shape
    }

    pub fn strides(&self) -> [usize; 2] {
        self.strides
    }

    pub fn dilations(&self) -> [usize; 2] {
        self.dilations
    }

    /// Pads in ONNX order `[h_begin, w_begin, h_end, w_end]`.
    pub fn pads(&self) -> [usize; 4] {
        self.pads
    }

    pub fn pad_begin(&self, axis: usize) -> usize {
        self.pads[axis]
    }

    pub fn pad_end(&self, axis: usize) -> usize {
        self.pads[axis + 2]
    }

    pub fn group(&self) -> usize {
        self.group
    }

    pub fn auto_pad(&self) -> AutoPad {
        self.auto_pad
    }

    /// Number of kernel positions per input channel.
    pub fn kernel_area(&self) -> usize {
        self.kernel_shape[0] * self.kernel_shape[1]
    }

    /// Output height and width.
    pub fn output_spatial(&self) -> [usize; 2] {
        [0, 1].map(|axis| {
            output_size(
                self.input_shape[axis + 2],
                self.pad_begin(axis),
                self.pad_end(axis),
                self.kernel_shape[axis],
                self.dilations[axis],
                self.strides[axis],
            )
            .unwrap_or(0)
        })
    }

    /// Output shape `[batch, channels_out, out_h, out_w]`.
    pub fn output_shape(&self) -> [usize; 4] {
        let [out_h, out_w] = self.output_spatial();
        [self.batch(), self.channels_out, out_h, out_w]
    }
}

/// `floor((in + pad_begin + pad_end - ((kernel - 1) * dilation + 1)) / stride) + 1`, or `None`
/// when the kernel does not fit in the padded input.
fn output_size(
    input: usize,
    pad_begin: usize,
    pad_end: usize,
    kernel: usize,
    dilation: usize,
    stride: usize,
) -> Option<usize> {
    let effective_kernel = (kernel - 1) * dilation + 1;
    let padded = input + pad_begin + pad_end;
    padded
        .checked_sub(effective_kernel)
        .map(|span| span / stride + 1)
}

#[derive(Debug)]
struct ConvAttributes {
    kernel_shape: Option<Vec<i64>>,
    strides: Option<Vec<i64>>,
    dilations: Option<Vec<i64>>,
    pads: Option<Vec<i64>>,
    auto_pad: AutoPad,
    group: i64,
}

fn conv_attributes(node: &Node) -> Result<ConvAttributes, ProcessError> {
    let mut attrs = ConvAttributes {
        kernel_shape: None,
        strides: None,
        dilations: None,
        pads: None,
        auto_pad: AutoPad::NotSet,
        group: 1,
    };

    for (key, value) in node.attrs.iter() {
        match key.as_str() {
            "kernel_shape" => attrs.kernel_shape = Some(value.to_i64s(key)?),
            "strides" => attrs.strides = Some(value.to_i64s(key)?),
            "dilations" => attrs.dilations = Some(value.to_i64s(key)?),
            "pads" => attrs.pads = Some(value.to_i64s(key)?),
            "group" => attrs.group = value.to_i64(key)?,
            "auto_pad" => {
                let auto_pad = value.to_text(key)?;
                attrs.auto_pad =
                    AutoPad::from_str(&auto_pad).map_err(|_| ProcessError::InvalidAttribute {
                        name: key.clone(),
                        reason: format!("Unsupported 'auto_pad' value: {auto_pad}"),
                    })?;
            }
            _ => {
                return Err(ProcessError::InvalidAttribute {
                    name: key.clone(),
                    reason: format!("Unexpected attribute for {}: {key}", node.node_type),
                });
            }
        }
    }

    Ok(attrs)
}

/// Two strictly positive values, one per spatial axis.
fn spatial_values(name: &str, values: &[i64]) -> Result<[usize; 2], ProcessError> {
    match values {
        [h, w] if *h > 0 && *w > 0 => Ok([*h as usize, *w as usize]),
        _ => Err(ProcessError::InvalidAttribute {
            name: name.to_string(),
            reason: format!("expected 2 positive values, got {values:?}"),
        }),
    }
}

/// Resolve the geometry of a 2D convolution node.
///
/// Checks run in a fixed order so that the reported error does not depend on attribute
/// iteration order: data rank, strides, dilations, kernel shape and padding, group, and
/// finally shape consistency.
pub fn conv2d_params(node: &Node) -> Result<ConvParams, ProcessError> {
    let data = node
        .input(0)
        .ok_or(ProcessError::MissingInput { index: 0, name: "X" })?;
    let weights = node
        .input(1)
        .ok_or(ProcessError::MissingInput { index: 1, name: "W" })?;

    if data.rank() != 4 {
        return Err(ProcessError::UnsupportedRank { rank: data.rank() });
    }
    let input_shape = [data.shape[0], data.shape[1], data.shape[2], data.shape[3]];
    let input_spatial = [input_shape[2], input_shape[3]];

    let attrs = conv_attributes(node)?;

    let strides = match &attrs.strides {
        Some(strides) => spatial_values("strides", strides)?,
        None => [1, 1],
    };

    if let Some(dilations) = &attrs.dilations {
        if dilations.len() != 2 {
            return Err(ProcessError::InvalidAttribute {
                name: "dilations".to_string(),
                reason: format!("expected 2 values, got {dilations:?}"),
            });
        }
        if dilations.iter().any(|&d| d != 1) {
            return Err(ProcessError::UnsupportedDilation {
                dilations: dilations.clone(),
            });
        }
    }
    let dilations = [1, 1];

    if weights.rank() != 4 {
        return Err(ProcessError::InvalidShape(format!(
            "weights must be 4D [M, C, kH, kW], got {:?}",
            weights.shape
        )));
    }
    let weight_kernel = [weights.shape[2], weights.shape[3]];
    if weight_kernel.contains(&0) {
        return Err(ProcessError::InvalidShape(format!(
            "empty kernel in weights {:?}",
            weights.shape
        )));
    }
    let kernel_shape = match &attrs.kernel_shape {
        Some(kernel_shape) => {
            let kernel_shape = spatial_values("kernel_shape", kernel_shape)?;
            if kernel_shape != weight_kernel {
                return Err(ProcessError::InvalidAttribute {
                    name: "kernel_shape".to_string(),
                    reason: format!(
                        "{kernel_shape:?} does not match the weights kernel {weight_kernel:?}"
                    ),
                });
            }
            kernel_shape
        }
        None => weight_kernel,
    };

    let pads = resolve_pads_2d(
        attrs.auto_pad,
        attrs.pads.as_deref(),
        input_spatial,
        kernel_shape,
        strides,
        dilations,
    )?;

    if attrs.group != 1 {
        return Err(ProcessError::UnsupportedGrouping { group: attrs.group });
    }

    if weights.shape[1] != input_shape[1] {
        return Err(ProcessError::InvalidShape(format!(
            "weights expect {} input channels, data has {}",
            weights.shape[1], input_shape[1]
        )));
    }

    for axis in 0..2 {
        let size = output_size(
            input_spatial[axis],
            pads[axis],
            pads[axis + 2],
            kernel_shape[axis],
            dilations[axis],
            strides[axis],
        );
        if size.is_none() {
            return Err(ProcessError::InvalidShape(format!(
                "kernel {kernel_shape:?} does not fit in input {input_spatial:?} padded by {pads:?}"
            )));
        }
    }

    let params = ConvParams {
        input_shape,
        channels_out: weights.shape[0],
        kernel_shape,
        strides,
        dilations,
        pads,
        group: 1,
        auto_pad: attrs.auto_pad,
    };

    log::debug!(
        "{} '{}': kernel {:?}, strides {:?}, pads {:?}, output {:?}",
        node.node_type,
        node.name,
        params.kernel_shape,
        params.strides,
        params.pads,
        params.output_shape()
    );

    Ok(params)
}

/// Configuration of a floating point Conv node.
#[derive(Debug, Clone, PartialEq)]
pub struct Conv2dConfig {
    /// Resolved geometry.
    pub params: ConvParams,
    /// Optional bias, one value per output channel.
    pub bias: Option<Tensor>,
    /// The tensor the node produces.
    pub output: Tensor,
}

/// Create a [Conv2dConfig] from a Conv node.
pub fn conv2d_config(node: &Node) -> Result<Conv2dConfig, ProcessError> {
    validate_input_count(node, 2, 3)?;
    validate_single_output(node)?;

    let params = conv2d_params(node)?;

    for (index, name) in [(0, "X"), (1, "W")] {
        if let Some(tensor) = node.input(index) {
            if tensor.elem_type != ElementType::Float32 {
                return Err(ProcessError::TypeMismatch {
                    expected: format!("{name}: float32"),
                    actual: tensor.elem_type.to_string(),
                });
            }
        }
    }

    let bias = node.input(2).cloned();
    if let Some(bias) = &bias {
        if bias.num_elements() != params.channels_out() {
            return Err(ProcessError::InvalidShape(format!(
                "bias has {} values for {} output channels",
                bias.num_elements(),
                params.channels_out()
            )));
        }
    }

    let output = Tensor::new(
        node.outputs[0].clone(),
        ElementType::Float32,
        params.output_shape().to_vec(),
    );

    Ok(Conv2dConfig {
        params,
        bias,
        output,
    })
}
