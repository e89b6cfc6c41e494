//! Padding resolution shared by the convolution-family operators.

use strum::{Display, EnumString};

use crate::processor::ProcessError;

/// The `auto_pad` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
pub enum AutoPad {
    /// Use the explicit `pads` attribute (zero when absent).
    #[default]
    #[strum(serialize = "NOTSET")]
    NotSet,
    /// Pad so that `out = ceil(in / stride)`, extra padding at the end.
    #[strum(serialize = "SAME_UPPER")]
    SameUpper,
    /// Pad so that `out = ceil(in / stride)`, extra padding at the beginning.
    #[strum(serialize = "SAME_LOWER")]
    SameLower,
    /// No padding.
    #[strum(serialize = "VALID")]
    Valid,
}

/// Calculate (begin, end) padding for the `SAME_*` policies on one spatial axis.
/// For odd total padding the extra pad goes to the end, or to the beginning when `lower`.
fn calculate_same_padding(
    kernel_size: usize,
    stride: usize,
    dilation: usize,
    size_in: usize,
    lower: bool,
) -> (usize, usize) {
    let size_out = size_in.div_ceil(stride);
    let effective_kernel = (kernel_size - 1) * dilation + 1;
    let total_padding = if size_out > 0 {
        let needed = (size_out - 1) * stride + effective_kernel;
        needed.saturating_sub(size_in)
    } else {
        0
    };
    let small = total_padding / 2;
    let large = total_padding - small;
    if lower {
        (large, small)
    } else {
        (small, large)
    }
}

/// Resolve the 2D padding of a node.
///
/// Returns the pads in ONNX order `[h_begin, w_begin, h_end, w_end]`.
pub fn resolve_pads_2d(
    auto_pad: AutoPad,
    pads: Option<&[i64]>,
    input: [usize; 2],
    kernel: [usize; 2],
    strides: [usize; 2],
    dilations: [usize; 2],
) -> Result<[usize; 4], ProcessError> {
    let same = |lower: bool| {
        let (top, bottom) =
            calculate_same_padding(kernel[0], strides[0], dilations[0], input[0], lower);
        let (left, right) =
            calculate_same_padding(kernel[1], strides[1], dilations[1], input[1], lower);
        [top, left, bottom, right]
    };

    if auto_pad != AutoPad::NotSet && pads.is_some() {
        log::warn!("Both 'auto_pad' ({auto_pad}) and 'pads' are set, 'pads' is ignored");
    }

    match auto_pad {
        AutoPad::Valid => Ok([0; 4]),
        AutoPad::SameUpper => Ok(same(false)),
        AutoPad::SameLower => Ok(same(true)),
        AutoPad::NotSet => match pads {
            None => Ok([0; 4]),
            Some(pads) => explicit_pads(pads),
        },
    }
}

fn explicit_pads(pads: &[i64]) -> Result<[usize; 4], ProcessError> {
    let invalid = |reason: String| ProcessError::InvalidAttribute {
        name: "pads".to_string(),
        reason,
    };

    if pads.len() != 4 {
        return Err(invalid(format!("expected 4 values, got {pads:?}")));
    }
    if pads.iter().any(|&p| p < 0) {
        return Err(invalid(format!("negative pad values are not supported: {pads:?}")));
    }

    Ok([
        pads[0] as usize,
        pads[1] as usize,
        pads[2] as usize,
        pads[3] as usize,
    ])
}
