//! A direct evaluator for integer convolutions.
//!
//! It runs the same three-phase cell computation as the generated C code, on concrete
//! values, and is used to check the numeric behavior of the generated kernels.

use onnx_cgen_ir::node::conv::ConvParams;
use onnx_cgen_ir::node::conv_integer::quantization_divisor;
use onnx_cgen_ir::ProcessError;

use crate::node::requantize;

/// Phase of one output cell.
///
/// `Init` moves to `Accumulating` once, `Accumulating` absorbs one product per valid kernel
/// position, and `Finalized` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Nothing written yet.
    Init,
    /// Running sum of products.
    Accumulating(i32),
    /// Output value.
    Finalized(i32),
}

/// One output cell of an integer convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerCell {
    state: CellState,
    divisor: Option<i32>,
}

impl IntegerCell {
    /// A cell in the `Init` phase.
    ///
    /// With a `divisor` the finalize phase requantizes, without one it keeps the
    /// accumulator.
    pub fn new(divisor: Option<i32>) -> Self {
        Self {
            state: CellState::Init,
            divisor,
        }
    }

    /// The current phase.
    pub fn state(&self) -> CellState {
        self.state
    }

    /// Init phase: the accumulator starts at zero.
    pub fn init(&mut self) {
        if self.state == CellState::Init {
            self.state = CellState::Accumulating(0);
        }
    }

    /// Calc phase: add `(x - x_zero) * w` with 32-bit wrapping arithmetic.
    pub fn accumulate(&mut self, x: i32, x_zero: i32, w: i32) {
        if let CellState::Accumulating(acc) = self.state {
            let product = x.wrapping_sub(x_zero).wrapping_mul(w);
            self.state = CellState::Accumulating(acc.wrapping_add(product));
        }
    }

    /// Finalize phase: rescale when quantizing, keep the accumulator otherwise.
    pub fn finalize(&mut self) {
        if let CellState::Accumulating(acc) = self.state {
            let value = match self.divisor {
                Some(divisor) => requantize(acc, divisor) as i32,
                None => acc,
            };
            self.state = CellState::Finalized(value);
        }
    }

    /// The output value, once finalized.
    pub fn value(&self) -> Option<i32> {
        match self.state {
            CellState::Finalized(value) => Some(value),
            _ => None,
        }
    }
}

/// Evaluate an integer convolution.
///
/// `data` and `weights` hold row-major values matching the shapes `params` was resolved
/// against. The result is row-major in the output shape, `int8` range when quantizing.
pub fn evaluate_conv_integer(
    params: &ConvParams,
    quantize: bool,
    data: &[i32],
    weights: &[i32],
    x_zero: i32,
) -> Result<Vec<i32>, ProcessError> {
    let batch = params.batch();
    let channels_out = params.channels_out();
    let channels_in = params.channels_in();
    let [in_h, in_w] = params.input_spatial();
    let [kernel_h, kernel_w] = params.kernel_shape();
    let [out_h, out_w] = params.output_spatial();
    let strides = params.strides();
    let dilations = params.dilations();
    let divisor = if quantize {
        Some(quantization_divisor(params)?)
    } else {
        None
    };

    let data_len = batch * channels_in * in_h * in_w;
    let weights_len = channels_out * channels_in * kernel_h * kernel_w;
    if data.len() != data_len || weights.len() != weights_len {
        return Err(ProcessError::InvalidShape(format!(
            "expected {data_len} data and {weights_len} weight values, got {} and {}",
            data.len(),
            weights.len()
        )));
    }

    // Start of the window of output index `o` on `axis`, in unpadded input coordinates.
    let window = |axis: usize, o: usize| (o * strides[axis]) as i64 - params.pad_begin(axis) as i64;
    let inside = |position: i64, size: usize| position >= 0 && position < size as i64;

    let mut output = Vec::with_capacity(batch * channels_out * out_h * out_w);
    for b in 0..batch {
        for m in 0..channels_out {
            for o0 in 0..out_h {
                for o1 in 0..out_w {
                    let mut cell = IntegerCell::new(divisor);
                    cell.init();
                    for c in 0..channels_in {
                        for k0 in 0..kernel_h {
                            let ii0 = window(0, o0) + (k0 * dilations[0]) as i64;
                            if !inside(ii0, in_h) {
                                continue;
                            }
                            for k1 in 0..kernel_w {
                                let ii1 = window(1, o1) + (k1 * dilations[1]) as i64;
                                if !inside(ii1, in_w) {
                                    continue;
                                }
                                let x_index =
                                    ((b * channels_in + c) * in_h + ii0 as usize) * in_w + ii1 as usize;
                                let w_index = ((m * channels_in + c) * kernel_h + k0) * kernel_w + k1;
                                cell.accumulate(data[x_index], x_zero, weights[w_index]);
                            }
                        }
                    }
                    cell.finalize();
                    output.extend(cell.value());
                }
            }
        }
    }

    Ok(output)
}
