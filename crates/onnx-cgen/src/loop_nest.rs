//! Loop-nest scaffolding for 2D convolutions.
//!
//! The driver walks batch, output channel and both output spatial axes, then for each
//! output cell the input channels and kernel positions. Kernel positions that fall in the
//! padding are skipped with a bounds check, so padding never reads memory.
//!
//! Inside the nest the following names are in scope:
//! - `b`, `m`, `o0`, `o1`: the output cell, addressed as [Y_CELL]
//! - `c`, `k0`, `k1`: input channel and kernel position, weights at [W_CELL]
//! - `ii0`, `ii1`: the input position, data at [X_CELL]

use onnx_cgen_ir::node::conv::ConvParams;
use onnx_cgen_ir::NodeType;

use crate::writer::CodeWriter;

/// Data element read at the current kernel position.
pub const X_CELL: &str = "x[b][c][ii0][ii1]";
/// Weight element of the current kernel position.
pub const W_CELL: &str = "w[m][c][k0][k1]";
/// Output element of the current cell.
pub const Y_CELL: &str = "y[b][m][o0][o1]";

/// The operator-specific arithmetic of a convolution, in three phases.
///
/// For every output cell the driver prints `init` once, `calc` once inside the innermost
/// loop (so it runs for each kernel position inside the input), and `finalize` once after
/// the accumulation loops.
pub trait CellComputation {
    /// Statements run before any accumulation into the cell.
    fn print_output_cell_init(&self, writer: &mut CodeWriter);

    /// Statements run for each valid kernel position.
    fn print_output_cell_calc(&self, writer: &mut CodeWriter);

    /// Statements run after the last accumulation. May print nothing.
    fn print_output_cell_finalize(&self, writer: &mut CodeWriter);
}

/// Print the comment block describing a resolved node.
pub fn print_header_info_comment(
    node_type: NodeType,
    name: &str,
    params: &ConvParams,
    writer: &mut CodeWriter,
) {
    writer.line(format!("/* {node_type}"));
    writer.line(format!(" * name: {name}"));
    writer.line(format!(" * auto_pad: {}", params.auto_pad()));
    writer.line(format!(" * kernel_shape: {:?}", params.kernel_shape()));
    writer.line(format!(" * strides: {:?}", params.strides()));
    writer.line(format!(" * dilations: {:?}", params.dilations()));
    writer.line(format!(" * pads: {:?}", params.pads()));
    writer.line(format!(" * group: {}", params.group()));
    writer.line(" */");
}

/// Print the full loop nest around the phases of `cell`.
pub fn print_loop_with_padding_checks<C: CellComputation + ?Sized>(
    params: &ConvParams,
    cell: &C,
    writer: &mut CodeWriter,
) {
    let [out_h, out_w] = params.output_spatial();
    let [in_h, in_w] = params.input_spatial();
    let [kernel_h, kernel_w] = params.kernel_shape();
    let [stride_h, stride_w] = params.strides();
    debug_assert_eq!(params.dilations(), [1, 1], "dilations are rejected at resolution");

    writer.open(format!(
        "for (uint32_t b = 0; b < {}; b++)",
        params.batch()
    ));
    writer.open(format!(
        "for (uint32_t m = 0; m < {}; m++)",
        params.channels_out()
    ));
    print_output_loop(writer, 0, out_h, params.pad_begin(0), stride_h);
    print_output_loop(writer, 1, out_w, params.pad_begin(1), stride_w);

    cell.print_output_cell_init(writer);

    writer.open(format!(
        "for (uint32_t c = 0; c < {}; c++)",
        params.channels_in()
    ));
    print_kernel_loop(writer, 0, kernel_h, in_h);
    print_kernel_loop(writer, 1, kernel_w, in_w);

    cell.print_output_cell_calc(writer);

    // kernel loops and channel loop
    writer.close();
    writer.close();
    writer.close();

    cell.print_output_cell_finalize(writer);

    // output loops
    writer.close();
    writer.close();
    writer.close();
    writer.close();
}

/// `o{axis}` walks the output, `i{axis}` the matching window start in the padded input.
fn print_output_loop(writer: &mut CodeWriter, axis: usize, size: usize, pad: usize, stride: usize) {
    let start = -(pad as i64);
    writer.open(format!(
        "for (int32_t o{axis} = 0, i{axis} = {start}; o{axis} < {size}; o{axis}++, i{axis} += {stride})"
    ));
}

fn print_kernel_loop(writer: &mut CodeWriter, axis: usize, kernel: usize, input: usize) {
    writer.open(format!(
        "for (int32_t k{axis} = 0; k{axis} < {kernel}; k{axis}++)"
    ));
    writer.line(format!("int32_t ii{axis} = i{axis} + k{axis};"));
    writer.line(format!(
        "if (ii{axis} < 0 || ii{axis} >= {input}) continue;"
    ));
}
