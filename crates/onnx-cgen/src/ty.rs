use onnx_cgen_ir::ElementType;

/// The C type of an element, from `<stdint.h>` for integers.
pub fn c_type(elem_type: ElementType) -> &'static str {
    match elem_type {
        ElementType::Float32 => "float",
        ElementType::Int8 => "int8_t",
        ElementType::Uint8 => "uint8_t",
        ElementType::Int32 => "int32_t",
        ElementType::Int64 => "int64_t",
    }
}

/// Array dimensions, e.g. `[1][3][5][5]`.
///
/// A scalar (empty shape) is declared as a one-element array so that it can still be
/// read as `name[0]`.
pub fn c_dims(shape: &[usize]) -> String {
    if shape.is_empty() {
        return "[1]".to_string();
    }
    shape.iter().map(|dim| format!("[{dim}]")).collect()
}

/// A full array declaration, e.g. `int8_t x[1][3][5][5]`.
pub fn c_declaration(elem_type: ElementType, name: &str, shape: &[usize]) -> String {
    format!("{} {name}{}", c_type(elem_type), c_dims(shape))
}

/// Turn an arbitrary tensor or node name into a valid C identifier.
pub fn c_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }

    ident
}
