use std::fs;
use std::path::Path;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options read by every node during a compilation run.
///
/// The context is passed explicitly to node resolution and never changes during a run.
#[derive(new, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileContext {
    /// Rescale integer convolution results to saturated `int8` instead of emitting the
    /// raw `int32` accumulators.
    pub quantize: bool,
}

impl CompileContext {
    /// Load options from a JSON file. Missing fields take their default value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading compile options from {}", path.display());

        let text = fs::read_to_string(path)?;
        let context = serde_json::from_str(&text)?;

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_is_off_by_default() {
        assert!(!CompileContext::default().quantize);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let context: CompileContext = serde_json::from_str("{}").unwrap();
        assert_eq!(context, CompileContext::new(false));

        let context: CompileContext = serde_json::from_str(r#"{"quantize": true}"#).unwrap();
        assert_eq!(context, CompileContext::new(true));
    }
}
