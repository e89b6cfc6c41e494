use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;

use crate::context::CompileContext;
use crate::error::Result;
use crate::graph::CGraph;
use crate::logger::init_log;
use crate::model::ModelDescription;

/// Generate a C source file from a JSON model description.
#[derive(Debug, Default)]
pub struct CGen {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    options: Option<PathBuf>,
    quantize: Option<bool>,
    development: bool,
}

impl CGen {
    /// Create a new `CGen`.
    pub fn new() -> Self {
        init_log(LevelFilter::Info).ok(); // Error when init multiple times are ignored.
        Self::default()
    }

    /// Set the model file.
    pub fn input(&mut self, input: &str) -> &mut Self {
        self.input = Some(input.into());
        self
    }

    /// Set the generated file. Defaults to the input path with a `.c` extension.
    pub fn output(&mut self, output: &str) -> &mut Self {
        self.output = Some(output.into());
        self
    }

    /// Read compile options from a JSON file.
    pub fn options(&mut self, options: &str) -> &mut Self {
        self.options = Some(options.into());
        self
    }

    /// Force quantization on or off, whatever the options file says.
    pub fn quantize(&mut self, quantize: bool) -> &mut Self {
        self.quantize = Some(quantize);
        self
    }

    /// Set development mode.
    ///
    /// If this is set to true, the resolved graph is also written next to the output as a
    /// `.graph.txt` file.
    pub fn development(&mut self, development: bool) -> &mut Self {
        self.development = development;
        self
    }

    /// The options of this run: the options file if any, then the overrides.
    pub fn context(&self) -> Result<CompileContext> {
        let mut context = match &self.options {
            Some(path) => CompileContext::load(path)?,
            None => CompileContext::default(),
        };
        if let Some(quantize) = self.quantize {
            context.quantize = quantize;
        }
        Ok(context)
    }

    /// Run code generation and return the path of the generated file.
    ///
    /// Nothing is written unless every node resolves.
    pub fn run(&self) -> Result<PathBuf> {
        let input = self.input.as_deref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "no input file provided")
        })?;
        let output = match &self.output {
            Some(output) => output.clone(),
            None => input.with_extension("c"),
        };

        log::info!("Generating C code from {}", input.display());

        let context = self.context()?;
        log::debug!("Compile options: {context:?}");

        let model = ModelDescription::load(input)?;
        let graph = CGraph::build(&model, &context)?
            .with_top_comment(Some(top_comment(&model.name, input)));

        if self.development {
            let graph_file = output.with_extension("graph.txt");
            log::debug!("Writing debug graph file: {}", graph_file.display());
            fs::write(graph_file, format!("{graph:#?}"))?;
        }

        let code = graph.codegen();
        log::info!("Writing source code to {}", output.display());
        fs::write(&output, code)?;

        Ok(output)
    }
}

/// `<name>: generated from <file> by onnx-cgen`, without the name when the graph has none.
fn top_comment(name: &str, input: &Path) -> String {
    let source = format!("from {} by onnx-cgen", file_name(input));
    let comment = if name.is_empty() {
        format!("Generated {source}")
    } else {
        format!("{name}: generated {source}")
    };
    // A `*/` in the name would end the C comment early.
    comment.replace("*/", "* /")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn top_comment_names_the_graph() {
        let input = Path::new("models/conv.json");

        assert_eq!(
            top_comment("quantized", input),
            "quantized: generated from conv.json by onnx-cgen"
        );
        assert_eq!(top_comment("", input), "Generated from conv.json by onnx-cgen");
    }

    #[test]
    fn top_comment_cannot_close_the_c_comment() {
        let comment = top_comment("a */ b", Path::new("conv.json"));

        assert!(!comment.contains("*/"));
    }
}
