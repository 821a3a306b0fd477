//! External tile generator.
//!
//! Runs a configured argv once per image, e.g.
//! `["vips", "dzsave", "{source}", "{staging}", "--layout", "zoomify"]`.
//! `{source}` and `{staging}` are replaced in every argument. The tool must
//! leave a pyramid directory at the staging path; the relocator checks that.

use super::generator::{GeneratorError, TileGenerator};
use std::path::Path;
use std::process::Command;

const SOURCE_PLACEHOLDER: &str = "{source}";
const STAGING_PLACEHOLDER: &str = "{staging}";

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    /// Build from an argv. Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders substituted.
    pub fn resolved_args(&self, source: &Path, staging: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let staging = staging.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(SOURCE_PLACEHOLDER, &source)
                    .replace(STAGING_PLACEHOLDER, &staging)
            })
            .collect()
    }
}

impl TileGenerator for CommandGenerator {
    fn generate(&self, source: &Path, staging: &Path) -> Result<(), GeneratorError> {
        let args = self.resolved_args(source, staging);
        log::debug!("running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program).args(&args).output()?;
        if !output.status.success() {
            return Err(GeneratorError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
