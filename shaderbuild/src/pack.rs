//! Packing per-entry libraries into one final library

use crate::process::{self, Finished};
use crate::{Error, PackConfig, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// External packing tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackStep {
    /// Packer executable
    pub program: PathBuf,
    /// Leading arguments
    pub args: Vec<String>,
    /// Flag preceding the output path
    pub output_flag: String,
}

impl PackStep {
    /// Creates the step from configuration.
    pub fn from_config(config: &PackConfig) -> Self {
        PackStep {
            program: config.program.clone(),
            args: config.args.clone(),
            output_flag: config.output_flag.clone(),
        }
    }

    /// Builds `<program> <args...> <output_flag> <output> <inputs...>`.
    pub fn command(&self, output: &Path, inputs: &[PathBuf]) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&self.output_flag)
            .arg(output)
            .args(inputs);
        command
    }

    /// Packs `inputs` into `output`, then deletes the inputs.
    ///
    /// On failure the inputs are left in place and [`Error::Pack`] is
    /// returned.
    pub fn run(&self, output: &Path, inputs: &[PathBuf], timeout: Option<Duration>) -> Result<()> {
        log::info!(
            "Packing {} libraries into {}",
            inputs.len(),
            output.display()
        );

        let pack_error = |message: String| Error::Pack {
            output: output.to_path_buf(),
            message,
        };

        match process::run_captured(&mut self.command(output, inputs), timeout) {
            Err(e) => return Err(pack_error(format!("failed to run {}: {e}", self.program.display()))),
            Ok(Finished::TimedOut(after)) => return Err(pack_error(format!("timed out after {after:?}"))),
            Ok(Finished::Exited(out)) if !out.status.success() => {
                return Err(pack_error(process::diagnostic_text(&out)));
            }
            Ok(Finished::Exited(_)) if !output.is_file() => {
                return Err(pack_error("packer reported success but wrote nothing".to_string()));
            }
            Ok(Finished::Exited(_)) => {}
        }

        remove_intermediates(inputs, output);
        Ok(())
    }
}

/// Deletes per-entry artifacts, never touching `keep`.
pub fn remove_intermediates(inputs: &[PathBuf], keep: &Path) {
    for input in inputs.iter().filter(|p| p.as_path() != keep) {
        match std::fs::remove_file(input) {
            Ok(()) => log::debug!("Removed intermediate {}", input.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", input.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_shape() {
        let step = PackStep::from_config(&PackConfig::default());
        let command = step.command(
            Path::new("out/Shaders.metallib"),
            &[PathBuf::from("out/VSMain.metallib"), PathBuf::from("out/PSMain.metallib")],
        );
        assert_eq!(command.get_program(), "xcrun");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(
            args,
            [
                "metallib",
                "-o",
                "out/Shaders.metallib",
                "out/VSMain.metallib",
                "out/PSMain.metallib"
            ]
        );
    }

    #[test]
    fn test_missing_packer_keeps_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("VSMain.metallib");
        std::fs::write(&input, "lib").unwrap();

        let step = PackStep {
            program: dir.path().join("no-such-packer"),
            args: Vec::new(),
            output_flag: "-o".into(),
        };
        let result = step.run(&dir.path().join("Shaders.metallib"), &[input.clone()], None);
        assert!(matches!(result, Err(Error::Pack { .. })));
        assert!(input.exists());
    }

    #[test]
    fn test_remove_intermediates_keeps_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.metallib");
        let keep = dir.path().join("Shaders.metallib");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&keep, "lib").unwrap();

        remove_intermediates(&[a.clone(), keep.clone()], &keep);
        assert!(!a.exists());
        assert!(keep.exists());
    }
}
