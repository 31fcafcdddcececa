//! Compile jobs: command construction, execution and outcome classification

use crate::process::{self, Finished};
use crate::{CompileTarget, Profile, Rewrite, Stage, TempSource};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempPath;

/// Builder for one compiler invocation with fluent API
///
/// # Example
/// ```
/// use shaderbuild::{CommandBuilder, Profile, ShaderModel, Stage};
///
/// let args = CommandBuilder::new("dxc", "basic.hlsl", "VSMain", Profile::new(Stage::Vertex, ShaderModel::SM6_6))
///     .language_version("2021")
///     .define("USE_VULKAN_RENDERER")
///     .include_dir("shaders")
///     .output("out/VSMain.spv")
///     .extra_arg("-spirv")
///     .to_args();
///
/// assert_eq!(args[0], "basic.hlsl");
/// assert!(args.iter().any(|a| a == "vs_6_6"));
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    compiler: PathBuf,
    input: PathBuf,
    entry_point: String,
    profile: Profile,
    language_version: Option<String>,
    defines: Vec<String>,
    include_dirs: Vec<PathBuf>,
    output: Option<PathBuf>,
    extra: Vec<String>,
}

impl CommandBuilder {
    /// Creates a new builder with the required parameters.
    ///
    /// # Arguments
    /// * `compiler` - The compiler executable
    /// * `input` - The source file handed to the compiler
    /// * `entry_point` - The entry symbol (`-E`)
    /// * `profile` - The target profile (`-T`)
    pub fn new(
        compiler: impl Into<PathBuf>,
        input: impl Into<PathBuf>,
        entry_point: &str,
        profile: Profile,
    ) -> Self {
        CommandBuilder {
            compiler: compiler.into(),
            input: input.into(),
            entry_point: entry_point.to_string(),
            profile,
            language_version: None,
            defines: Vec::new(),
            include_dirs: Vec::new(),
            output: None,
            extra: Vec::new(),
        }
    }

    /// Sets the language version (`-HV`).
    pub fn language_version(mut self, version: &str) -> Self {
        self.language_version = Some(version.to_string());
        self
    }

    /// Adds a preprocessor define (`NAME` or `NAME=VALUE`).
    pub fn define(mut self, define: &str) -> Self {
        self.defines.push(define.to_string());
        self
    }

    /// Adds multiple preprocessor defines.
    pub fn defines<I, S>(mut self, defines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defines.extend(defines.into_iter().map(Into::into));
        self
    }

    /// Adds an include directory (`-I`). Order is preserved.
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Adds multiple include directories.
    pub fn include_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Sets the output file (`-Fo`).
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Appends a raw argument after the standard ones.
    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra.push(arg.into());
        self
    }

    /// Appends raw arguments after the standard ones.
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the argument vector, excluding the executable.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![self.input.clone().into()];
        if let Some(version) = &self.language_version {
            args.push("-HV".into());
            args.push(version.into());
        }
        for define in &self.defines {
            args.push("-D".into());
            args.push(define.into());
        }
        args.push("-T".into());
        args.push(self.profile.as_str().into());
        for dir in &self.include_dirs {
            args.push("-I".into());
            args.push(dir.clone().into());
        }
        args.push("-E".into());
        args.push(self.entry_point.clone().into());
        if let Some(output) = &self.output {
            args.push("-Fo".into());
            args.push(output.clone().into());
        }
        args.extend(self.extra.iter().map(OsString::from));
        args
    }

    /// Builds the process command.
    pub fn build(&self) -> Command {
        let mut command = Command::new(&self.compiler);
        command.args(self.to_args());
        command
    }
}

/// One unit of work: compile one entry point of one shader.
///
/// Consumed by [`JobRunner::run`]; any temporary source it needs is created
/// and deleted inside that call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    /// The shader file as found by discovery
    pub source: PathBuf,
    /// Entry point as declared in the source
    pub entry_point: String,
    /// Pipeline stage
    pub stage: Stage,
    /// Directory receiving `<entry_point>.<ext>`
    pub output_dir: PathBuf,
    /// Include directories in priority order
    pub include_dirs: Vec<PathBuf>,
    /// Source rewrite applied before compiling
    pub rewrite: Rewrite,
}

impl CompileJob {
    /// Creates a job with no rewrite and no include directories.
    pub fn new(
        source: impl Into<PathBuf>,
        entry_point: &str,
        stage: Stage,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        CompileJob {
            source: source.into(),
            entry_point: entry_point.to_string(),
            stage,
            output_dir: output_dir.into(),
            include_dirs: Vec::new(),
            rewrite: Rewrite::default(),
        }
    }

    /// Returns the symbol passed to `-E`: the rename target if any, otherwise
    /// the declared entry point.
    pub fn symbol(&self) -> &str {
        self.rewrite
            .rename
            .as_ref()
            .map(|(_, to)| to.as_str())
            .unwrap_or(&self.entry_point)
    }

    /// Returns the artifact path for the given extension.
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.entry_point, extension))
    }
}

/// Outcome of one compile job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The compiler exited zero and wrote the artifact
    Success {
        /// Path of the written artifact
        artifact: PathBuf,
    },
    /// The compiler rejected the source
    Diagnostic {
        /// Compiler output explaining the failure
        message: String,
    },
    /// The compiler could not be run (missing, not executable, timed out)
    Launch {
        /// Why the process could not be run to completion
        reason: String,
    },
}

impl JobOutcome {
    /// Returns true on success
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    /// Returns the artifact path on success
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            JobOutcome::Success { artifact } => Some(artifact),
            _ => None,
        }
    }
}

/// A finished job and what happened to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// The shader file
    pub source: PathBuf,
    /// Pipeline stage
    pub stage: Stage,
    /// Declared entry point
    pub entry_point: String,
    /// Result of the job
    pub outcome: JobOutcome,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}]",
            self.source.display(),
            self.stage,
            self.entry_point
        )?;
        match &self.outcome {
            JobOutcome::Success { artifact } => write!(f, " -> {}", artifact.display()),
            JobOutcome::Diagnostic { message } => write!(f, ": {message}"),
            JobOutcome::Launch { reason } => write!(f, ": failed to run compiler: {reason}"),
        }
    }
}

/// Runs compile jobs against a resolved target.
#[derive(Debug, Clone)]
pub struct JobRunner<'a> {
    target: &'a CompileTarget,
    temp_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl<'a> JobRunner<'a> {
    /// Creates a runner using the system temp directory and no timeout.
    pub fn new(target: &'a CompileTarget) -> Self {
        JobRunner {
            target,
            temp_dir: None,
            timeout: None,
        }
    }

    /// Places rewritten sources in `dir` instead of the system temp directory.
    pub fn temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Kills the compiler after `timeout`, reporting a launch failure.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the compiler command for `job` reading from `input` and
    /// writing to `output`.
    pub fn command_for(&self, job: &CompileJob, input: &Path, output: &Path) -> CommandBuilder {
        let target = self.target;
        CommandBuilder::new(
            &target.compiler,
            input,
            job.symbol(),
            target.profile(job.stage),
        )
        .language_version(&target.language_version)
        .define(target.backend.renderer_define())
        .defines(target.defines.iter().cloned())
        .include_dirs(job.include_dirs.iter().cloned())
        .output(output)
        .extra_args(target.stage_args(job.stage))
    }

    /// Runs one job to completion.
    ///
    /// Any temporary source is deleted before this returns, whatever the
    /// outcome.
    pub fn run(&self, job: CompileJob) -> JobReport {
        let file_name = job
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.source.display().to_string());
        log::info!(
            "Compiling {} for {} stage, entry point: {}",
            file_name,
            job.stage,
            job.entry_point
        );

        let temp = match job
            .rewrite
            .materialize(&job.source, self.temp_dir.as_deref())
        {
            Ok(temp) => temp,
            Err(e) => {
                return report(
                    job,
                    JobOutcome::Launch {
                        reason: format!("failed to prepare source: {e}"),
                    },
                );
            }
        };

        let extension = self.target.extension();
        let artifact = job.artifact_path(extension);
        let staged = match staging_path(&job.output_dir, &job.entry_point, extension) {
            Ok(staged) => staged,
            Err(e) => {
                let reason = format!("failed to prepare output in {}: {e}", job.output_dir.display());
                return report(job, JobOutcome::Launch { reason });
            }
        };

        let input = temp.as_ref().map_or(job.source.as_path(), TempSource::path);
        let builder = self.command_for(&job, input, &staged);
        log::debug!("{} {:?}", self.target.compiler.display(), builder.to_args());

        let outcome = classify(
            process::run_captured(&mut builder.build(), self.timeout),
            &staged,
            &artifact,
        );

        if let Some(temp) = temp {
            let path = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                log::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }

        // Only a successful job touches `<entry>.<ext>`; a failed one leaves
        // whatever an earlier job with the same entry name produced.
        let outcome = match outcome {
            JobOutcome::Success { .. } => match staged.persist(&artifact) {
                Ok(()) => JobOutcome::Success { artifact },
                Err(e) => JobOutcome::Launch {
                    reason: format!("failed to move output to {}: {}", artifact.display(), e.error),
                },
            },
            failed => failed,
        };
        report(job, outcome)
    }
}

/// Reserves a unique path in `dir` for the compiler to write into.
///
/// The placeholder file is removed again so a compiler that writes nothing
/// is still detected. The path is deleted on drop unless persisted.
fn staging_path(dir: &Path, entry_point: &str, extension: &str) -> std::io::Result<TempPath> {
    let path = tempfile::Builder::new()
        .prefix(&format!(".{entry_point}-"))
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)?
        .into_temp_path();
    std::fs::remove_file(&path)?;
    Ok(path)
}

fn classify(result: std::io::Result<Finished>, staged: &Path, artifact: &Path) -> JobOutcome {
    match result {
        Err(e) => JobOutcome::Launch {
            reason: e.to_string(),
        },
        Ok(Finished::TimedOut(after)) => JobOutcome::Launch {
            reason: format!("timed out after {after:?}"),
        },
        Ok(Finished::Exited(output)) if !output.status.success() => JobOutcome::Diagnostic {
            message: process::diagnostic_text(&output),
        },
        Ok(Finished::Exited(_)) if !staged.is_file() => JobOutcome::Diagnostic {
            message: format!(
                "compiler reported success but wrote no {}",
                artifact.display()
            ),
        },
        Ok(Finished::Exited(_)) => JobOutcome::Success {
            artifact: staged.to_path_buf(),
        },
    }
}

fn report(job: CompileJob, outcome: JobOutcome) -> JobReport {
    match &outcome {
        JobOutcome::Success { .. } => {}
        JobOutcome::Diagnostic { message } => log::error!(
            "Shader compilation failed for {} ({} {}):\n{}",
            job.source.display(),
            job.stage,
            job.entry_point,
            message
        ),
        JobOutcome::Launch { reason } => log::error!(
            "Could not run compiler for {} ({} {}): {}",
            job.source.display(),
            job.stage,
            job.entry_point,
            reason
        ),
    }
    JobReport {
        source: job.source,
        stage: job.stage,
        entry_point: job.entry_point,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Platform, ShaderModel, TargetConfig};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn target(platform: Platform) -> CompileTarget {
        let config = TargetConfig {
            compiler: Some(PathBuf::from("/tools/dxc")),
            include_dirs: vec![PathBuf::from("engine/shaders")],
            defines: vec!["ENABLE_BINDLESS=1".to_string()],
            ..TargetConfig::default()
        };
        CompileTarget::resolve(platform, &HashMap::new(), &config)
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_builder_argument_order() {
        let args = CommandBuilder::new(
            "dxc",
            "a.hlsl",
            "main",
            Profile::new(Stage::Compute, ShaderModel::SM6_6),
        )
        .language_version("2021")
        .define("A")
        .define("B=2")
        .include_dir("first")
        .include_dir("second")
        .output("out/main.dxil")
        .extra_arg("-Zi")
        .to_args();

        assert_eq!(
            strings(args),
            vec![
                "a.hlsl", "-HV", "2021", "-D", "A", "-D", "B=2", "-T", "cs_6_6", "-I", "first",
                "-I", "second", "-E", "main", "-Fo", "out/main.dxil", "-Zi",
            ]
        );
    }

    #[test]
    fn test_command_for_dxil_job() {
        let target = target(Platform::Windows);
        let mut job = CompileJob::new("shaders/basic.hlsl", "PSMain", Stage::Fragment, "out");
        job.include_dirs = vec![PathBuf::from("shaders"), PathBuf::from("engine/shaders")];

        let runner = JobRunner::new(&target);
        let builder = runner.command_for(&job, &job.source, &job.artifact_path("dxil"));
        assert_eq!(
            strings(builder.to_args()),
            vec![
                "shaders/basic.hlsl",
                "-HV",
                "2021",
                "-D",
                "USE_DIRECTX_RENDERER",
                "-D",
                "ENABLE_BINDLESS=1",
                "-T",
                "ps_6_6",
                "-I",
                "shaders",
                "-I",
                "engine/shaders",
                "-E",
                "PSMain",
                "-Fo",
                "out/PSMain.dxil",
            ]
        );
        assert_eq!(builder.build().get_program(), "/tools/dxc");
    }

    #[test]
    fn test_command_for_spirv_vertex_job() {
        let target = target(Platform::Linux);
        let job = CompileJob::new("basic.hlsl", "VSMain", Stage::Vertex, "out");
        let output = job.artifact_path(target.extension());
        let args = strings(JobRunner::new(&target).command_for(&job, &job.source, &output).to_args());

        assert!(args.contains(&"USE_VULKAN_RENDERER".to_string()));
        assert!(args.contains(&"out/VSMain.spv".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-fvk-invert-y"));
    }

    #[test]
    fn test_renamed_symbol_keeps_artifact_name() {
        let target = target(Platform::Windows);
        let mut job = CompileJob::new("basic.hlsl", "VSMain", Stage::Vertex, "out");
        job.rewrite.rename = Some(("VSMain".into(), "main".into()));

        assert_eq!(job.symbol(), "main");
        assert_eq!(job.artifact_path("dxil"), PathBuf::from("out/VSMain.dxil"));
        let output = job.artifact_path("dxil");
        let args = strings(JobRunner::new(&target).command_for(&job, &job.source, &output).to_args());
        let e = args.iter().position(|a| a == "-E").unwrap();
        assert_eq!(args[e + 1], "main");
    }

    #[test]
    fn test_missing_compiler_is_launch_error() {
        let out = tempfile::tempdir().unwrap();
        let source = out.path().join("basic.hlsl");
        std::fs::write(&source, "#pragma vertex VSMain\n").unwrap();

        let config = TargetConfig {
            compiler: Some(out.path().join("no-such-dxc")),
            ..TargetConfig::default()
        };
        let target = CompileTarget::resolve(Platform::Linux, &HashMap::new(), &config);
        let report = JobRunner::new(&target).run(CompileJob::new(
            &source,
            "VSMain",
            Stage::Vertex,
            out.path(),
        ));

        assert!(matches!(report.outcome, JobOutcome::Launch { .. }));
        assert!(!out.path().join("VSMain.spv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_job_keeps_existing_artifact() {
        let out = tempfile::tempdir().unwrap();
        let source = out.path().join("basic.hlsl");
        std::fs::write(&source, "#pragma vertex VSMain\n").unwrap();
        let artifact = out.path().join("VSMain.dxil");
        std::fs::write(&artifact, "from an earlier job").unwrap();

        for compiler in ["false", "true"] {
            let config = TargetConfig {
                compiler: Some(PathBuf::from(compiler)),
                ..TargetConfig::default()
            };
            let target = CompileTarget::resolve(Platform::Windows, &HashMap::new(), &config);
            let report = JobRunner::new(&target).run(CompileJob::new(
                &source,
                "VSMain",
                Stage::Vertex,
                out.path(),
            ));

            assert!(matches!(report.outcome, JobOutcome::Diagnostic { .. }), "{compiler}");
            assert_eq!(std::fs::read_to_string(&artifact).unwrap(), "from an earlier job");
        }

        let mut names: Vec<_> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["VSMain.dxil", "basic.hlsl"]);
    }

    #[test]
    fn test_report_display() {
        let report = JobReport {
            source: PathBuf::from("basic.hlsl"),
            stage: Stage::Fragment,
            entry_point: "PSMain".into(),
            outcome: JobOutcome::Diagnostic {
                message: "error: undeclared identifier 'x'".into(),
            },
        };
        assert_eq!(
            report.to_string(),
            "basic.hlsl [fragment PSMain]: error: undeclared identifier 'x'"
        );
    }
}
