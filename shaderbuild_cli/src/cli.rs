//! Command-line arguments

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand, ValueEnum};
use shaderbuild::{Backend, DEFAULT_LIBRARY_NAME, DEFAULT_OUTPUT_DIR, ShaderModel, StageMask};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "shaderbuild", version)]
#[command(about = "Compile HLSL shaders for the host graphics backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile every entry point found in a directory or a list of files
    #[command(group(ArgGroup::new("sources").required(true).args(["directory", "files"])))]
    Compile {
        /// Directory to search recursively for shader files
        #[arg(short, long, value_name = "DIR")]
        directory: Option<PathBuf>,

        /// Specific shader files to compile
        #[arg(short, long, value_name = "FILE", num_args = 1..)]
        files: Vec<PathBuf>,

        /// Directory receiving the compiled artifacts
        #[arg(long, value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Base name of the packed library (Metal only)
        #[arg(short, long, value_name = "NAME", default_value = DEFAULT_LIBRARY_NAME)]
        output: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Compile explicitly listed entry points
    Entries {
        /// Directory receiving the compiled artifacts
        output_dir: PathBuf,

        /// One or more FILE ENTRY STAGE triples
        #[arg(value_name = "FILE ENTRY STAGE", num_args = 1.., required = true)]
        triples: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// TOML build configuration
    #[arg(long, value_name = "FILE", env = "SHADERBUILD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output backend (default: derived from the host platform)
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Compiler executable (default: $DXC_SDK_ROOT, bundled, then PATH)
    #[arg(long, value_name = "PATH")]
    pub compiler: Option<PathBuf>,

    /// Forced include file injected ahead of every shader
    #[arg(short, long, value_name = "FILE")]
    pub include: Option<String>,

    /// Runtime include directory, searched after the shader's own directory
    #[arg(short = 'I', long = "include-dir", value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Preprocessor defines (NAME=VALUE or NAME)
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    pub defines: Vec<String>,

    /// Rename every entry point to this symbol before compiling
    #[arg(long, value_name = "SYMBOL")]
    pub entry_symbol: Option<String>,

    /// Stages to compile (comma separated: vertex, fragment, compute, graphics, all)
    #[arg(long, value_name = "STAGES")]
    pub stages: Option<StageMask>,

    /// Shader model for every profile (e.g. 6_6)
    #[arg(long, value_name = "MODEL")]
    pub shader_model: Option<ShaderModel>,

    /// Concurrent compiler processes (default: available parallelism)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Kill a compiler process after this long (e.g. 30s, 2m)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Directory for rewritten temporary sources
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// DXIL bytecode
    Dxil,
    /// SPIR-V bytecode
    Spirv,
    /// Metal libraries packed into one
    Metal,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Dxil => Backend::Dxil,
            BackendArg::Spirv => Backend::Spirv,
            BackendArg::Metal => Backend::Metal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_directory() {
        let cli = Cli::try_parse_from([
            "shaderbuild",
            "compile",
            "-d",
            "Shaders",
            "-i",
            "Globals.hlsli",
            "--backend",
            "spirv",
            "-D",
            "FOO=1",
            "--stages",
            "vertex,compute",
            "--timeout",
            "30s",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Compile {
            directory,
            files,
            output_dir,
            output,
            common,
        } = cli.command
        else {
            panic!("expected compile");
        };
        assert_eq!(directory, Some(PathBuf::from("Shaders")));
        assert!(files.is_empty());
        assert_eq!(output_dir, PathBuf::from("Assets/Shaders"));
        assert_eq!(output, "Shaders");
        assert_eq!(common.include.as_deref(), Some("Globals.hlsli"));
        assert_eq!(common.backend, Some(BackendArg::Spirv));
        assert_eq!(common.defines, vec!["FOO=1"]);
        assert_eq!(common.stages, Some(StageMask::VERTEX | StageMask::COMPUTE));
        assert_eq!(common.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_compile_files() {
        let cli =
            Cli::try_parse_from(["shaderbuild", "compile", "-f", "a.hlsl", "b.hlsl", "-j", "2"])
                .unwrap();
        let Commands::Compile { files, common, .. } = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(files, vec![PathBuf::from("a.hlsl"), PathBuf::from("b.hlsl")]);
        assert_eq!(common.jobs, Some(2));
    }

    #[test]
    fn test_compile_requires_sources() {
        assert!(Cli::try_parse_from(["shaderbuild", "compile"]).is_err());
        assert!(
            Cli::try_parse_from(["shaderbuild", "compile", "-d", "x", "-f", "a.hlsl"]).is_err()
        );
    }

    #[test]
    fn test_parse_entries() {
        let cli = Cli::try_parse_from([
            "shaderbuild",
            "entries",
            "out",
            "a.hlsl",
            "VSMain",
            "vertex",
            "--backend",
            "metal",
        ])
        .unwrap();
        let Commands::Entries {
            output_dir,
            triples,
            common,
        } = cli.command
        else {
            panic!("expected entries");
        };
        assert_eq!(output_dir, PathBuf::from("out"));
        assert_eq!(triples, vec!["a.hlsl", "VSMain", "vertex"]);
        assert_eq!(common.backend.map(Backend::from), Some(Backend::Metal));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["shaderbuild", "compile", "-d", "x", "--stages", "geometry"]).is_err());
        assert!(Cli::try_parse_from(["shaderbuild", "compile", "-d", "x", "-j", "0"]).is_err());
        assert!(Cli::try_parse_from(["shaderbuild", "compile", "-d", "x", "--backend", "gl"]).is_err());
    }
}
