//! Backend selection: compiler path, output format and per-stage flags

use crate::{PackStep, Profile, ShaderModel, SpirvConfig, Stage, TargetConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable naming the compiler SDK root.
pub const SDK_ROOT_VAR: &str = "DXC_SDK_ROOT";

const COMPILER_NAME: &str = "dxc";

/// Host operating system, as far as backend selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Windows
    Windows,
    /// macOS
    MacOs,
    /// Linux and every other unix
    Linux,
}

impl Platform {
    /// Returns the platform this binary was built for.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Returns the backend used when none is configured.
    pub fn default_backend(&self) -> Backend {
        match self {
            Platform::Windows => Backend::Dxil,
            Platform::MacOs => Backend::Metal,
            Platform::Linux => Backend::Spirv,
        }
    }

    /// Appends the platform's executable suffix to `stem`.
    pub fn executable_name(&self, stem: &str) -> String {
        match self {
            Platform::Windows => format!("{stem}.exe"),
            Platform::MacOs | Platform::Linux => stem.to_string(),
        }
    }
}

/// Output format of the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// DXIL bytecode, one loose file per entry point
    Dxil,
    /// SPIR-V bytecode, one loose file per entry point
    Spirv,
    /// Metal libraries, merged into one library by the pack step
    Metal,
}

impl Backend {
    /// Returns the artifact file extension
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::Dxil => "dxil",
            Backend::Spirv => "spv",
            Backend::Metal => "metallib",
        }
    }

    /// Returns the define telling shaders which renderer they target
    pub fn renderer_define(&self) -> &'static str {
        match self {
            Backend::Dxil => "USE_DIRECTX_RENDERER",
            Backend::Spirv => "USE_VULKAN_RENDERER",
            Backend::Metal => "USE_METAL_RENDERER",
        }
    }

    /// Returns true if per-entry artifacts must be packed into one library
    pub fn requires_packing(&self) -> bool {
        matches!(self, Backend::Metal)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Dxil => "dxil",
            Backend::Spirv => "spirv",
            Backend::Metal => "metal",
        })
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dxil" => Ok(Backend::Dxil),
            "spirv" | "spir-v" => Ok(Backend::Spirv),
            "metal" => Ok(Backend::Metal),
            _ => Err(format!("unknown backend '{s}'")),
        }
    }
}

/// Read-only view of environment variables.
///
/// Lets target resolution run against a fake environment in tests.
pub trait Environment {
    /// Returns the value of `key`, if set.
    fn var(&self, key: &str) -> Option<OsString>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<OsString> {
        std::env::var_os(key)
    }
}

impl Environment for HashMap<String, OsString> {
    fn var(&self, key: &str) -> Option<OsString> {
        self.get(key).cloned()
    }
}

/// Everything a compile job needs to know about the toolchain.
///
/// Resolved once per run and shared read-only by every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileTarget {
    /// Platform the target was resolved for
    pub platform: Platform,
    /// Output format
    pub backend: Backend,
    /// Compiler executable
    pub compiler: PathBuf,
    /// Runtime include directories, after the shader's own directory
    pub include_dirs: Vec<PathBuf>,
    /// Shader model for every profile
    pub shader_model: ShaderModel,
    /// `-HV` value
    pub language_version: String,
    /// Defines after the renderer define
    pub defines: Vec<String>,
    /// SPIR-V conventions, only used by [`Backend::Spirv`]
    pub spirv: SpirvConfig,
    /// Post-process step, present when the backend requires packing
    pub pack: Option<PackStep>,
}

impl CompileTarget {
    /// Resolves the target for `platform`.
    ///
    /// Compiler lookup order: explicit `config.compiler`, then
    /// `$DXC_SDK_ROOT/bin/dxc`, then the bundled compiler if it exists, then
    /// the first `dxc` on `PATH`. When nothing is found the bare name is kept
    /// and the failure surfaces as a launch error on the first job.
    pub fn resolve(platform: Platform, env: &dyn Environment, config: &TargetConfig) -> Self {
        let backend = config.backend.unwrap_or_else(|| platform.default_backend());
        let pack = backend
            .requires_packing()
            .then(|| PackStep::from_config(&config.pack));

        CompileTarget {
            platform,
            backend,
            compiler: resolve_compiler(platform, env, config),
            include_dirs: config.include_dirs.clone(),
            shader_model: config.shader_model,
            language_version: config.language_version.clone(),
            defines: config.defines.clone(),
            spirv: config.spirv.clone(),
            pack,
        }
    }

    /// Resolves the target for the host platform and process environment.
    pub fn for_host(config: &TargetConfig) -> Self {
        Self::resolve(Platform::host(), &SystemEnvironment, config)
    }

    /// Returns the artifact extension
    pub fn extension(&self) -> &'static str {
        self.backend.extension()
    }

    /// Returns the profile for `stage`
    pub fn profile(&self, stage: Stage) -> Profile {
        Profile::new(stage, self.shader_model)
    }

    /// Returns true if a pack step runs after all jobs
    pub fn requires_packing(&self) -> bool {
        self.pack.is_some()
    }

    /// Returns backend and stage specific compiler flags.
    pub fn stage_args(&self, stage: Stage) -> Vec<String> {
        match self.backend {
            Backend::Dxil => Vec::new(),
            Backend::Metal => vec!["-metal".to_string()],
            Backend::Spirv => {
                let spirv = &self.spirv;
                let mut args = vec!["-spirv".to_string()];
                for (class, shift) in [
                    ('b', spirv.b_shift),
                    ('t', spirv.t_shift),
                    ('s', spirv.s_shift),
                    ('u', spirv.u_shift),
                ] {
                    if shift != 0 {
                        args.push(format!("-fvk-{class}-shift"));
                        args.push(shift.to_string());
                        args.push(spirv.binding_space.clone());
                    }
                }
                if stage == Stage::Vertex && spirv.flip_vertex_y {
                    args.push("-fvk-invert-y".to_string());
                }
                args
            }
        }
    }
}

fn resolve_compiler(platform: Platform, env: &dyn Environment, config: &TargetConfig) -> PathBuf {
    let exe = platform.executable_name(COMPILER_NAME);

    if let Some(explicit) = &config.compiler {
        return explicit.clone();
    }

    if let Some(root) = env.var(SDK_ROOT_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(root).join("bin").join(&exe);
    }

    if let Some(dir) = &config.bundled_compiler_dir {
        let bundled = dir.join("bin").join(&exe);
        if bundled.is_file() {
            return bundled;
        }
    }

    env.var("PATH")
        .and_then(|path| search_path(&path, &exe))
        .unwrap_or_else(|| PathBuf::from(exe))
}

/// Returns the first `name` found in the directories of a `PATH`-style list.
fn search_path(path: &OsStr, name: &str) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
