//! Build configuration, optionally loaded from a TOML file

use crate::{Backend, Error, Result, ShaderModel};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings the [`CompileTarget`](crate::CompileTarget) is resolved from.
///
/// Every field has a default, so an empty file (or no file) is valid.
///
/// ```toml
/// backend = "spirv"
/// include_dirs = ["engine/shaders"]
/// defines = ["ENABLE_BINDLESS=1"]
///
/// [spirv]
/// flip_vertex_y = true
/// t_shift = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Forces a backend instead of deriving it from the host platform
    pub backend: Option<Backend>,
    /// Explicit compiler executable; beats every other lookup
    pub compiler: Option<PathBuf>,
    /// Directory of a compiler shipped next to the project (`<dir>/bin/dxc`)
    pub bundled_compiler_dir: Option<PathBuf>,
    /// Shader model used for every profile
    pub shader_model: ShaderModel,
    /// Value passed to `-HV`
    pub language_version: String,
    /// Runtime include directories, searched after the shader's own directory
    pub include_dirs: Vec<PathBuf>,
    /// Extra preprocessor defines (`NAME` or `NAME=VALUE`)
    pub defines: Vec<String>,
    /// SPIR-V specific conventions
    pub spirv: SpirvConfig,
    /// Packing tool used by backends that produce a single library
    pub pack: PackConfig,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            backend: None,
            compiler: None,
            bundled_compiler_dir: None,
            shader_model: ShaderModel::default(),
            language_version: "2021".to_string(),
            include_dirs: Vec::new(),
            defines: Vec::new(),
            spirv: SpirvConfig::default(),
            pack: PackConfig::default(),
        }
    }
}

impl TargetConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadSource {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Flags reconciling HLSL conventions with Vulkan.
///
/// HLSL keeps `b`, `t`, `s` and `u` registers in separate namespaces while
/// Vulkan has one binding space per set, so each register class is shifted
/// by a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpirvConfig {
    /// Emit `-fvk-invert-y` for vertex entry points
    pub flip_vertex_y: bool,
    /// Constant buffer binding offset
    pub b_shift: u32,
    /// Texture / SRV binding offset
    pub t_shift: u32,
    /// Sampler binding offset
    pub s_shift: u32,
    /// UAV binding offset
    pub u_shift: u32,
    /// Register space the shifts apply to (`all` or a number)
    pub binding_space: String,
}

impl Default for SpirvConfig {
    fn default() -> Self {
        SpirvConfig {
            flip_vertex_y: true,
            b_shift: 0,
            t_shift: 1000,
            s_shift: 2000,
            u_shift: 3000,
            binding_space: "all".to_string(),
        }
    }
}

/// External tool merging per-entry libraries into one.
///
/// Invoked as `<program> <args...> <output_flag> <final> <inputs...>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Packer executable
    pub program: PathBuf,
    /// Leading arguments
    pub args: Vec<String>,
    /// Flag preceding the output path
    pub output_flag: String,
}

impl Default for PackConfig {
    fn default() -> Self {
        PackConfig {
            program: PathBuf::from("xcrun"),
            args: vec!["metallib".to_string()],
            output_flag: "-o".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(TargetConfig::from_toml("").unwrap(), TargetConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = TargetConfig::from_toml(
            r#"
            backend = "spirv"
            compiler = "/opt/dxc/bin/dxc"
            shader_model = "6_7"
            language_version = "202x"
            include_dirs = ["engine/shaders", "third_party/shaders"]
            defines = ["ENABLE_BINDLESS=1"]

            [spirv]
            flip_vertex_y = false
            t_shift = 64
            binding_space = "0"

            [pack]
            program = "metal-pack"
            args = []
            output_flag = "--output"
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Some(Backend::Spirv));
        assert_eq!(config.compiler, Some(PathBuf::from("/opt/dxc/bin/dxc")));
        assert_eq!(config.shader_model, ShaderModel::SM6_7);
        assert_eq!(config.language_version, "202x");
        assert_eq!(config.include_dirs.len(), 2);
        assert!(!config.spirv.flip_vertex_y);
        assert_eq!(config.spirv.t_shift, 64);
        assert_eq!(config.spirv.s_shift, 2000);
        assert_eq!(config.pack.program, PathBuf::from("metal-pack"));
        assert!(config.pack.args.is_empty());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(TargetConfig::from_toml("compilr = \"dxc\"").is_err());
        assert!(TargetConfig::from_toml("shader_model = \"5_0\"").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shaderbuild.toml");
        std::fs::write(&path, "backend = \"vulkan\"").unwrap();
        assert!(matches!(TargetConfig::load(&path), Err(Error::Config { path: p, .. }) if p == path));
    }
}
