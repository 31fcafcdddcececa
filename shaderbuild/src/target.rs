//! Pipeline stages, shader models and compiler profiles

use crate::{Error, StageMask};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Pipeline stage an entry point is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Vertex shader
    Vertex,
    /// Fragment (pixel) shader
    Fragment,
    /// Compute shader
    Compute,
}

impl Stage {
    /// Every stage, in job order
    pub const ALL: [Stage; 3] = [Stage::Vertex, Stage::Fragment, Stage::Compute];

    /// Returns the keyword used in `#pragma <stage> <entry>` directives
    pub fn keyword(&self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        }
    }

    /// Returns the profile prefix (vs, ps, cs)
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Vertex => "vs",
            Stage::Fragment => "ps",
            Stage::Compute => "cs",
        }
    }

    /// Returns the single-stage mask for this stage
    pub fn mask(&self) -> StageMask {
        match self {
            Stage::Vertex => StageMask::VERTEX,
            Stage::Fragment => StageMask::FRAGMENT,
            Stage::Compute => StageMask::COMPUTE,
        }
    }

    /// Looks up a stage by its directive keyword.
    ///
    /// Returns `None` for anything outside the closed set, so callers scanning
    /// source text can skip unrelated pragmas.
    pub fn from_keyword(keyword: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.keyword() == keyword)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::from_keyword(&s.to_ascii_lowercase()).ok_or_else(|| Error::UnknownStage(s.into()))
    }
}

/// Shader model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ShaderModel {
    /// Shader Model 6.0
    SM6_0,
    /// Shader Model 6.1
    SM6_1,
    /// Shader Model 6.2
    SM6_2,
    /// Shader Model 6.3
    SM6_3,
    /// Shader Model 6.4
    SM6_4,
    /// Shader Model 6.5
    SM6_5,
    /// Shader Model 6.6
    #[default]
    SM6_6,
    /// Shader Model 6.7
    SM6_7,
    /// Shader Model 6.8
    SM6_8,
}

impl ShaderModel {
    const ALL: [ShaderModel; 9] = [
        ShaderModel::SM6_0,
        ShaderModel::SM6_1,
        ShaderModel::SM6_2,
        ShaderModel::SM6_3,
        ShaderModel::SM6_4,
        ShaderModel::SM6_5,
        ShaderModel::SM6_6,
        ShaderModel::SM6_7,
        ShaderModel::SM6_8,
    ];

    /// Returns the shader model suffix (6_0, 6_6, etc.)
    pub fn suffix(&self) -> &'static str {
        match self {
            ShaderModel::SM6_0 => "6_0",
            ShaderModel::SM6_1 => "6_1",
            ShaderModel::SM6_2 => "6_2",
            ShaderModel::SM6_3 => "6_3",
            ShaderModel::SM6_4 => "6_4",
            ShaderModel::SM6_5 => "6_5",
            ShaderModel::SM6_6 => "6_6",
            ShaderModel::SM6_7 => "6_7",
            ShaderModel::SM6_8 => "6_8",
        }
    }

    /// Returns the major version number
    pub fn major(&self) -> u32 {
        6
    }

    /// Returns the minor version number
    pub fn minor(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for ShaderModel {
    type Err = String;

    /// Accepts `6_6`, `6.6` or `sm6_6`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches("sm").replace('.', "_");
        ShaderModel::ALL
            .into_iter()
            .find(|m| m.suffix() == normalized)
            .ok_or_else(|| format!("unsupported shader model '{s}'"))
    }
}

impl TryFrom<String> for ShaderModel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Compiler profile (stage + shader model), e.g. `vs_6_6`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Profile {
    /// The pipeline stage
    pub stage: Stage,
    /// The shader model version
    pub model: ShaderModel,
}

impl Profile {
    /// Creates a new profile
    pub const fn new(stage: Stage, model: ShaderModel) -> Self {
        Profile { stage, model }
    }

    /// Returns the profile string (e.g., "vs_6_6")
    pub fn as_str(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.stage.prefix(), self.model.suffix())
    }
}
