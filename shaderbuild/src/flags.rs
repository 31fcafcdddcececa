//! Stage selection flags

use crate::{Error, Stage};
use bitflags::bitflags;
use std::str::FromStr;

bitflags! {
    /// Set of pipeline stages a build should compile.
    ///
    /// Entry points whose stage is not in the mask are skipped before any
    /// job is created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u32 {
        /// Vertex entry points
        const VERTEX = 1 << 0;

        /// Fragment entry points
        const FRAGMENT = 1 << 1;

        /// Compute entry points
        const COMPUTE = 1 << 2;

        /// Graphics stages only
        const GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

impl StageMask {
    /// Returns true if `stage` is selected
    pub fn includes(&self, stage: Stage) -> bool {
        self.contains(stage.mask())
    }
}

impl Default for StageMask {
    fn default() -> Self {
        StageMask::all()
    }
}

impl FromStr for StageMask {
    type Err = Error;

    /// Parses a comma separated stage list, e.g. `vertex,compute` or `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = StageMask::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            mask |= match part {
                "all" => StageMask::all(),
                "graphics" => StageMask::GRAPHICS,
                other => other.parse::<Stage>()?.mask(),
            };
        }
        if mask.is_empty() {
            return Err(Error::Usage("empty stage list".to_string()));
        }
        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mask_combine() {
        let mask = StageMask::VERTEX | StageMask::COMPUTE;
        assert!(mask.includes(Stage::Vertex));
        assert!(mask.includes(Stage::Compute));
        assert!(!mask.includes(Stage::Fragment));
    }

    #[test]
    fn test_stage_mask_parse() {
        assert_eq!(
            "vertex, fragment".parse::<StageMask>().unwrap(),
            StageMask::GRAPHICS
        );
        assert_eq!("all".parse::<StageMask>().unwrap(), StageMask::all());
        assert!("vertex,tessellation".parse::<StageMask>().is_err());
        assert!(" , ".parse::<StageMask>().is_err());
        assert_eq!(StageMask::default(), StageMask::all());
    }
}
