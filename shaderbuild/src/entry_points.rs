//! Entry point discovery from `#pragma <stage> <entry>` directives

use crate::{Stage, StageMask};
use std::collections::BTreeMap;

const PRAGMA: &str = "#pragma";

/// Entry points declared by one shader source, grouped by stage.
///
/// Names keep their order of first appearance within a stage. Repeated
/// directives are kept as separate entries, each one becomes its own job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPointSet {
    stages: BTreeMap<Stage, Vec<String>>,
}

impl EntryPointSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans shader source text for stage directives.
    ///
    /// A directive is only recognized at the start of a line once leading
    /// whitespace is trimmed. Unknown stage keywords and unrelated pragmas are
    /// ignored.
    ///
    /// # Example
    /// ```
    /// use shaderbuild::{EntryPointSet, Stage};
    ///
    /// let set = EntryPointSet::extract("#pragma vertex VSMain\n// see #pragma vertex Other\n");
    /// assert_eq!(set.get(Stage::Vertex), ["VSMain"]);
    /// ```
    pub fn extract(source: &str) -> Self {
        let mut set = Self::new();
        for line in source.lines() {
            if let Some((stage, entry)) = parse_directive(line) {
                set.push(stage, entry);
            }
        }
        set
    }

    /// Appends an entry point for `stage`.
    pub fn push(&mut self, stage: Stage, entry: impl Into<String>) {
        self.stages.entry(stage).or_default().push(entry.into());
    }

    /// Returns the entry points declared for `stage`, in source order.
    pub fn get(&self, stage: Stage) -> &[String] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates over every `(stage, entry)` pair, vertex first, then fragment,
    /// then compute.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        self.stages
            .iter()
            .flat_map(|(stage, entries)| entries.iter().map(move |e| (*stage, e.as_str())))
    }

    /// Returns the stages that have at least one entry point.
    pub fn stages(&self) -> StageMask {
        self.stages
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .fold(StageMask::empty(), |mask, (stage, _)| mask | stage.mask())
    }

    /// Keeps only the stages selected by `mask`.
    pub fn retain(&mut self, mask: StageMask) {
        self.stages.retain(|stage, _| mask.includes(*stage));
    }

    /// Total number of entry points across all stages.
    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    /// Returns true if no directive was found.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses `#pragma <stage> <identifier>` at the start of a trimmed line.
fn parse_directive(line: &str) -> Option<(Stage, &str)> {
    let rest = line.trim().strip_prefix(PRAGMA)?;
    // `#pragmaonce` is not a pragma.
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    let stage = Stage::from_keyword(tokens.next()?)?;
    let name = leading_identifier(tokens.next()?)?;
    Some((stage, name))
}

/// Returns the identifier prefix of `token`, if it starts with one.
fn leading_identifier(token: &str) -> Option<&str> {
    let end = token
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(token.len());
    (end > 0).then(|| &token[..end])
}
