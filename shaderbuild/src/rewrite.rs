//! Compilable variants of a shader source
//!
//! The compiler only takes one entry symbol per invocation and has no way to
//! inject a global include, so both are done by writing a rewritten copy of
//! the source to a temporary file. The file lives exactly as long as the
//! [`TempSource`] that owns it.

use crate::Result;
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A rewritten shader source on disk, deleted when dropped.
#[derive(Debug)]
pub struct TempSource {
    file: NamedTempFile,
}

impl TempSource {
    /// Writes `contents` to a uniquely named `.hlsl` file in `dir`, or in the
    /// system temp directory when `dir` is `None`.
    pub fn create(contents: &[u8], dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("shaderbuild-").suffix(".hlsl");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(contents)?;
        file.flush()?;
        Ok(TempSource { file })
    }

    /// Returns the path of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Deletes the file now, reporting any failure.
    pub fn close(self) -> Result<()> {
        self.file.close().map_err(Into::into)
    }
}

/// Describes how a job's source should be rewritten before compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    /// Resolved forced include contents, prepended to the source
    pub include: Option<Vec<u8>>,
    /// `(declared, replacement)` entry symbol rename
    pub rename: Option<(String, String)>,
}

impl Rewrite {
    /// Returns true if the source can be compiled as-is.
    pub fn is_identity(&self) -> bool {
        self.include.is_none()
            && self
                .rename
                .as_ref()
                .is_none_or(|(from, to)| from == to)
    }

    /// Applies both transforms to `source`.
    ///
    /// The rename runs on the shader's own text only, so tokens inside the
    /// injected include are never touched.
    pub fn apply(&self, source: &[u8]) -> Result<Vec<u8>> {
        let body: Cow<'_, [u8]> = match &self.rename {
            Some((from, to)) if from != to => {
                let text = String::from_utf8(source.to_vec())?;
                Cow::Owned(rename_entry_point(&text, from, to).into_owned().into_bytes())
            }
            _ => Cow::Borrowed(source),
        };

        Ok(match &self.include {
            Some(include) => inject_include(include, &body),
            None => body.into_owned(),
        })
    }

    /// Materializes the rewritten source as a [`TempSource`], or returns
    /// `None` when no rewrite is needed.
    pub fn materialize(&self, source_path: &Path, temp_dir: Option<&Path>) -> Result<Option<TempSource>> {
        if self.is_identity() {
            return Ok(None);
        }
        let source = std::fs::read(source_path)?;
        let rewritten = self.apply(&source)?;
        let temp = TempSource::create(&rewritten, temp_dir)?;
        log::debug!(
            "Rewrote {} -> {}",
            source_path.display(),
            temp.path().display()
        );
        Ok(Some(temp))
    }
}

/// Concatenates include contents ahead of the original source.
///
/// A newline is inserted between the two when the include does not end with
/// one, so the last include line cannot fuse with the first source line.
pub fn inject_include(include: &[u8], source: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(include.len() + source.len() + 1);
    out.extend_from_slice(include);
    if !include.is_empty() && !include.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(source);
    out
}

/// Replaces every whole-identifier occurrence of `from` with `to`.
///
/// Matching is on identifier boundaries: `VSMain` is renamed, `VSMainHelper`
/// and `g_VSMain` are not. Comments and string contents are not special
/// cased, an identical token there is renamed as well.
pub fn rename_entry_point<'a>(source: &'a str, from: &str, to: &str) -> Cow<'a, str> {
    if from == to || from.is_empty() {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    let mut changed = false;
    for (start, ident) in identifiers(source) {
        if ident == from {
            out.push_str(&source[last..start]);
            out.push_str(to);
            last = start + ident.len();
            changed = true;
        }
    }

    if !changed {
        return Cow::Borrowed(source);
    }
    out.push_str(&source[last..]);
    Cow::Owned(out)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Yields `(byte offset, identifier)` for every identifier token.
///
/// Digits that start a token (numeric literals like `1e5f`) are skipped as a
/// whole so their suffixes are not mistaken for identifiers.
fn identifiers(source: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut chars = source.char_indices().peekable();
    std::iter::from_fn(move || {
        while let Some((start, c)) = chars.next() {
            if is_ident_start(c) || c.is_ascii_digit() {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_ident_continue(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                if is_ident_start(c) {
                    return Some((start, &source[start..end]));
                }
            }
        }
        None
    })
}

/// Returns the directory a temp source should be resolved against for
/// relative `#include`s: the original shader's own directory.
pub fn origin_dir(source_path: &Path) -> PathBuf {
    match source_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
#pragma vertex VSMain
// VSMain is the entry
float4 VSMainHelper(float4 p) { return p; }
float4 VSMain(float4 p : POSITION) : SV_Position { return VSMainHelper(p) * 1e5f; }
";

    #[test]
    fn test_rename_whole_identifiers() {
        let renamed = rename_entry_point(SOURCE, "VSMain", "main");
        assert_eq!(
            renamed,
            "\
#pragma vertex main
// main is the entry
float4 VSMainHelper(float4 p) { return p; }
float4 main(float4 p : POSITION) : SV_Position { return VSMainHelper(p) * 1e5f; }
"
        );
    }

    #[test]
    fn test_rename_noop_is_identical() {
        assert!(matches!(rename_entry_point(SOURCE, "Main", "Main"), Cow::Borrowed(s) if s == SOURCE));
        assert!(matches!(rename_entry_point(SOURCE, "Absent", "main"), Cow::Borrowed(_)));

        let rewrite = Rewrite {
            include: None,
            rename: Some(("Main".into(), "Main".into())),
        };
        assert!(rewrite.is_identity());
        assert_eq!(rewrite.apply(SOURCE.as_bytes()).unwrap(), SOURCE.as_bytes());
    }

    #[test]
    fn test_rename_skips_numeric_suffixes() {
        assert_eq!(rename_entry_point("float x = 2f; f(x);", "f", "g"), "float x = 2f; g(x);");
        assert_eq!(rename_entry_point("g_a a_b a", "a", "b"), "g_a a_b b");
    }

    #[test]
    fn test_inject_include() {
        assert_eq!(inject_include(b"#define A 1\n", b"float x;"), b"#define A 1\nfloat x;");
        assert_eq!(inject_include(b"#define A 1", b"float x;"), b"#define A 1\nfloat x;");
        assert_eq!(inject_include(b"", b"float x;"), b"float x;");
    }

    #[test]
    fn test_apply_both_renames_only_source() {
        let rewrite = Rewrite {
            include: Some(b"#define PSMain_SCALE 2\nfloat PSMain;\n".to_vec()),
            rename: Some(("PSMain".into(), "main".into())),
        };
        let out = rewrite.apply(b"float4 PSMain() : SV_Target { return 1; }").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "#define PSMain_SCALE 2\nfloat PSMain;\nfloat4 main() : SV_Target { return 1; }"
        );
    }

    #[test]
    fn test_temp_source_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempSource::create(b"float x;", Some(dir.path())).unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"float x;");
        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_materialize_identity_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("basic.hlsl");
        std::fs::write(&source, "float x;").unwrap();

        let temp = Rewrite::default().materialize(&source, Some(dir.path())).unwrap();
        assert!(temp.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_origin_dir() {
        assert_eq!(origin_dir(Path::new("shaders/basic.hlsl")), PathBuf::from("shaders"));
        assert_eq!(origin_dir(Path::new("basic.hlsl")), PathBuf::from("."));
    }
}
