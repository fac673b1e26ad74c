//! Example registry: a static table of named entry points.
//!
//! Descriptors are derived from the registered sources on every
//! [`ExampleRegistry::list`] call, so a listing never goes stale.

use std::path::{Path, PathBuf};

use airsim_core::config::AppConfig;
use airsim_core::error::{Result, SimError};
use airsim_rpc::Connection;
use regex::Regex;

use crate::builtin;

/// Text used when an example has no leading comment block.
pub const NO_DESCRIPTION: &str = "(no description)";

/// Entry point signature shared by every example.
pub type ExampleFn = fn(&mut Connection, &AppConfig) -> Result<()>;

// ── ExampleEntry ──────────────────────────────────────────────────────────────

/// One registered example.
#[derive(Clone, Copy)]
pub struct ExampleEntry {
    /// Location of the example's source; its file stem is the example name.
    pub file_path: &'static str,
    /// Full source text, used to extract the description.
    pub source: &'static str,
    pub run: ExampleFn,
}

impl ExampleEntry {
    pub fn name(&self) -> &str {
        Path::new(self.file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.file_path)
    }

    pub fn descriptor(&self) -> ExampleDescriptor {
        ExampleDescriptor {
            name: self.name().to_string(),
            file_path: PathBuf::from(self.file_path),
            description: extract_description(self.source)
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        }
    }
}

impl std::fmt::Debug for ExampleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleEntry")
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

// ── ExampleDescriptor ─────────────────────────────────────────────────────────

/// Name, location and description of an example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleDescriptor {
    pub name: String,
    pub file_path: PathBuf,
    pub description: String,
}

impl ExampleDescriptor {
    /// First sentence of the first description line.
    pub fn summary(&self) -> &str {
        let first_line = self.description.lines().next().unwrap_or("");
        first_line
            .split(". ")
            .next()
            .unwrap_or(first_line)
            .trim()
    }
}

// ── ExampleRegistry ───────────────────────────────────────────────────────────

/// Lookup table of examples by name.
#[derive(Debug, Clone)]
pub struct ExampleRegistry {
    entries: Vec<ExampleEntry>,
}

impl ExampleRegistry {
    /// Registry of the bundled examples.
    pub fn builtin() -> Self {
        Self::new(builtin::entries())
    }

    pub fn new(entries: Vec<ExampleEntry>) -> Self {
        Self { entries }
    }

    /// Descriptors of every example, sorted by name.
    pub fn list(&self) -> Vec<ExampleDescriptor> {
        let mut all: Vec<ExampleDescriptor> =
            self.entries.iter().map(ExampleEntry::descriptor).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Look up an example by name.
    pub fn find(&self, name: &str) -> Result<&ExampleEntry> {
        self.entries
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| SimError::NotFound(format!("example '{}'", name)))
    }

    pub fn describe(&self, name: &str) -> Result<ExampleDescriptor> {
        self.find(name).map(ExampleEntry::descriptor)
    }
}

// ── Description extraction ────────────────────────────────────────────────────

/// Text of the leading comment block of `source`, or `None` when there is
/// none. Leading blank lines are skipped; the block ends at the first line
/// that is not a comment.
pub fn extract_description(source: &str) -> Option<String> {
    let re = Regex::new(r"^\s*//[!/]?\s?(.*)$").expect("regex is valid");
    let mut lines = Vec::new();

    for line in source.lines() {
        if lines.is_empty() && line.trim().is_empty() {
            continue;
        }
        match re.captures(line) {
            Some(caps) => lines.push(caps.get(1).map_or("", |m| m.as_str()).trim_end()),
            None => break,
        }
    }

    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Connection, _: &AppConfig) -> Result<()> {
        Ok(())
    }

    fn entry(file_path: &'static str, source: &'static str) -> ExampleEntry {
        ExampleEntry {
            file_path,
            source,
            run: noop,
        }
    }

    #[test]
    fn test_extract_description_leading_block() {
        let src =
            "\n//! Drive in a circle. Then stop.\n//!\n//! Needs a car.\nuse x;\n//! ignored\n";
        assert_eq!(
            extract_description(src).as_deref(),
            Some("Drive in a circle. Then stop.\n\nNeeds a car.")
        );
    }

    #[test]
    fn test_extract_description_plain_comments() {
        let src = "// Plain comment header\n// second line\nfn main() {}\n";
        assert_eq!(
            extract_description(src).as_deref(),
            Some("Plain comment header\nsecond line")
        );
    }

    #[test]
    fn test_extract_description_none() {
        assert_eq!(extract_description("use std::fs;\n"), None);
        assert_eq!(extract_description("//!\n//!\n"), None);
        assert_eq!(extract_description(""), None);
    }

    #[test]
    fn test_descriptor_name_summary_and_fallback() {
        let registry = ExampleRegistry::new(vec![
            entry("/x/src/builtin/zeta.rs", "//! Zeta runs. It also stops.\n//! More.\n"),
            entry("/x/src/builtin/alpha.rs", "fn run() {}\n"),
        ]);

        let list = registry.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "alpha");
        assert_eq!(list[0].description, NO_DESCRIPTION);
        assert_eq!(list[1].name, "zeta");
        assert_eq!(list[1].summary(), "Zeta runs");
        assert_eq!(list[1].file_path, PathBuf::from("/x/src/builtin/zeta.rs"));
    }

    #[test]
    fn test_find_unknown_is_not_found() {
        let registry = ExampleRegistry::builtin();
        let err = registry.describe("missing-name").unwrap_err();
        assert!(matches!(err, SimError::NotFound(_)));
        assert!(err.to_string().contains("missing-name"));
    }

    #[test]
    fn test_builtin_examples_are_registered_and_described() {
        let registry = ExampleRegistry::builtin();
        let names: Vec<String> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec![
                "capture_data",
                "car_capture_images",
                "car_lidar",
                "car_lidar_simple",
                "hello_car"
            ]
        );

        for desc in registry.list() {
            assert_ne!(desc.description, NO_DESCRIPTION, "{} has no description", desc.name);
            assert!(desc.file_path.exists(), "{} not found", desc.file_path.display());
        }
    }
}
