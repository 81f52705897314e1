//! Category catalog fed to the enrichment prompt
//!
//! The catalog is a flat arena of nodes with parent/child indices, built
//! and traversed with explicit worklists. `render_guidance` turns it into
//! a line-capped plain-text tree for the prompt; `canonicalize_path`
//! snaps a model-proposed path back onto catalog casing.

use crate::error::Result;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::warn;

const MAX_DEPTH: usize = 6;

#[derive(Debug, Clone)]
struct CategoryNode {
    name: String,
    article_count: Option<u64>,
    children: Vec<usize>,
}

/// Arena-backed category tree loaded from `categories.json`.
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    nodes: Vec<CategoryNode>,
    roots: Vec<usize>,
    /// Lowercased full path -> catalog-cased full path.
    path_index: BTreeMap<Vec<String>, Vec<String>>,
}

impl CategoryCatalog {
    /// Load from disk. A missing file yields `None`; an unparseable one
    /// is logged and also yields `None` rather than failing the caller.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Ok(Some(Self::from_value(&value))),
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable category catalog");
                Ok(None)
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let mut catalog = Self::default();
        let top = value
            .get("categories")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        // (json node, parent index) worklist; children are pushed as
        // they are discovered.
        let mut work: Vec<(&Value, Option<usize>)> =
            top.iter().rev().map(|v| (v, None)).collect();
        while let Some((raw, parent)) = work.pop() {
            let Some(name) = raw.get("name").and_then(Value::as_str) else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let idx = catalog.nodes.len();
            catalog.nodes.push(CategoryNode {
                name: name.to_string(),
                article_count: raw.get("article_count").and_then(Value::as_u64),
                children: Vec::new(),
            });
            match parent {
                Some(p) => catalog.nodes[p].children.push(idx),
                None => catalog.roots.push(idx),
            }
            if let Some(children) = raw.get("children").and_then(Value::as_array) {
                for child in children.iter().rev() {
                    work.push((child, Some(idx)));
                }
            }
        }

        catalog.build_path_index();
        catalog
    }

    fn build_path_index(&mut self) {
        let mut index = BTreeMap::new();
        let mut work: Vec<(usize, Vec<String>)> = self
            .roots
            .iter()
            .rev()
            .map(|&idx| (idx, Vec::new()))
            .collect();
        while let Some((idx, mut path)) = work.pop() {
            path.push(self.nodes[idx].name.clone());
            let key: Vec<String> = path.iter().map(|s| s.to_lowercase()).collect();
            index.insert(key, path.clone());
            for &child in self.nodes[idx].children.iter().rev() {
                work.push((child, path.clone()));
            }
        }
        self.path_index = index;
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render the tree as `- A > B (count)` lines, one per category,
    /// depth-bounded and capped at `max_lines`.
    pub fn render_guidance(&self, max_lines: usize) -> String {
        let mut lines = Vec::new();
        let mut truncated = false;
        let mut work: Vec<(usize, Vec<&str>)> = self
            .roots
            .iter()
            .rev()
            .map(|&idx| (idx, Vec::new()))
            .collect();
        while let Some((idx, mut trail)) = work.pop() {
            if trail.len() >= MAX_DEPTH {
                continue;
            }
            let node = &self.nodes[idx];
            trail.push(&node.name);
            if lines.len() >= max_lines {
                truncated = true;
                break;
            }
            let label = trail.join(" > ");
            match node.article_count {
                Some(count) => lines.push(format!("- {} ({})", label, count)),
                None => lines.push(format!("- {}", label)),
            }
            for &child in node.children.iter().rev() {
                work.push((child, trail.clone()));
            }
        }
        if truncated {
            lines.push("- ... (catalog truncated)".to_string());
        }
        lines.join("\n")
    }

    /// Snap a proposed path onto catalog casing. Tries the full path
    /// first, then falls back to a unique prefix match. Returns `None`
    /// when the path names nothing in the catalog.
    pub fn canonicalize_path(&self, path: &[String]) -> Option<Vec<String>> {
        let key: Vec<String> = path
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if key.is_empty() {
            return None;
        }
        if let Some(found) = self.path_index.get(&key) {
            return Some(found.clone());
        }
        let mut prefixes: BTreeSet<Vec<String>> = BTreeSet::new();
        for (normalized, original) in &self.path_index {
            if normalized.len() >= key.len() && normalized[..key.len()] == key[..] {
                prefixes.insert(original[..key.len()].to_vec());
            }
        }
        if prefixes.len() == 1 {
            return prefixes.into_iter().next();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CategoryCatalog {
        CategoryCatalog::from_value(&json!({
            "categories": [
                {
                    "name": "Tech",
                    "article_count": 12,
                    "children": [
                        {"name": "Rust", "article_count": 5},
                        {"name": "Databases", "article_count": 3}
                    ]
                },
                {"name": "Life", "article_count": 7}
            ]
        }))
    }

    #[test]
    fn test_guidance_lists_paths_in_order() {
        let guidance = sample().render_guidance(10);
        let lines: Vec<&str> = guidance.lines().collect();
        assert_eq!(
            lines,
            vec![
                "- Tech (12)",
                "- Tech > Rust (5)",
                "- Tech > Databases (3)",
                "- Life (7)",
            ]
        );
    }

    #[test]
    fn test_guidance_truncates_at_line_cap() {
        let guidance = sample().render_guidance(2);
        let lines: Vec<&str> = guidance.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "- ... (catalog truncated)");
    }

    #[test]
    fn test_canonicalize_restores_catalog_casing() {
        let catalog = sample();
        assert_eq!(
            catalog.canonicalize_path(&["tech".into(), "rust".into()]),
            Some(vec!["Tech".to_string(), "Rust".to_string()])
        );
        assert_eq!(
            catalog.canonicalize_path(&[" LIFE ".into()]),
            Some(vec!["Life".to_string()])
        );
        assert_eq!(catalog.canonicalize_path(&["unknown".into()]), None);
        assert_eq!(
            catalog.canonicalize_path(&["rust".into()]),
            None,
            "a leaf without its ancestors is not a valid path"
        );
        assert_eq!(catalog.canonicalize_path(&[]), None);
        assert_eq!(catalog.canonicalize_path(&["  ".into()]), None);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = CategoryCatalog::load(&dir.path().join("categories.json")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let catalog = CategoryCatalog::from_value(&json!({
            "categories": [{"article_count": 3}, {"name": "  "}, {"name": "Kept"}]
        }));
        assert_eq!(catalog.render_guidance(10), "- Kept");
    }
}
