//! Prompt templates for the enrichment models

/// A named template with `{placeholder}` slots.
pub struct PromptTemplate {
    pub name: &'static str,
    template: &'static str,
}

impl PromptTemplate {
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }

    /// Substitute each `{key}` slot with its value.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.template.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

pub const NOTE_SUMMARY: PromptTemplate = PromptTemplate::new(
    "note_summary",
    r#"You are a note curation assistant. Read the note below and reply with strict JSON only, no prose around it:
{"summary": "one sentence of at most 80 characters", "keywords": ["exactly 5 keywords"], "action_items": ["concrete follow-ups, or the single entry 'none'"], "category_path": ["path from root to leaf in the existing category tree"], "new_category_suggestion": null}
Reuse an existing category path whenever one fits. Only fill new_category_suggestion (as a path array) when nothing existing fits.
Note title: {title}
Reply language: {language}
Existing categories:
{categories}
--- note content ---
{content}
--- end of note ---"#,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_slots() {
        let rendered = NOTE_SUMMARY.render(&[
            ("title", "Grocery run"),
            ("language", "en"),
            ("categories", "(none yet)"),
            ("content", "milk and eggs"),
        ]);
        assert!(rendered.contains("Note title: Grocery run"));
        assert!(rendered.contains("milk and eggs"));
        assert!(!rendered.contains("{title}"));
        assert!(!rendered.contains("{content}"));
        // JSON braces in the template body must survive rendering.
        assert!(rendered.contains(r#"{"summary""#));
    }

    #[test]
    fn test_render_leaves_unknown_slots_alone() {
        let template = PromptTemplate::new("t", "a {x} b {y}");
        assert_eq!(template.render(&[("x", "1")]), "a 1 b {y}");
    }
}
