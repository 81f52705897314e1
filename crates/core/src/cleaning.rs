//! Rule-based content cleaning for freshly extracted plain text
//!
//! Rules run in ascending priority order. Each rule is a pure function
//! over the text; it contributes to the audit log only when it actually
//! changed something. The whitespace normalizer always runs last.
//!
//! Individual rules are idempotent on their own output, but a full pass
//! is not guaranteed to be a fixed point: collapsing whitespace can
//! expose new adjacent duplicate lines for the dedupe rule.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;

use crate::entities::AttrMap;

/// Content tags inferred from a note's origin, used to gate rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTag {
    Forum,
    Social,
    Email,
    AiGenerated,
    Longform,
}

/// Lightweight descriptor for a note's origin.
#[derive(Debug, Clone, Default)]
pub struct CleaningContext {
    pub source_type: String,
    pub language: String,
    pub metadata: AttrMap,
}

impl CleaningContext {
    pub fn new(source_type: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            language: language.into(),
            metadata: AttrMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: AttrMap) -> Self {
        self.metadata = metadata;
        self
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Keyword heuristics over the source descriptor.
    pub fn has_tag(&self, tag: ContentTag) -> bool {
        let source = self.source_type.to_lowercase();
        match tag {
            ContentTag::Forum => ["forum", "bbs", "community"]
                .iter()
                .any(|token| source.contains(token)),
            ContentTag::Social => ["weibo", "twitter", "social", "wechat"]
                .iter()
                .any(|token| source.contains(token)),
            ContentTag::Email => source.contains("email") || self.meta_str("channel") == Some("email"),
            ContentTag::AiGenerated => {
                source.contains("ai") || self.meta_str("generator") == Some("llm")
            }
            ContentTag::Longform => {
                source.contains("blog") || self.meta_str("category") == Some("blog")
            }
        }
    }
}

/// One entry of the cleaning audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedRule {
    pub rule_id: String,
    pub description: String,
    pub note: String,
}

/// Cleaned text plus the rules that changed it, in application order.
#[derive(Debug, Clone)]
pub struct CleaningResult {
    pub text: String,
    pub applied: Vec<AppliedRule>,
}

impl CleaningResult {
    /// Audit trail in the shape stored on the clean variant's metadata.
    pub fn to_metadata(&self) -> AttrMap {
        let mut map = AttrMap::new();
        map.insert("rule_count".into(), json!(self.applied.len()));
        map.insert(
            "applied_rules".into(),
            serde_json::to_value(&self.applied).unwrap_or_default(),
        );
        map
    }
}

type Predicate = fn(&str, &CleaningContext) -> bool;
type Transform = fn(&str, &CleaningContext) -> (String, &'static str);

struct CleaningRule {
    rule_id: &'static str,
    description: &'static str,
    priority: u32,
    predicate: Predicate,
    transform: Transform,
}

/// Run all matching rules and return the cleaned text and audit trail.
pub fn apply_rules(text: &str, context: &CleaningContext) -> CleaningResult {
    let mut active = text.to_string();
    let mut applied = Vec::new();

    for rule in rules() {
        if !(rule.predicate)(&active, context) {
            continue;
        }
        let (next, note) = (rule.transform)(&active, context);
        if next == active {
            continue;
        }
        applied.push(AppliedRule {
            rule_id: rule.rule_id.to_string(),
            description: rule.description.to_string(),
            note: note.to_string(),
        });
        active = next;
    }

    CleaningResult {
        text: active.trim().to_string(),
        applied,
    }
}

fn rules() -> &'static [CleaningRule] {
    // Kept sorted by priority.
    static RULES: OnceLock<Vec<CleaningRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut rules = vec![
            CleaningRule {
                rule_id: "forum_quotes",
                description: "Remove forum style quoted sections",
                priority: 10,
                predicate: |text, ctx| {
                    text.to_lowercase().contains("[quote") || ctx.has_tag(ContentTag::Forum)
                },
                transform: strip_forum_quotes,
            },
            CleaningRule {
                rule_id: "social_handles",
                description: "Drop standalone social handles and hashtags",
                priority: 20,
                predicate: |text, ctx| {
                    ctx.has_tag(ContentTag::Social) || handle_line_re().is_match(text)
                },
                transform: strip_social_handles,
            },
            CleaningRule {
                rule_id: "ai_disclaimer",
                description: "Remove boilerplate AI disclaimers",
                priority: 30,
                predicate: |text, ctx| {
                    text.to_lowercase().contains("ai language model")
                        || ctx.has_tag(ContentTag::AiGenerated)
                },
                transform: strip_ai_disclaimer,
            },
            CleaningRule {
                rule_id: "signature",
                description: "Strip trailing signatures",
                priority: 40,
                predicate: |text, ctx| {
                    ctx.has_tag(ContentTag::Email) || text.to_lowercase().contains("sent from my")
                },
                transform: strip_signature_block,
            },
            CleaningRule {
                rule_id: "dedupe_lines",
                description: "Collapse adjacent duplicate lines",
                priority: 50,
                predicate: |text, _| text.contains('\n'),
                transform: dedupe_repeated_lines,
            },
            CleaningRule {
                rule_id: "whitespace",
                description: "Normalize whitespace",
                priority: 100,
                predicate: |_, _| true,
                transform: collapse_whitespace,
            },
        ];
        rules.sort_by_key(|rule| rule.priority);
        rules
    })
}

fn static_re(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static cleaning pattern"))
}

fn forum_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?is)\[quote[^\]]*\].*?\[/quote\]")
}

fn handle_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?m)^[@#][\w\-]{2,}(?::\s*)?$")
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"\n{2,}")
}

fn ai_disclaimer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(
        &RE,
        r"(?im)^.*(?:as an ai language model|i cannot assist with).*$",
    )
}

fn signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(
        &RE,
        r"(?is)(\n--\s+|\nsent from my [^\n]+|\nbest regards,\n).*",
    )
}

fn exotic_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"[\t\x0B\x0C]+")
}

fn trailing_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"(?m)[ \t]+$")
}

fn excess_newlines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    static_re(&RE, r"\n{3,}")
}

fn strip_forum_quotes(text: &str, _: &CleaningContext) -> (String, &'static str) {
    let stripped = forum_quote_re().replace_all(text, "");
    let lines: Vec<&str> = stripped
        .lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect();
    (lines.join("\n"), "removed quoted blocks")
}

fn strip_social_handles(text: &str, _: &CleaningContext) -> (String, &'static str) {
    let cleaned = handle_line_re().replace_all(text, "");
    let cleaned = blank_run_re().replace_all(&cleaned, "\n\n");
    (cleaned.into_owned(), "removed social handle only lines")
}

fn strip_ai_disclaimer(text: &str, _: &CleaningContext) -> (String, &'static str) {
    (
        ai_disclaimer_re().replace_all(text, "").into_owned(),
        "removed AI disclaimer",
    )
}

fn strip_signature_block(text: &str, _: &CleaningContext) -> (String, &'static str) {
    (
        signature_re().replace(text, "").into_owned(),
        "removed trailing signature",
    )
}

fn dedupe_repeated_lines(text: &str, _: &CleaningContext) -> (String, &'static str) {
    let mut unique: Vec<&str> = Vec::new();
    for line in text.lines() {
        if let Some(last) = unique.last() {
            if last.trim() == line.trim() {
                continue;
            }
        }
        unique.push(line);
    }
    (unique.join("\n"), "collapsed duplicate adjacent lines")
}

fn collapse_whitespace(text: &str, _: &CleaningContext) -> (String, &'static str) {
    let compact = exotic_space_re().replace_all(text, " ");
    let compact = trailing_space_re().replace_all(&compact, "");
    let compact = excess_newlines_re().replace_all(&compact, "\n\n");
    (compact.trim().to_string(), "collapsed whitespace")
}
