//! Quality metrics and scoring for enrichment payloads

use crate::enrich::{EnhanceStatus, SummaryPayload};
use serde::Serialize;

/// Lightweight metrics over one clean-text + payload pair.
#[derive(Debug, Clone, Serialize)]
pub struct QualityMetrics {
    pub input_chars: f64,
    pub input_lines: f64,
    pub summary_chars: f64,
    pub summary_coverage_ratio: f64,
    pub keyword_hit_rate: f64,
    pub action_item_count: f64,
    pub unique_summary_sentences: f64,
    pub estimated_read_seconds: f64,
}

pub fn compute_quality_metrics(clean_text: &str, payload: &SummaryPayload) -> QualityMetrics {
    let summary = payload.summary.trim();
    let total_chars = clean_text.trim().chars().count() as f64;
    let summary_chars = summary.chars().count() as f64;
    let coverage_ratio = if total_chars == 0.0 {
        0.0
    } else {
        (summary_chars / total_chars).min(1.0)
    };

    let lowered_source = clean_text.to_lowercase();
    let keywords: Vec<&str> = payload
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    let keyword_hits = keywords
        .iter()
        .filter(|k| lowered_source.contains(&k.to_lowercase()))
        .count();
    let keyword_hit_rate = if keywords.is_empty() {
        0.0
    } else {
        keyword_hits as f64 / keywords.len() as f64
    };

    let action_item_count = payload
        .action_items
        .iter()
        .filter(|a| !a.trim().is_empty())
        .count() as f64;

    let mut sentences: Vec<&str> = summary
        .split(['。', '.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    sentences.sort_unstable();
    sentences.dedup();

    let input_lines = clean_text.lines().filter(|l| !l.trim().is_empty()).count() as f64;
    let estimated_read_seconds = if total_chars == 0.0 {
        0.0
    } else {
        round_to(total_chars / 1000.0 * 60.0, 1)
    };

    QualityMetrics {
        input_chars: total_chars,
        input_lines,
        summary_chars,
        summary_coverage_ratio: round_to(coverage_ratio, 3),
        keyword_hit_rate: round_to(keyword_hit_rate, 3),
        action_item_count,
        unique_summary_sentences: sentences.len() as f64,
        estimated_read_seconds,
    }
}

/// Weighted score in `[0, 1]`, rounded to three decimals. Non-success
/// outcomes are damped to 40% of what the same payload would score.
pub fn score_quality(status: EnhanceStatus, metrics: &QualityMetrics) -> f64 {
    let coverage = metrics.summary_coverage_ratio;
    let keyword_hit = metrics.keyword_hit_rate;
    let action_density = (metrics.action_item_count / 3.0).min(1.0);
    let mut score = 0.5 * coverage + 0.3 * keyword_hit + 0.2 * action_density;
    if status != EnhanceStatus::Success {
        score *= 0.4;
    }
    round_to(score.clamp(0.0, 1.0), 3)
}

fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
