//! HTML text extraction and language guessing for web-clip exports
//!
//! The extractor is a small scanner over the markup: it drops tags,
//! skips `<script>`/`<style>` subtrees and comments, decodes the common
//! entities, and inserts line breaks at block boundaries. It is not a
//! full HTML parser; exports are machine-generated and regular enough
//! that this holds up well in practice.

use regex::Regex;
use std::sync::OnceLock;

/// Tags that imply a line break in the extracted text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "table", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "blockquote", "pre", "hr", "title", "head", "body",
];

/// Return cleaned text and inferred title from an HTML payload.
pub fn extract_text_from_html(html: &str) -> (String, String) {
    let title = extract_title(html);
    let mut out = String::with_capacity(html.len() / 2);
    let bytes = html.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'<' {
            if html[pos..].starts_with("<!--") {
                pos = match html[pos..].find("-->") {
                    Some(end) => pos + end + 3,
                    None => bytes.len(),
                };
                continue;
            }
            let tag_end = match html[pos..].find('>') {
                Some(end) => pos + end,
                None => break,
            };
            let tag_body = &html[pos + 1..tag_end];
            let name = tag_name(tag_body);

            if name == "script" || name == "style" {
                pos = skip_subtree(html, tag_end + 1, &name);
                out.push('\n');
                continue;
            }
            if BLOCK_TAGS.contains(&name.as_str()) {
                out.push('\n');
            }
            pos = tag_end + 1;
            continue;
        }

        let text_end = html[pos..]
            .find('<')
            .map(|offset| pos + offset)
            .unwrap_or(bytes.len());
        out.push_str(&decode_entities(&html[pos..text_end]));
        pos = text_end;
    }

    let text = blank_run_re().replace_all(&out, "\n\n");
    (text.trim().to_string(), title)
}

/// Guess the text language with a deterministic heuristic.
///
/// CJK-heavy text maps to "zh", ASCII-letter-heavy text to "en",
/// anything else to the fallback.
pub fn guess_language(text: &str, fallback: &str) -> String {
    let sample: String = text.chars().take(4000).collect();
    if sample.trim().is_empty() {
        return fallback.to_string();
    }

    let mut letters = 0usize;
    let mut han = 0usize;
    let mut ascii = 0usize;
    for ch in sample.chars() {
        if ch.is_alphabetic() {
            letters += 1;
            if ('\u{4e00}'..='\u{9fff}').contains(&ch) {
                han += 1;
            } else if ch.is_ascii_alphabetic() {
                ascii += 1;
            }
        }
    }

    if letters == 0 {
        return fallback.to_string();
    }
    if han as f64 / letters as f64 > 0.15 {
        return "zh".to_string();
    }
    if ascii as f64 / letters as f64 > 0.5 {
        return "en".to_string();
    }
    fallback.to_string()
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("static pattern"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title").expect("static pattern"))
}

fn extract_title(html: &str) -> String {
    match title_re().captures(html) {
        Some(caps) => decode_entities(caps[1].trim()),
        None => String::new(),
    }
}

fn tag_name(tag_body: &str) -> String {
    tag_body
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Advance past the matching close tag of a skipped subtree.
fn skip_subtree(html: &str, from: usize, name: &str) -> usize {
    let close = format!("</{}", name);
    match find_ascii_ci(&html.as_bytes()[from..], close.as_bytes()) {
        Some(offset) => {
            let after = from + offset;
            match html[after..].find('>') {
                Some(end) => after + end + 1,
                None => html.len(),
            }
        }
        None => html.len(),
    }
}

/// Case-insensitive byte search for an ASCII needle. The needle always
/// starts with `<`, so a match offset is a char boundary in UTF-8 text.
fn find_ascii_ci(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let semi = rest
            .char_indices()
            .take(10)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);
        let Some(semi) = semi else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => decode_numeric_entity(entity),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_text_and_title() {
        let html = "<html><head><title>My Clip</title>\
                    <style>body { color: red; }</style></head>\
                    <body><p>First paragraph</p><p>Second &amp; third</p>\
                    <script>alert('x');</script></body></html>";
        let (text, title) = extract_text_from_html(html);
        assert_eq!(title, "My Clip");
        assert!(text.contains("First paragraph"));
        assert!(text.contains("Second & third"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("alert"));
    }

    #[test]
    fn test_block_tags_break_lines() {
        let (text, _) = extract_text_from_html("<div>one</div><div>two</div>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn test_numeric_entities_decoded() {
        let (text, _) = extract_text_from_html("<p>caf&#233; &#x4e2d;</p>");
        assert_eq!(text, "caf\u{e9} \u{4e2d}");
    }

    #[test]
    fn test_title_after_multibyte_text() {
        // Case-folding 'İ' changes byte length; offsets must come from
        // the original string.
        let (_, title) =
            extract_text_from_html("<p>İstanbul İzmir İçel notes</p><title>My Title</title>");
        assert_eq!(title, "My Title");

        let (text, title) = extract_text_from_html("<p>İ</p><TITLE>中文标题</TITLE>");
        assert_eq!(title, "中文标题");
        assert!(text.contains('İ'));
    }

    #[test]
    fn test_skipped_subtree_with_multibyte_content() {
        let html = "<p>before</p><SCRIPT>var s = 'İİİ';</SCRIPT><p>after</p>";
        let (text, _) = extract_text_from_html(html);
        assert!(text.contains("before"));
        assert!(text.contains("after"));
        assert!(!text.contains("var s"));
    }

    #[test]
    fn test_comments_skipped() {
        let (text, _) = extract_text_from_html("a<!-- hidden <b>bold</b> -->b");
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_guess_language() {
        assert_eq!(guess_language("The quick brown fox jumps over", "und"), "en");
        assert_eq!(guess_language("这是一段中文笔记内容，用于测试。", "und"), "zh");
        assert_eq!(guess_language("", "und"), "und");
        assert_eq!(guess_language("12345 67890", "fr"), "fr");
    }
}
