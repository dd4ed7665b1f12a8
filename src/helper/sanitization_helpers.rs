use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| Regex::new(r"(?s)```[\s\S]*?```").expect("code block pattern is valid"))
}

/// Escapes all HTML outside fenced code blocks (```), which are kept untouched.
/// Existing entities are decoded first so content is never double-escaped.
pub fn sanitize_markdown_content(markdown_input: &str) -> String {
    let mut code_blocks: Vec<String> = Vec::new();

    let with_placeholders = code_block_regex().replace_all(markdown_input, |caps: &regex::Captures| {
        code_blocks.push(caps[0].to_string());
        format!("__CODE_BLOCK_PLACEHOLDER_{}__", code_blocks.len() - 1)
    });

    let decoded = html_escape::decode_html_entities(&with_placeholders);
    let mut final_output = html_escape::encode_text(&decoded).to_string();

    for (i, block) in code_blocks.iter().enumerate() {
        let placeholder = format!("__CODE_BLOCK_PLACEHOLDER_{}__", i);
        final_output = final_output.replacen(&placeholder, block, 1);
    }

    final_output
}

/// Strips all HTML tags from input (titles, names, short text fields).
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Like `strip_all_html`, but maps blank results to `None`.
pub fn strip_optional(input: Option<&str>) -> Option<String> {
    input
        .map(|value| strip_all_html(value.trim()))
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_tags_and_scripts() {
        assert_eq!(strip_all_html("<b>Fern</b> grove"), "Fern grove");
        assert_eq!(strip_all_html("Owl<script>alert(1)</script>"), "Owl");
    }

    #[test]
    fn markdown_escapes_html_but_keeps_code_fences() {
        let input = "Hello <i>there</i>\n```\n<div>raw</div>\n```";
        let out = sanitize_markdown_content(input);
        assert!(out.starts_with("Hello &lt;i&gt;there&lt;/i&gt;"));
        assert!(out.contains("<div>raw</div>"));
    }

    #[test]
    fn markdown_does_not_double_escape() {
        assert_eq!(sanitize_markdown_content("a &amp; b"), "a &amp; b");
    }

    #[test]
    fn optional_blank_becomes_none() {
        assert_eq!(strip_optional(Some("   ")), None);
        assert_eq!(strip_optional(Some(" North trail ")), Some("North trail".to_string()));
        assert_eq!(strip_optional(None), None);
    }
}
