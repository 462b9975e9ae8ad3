use crate::types::BufferItem;
use regex::Regex;
use std::sync::OnceLock;

fn reasoning_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>|<think>.*?</think>|<reasoning>.*?</reasoning>")
            .expect("valid reasoning regex")
    })
}

const PROMPT_HEADER: &str = "Please analyze and respond to the following collected items:";
const PROMPT_FOOTER: &str = "Please provide a helpful response based on these items.";

/// Builds the single user message sent for a collection.
pub fn build_collection_prompt(items: &[BufferItem]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(items.len() * 3 + 3);
    parts.push(PROMPT_HEADER.into());
    parts.push(String::new());

    for (i, item) in items.iter().enumerate() {
        parts.push(format!("--- Item {} ---", i + 1));
        parts.push(item.as_str().to_string());
        parts.push(String::new());
    }

    parts.push(PROMPT_FOOTER.into());
    parts.join("\n")
}

/// Strips model reasoning blocks and surrounding whitespace.
pub fn filter_response_output(text: &str) -> String {
    let out = reasoning_block_re().replace_all(text, "");
    out.trim().to_string()
}

/// Single-line preview, cut at `max_chars` characters with an ellipsis.
pub fn preview_text(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .collect();

    if flat.chars().count() <= max_chars {
        return flat;
    }

    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_numbers_items_in_order() {
        let items = vec![
            BufferItem::new("first").unwrap(),
            BufferItem::new("second").unwrap(),
        ];
        let prompt = build_collection_prompt(&items);
        assert!(prompt.starts_with(PROMPT_HEADER));
        assert!(prompt.ends_with(PROMPT_FOOTER));
        let one = prompt.find("--- Item 1 ---\nfirst").unwrap();
        let two = prompt.find("--- Item 2 ---\nsecond").unwrap();
        assert!(one < two);
    }

    #[test]
    fn response_filter_strips_reasoning() {
        assert_eq!(
            filter_response_output("<think>plan</think>\n  Answer  "),
            "Answer"
        );
        assert_eq!(filter_response_output("<reasoning>x</reasoning>"), "");
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview_text("a\nb", 10), "a b");
        assert_eq!(preview_text("abcdef", 3), "abc...");
        assert_eq!(preview_text("héllo", 5), "héllo");
    }
}
