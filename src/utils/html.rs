// src/utils/html.rs

/// Sanitizes user-supplied rich text with ammonia's whitelist.
///
/// Safe formatting tags survive; `<script>`, event handler attributes and
/// the like are stripped. Used for issue descriptions and replies, which
/// are rendered by the dashboard.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_keeps_formatting() {
        let cleaned = clean_html("<b>Timer froze</b><script>alert(1)</script>");
        assert_eq!(cleaned, "<b>Timer froze</b>");
    }

    #[test]
    fn strips_event_handlers() {
        let cleaned = clean_html(r#"<a href="https://x.test" onclick="evil()">link</a>"#);
        assert!(!cleaned.contains("onclick"));
        assert!(cleaned.contains("link"));
    }
}
