//! HTML escaping for the `form_post` response document.

use std::fmt::Write as _;

/// Escape a string for safe interpolation into HTML attribute values and
/// element content.
///
/// Every parameter name and value rendered into the auto-posting form goes
/// through this function.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Render a hidden `<input>` element with an escaped name and value.
pub(crate) fn hidden_input(out: &mut String, name: &str, value: &str) {
    let _ = write!(
        out,
        r#"<input type="hidden" name="{}" value="{}" />"#,
        escape(name),
        escape(value)
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x&y')</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&#x27;)&lt;/script&gt;"
        );
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(escape("state-123_xyz.~"), "state-123_xyz.~");
    }

    #[test]
    fn input_rendering() {
        let mut out = String::new();
        hidden_input(&mut out, "state", "a\"b");
        assert_eq!(out, r#"<input type="hidden" name="state" value="a&quot;b" />"#);
    }
}
