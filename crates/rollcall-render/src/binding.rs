//! Placeholder substitution for compiled templates
//!
//! `{{ key }}` placeholders are replaced with the HTML-escaped value bound to
//! `key`. Unknown keys render as empty strings.

use regex::{Captures, Regex};
use rollcall_core::{BindingData, RenderError};

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

/// Compiled placeholder binder
#[derive(Debug, Clone)]
pub struct TemplateBinder {
    pattern: Regex,
}

impl TemplateBinder {
    /// Compile the placeholder pattern
    ///
    /// # Errors
    /// - `RenderError::Binding` if the pattern fails to compile
    pub fn new() -> Result<Self, RenderError> {
        let pattern = Regex::new(PLACEHOLDER).map_err(|e| RenderError::Binding(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Substitute every placeholder in `markup`
    #[must_use]
    pub fn bind(&self, markup: &str, data: &BindingData) -> String {
        self.pattern
            .replace_all(markup, |caps: &Captures<'_>| {
                data.get(&caps[1]).map(escape_html).unwrap_or_default()
            })
            .into_owned()
    }

    /// Placeholder keys referenced by `markup`, in order of appearance
    #[must_use]
    pub fn keys<'a>(&self, markup: &'a str) -> Vec<&'a str> {
        self.pattern
            .captures_iter(markup)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}

/// Escape text for inclusion in HTML content or attribute values
#[must_use]
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binder() -> TemplateBinder {
        TemplateBinder::new().unwrap()
    }

    #[test]
    fn substitutes_known_keys() {
        let data = BindingData::new()
            .with("full_name", "Ada Lovelace")
            .with("event_name", "Summit");
        let out = binder().bind("<p>{{full_name}} at {{ event_name }}</p>", &data);
        assert_eq!(out, "<p>Ada Lovelace at Summit</p>");
    }

    #[test]
    fn unknown_keys_become_empty() {
        let out = binder().bind("[{{ missing }}]", &BindingData::new());
        assert_eq!(out, "[]");
    }

    #[test]
    fn values_are_html_escaped() {
        let data = BindingData::new().with("name", "<script>\"x\" & 'y'</script>");
        let out = binder().bind("{{ name }}", &data);
        assert_eq!(
            out,
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn dotted_attribute_keys_are_supported() {
        let data = BindingData::new().with("attr.table", "12");
        assert_eq!(binder().bind("Table {{ attr.table }}", &data), "Table 12");
    }

    #[test]
    fn lists_referenced_keys() {
        let keys = binder().keys("{{ a }} {{b}} {{ a }}");
        assert_eq!(keys, vec!["a", "b", "a"]);
    }

    #[test]
    fn markup_without_placeholders_is_unchanged() {
        let markup = "<div style=\"color: {red}\">static</div>";
        assert_eq!(binder().bind(markup, &BindingData::new()), markup);
    }
}
