//! `{placeholder}` substitution for host URL templates

use crate::{UrlError, UrlResult};

/// Renders a template, replacing every `{key}` with its value
///
/// Placeholders without a value are an error so a misconfigured host never
/// produces a half-templated URL.
///
/// # Examples
///
/// ```
/// use publiccode_crawler::url::template::render;
///
/// let url = render(
///     "https://api.github.com/orgs/{org}/repos",
///     &[("org", "italia")],
/// )
/// .unwrap();
/// assert_eq!(url, "https://api.github.com/orgs/italia/repos");
/// ```
pub fn render(template: &str, values: &[(&str, &str)]) -> UrlResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('}') else {
            // Unbalanced brace, keep it literally
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let key = &after[..end];
        let value = values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| UrlError::UnknownPlaceholder {
                template: template.to_string(),
                placeholder: key.to_string(),
            })?;

        out.push_str(value);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Lists the placeholder names used by a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                found.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }

    found
}
