//! Placeholder substitution for explanation templates.
//!
//! Placeholders are written `{name}`. A placeholder the lookup does not know
//! is kept verbatim, braces included, so templates can mention keys that only
//! a later stage fills in.

/// Render a template, substituting each `{name}` the lookup resolves.
pub fn render<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unterminated placeholder.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render against a fixed list of `(name, value)` bindings.
pub fn render_with(template: &str, bindings: &[(&str, &str)]) -> String {
    render(template, |name| {
        bindings
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    })
}
