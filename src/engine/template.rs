//! Replacement templates.
//!
//! `$(name)` expands to the text captured under `name` by the match being
//! replaced. Placeholders naming nothing captured are kept verbatim.

use std::collections::HashMap;

use crate::schema::keyword::is_symbol_char;

pub fn expand(template: &str, captured: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("$(") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let name_len = after
            .find(|c: char| !is_symbol_char(c))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        match captured.get(name) {
            Some(value) if !name.is_empty() && after[name_len..].starts_with(')') => {
                out.push_str(value);
                rest = &after[name_len + 1..];
            }
            _ => {
                out.push_str("$(");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
