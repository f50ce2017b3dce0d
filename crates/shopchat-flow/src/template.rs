// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{{name}}` placeholder substitution.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

// Any variable name a question node can store, including non-ASCII and
// multi-word names. Surrounding whitespace is not part of the name.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

fn name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(1)
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

/// Replace every `{{name}}` whose variable is set. Unknown placeholders are
/// left exactly as written.
pub fn render<'a>(template: &'a str, variables: &BTreeMap<String, String>) -> Cow<'a, str> {
    PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        match name(caps).and_then(|name| variables.get(name)) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    })
}

/// Names referenced by the template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        if let Some(name) = name(&caps)
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}
