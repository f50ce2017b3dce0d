// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection predicate evaluation.
//!
//! Both sides are trimmed and lowercased before comparing, so `" YES "`
//! satisfies `equals "yes"`.

use shopchat_core::{FlowConnection, Predicate};

pub fn matches(predicate: &Predicate, text: &str) -> bool {
    let input = text.trim().to_lowercase();
    let fold = |v: &str| v.trim().to_lowercase();
    match predicate {
        Predicate::Always => true,
        Predicate::Equals(v) => input == fold(v),
        Predicate::Contains(v) => input.contains(&fold(v)),
        Predicate::StartsWith(v) => input.starts_with(&fold(v)),
        Predicate::EndsWith(v) => input.ends_with(&fold(v)),
    }
}

/// First connection, in listing order, whose predicate accepts `text`.
pub fn first_match<'a>(connections: &'a [FlowConnection], text: &str) -> Option<&'a FlowConnection> {
    connections.iter().find(|c| matches(&c.predicate, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn edge(to: &str, predicate: Predicate) -> FlowConnection {
        FlowConnection {
            flow_id: 1,
            source_node_id: "menu".into(),
            target_node_id: to.into(),
            predicate,
        }
    }

    #[test]
    fn comparisons_fold_case_and_whitespace() {
        assert!(matches(&Predicate::Equals("Yes".into()), "  yES "));
        assert!(matches(&Predicate::Contains("ORDER".into()), "where is my order?"));
        assert!(matches(&Predicate::StartsWith("track".into()), "Track ORD-1"));
        assert!(matches(&Predicate::EndsWith("please".into()), "help PLEASE"));
        assert!(!matches(&Predicate::Equals("1".into()), "11"));
        assert!(matches(&Predicate::Always, ""));
    }

    #[test]
    fn first_matching_edge_wins() {
        let edges = vec![
            edge("one", Predicate::Equals("1".into())),
            edge("any-digit", Predicate::StartsWith("1".into())),
            edge("fallback", Predicate::Always),
        ];
        assert_eq!(first_match(&edges, "1").unwrap().target_node_id, "one");
        assert_eq!(first_match(&edges, "12").unwrap().target_node_id, "any-digit");
        assert_eq!(first_match(&edges, "9").unwrap().target_node_id, "fallback");
        assert!(first_match(&edges[..2], "9").is_none());
        assert!(first_match(&[], "9").is_none());
    }

    proptest! {
        #[test]
        fn equals_is_case_insensitive(s in "[a-zA-Z0-9 ]{0,20}") {
            let p = Predicate::Equals(s.to_uppercase());
            prop_assert!(matches(&p, &s.to_lowercase()));
        }

        #[test]
        fn contains_accepts_any_affix(prefix in "[a-z]{0,8}", word in "[a-z]{1,8}", suffix in "[a-z]{0,8}") {
            let p = Predicate::Contains(word.to_uppercase());
            let text = format!("{prefix}{word}{suffix}");
            prop_assert!(matches(&p, &text));
        }
    }
}
