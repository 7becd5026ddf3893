//! `{{key}}` placeholder substitution.

use std::collections::HashMap;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replaces `{{key}}` placeholders with values from `data`.
///
/// One left-to-right pass: substituted values are not scanned again and
/// placeholders without a value are kept verbatim. No escaping is applied.
#[must_use]
pub fn render_template<S: std::hash::BuildHasher>(
    template: &str,
    data: &HashMap<String, String, S>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        if let Some(value) = data.get(&after_open[..end]) {
            out.push_str(value);
            rest = &after_open[end + CLOSE.len()..];
        } else {
            // Unknown key: keep the braces and resume inside them.
            out.push_str(OPEN);
            rest = after_open;
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_known_key() {
        assert_eq!(render_template("Hi {{name}}", &data(&[("name", "Ann")])), "Hi Ann");
    }

    #[test]
    fn test_unmatched_kept_verbatim() {
        let rendered = render_template("Hi {{name}}, see {{link}}", &data(&[("name", "Ann")]));
        assert_eq!(rendered, "Hi Ann, see {{link}}");
    }

    #[test]
    fn test_repeated_and_adjacent() {
        let rendered = render_template("{{a}}{{b}}{{a}}", &data(&[("a", "1"), ("b", "2")]));
        assert_eq!(rendered, "121");
    }

    #[test]
    fn test_unclosed_placeholder() {
        assert_eq!(render_template("Hi {{name", &data(&[("name", "Ann")])), "Hi {{name");
    }

    #[test]
    fn test_nested_open_resolves_inner() {
        let rendered = render_template("{{x {{name}}", &data(&[("name", "Ann")]));
        assert_eq!(rendered, "{{x Ann");
    }

    #[test]
    fn test_values_not_rescanned() {
        let rendered = render_template(
            "{{a}}",
            &data(&[("a", "{{b}}"), ("b", "should not appear")]),
        );
        assert_eq!(rendered, "{{b}}");
    }

    proptest! {
        #[test]
        fn prop_text_without_braces_unchanged(text in "[^{}]*") {
            prop_assert_eq!(render_template(&text, &data(&[("k", "v")])), text);
        }

        #[test]
        fn prop_empty_data_is_identity(text in ".*") {
            prop_assert_eq!(render_template(&text, &HashMap::new()), text);
        }

        #[test]
        fn prop_single_placeholder(
            prefix in "[^{}]*",
            key in "[a-z_]{1,12}",
            value in ".*",
            suffix in "[^{}]*",
        ) {
            let template = format!("{prefix}{{{{{key}}}}}{suffix}");
            let rendered = render_template(&template, &data(&[(key.as_str(), value.as_str())]));
            prop_assert_eq!(rendered, format!("{prefix}{value}{suffix}"));
        }
    }
}
