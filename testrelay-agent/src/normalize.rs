// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns raw framework test identifiers into display names.
//!
//! Frameworks deliver identifiers like `-[LoginTests test_login_success]`.
//! [`display_name`] isolates the method token and applies the configured
//! [`NameRuleSet`] to it, producing something a human wants to read on a
//! report page. The function is pure and idempotent: feeding its output back
//! in returns the same string, except when stripping the `test` prefix
//! uncovers yet another `test` prefix; a second pass strips that one too.

use crate::{config::NameRuleSet, errors::NormalizeError};

const TEST_PREFIX: &str = "test";

/// Normalizes a raw test identifier into a display name.
///
/// Identifiers of the form `-[Class method]` are reduced to their method
/// token; anything else is used whole, so already-normalized names pass
/// through unchanged. Rules then apply in a fixed order: prefix stripping,
/// underscore replacement, camel-case splitting. The result is trimmed.
pub fn display_name(raw: &str, rules: NameRuleSet) -> Result<String, NormalizeError> {
    let token = method_token(raw)?;

    let mut name = token.to_owned();
    if rules.strip_test_prefix {
        // Gated on the prefix actually being present, so a second pass over
        // an already-stripped name is a no-op.
        if let Some(stripped) = name.strip_prefix(TEST_PREFIX) {
            name = stripped.to_owned();
        }
    }
    if rules.whitespace_on_underscore {
        name = name.replace('_', " ");
    }
    if rules.whitespace_on_camel_case {
        name = split_camel_case(&name);
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(NormalizeError::EmptyName {
            raw: raw.to_owned(),
        });
    }
    Ok(name.to_owned())
}

/// Isolates the method name token from a raw identifier.
fn method_token(raw: &str) -> Result<&str, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::EmptyName {
            raw: raw.to_owned(),
        });
    }

    match trimmed
        .strip_prefix("-[")
        .and_then(|rest| rest.strip_suffix(']'))
    {
        Some(inner) => match inner.split_once(' ') {
            Some((_, method)) if !method.trim().is_empty() => Ok(method.trim()),
            _ => Err(NormalizeError::MissingMethodToken {
                raw: raw.to_owned(),
            }),
        },
        None => Ok(trimmed),
    }
}

/// Single forward scan inserting a space at each camel-case boundary.
///
/// A boundary is a cased-or-symbol character followed by an uppercase one;
/// whitespace and existing uppercase runs never trigger an insertion, which
/// keeps repeated application a fixed point.
fn split_camel_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len() + 4);
    let mut previous: Option<char> = None;
    for ch in input.chars() {
        if let Some(prev) = previous {
            if ch.is_uppercase() && !prev.is_uppercase() && !prev.is_whitespace() {
                output.push(' ');
            }
        }
        output.push(ch);
        previous = Some(ch);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    const ALL_RULES: NameRuleSet = NameRuleSet {
        strip_test_prefix: true,
        whitespace_on_underscore: true,
        whitespace_on_camel_case: true,
    };

    #[test]
    fn strips_class_qualifier_and_applies_rules() {
        assert_eq!(
            display_name("-[LoginTests test_login_success]", ALL_RULES).unwrap(),
            "login success"
        );
    }

    #[test_case("-[Suite testLoginSucceeds]", "Login Succeeds"; "camel split")]
    #[test_case("-[Suite test_checkout_flow]", "checkout flow"; "underscores")]
    #[test_case("-[Suite testHTTPSRedirect]", "HTTPSRedirect"; "uppercase run stays together")]
    #[test_case("-[Suite test1Password]", "1 Password"; "digit before uppercase splits")]
    #[test_case("plain_name", "plain name"; "unqualified identifier used whole")]
    fn normalization_grid(raw: &str, expected: &str) {
        assert_eq!(display_name(raw, ALL_RULES).unwrap(), expected);
    }

    #[test]
    fn rules_off_passes_method_token_through() {
        assert_eq!(
            display_name("-[LoginTests test_login_success]", NameRuleSet::default()).unwrap(),
            "test_login_success"
        );
    }

    #[test]
    fn bracketed_identifier_without_method_is_an_error() {
        assert_eq!(
            display_name("-[LoginTests]", ALL_RULES),
            Err(NormalizeError::MissingMethodToken {
                raw: "-[LoginTests]".to_owned()
            })
        );
    }

    #[test]
    fn identifier_normalizing_to_nothing_is_an_error() {
        assert!(matches!(
            display_name("-[Suite test]", ALL_RULES),
            Err(NormalizeError::EmptyName { .. })
        ));
        assert!(matches!(
            display_name("   ", ALL_RULES),
            Err(NormalizeError::EmptyName { .. })
        ));
    }

    fn rule_sets() -> impl Strategy<Value = NameRuleSet> {
        (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(strip_test_prefix, whitespace_on_underscore, whitespace_on_camel_case)| NameRuleSet {
                strip_test_prefix,
                whitespace_on_underscore,
                whitespace_on_camel_case,
            },
        )
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(
            method in "[a-zA-Z][a-zA-Z0-9_]{0,24}",
            rules in rule_sets(),
        ) {
            let raw = format!("-[GeneratedTests {method}]");
            if let Ok(once) = display_name(&raw, rules) {
                // Idempotence boundary: a stripped name that itself begins
                // with the prefix gets stripped again on the next pass.
                prop_assume!(!(rules.strip_test_prefix && once.starts_with(TEST_PREFIX)));
                let twice = display_name(&once, rules).expect("normalized names stay valid");
                prop_assert_eq!(once, twice);
            }
        }
    }
}
