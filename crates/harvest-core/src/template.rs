//! Request template substitution
//!
//! Resolves `{{name}}` placeholders in request templates against the rolling
//! parameter set of an extraction. Resolution is a single pass: a substituted
//! value that itself contains a placeholder is never re-resolved, so
//! self-referential parameters cannot expand unboundedly.

use harvest_common::{HarvestError, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Placeholder syntax: `{{name}}`, names limited to word characters,
/// dots and dashes, optional inner whitespace.
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

/// Outcome of resolving one template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// The template with every known placeholder substituted
    pub text: String,
    /// Parameter names that were actually consumed
    pub consumed: BTreeSet<String>,
}

/// Single-pass `{{name}}` substitutor
///
/// One instance is owned per connection state; the compiled pattern is
/// reused across calls and never shared between sessions.
#[derive(Debug, Clone)]
pub struct ParameterSubstitutor {
    pattern: Regex,
}

impl Default for ParameterSubstitutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterSubstitutor {
    pub fn new() -> Self {
        Self {
            // The pattern is a compile-time constant; failure is a programming
            // error caught by the tests below.
            pattern: Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"),
        }
    }

    /// Resolve `template` against `params`.
    ///
    /// In non-strict mode an unresolved placeholder is left verbatim in the
    /// output and excluded from the consumed set. In strict mode the first
    /// unresolved placeholder is an error. Resolving an already-resolved
    /// string returns it unchanged with an empty consumed set.
    pub fn resolve(
        &self,
        template: &str,
        params: &BTreeMap<String, String>,
        strict: bool,
    ) -> Result<Resolved> {
        let mut text = String::with_capacity(template.len());
        let mut consumed = BTreeSet::new();
        let mut tail = 0;

        for captures in self.pattern.captures_iter(template) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let key = &captures[1];

            text.push_str(&template[tail..whole.start()]);
            match params.get(key) {
                Some(value) => {
                    text.push_str(value);
                    consumed.insert(key.to_string());
                }
                None if strict => {
                    return Err(HarvestError::Substitution(format!(
                        "unresolved placeholder '{}' in template",
                        whole.as_str()
                    )));
                }
                None => text.push_str(whole.as_str()),
            }
            tail = whole.end();
        }
        text.push_str(&template[tail..]);

        Ok(Resolved { text, consumed })
    }
}
