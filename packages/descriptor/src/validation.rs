//! # Declarative Validation Rules
//!
//! `validation` blocks on descriptors are turned into `isInvalid` checks at
//! compile time. The generated check reads the field's own value out of the
//! data it is handed, so the engine can run it against a hypothetical next
//! document before committing.
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! 1. `required`: null, blank string, empty array or `false` fail
//! 2. empty values pass every remaining rule
//! 3. `minLength` / `maxLength` (characters, or array items)
//! 4. `numeric`, then `minNum` / `maxNum`
//! 5. `pattern` (regex, must match somewhere in the string)
//!
//! A user `isInvalid` runs after the rules.

use crate::callbacks::Check;
use crate::errors::CompileError;
use formloom_document::FieldPath;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_REQUIRED: &str = "required";
pub const MSG_NUMERIC: &str = "must be a number";
pub const MSG_PATTERN: &str = "invalid format";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub numeric: bool,
    pub min_num: Option<f64>,
    pub max_num: Option<f64>,
    pub pattern: Option<String>,
}

impl ValidationRules {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    pub fn with_min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn with_max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn with_numeric(mut self) -> Self {
        self.numeric = true;
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_num = min;
        self.max_num = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Rules with the pattern compiled once
#[derive(Debug, Clone)]
pub(crate) struct RuleSet {
    rules: ValidationRules,
    pattern: Option<Regex>,
}

impl RuleSet {
    pub(crate) fn compile(rules: &ValidationRules, field: &str) -> Result<Self, CompileError> {
        let pattern = rules
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| CompileError::InvalidPattern {
                field: field.to_string(),
                source,
            })?;

        Ok(Self {
            rules: rules.clone(),
            pattern,
        })
    }

    pub(crate) fn check(&self, value: &Value) -> Option<String> {
        let rules = &self.rules;

        if is_blank(value) {
            return rules.required.then(|| MSG_REQUIRED.to_string());
        }

        if let Some(len) = length_of(value) {
            if let Some(min) = rules.min_length {
                if len < min {
                    return Some(format!("must be at least {} characters", min));
                }
            }
            if let Some(max) = rules.max_length {
                if len > max {
                    return Some(format!("must be at most {} characters", max));
                }
            }
        }

        if rules.numeric || rules.min_num.is_some() || rules.max_num.is_some() {
            let Some(number) = as_number(value) else {
                return Some(MSG_NUMERIC.to_string());
            };
            if let Some(min) = rules.min_num {
                if number < min {
                    return Some(format!("must be at least {}", min));
                }
            }
            if let Some(max) = rules.max_num {
                if number > max {
                    return Some(format!("must be at most {}", max));
                }
            }
        }

        if let (Some(pattern), Value::String(s)) = (&self.pattern, value) {
            if !pattern.is_match(s) {
                return Some(MSG_PATTERN.to_string());
            }
        }

        None
    }
}

/// Build the `isInvalid` check for a field: rules first, then `existing`
pub(crate) fn inject(rules: RuleSet, path: FieldPath, existing: Option<Check>) -> Check {
    Check::new(move |data, payload| {
        let value = path.read(data);
        rules
            .check(&value)
            .or_else(|| existing.as_ref().and_then(|check| check.call(data, payload)))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules(rules: ValidationRules) -> RuleSet {
        RuleSet::compile(&rules, "field").unwrap()
    }

    #[test]
    fn test_required() {
        let set = rules(ValidationRules::required());
        assert_eq!(set.check(&json!("")), Some("required".to_string()));
        assert_eq!(set.check(&json!("   ")), Some("required".to_string()));
        assert_eq!(set.check(&Value::Null), Some("required".to_string()));
        assert_eq!(set.check(&json!([])), Some("required".to_string()));
        assert_eq!(set.check(&json!(false)), Some("required".to_string()));
        assert_eq!(set.check(&json!("x")), None);
    }

    #[test]
    fn test_empty_optional_value_skips_rules() {
        let set = rules(ValidationRules::default().with_min_length(3).with_numeric());
        assert_eq!(set.check(&json!("")), None);
    }

    #[test]
    fn test_length_bounds() {
        let set = rules(ValidationRules::default().with_min_length(2).with_max_length(4));
        assert!(set.check(&json!("a")).is_some());
        assert!(set.check(&json!("abcde")).is_some());
        assert_eq!(set.check(&json!("abc")), None);
        // Characters, not bytes
        assert_eq!(set.check(&json!("øæå")), None);
    }

    #[test]
    fn test_numeric_range() {
        let set = rules(ValidationRules::default().with_range(Some(1.0), Some(10.0)));
        assert_eq!(set.check(&json!("abc")), Some(MSG_NUMERIC.to_string()));
        assert_eq!(set.check(&json!("0")), Some("must be at least 1".to_string()));
        assert_eq!(set.check(&json!(11)), Some("must be at most 10".to_string()));
        assert_eq!(set.check(&json!(" 5 ")), None);
    }

    #[test]
    fn test_pattern() {
        let set = rules(ValidationRules::default().with_pattern(r"^[^@]+@[^@]+$"));
        assert_eq!(set.check(&json!("nope")), Some(MSG_PATTERN.to_string()));
        assert_eq!(set.check(&json!("a@b.com")), None);
    }

    #[test]
    fn test_bad_pattern_is_compile_error() {
        let err = RuleSet::compile(&ValidationRules::default().with_pattern("("), "email");
        assert!(matches!(err, Err(CompileError::InvalidPattern { .. })));
    }

    #[test]
    fn test_injected_check_runs_user_check_last() {
        let set = rules(ValidationRules::required());
        let user = Check::new(|data, _| (data["pin"] == json!("0000")).then(|| "weak".to_string()));
        let check = inject(set, FieldPath::parse("pin").unwrap(), Some(user));

        assert_eq!(check.call(&json!({"pin": ""}), &Value::Null), Some("required".to_string()));
        assert_eq!(check.call(&json!({"pin": "0000"}), &Value::Null), Some("weak".to_string()));
        assert_eq!(check.call(&json!({"pin": "1234"}), &Value::Null), None);
    }

    #[test]
    fn test_rules_deserialize_camel_case() {
        let parsed: ValidationRules =
            serde_json::from_str(r#"{"required": true, "minLength": 2, "maxNum": 5}"#).unwrap();
        assert!(parsed.required);
        assert_eq!(parsed.min_length, Some(2));
        assert_eq!(parsed.max_num, Some(5.0));
        assert!(!parsed.numeric);
    }
}
