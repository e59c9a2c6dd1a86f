use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One configured rewrite: replace matches of `regex` in the item child named `field`.
///
/// Every attribute is optional at load time. Completeness is checked when the rule is
/// applied, so a malformed entry never prevents the service from starting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

impl Rule {
    pub fn new(field: &str, regex: &str, replacement: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            regex: Some(regex.to_string()),
            replacement: Some(replacement.to_string()),
        }
    }

    /// Builds a rule from one element of the configured array.
    ///
    /// Attributes that are not strings are treated as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };
        Self {
            field: text("field"),
            regex: text("regex"),
            replacement: text("replacement"),
        }
    }

    /// `field` and `regex` must be non-empty; `replacement` only has to be present.
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        let field = self.field.as_deref().filter(|f| !f.is_empty())?;
        let regex = self.regex.as_deref().filter(|r| !r.is_empty())?;
        let replacement = self.replacement.as_deref()?;
        Some((field, regex, replacement))
    }

    pub fn is_complete(&self) -> bool {
        self.parts().is_some()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// A rule together with the outcome of compiling its pattern.
#[derive(Debug, Clone)]
pub struct PreparedRule {
    pub rule: Rule,
    pub pattern: Option<Result<Regex, regex::Error>>,
}

impl PreparedRule {
    pub fn new(rule: Rule) -> Self {
        let pattern = rule.parts().map(|(_, regex, _)| Regex::new(regex));
        Self { rule, pattern }
    }
}

/// Ordered rules, applied first to last.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PreparedRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: rules.into_iter().map(PreparedRule::new).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the TRANSFORM_RULES value. Never fails: malformed input yields an empty set.
    pub fn from_config(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(json) => Self::from_json(json),
            None => {
                tracing::info!("No transformation rules provided.");
                Self::empty()
            }
        }
    }

    pub fn from_json(json: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Error decoding TRANSFORM_RULES: {}", e);
                return Self::empty();
            }
        };

        let serde_json::Value::Array(entries) = value else {
            tracing::error!("Error decoding TRANSFORM_RULES: expected a JSON array of rules");
            return Self::empty();
        };

        let rules: Vec<Rule> = entries.iter().map(Rule::from_value).collect();
        tracing::info!("Loaded {} transformation rules.", rules.len());
        Self::new(rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PreparedRule> {
        self.rules.iter()
    }
}
