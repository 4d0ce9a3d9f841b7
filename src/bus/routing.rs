//! Routing keys and topic binding patterns.
//!
//! Keys are dot-delimited words (`LOG.INFO`). Patterns use AMQP topic
//! semantics: `*` matches exactly one word, `#` matches zero or more words.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An exact routing key used when publishing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingKey(String);

impl RoutingKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first dot-delimited word, e.g. `LOG` for `LOG.INFO`.
    pub fn namespace(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutingKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RoutingKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A binding pattern used when subscribing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingPattern(String);

impl RoutingPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `key` is routed to a queue bound with this pattern.
    pub fn matches(&self, key: &RoutingKey) -> bool {
        let pattern: Vec<&str> = self.0.split('.').collect();
        let words: Vec<&str> = key.as_str().split('.').collect();
        match_words(&pattern, &words)
    }
}

impl fmt::Display for RoutingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoutingPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for RoutingPattern {
    fn from(pattern: String) -> Self {
        Self(pattern)
    }
}

impl From<RoutingKey> for RoutingPattern {
    fn from(key: RoutingKey) -> Self {
        Self(key.0)
    }
}

fn match_words(pattern: &[&str], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((head, rest)) if *head == "#" => {
            (0..=words.len()).any(|skip| match_words(rest, &words[skip..]))
        }
        Some((head, rest)) => match words.split_first() {
            Some((word, remaining)) if *head == "*" || head == word => {
                match_words(rest, remaining)
            }
            _ => false,
        },
    }
}
