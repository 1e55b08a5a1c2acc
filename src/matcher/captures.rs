use std::collections::BTreeMap;

/// Key under which matchers store the free-text remainder of a command.
pub const FULL_MATCH: &str = "match";

/// Named values extracted from a message by a successful match.
///
/// All accessors are permissive: a missing key reads as an empty string or
/// zero, so command handlers treat "absent" and "empty" the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    values: BTreeMap<String, String>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Value for `key`, or an empty string.
    pub fn get_string(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value for `key` parsed as an integer, or 0 when missing or non-numeric.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get_string(key).trim().parse().unwrap_or(0)
    }

    /// True when `key` holds a non-empty value. `"0"` counts as present.
    pub fn has(&self, key: &str) -> bool {
        !self.get_string(key).is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Captures {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut captures = Captures::new();
        for (key, value) in iter {
            captures.set(key, value);
        }
        captures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_string_defaults_to_empty() {
        let captures = Captures::from_iter([("name", "deploy-bot")]);
        assert_eq!(captures.get_string("name"), "deploy-bot");
        assert_eq!(captures.get_string("missing"), "");
    }

    #[test]
    fn test_get_int_is_permissive() {
        let captures = Captures::from_iter([("count", "12"), ("word", "twelve"), ("neg", "-3")]);
        assert_eq!(captures.get_int("count"), 12);
        assert_eq!(captures.get_int("neg"), -3);
        assert_eq!(captures.get_int("word"), 0);
        assert_eq!(captures.get_int("missing"), 0);
    }

    #[test]
    fn test_has_treats_zero_as_present() {
        let captures = Captures::from_iter([("zero", "0"), ("empty", "")]);
        assert!(captures.has("zero"));
        assert!(!captures.has("empty"));
        assert!(captures.contains_key("empty"));
        assert!(!captures.has("missing"));
    }
}
