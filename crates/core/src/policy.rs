//! Element admission policy.
//!
//! A policy is a comma separated list of glob patterns. Patterns prefixed
//! with `!` deny, all others allow, e.g. `eth*,!eth1`.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl Policy {
    pub fn parse(spec: &str) -> Self {
        let mut policy = Self::default();

        for rule in spec.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match rule.strip_prefix('!') {
                Some(pattern) if !pattern.is_empty() => policy.denied.push(pattern.to_string()),
                Some(_) => {}
                None => policy.allowed.push(rule.to_string()),
            }
        }

        policy
    }

    pub fn allow_rules(&self) -> &[String] {
        &self.allowed
    }

    pub fn deny_rules(&self) -> &[String] {
        &self.denied
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty() && self.denied.is_empty()
    }

    /// Whether an element named `name` may be created
    pub fn is_allowed(&self, name: &str) -> bool {
        if self.denied.iter().any(|rule| match_mask(rule, name)) {
            return false;
        }

        self.allowed.is_empty() || self.matches_allow_rule(name)
    }

    pub fn matches_allow_rule(&self, name: &str) -> bool {
        self.allowed.iter().any(|rule| match_mask(rule, name))
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self
            .allowed
            .iter()
            .cloned()
            .chain(self.denied.iter().map(|r| format!("!{}", r)))
            .collect();
        f.write_str(&rules.join(","))
    }
}

/// Case-insensitive glob match.
///
/// `*` skips to the first occurrence of the following pattern character, a
/// trailing `*` matches anything. There is no backtracking: `*x` commits to
/// the first `x` found.
pub fn match_mask(mask: &str, name: &str) -> bool {
    let mask: Vec<char> = mask.chars().flat_map(char::to_lowercase).collect();
    let name: Vec<char> = name.chars().flat_map(char::to_lowercase).collect();

    let mut n = 0;
    for (i, c) in mask.iter().enumerate() {
        if *c == '*' {
            let Some(next) = mask.get(i + 1) else {
                return true;
            };
            while name.get(n) != Some(next) {
                if n >= name.len() {
                    return false;
                }
                n += 1;
            }
        } else {
            if name.get(n) != Some(c) {
                return false;
            }
            n += 1;
        }
    }

    n == name.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_and_deny() {
        let policy = Policy::parse("eth*,!eth1");
        assert!(policy.is_allowed("eth0"));
        assert!(!policy.is_allowed("eth1"));
        assert!(!policy.is_allowed("lo"));
    }

    #[test]
    fn test_empty_policy_permits() {
        let policy = Policy::parse("");
        assert!(policy.is_empty());
        assert!(policy.is_allowed("anything"));
    }

    #[test]
    fn test_deny_only() {
        let policy = Policy::parse("!lo, !dummy*");
        assert!(policy.is_allowed("eth0"));
        assert!(!policy.is_allowed("lo"));
        assert!(!policy.is_allowed("dummy3"));
        assert_eq!(policy.to_string(), "!lo,!dummy*");
    }

    #[test]
    fn test_match_mask() {
        assert!(match_mask("eth*", "eth0"));
        assert!(match_mask("ETH*", "eth0"));
        assert!(match_mask("*", ""));
        assert!(match_mask("e*0", "eth0"));
        assert!(match_mask("eth0", "eth0"));
        assert!(!match_mask("eth0", "eth01"));
        assert!(!match_mask("eth", "eth0"));
        assert!(!match_mask("e*1", "eth0"));
    }

    #[test]
    fn test_star_commits_to_first_match() {
        // `*0` stops at the first '0', leaving "00" unmatched by "0"
        assert!(!match_mask("a*0", "a000"));
        assert!(match_mask("a*0*", "a000"));
    }
}
