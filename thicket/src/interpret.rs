//! Mapping raw oracle text onto the tokens the pipeline expects.
//!
//! Both parsers return `None` for malformed text; callers pick the safe default
//! for their context (neutral grade, "not violated", "not answerable", reject).

use serde::{Deserialize, Serialize};

/// Reads a leading yes/no token, ignoring case, surrounding whitespace, quotes
/// and trailing punctuation: `" Yes."` is `Some(true)`, `"no, because"` is `Some(false)`.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let word: String = text
        .trim_start_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '*')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    match word.as_str() {
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => None,
    }
}

/// Integer grading scale. `neutral` is the "no information" grade and contributes 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeScale {
    pub min: i32,
    pub max: i32,
    pub neutral: i32,
}

impl Default for GradeScale {
    /// 1..=9 recentered on 5, i.e. contributions -4..=+4.
    fn default() -> Self {
        Self {
            min: 1,
            max: 9,
            neutral: 5,
        }
    }
}

impl GradeScale {
    pub fn is_valid(&self) -> bool {
        self.min <= self.neutral && self.neutral <= self.max
    }

    /// Parses the leading integer of `text` and returns its contribution
    /// (`grade - neutral`), or `None` when there is no integer or it is out of range.
    pub fn parse_contribution(&self, text: &str) -> Option<i32> {
        let trimmed = text.trim_start();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        let grade: i32 = digits.parse().ok()?;
        if grade < self.min || grade > self.max {
            return None;
        }
        Some(grade - self.neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_variants() {
        assert_eq!(parse_yes_no("yes"), Some(true));
        assert_eq!(parse_yes_no(" Yes."), Some(true));
        assert_eq!(parse_yes_no("\"NO\""), Some(false));
        assert_eq!(parse_yes_no("no, the second step is wrong"), Some(false));
        assert_eq!(parse_yes_no("True"), Some(true));
        assert_eq!(parse_yes_no("**No**"), Some(false));
    }

    #[test]
    fn yes_no_malformed() {
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no("yesterday"), None);
        assert_eq!(parse_yes_no("42"), None);
    }

    #[test]
    fn grade_contribution_is_recentered() {
        let scale = GradeScale::default();
        assert_eq!(scale.parse_contribution("5"), Some(0));
        assert_eq!(scale.parse_contribution("9"), Some(4));
        assert_eq!(scale.parse_contribution(" 1 - poor"), Some(-4));
        assert_eq!(scale.parse_contribution("7/9"), Some(2));
    }

    #[test]
    fn grade_out_of_range_or_missing_is_malformed() {
        let scale = GradeScale::default();
        assert_eq!(scale.parse_contribution("0"), None);
        assert_eq!(scale.parse_contribution("10"), None);
        assert_eq!(scale.parse_contribution("seven"), None);
        assert_eq!(scale.parse_contribution(""), None);
    }

    #[test]
    fn custom_scale() {
        let scale = GradeScale {
            min: 0,
            max: 10,
            neutral: 0,
        };
        assert!(scale.is_valid());
        assert_eq!(scale.parse_contribution("10"), Some(10));
        assert!(!GradeScale {
            min: 3,
            max: 9,
            neutral: 1
        }
        .is_valid());
    }
}
