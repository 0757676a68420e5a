//! Prompt templates with `$name` placeholders.
//!
//! Templates are parsed once at construction against a fixed set of placeholders
//! ([`Placeholder`]); an unrecognized `$identifier` is rejected there rather than
//! at render time. `$$` renders a literal `$`. A `$` not followed by an identifier
//! character is kept as-is, so prices like `$5` need no escaping.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TemplateError;

/// Values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The original problem statement passed to the search.
    Problem,
    /// Root framing plus the rendered reasoning steps.
    Path,
    /// The candidate thought or answer being judged.
    Candidate,
    /// A fatal/vital/graded criterion statement.
    Statement,
    /// A validation question, already rendered.
    Question,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "problem" => Some(Self::Problem),
            "path" => Some(Self::Path),
            "candidate" => Some(Self::Candidate),
            "statement" => Some(Self::Statement),
            "question" => Some(Self::Question),
            _ => None,
        }
    }
}

/// Record of values available while rendering. Unset fields render as empty text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContext<'a> {
    pub problem: Option<&'a str>,
    pub path: Option<&'a str>,
    pub candidate: Option<&'a str>,
    pub statement: Option<&'a str>,
    pub question: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    fn lookup(&self, p: Placeholder) -> &'a str {
        let v = match p {
            Placeholder::Problem => self.problem,
            Placeholder::Path => self.path,
            Placeholder::Candidate => self.candidate,
            Placeholder::Statement => self.statement,
            Placeholder::Question => self.question,
        };
        v.unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Slot(Placeholder),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '$' {
                text.push(c);
                continue;
            }
            match chars.peek().copied() {
                Some((_, '$')) => {
                    chars.next();
                    text.push('$');
                }
                Some((start, next)) if is_ident_start(next) => {
                    let mut end = start;
                    while let Some((i, ch)) = chars.peek().copied() {
                        if is_ident_char(ch) {
                            end = i + ch.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let name = &source[start..end];
                    let slot = Placeholder::parse(name).ok_or_else(|| {
                        TemplateError::UnknownPlaceholder {
                            name: name.to_string(),
                            template: source.clone(),
                        }
                    })?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                _ => text.push('$'),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the template references `p` at least once.
    pub fn uses(&self, p: Placeholder) -> bool {
        self.segments.iter().any(|s| *s == Segment::Slot(p))
    }

    pub fn render(&self, ctx: &TemplateContext<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Slot(p) => out.push_str(ctx.lookup(*p)),
            }
        }
        out
    }
}

impl std::str::FromStr for PromptTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PromptTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for PromptTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(s).map_err(serde::de::Error::custom)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_placeholders() {
        let t = PromptTemplate::parse("$path\nIs \"$candidate\" an answer to $problem?").unwrap();
        let ctx = TemplateContext {
            problem: Some("the puzzle"),
            path: Some("step 1"),
            candidate: Some("42"),
            ..Default::default()
        };
        assert_eq!(t.render(&ctx), "step 1\nIs \"42\" an answer to the puzzle?");
        assert!(t.uses(Placeholder::Candidate));
        assert!(!t.uses(Placeholder::Statement));
    }

    #[test]
    fn unknown_placeholder_is_rejected_at_parse() {
        let err = PromptTemplate::parse("hello $nme").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                name: "nme".into(),
                template: "hello $nme".into()
            }
        );
    }

    #[test]
    fn dollar_escapes_and_bare_dollars_survive() {
        let t = PromptTemplate::parse("costs $5, literally $$path, end $").unwrap();
        assert_eq!(
            t.render(&TemplateContext::default()),
            "costs $5, literally $path, end $"
        );
    }

    #[test]
    fn missing_values_render_empty() {
        let t = PromptTemplate::parse("[$statement]").unwrap();
        assert_eq!(t.render(&TemplateContext::default()), "[]");
    }

    #[test]
    fn placeholder_followed_by_punctuation() {
        let t = PromptTemplate::parse("($candidate).").unwrap();
        let ctx = TemplateContext {
            candidate: Some("x"),
            ..Default::default()
        };
        assert_eq!(t.render(&ctx), "(x).");
    }

    #[test]
    fn deserializes_and_validates() {
        let ok: Result<PromptTemplate, _> = serde_json::from_str("\"$problem:\"");
        assert!(ok.is_ok());
        let bad: Result<PromptTemplate, _> = serde_json::from_str("\"$bogus\"");
        assert!(bad.is_err());
    }
}
