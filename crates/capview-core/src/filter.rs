//! Display filter expressions
//!
//! Filters restrict which records a tap listener sees. The language is a
//! boolean combination of protocol names: `tcp`, `!arp`, `tcp && !dns`,
//! `udp || icmp`. An empty filter matches every record.
//!
//! Parsing happens once, at listener registration, so a syntax error is
//! reported to the user before any tapping starts.

use crate::record::Record;

/// Error produced when a filter expression cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A character outside the filter alphabet
    #[error("unexpected character {0:?} in filter expression")]
    BadToken(char),
    /// An operator or `!` where a protocol name was required
    #[error("expected a protocol name")]
    ExpectedName,
    /// Two names in a row without `&&` or `||` between them
    #[error("expected '&&' or '||' before {0:?}")]
    ExpectedOperator(String),
}

/// One negatable protocol test
#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    negated: bool,
    proto: String,
}

/// A parsed display filter
///
/// Internally a disjunction of conjunctions: the filter matches a record if
/// any `||`-group matches, and a group matches if all of its terms do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFilter {
    text: String,
    groups: Vec<Vec<Term>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Name(String),
    And,
    Or,
    Not,
}

fn tokenize(text: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' | '|' => {
                chars.next();
                if chars.next_if_eq(&c).is_none() {
                    return Err(FilterError::BadToken(c));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(FilterError::BadToken(other)),
        }
    }

    Ok(tokens)
}

impl DisplayFilter {
    /// Parse a filter expression
    ///
    /// An empty (or all-whitespace) expression is valid and matches all
    /// records.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let tokens = tokenize(text)?;

        let mut groups = Vec::new();
        let mut group: Vec<Term> = Vec::new();
        let mut negated = false;
        // A term is expected at the start and after every operator
        let mut expect_term = true;

        for token in tokens {
            match token {
                Token::Not => {
                    if !expect_term {
                        return Err(FilterError::ExpectedOperator("!".into()));
                    }
                    negated = !negated;
                }
                Token::Name(proto) => {
                    if !expect_term {
                        return Err(FilterError::ExpectedOperator(proto));
                    }
                    group.push(Term { negated, proto });
                    negated = false;
                    expect_term = false;
                }
                Token::And => {
                    if expect_term {
                        return Err(FilterError::ExpectedName);
                    }
                    expect_term = true;
                }
                Token::Or => {
                    if expect_term {
                        return Err(FilterError::ExpectedName);
                    }
                    groups.push(std::mem::take(&mut group));
                    expect_term = true;
                }
            }
        }

        if expect_term && (!groups.is_empty() || !group.is_empty() || negated) {
            // Expression ended after an operator or a dangling '!'
            return Err(FilterError::ExpectedName);
        }
        if !group.is_empty() {
            groups.push(group);
        }

        Ok(Self {
            text: text.trim().to_string(),
            groups,
        })
    }

    /// The original expression text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True if this filter matches every record
    pub fn is_match_all(&self) -> bool {
        self.groups.is_empty()
    }

    /// Check a record against the filter
    pub fn matches(&self, record: &Record) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        self.groups.iter().any(|group| {
            group
                .iter()
                .all(|term| record.is_protocol(&term.proto) != term.negated)
        })
    }
}

impl std::fmt::Display for DisplayFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(proto: &str) -> Record {
        Record::new(1, 64, proto, "")
    }

    #[test]
    fn test_empty_matches_all() {
        let filter = DisplayFilter::parse("").unwrap();
        assert!(filter.is_match_all());
        assert!(filter.matches(&rec("tcp")));

        let filter = DisplayFilter::parse("   ").unwrap();
        assert!(filter.is_match_all());
    }

    #[test]
    fn test_single_protocol() {
        let filter = DisplayFilter::parse("tcp").unwrap();
        assert!(filter.matches(&rec("tcp")));
        assert!(filter.matches(&rec("TCP")));
        assert!(!filter.matches(&rec("udp")));
    }

    #[test]
    fn test_negation() {
        let filter = DisplayFilter::parse("!arp").unwrap();
        assert!(filter.matches(&rec("tcp")));
        assert!(!filter.matches(&rec("arp")));

        // Double negation cancels
        let filter = DisplayFilter::parse("!!arp").unwrap();
        assert!(filter.matches(&rec("arp")));
    }

    #[test]
    fn test_and_or() {
        let filter = DisplayFilter::parse("tcp && !dns").unwrap();
        assert!(filter.matches(&rec("tcp")));
        assert!(!filter.matches(&rec("udp")));

        let filter = DisplayFilter::parse("udp || icmp").unwrap();
        assert!(filter.matches(&rec("udp")));
        assert!(filter.matches(&rec("icmp")));
        assert!(!filter.matches(&rec("tcp")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            DisplayFilter::parse("tcp &"),
            Err(FilterError::BadToken('&'))
        );
        assert_eq!(
            DisplayFilter::parse("tcp &&"),
            Err(FilterError::ExpectedName)
        );
        assert_eq!(
            DisplayFilter::parse("&& tcp"),
            Err(FilterError::ExpectedName)
        );
        assert_eq!(DisplayFilter::parse("!"), Err(FilterError::ExpectedName));
        assert_eq!(
            DisplayFilter::parse("tcp udp"),
            Err(FilterError::ExpectedOperator("udp".into()))
        );
        assert_eq!(
            DisplayFilter::parse("tcp # udp"),
            Err(FilterError::BadToken('#'))
        );
    }

    #[test]
    fn test_display_keeps_text() {
        let filter = DisplayFilter::parse("  tcp && !dns ").unwrap();
        assert_eq!(filter.to_string(), "tcp && !dns");
    }
}
