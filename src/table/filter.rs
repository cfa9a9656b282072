//! OData filter-expression builder for `queryEntities` (§3, §4.6).

use chrono::{DateTime, Utc};

/// One element of a filter expression: a raw token (a field name, an OData
/// operator keyword, or an already-quoted constant), or a nested sequence
/// that renders parenthesized.
#[derive(Debug, Clone)]
pub enum Term {
    Raw(String),
    Nested(Vec<Term>),
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Raw(value.to_string())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::Raw(value)
    }
}

impl From<Vec<Term>> for Term {
    fn from(value: Vec<Term>) -> Self {
        Term::Nested(value)
    }
}

/// Renders a filter expression: walks the n-ary sequence, joining elements
/// by single spaces, recursing into nested sequences with parenthesization
/// (§4.6).
pub fn filter(terms: &[Term]) -> String {
    terms.iter().map(render).collect::<Vec<_>>().join(" ")
}

fn render(term: &Term) -> String {
    match term {
        Term::Raw(s) => s.clone(),
        Term::Nested(inner) => format!("({})", filter(inner)),
    }
}

/// `'<s with every ' doubled>'`.
pub fn string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Decimal form of a number constant.
pub fn number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// `true`/`false`; null/undefined/falsy inputs render `false` (§4.6).
pub fn bool_(b: Option<bool>) -> &'static str {
    if b.unwrap_or(false) {
        "true"
    } else {
        "false"
    }
}

/// `datetime'<ISO-8601>'`.
pub fn date(d: &DateTime<Utc>) -> String {
    format!("datetime'{}'", d.to_rfc3339())
}

/// `guid'<g>'`.
pub fn guid(g: &str) -> String {
    format!("guid'{g}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_sequence_joins_with_spaces() {
        let expr = vec![Term::from("PartitionKey"), Term::from("eq"), Term::from(string("jungle"))];
        assert_eq!(filter(&expr), "PartitionKey eq 'jungle'");
    }

    #[test]
    fn nested_sequence_parenthesizes() {
        let inner = vec![Term::from("RowKey"), Term::from("eq"), Term::from(string("r1"))];
        let expr = vec![
            Term::from("PartitionKey"),
            Term::from("eq"),
            Term::from(string("jungle")),
            Term::from("and"),
            Term::from(inner),
        ];
        assert_eq!(filter(&expr), "PartitionKey eq 'jungle' and (RowKey eq 'r1')");
    }

    #[test]
    fn string_escapes_every_quote() {
        assert_eq!(string("o'brien"), "'o''brien'");
    }

    #[test]
    fn string_round_trips_for_any_input() {
        for s in ["plain", "it's", "''", ""] {
            let quoted = string(s);
            let stripped = &quoted[1..quoted.len() - 1];
            assert_eq!(stripped.replace("''", "'"), s);
        }
    }

    #[test]
    fn bool_renders_false_for_none() {
        assert_eq!(bool_(None), "false");
        assert_eq!(bool_(Some(true)), "true");
    }
}
