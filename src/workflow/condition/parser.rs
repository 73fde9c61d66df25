// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar, loosest binding first:
//! `or` > `and` > `not` > comparison | bare path | `( expr )`

use super::ast::{CompareOp, Expression, Literal};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Could not parse condition '{input}': {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: String,
}

fn fail(input: &str, reason: impl Into<String>) -> ParseError {
    ParseError {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(fail(input, "empty expression"));
    }

    if let Some(pos) = find_top_level(input, " or ")? {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + 4..])?;
        return Ok(Expression::Or(Box::new(left), Box::new(right)));
    }
    if let Some(pos) = find_top_level(input, " and ")? {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + 5..])?;
        return Ok(Expression::And(Box::new(left), Box::new(right)));
    }
    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse(rest)?)));
    }
    if input.starts_with('(') && input.ends_with(')') && wraps_whole(input) {
        return parse(&input[1..input.len() - 1]);
    }

    match input {
        "true" => return Ok(Expression::True),
        "false" => return Ok(Expression::False),
        _ => {}
    }

    parse_comparison(input)
}

/// Byte offset of the first `needle` outside quotes and parentheses
fn find_top_level(input: &str, needle: &str) -> Result<Option<usize>, ParseError> {
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(fail(input, "unbalanced ')'"));
                    }
                }
                _ if depth == 0 && input[i..].starts_with(needle) => return Ok(Some(i)),
                _ => {}
            },
        }
    }

    if quote.is_some() {
        return Err(fail(input, "unterminated string literal"));
    }
    if depth != 0 {
        return Err(fail(input, "unbalanced '('"));
    }
    Ok(None)
}

/// True when the opening paren at 0 closes at the very end
fn wraps_whole(input: &str) -> bool {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let last = input.len() - 1;
    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 && i != last {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }
    true
}

fn parse_comparison(input: &str) -> Result<Expression, ParseError> {
    // Longest operators first so ">=" is not read as ">"
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (op_str, op) in operators {
        if let Some(pos) = find_top_level(input, op_str)? {
            let path = input[..pos].trim();
            validate_path(input, path)?;
            let right = parse_literal(input, input[pos + op_str.len()..].trim())?;
            return Ok(Expression::Compare {
                path: path.to_string(),
                op,
                right,
            });
        }
    }

    validate_path(input, input)?;
    Ok(Expression::Truthy(input.to_string()))
}

fn validate_path(input: &str, path: &str) -> Result<(), ParseError> {
    let valid = !path.is_empty()
        && path.split('.').all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(fail(input, format!("'{}' is not a field path", path)))
    }
}

fn parse_literal(input: &str, literal: &str) -> Result<Literal, ParseError> {
    match literal {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    let quoted = literal.len() >= 2
        && ((literal.starts_with('\'') && literal.ends_with('\''))
            || (literal.starts_with('"') && literal.ends_with('"')));
    if quoted {
        return Ok(Literal::String(literal[1..literal.len() - 1].to_string()));
    }

    literal
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| fail(input, format!("'{}' is not a literal", literal)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(path: &str, op: CompareOp, right: Literal) -> Expression {
        Expression::Compare {
            path: path.to_string(),
            op,
            right,
        }
    }

    #[test]
    fn test_parse_simple_equality() {
        assert_eq!(
            parse("intent == 'search'").unwrap(),
            cmp("intent", CompareOp::Eq, Literal::String("search".into()))
        );
    }

    #[test]
    fn test_parse_numeric_operators() {
        assert_eq!(
            parse("plan_quality_score >= 7").unwrap(),
            cmp("plan_quality_score", CompareOp::Gte, Literal::Number(7.0))
        );
        assert_eq!(
            parse("confidence < 0.8").unwrap(),
            cmp("confidence", CompareOp::Lt, Literal::Number(0.8))
        );
        assert_eq!(
            parse("count <= 10").unwrap(),
            cmp("count", CompareOp::Lte, Literal::Number(10.0))
        );
    }

    #[test]
    fn test_parse_boolean_and_null() {
        assert_eq!(
            parse("adaptation_needed == true").unwrap(),
            cmp("adaptation_needed", CompareOp::Eq, Literal::Boolean(true))
        );
        assert_eq!(
            parse("error != null").unwrap(),
            cmp("error", CompareOp::NotEq, Literal::Null)
        );
    }

    #[test]
    fn test_parse_contains() {
        assert_eq!(
            parse("tags contains 'bug'").unwrap(),
            cmp("tags", CompareOp::Contains, Literal::String("bug".into()))
        );
    }

    #[test]
    fn test_parse_bare_path() {
        assert_eq!(
            parse("adaptation_needed").unwrap(),
            Expression::Truthy("adaptation_needed".into())
        );
        assert_eq!(
            parse("not adaptation_needed").unwrap(),
            Expression::Not(Box::new(Expression::Truthy("adaptation_needed".into())))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        match expr {
            Expression::Or(left, right) => {
                assert_eq!(*left, cmp("a", CompareOp::Eq, Literal::Number(1.0)));
                assert!(matches!(*right, Expression::And(_, _)));
            }
            other => panic!("Expected Or expression, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_group() {
        let expr = parse("(a == 1 or b == 2) and c == 3").unwrap();
        match expr {
            Expression::And(left, _) => assert!(matches!(*left, Expression::Or(_, _))),
            other => panic!("Expected And expression, got {:?}", other),
        }
    }

    #[test]
    fn test_operators_inside_quotes_ignored() {
        assert_eq!(
            parse("note == 'x and y'").unwrap(),
            cmp("note", CompareOp::Eq, Literal::String("x and y".into()))
        );
    }

    #[test]
    fn test_parse_double_quotes() {
        assert_eq!(
            parse(r#"name == "hello""#).unwrap(),
            cmp("name", CompareOp::Eq, Literal::String("hello".into()))
        );
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("true").unwrap(), Expression::True);
        assert_eq!(parse("false").unwrap(), Expression::False);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse("this is not valid").is_err());
        assert!(parse("").is_err());
        assert!(parse("a == ").is_err());
        assert!(parse("a == 'open").is_err());
        assert!(parse("(a == 1").is_err());
        assert!(parse("score > high").is_err());
    }
}
