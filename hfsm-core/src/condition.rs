//! Transition condition grammar: boolean literals, path comparisons (`==`,
//! `!=`, `<`, `>`) against literals or other paths, and `&&`/`||`
//! conjunction/disjunction of those. A path is either `input.<path>` or
//! `output.<path>`, evaluated against the enclosing state's own `input`/
//! `output` trees at dispatch time.
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! or_expr    := and_expr ( "||" and_expr )*
//! and_expr   := comparison ( "&&" comparison )*
//! comparison := atom ( ("==" | "!=" | "<" | ">") atom )?
//! atom       := "true" | "false" | number | string-literal | path
//! path       := ("input" | "output") ("." name | "[" index "]")*
//! ```

use hfsm_value::Value;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    Path(PathRoot, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Or(Box<Condition>, Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Compare(Operand, CompareOp, Operand),
    /// A bare literal boolean or path, evaluated for truthiness.
    Bool(Operand),
}

impl Condition {
    /// Evaluate against a state's own `input`/`output` trees ("condition
    /// evaluates true against the current parameter snapshot").
    pub fn eval(&self, input: &Value, output: &Value) -> bool {
        match self {
            Condition::Or(l, r) => l.eval(input, output) || r.eval(input, output),
            Condition::And(l, r) => l.eval(input, output) && r.eval(input, output),
            Condition::Bool(op) => resolve(op, input, output).as_bool_or(false),
            Condition::Compare(l, cmp, r) => {
                let lv = resolve(l, input, output);
                let rv = resolve(r, input, output);
                match cmp {
                    CompareOp::Eq => lv == rv,
                    CompareOp::Ne => lv != rv,
                    CompareOp::Lt => lv.as_f64().ok().zip(rv.as_f64().ok()).is_some_and(|(a, b)| a < b),
                    CompareOp::Gt => lv.as_f64().ok().zip(rv.as_f64().ok()).is_some_and(|(a, b)| a > b),
                }
            }
        }
    }
}

fn resolve(operand: &Operand, input: &Value, output: &Value) -> Value {
    match operand {
        Operand::Literal(Literal::Bool(b)) => Value::boolean(*b),
        Operand::Literal(Literal::Integer(i)) => Value::integer(*i),
        Operand::Literal(Literal::Float(f)) => Value::float(*f),
        Operand::Literal(Literal::String(s)) => Value::string(s.clone()),
        Operand::Path(PathRoot::Input, path) => input.path_get(path).unwrap_or_else(|_| Value::undefined()),
        Operand::Path(PathRoot::Output, path) => output.path_get(path).unwrap_or_else(|_| Value::undefined()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    True,
    False,
    AndAnd,
    OrOr,
    Eq,
    Ne,
    Lt,
    Gt,
    Number(String),
    String(String),
    Path(PathRoot, String),
}

fn tokenize(src: &str) -> Result<Vec<Token>, BuildError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '&' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '&').is_some() {
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(err(src, i, "expected '&&'"));
                }
            }
            '|' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '|').is_some() {
                    tokens.push(Token::OrOr);
                } else {
                    return Err(err(src, i, "expected '||'"));
                }
            }
            '=' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(err(src, i, "expected '=='"));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    return Err(err(src, i, "expected '!='"));
                }
            }
            '<' => {
                chars.next();
                tokens.push(Token::Lt);
            }
            '>' => {
                chars.next();
                tokens.push(Token::Gt);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => s.push(ch),
                        None => return Err(err(src, i, "unterminated string literal")),
                    }
                }
                tokens.push(Token::String(s));
            }
            c if c.is_ascii_digit() || (c == '-' && peek_is_digit(&mut chars)) => {
                let mut s = String::new();
                if c == '-' {
                    s.push('-');
                    chars.next();
                }
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(s));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&(_, d)) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' || d == '[' || d == ']' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match s.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    _ if s == "input" || s.starts_with("input.") || s.starts_with("input[") => {
                        tokens.push(Token::Path(PathRoot::Input, strip_root(&s, "input")))
                    }
                    _ if s == "output" || s.starts_with("output.") || s.starts_with("output[") => {
                        tokens.push(Token::Path(PathRoot::Output, strip_root(&s, "output")))
                    }
                    other => {
                        return Err(err(
                            src,
                            i,
                            &format!("identifier '{other}' must be 'true', 'false', or start with 'input'/'output'"),
                        ))
                    }
                }
            }
            other => return Err(err(src, i, &format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

fn peek_is_digit(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> bool {
    let mut clone = chars.clone();
    clone.next();
    matches!(clone.peek(), Some((_, d)) if d.is_ascii_digit())
}

fn strip_root(s: &str, root: &str) -> String {
    s.strip_prefix(root).unwrap_or("").trim_start_matches('.').to_string()
}

fn err(src: &str, pos: usize, reason: &str) -> BuildError {
    BuildError::InvalidCondition {
        expression: src.to_string(),
        reason: format!("at byte {pos}: {reason}"),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn or_expr(&mut self) -> Result<Condition, BuildError> {
        let mut left = self.and_expr()?;
        while matches!(self.peek(), Some(Token::OrOr)) {
            self.next();
            let right = self.and_expr()?;
            left = Condition::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Condition, BuildError> {
        let mut left = self.comparison()?;
        while matches!(self.peek(), Some(Token::AndAnd)) {
            self.next();
            let right = self.comparison()?;
            left = Condition::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Condition, BuildError> {
        let left = self.atom()?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(CompareOp::Eq),
            Some(Token::Ne) => Some(CompareOp::Ne),
            Some(Token::Lt) => Some(CompareOp::Lt),
            Some(Token::Gt) => Some(CompareOp::Gt),
            _ => None,
        };
        match op {
            Some(op) => {
                self.next();
                let right = self.atom()?;
                Ok(Condition::Compare(left, op, right))
            }
            None => Ok(Condition::Bool(left)),
        }
    }

    fn atom(&mut self) -> Result<Operand, BuildError> {
        match self.next() {
            Some(Token::True) => Ok(Operand::Literal(Literal::Bool(true))),
            Some(Token::False) => Ok(Operand::Literal(Literal::Bool(false))),
            Some(Token::Number(s)) => {
                if s.contains('.') {
                    s.parse::<f64>()
                        .map(|f| Operand::Literal(Literal::Float(f)))
                        .map_err(|_| BuildError::InvalidCondition {
                            expression: s.clone(),
                            reason: "invalid float literal".into(),
                        })
                } else {
                    s.parse::<i64>()
                        .map(|i| Operand::Literal(Literal::Integer(i)))
                        .map_err(|_| BuildError::InvalidCondition {
                            expression: s.clone(),
                            reason: "invalid integer literal".into(),
                        })
                }
            }
            Some(Token::String(s)) => Ok(Operand::Literal(Literal::String(s))),
            Some(Token::Path(root, path)) => Ok(Operand::Path(root, path)),
            other => Err(BuildError::InvalidCondition {
                expression: String::new(),
                reason: format!("expected an atom, found {other:?}"),
            }),
        }
    }
}

/// Parse a condition expression. Called by the builder while linking
/// transitions so malformed conditions surface as a
/// `BuildError`, not a runtime panic.
pub fn parse(expr: &str) -> Result<Condition, BuildError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let cond = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(BuildError::InvalidCondition {
            expression: expr.to_string(),
            reason: "trailing tokens after a complete expression".into(),
        });
    }
    Ok(cond)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_boolean_literal() {
        let c = parse("true").unwrap();
        assert!(c.eval(&Value::object(), &Value::object()));
    }

    #[test]
    fn path_comparison_against_literal() {
        let input = Value::object();
        input.path_set("count", Value::integer(5)).unwrap();
        let c = parse("input.count > 3").unwrap();
        assert!(c.eval(&input, &Value::object()));
        let c2 = parse("input.count == 5").unwrap();
        assert!(c2.eval(&input, &Value::object()));
    }

    #[test]
    fn conjunction_and_disjunction() {
        let input = Value::object();
        input.path_set("a", Value::boolean(true)).unwrap();
        input.path_set("b", Value::boolean(false)).unwrap();
        assert!(parse("input.a || input.b").unwrap().eval(&input, &Value::object()));
        assert!(!parse("input.a && input.b").unwrap().eval(&input, &Value::object()));
    }

    #[test]
    fn missing_path_is_falsey_not_an_error() {
        let c = parse("input.missing").unwrap();
        assert!(!c.eval(&Value::object(), &Value::object()));
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        assert!(parse("bogus").is_err());
    }
}
