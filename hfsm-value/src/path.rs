use crate::error::{ValueError, ValueResult};

/// One step of a parsed path: either an object key or an array index.
///
/// Grammar: a leading key, then any number of `.key` or `[index]` suffixes,
/// splitting on `.` and `[` and walking Objects by key / Arrays by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Parse a dotted/indexed path such as `a.b[3].c` into segments.
///
/// Grammar: a path is a leading key, followed by any number of
/// `.key` or `[index]` suffixes. A bare path (`"x"`) is a single `Key`
/// segment. An empty path parses to zero segments (identity access).
pub fn parse(path: &str) -> ValueResult<Vec<Segment>> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let mut chars = path.char_indices().peekable();
    let mut current = String::new();

    let flush_key = |current: &mut String, segments: &mut Vec<Segment>| {
        if !current.is_empty() {
            segments.push(Segment::Key(std::mem::take(current)));
        }
    };

    while let Some((i, c)) = chars.next() {
        match c {
            '.' => {
                flush_key(&mut current, &mut segments);
            }
            '[' => {
                flush_key(&mut current, &mut segments);
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some((_, ']')) => break,
                        Some((_, d)) => digits.push(d),
                        None => {
                            return Err(ValueError::InvalidPath {
                                path: path.to_string(),
                                reason: format!("unterminated '[' starting at byte {i}"),
                            })
                        }
                    }
                }
                let index: usize = digits.parse().map_err(|_| ValueError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("invalid array index '{digits}'"),
                })?;
                segments.push(Segment::Index(index));
            }
            _ => current.push(c),
        }
    }
    flush_key(&mut current, &mut segments);

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_key() {
        assert_eq!(parse("a").unwrap(), vec![Segment::Key("a".into())]);
    }

    #[test]
    fn dotted_and_indexed() {
        assert_eq!(
            parse("a.b[3].c").unwrap(),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(3),
                Segment::Key("c".into()),
            ]
        );
    }

    #[test]
    fn leading_index() {
        assert_eq!(
            parse("[0].x").unwrap(),
            vec![Segment::Index(0), Segment::Key("x".into())]
        );
    }

    #[test]
    fn empty_path() {
        assert_eq!(parse("").unwrap(), Vec::<Segment>::new());
        assert_eq!(parse("   ").unwrap(), Vec::<Segment>::new());
    }

    #[test]
    fn unterminated_bracket_errors() {
        assert!(parse("a[3").is_err());
    }

    #[test]
    fn non_numeric_index_errors() {
        assert!(parse("a[x]").is_err());
    }
}
