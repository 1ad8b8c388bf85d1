use std::{fmt, fs, path::Path};

use crate::ruleset::{self, Owner};

/// Parse CODEOWNERS source.
///
/// The format is line based. Each non-blank line is either a comment starting
/// with `#` or a pattern followed by zero or more owners, separated by spaces
/// or tabs. An unescaped `#` ends the line's content and starts a trailing
/// comment. A backslash before a space, tab or `#` makes that character part
/// of the pattern; any other escape is passed on to the glob compiler as is.
///
/// A line with any error (an invalid owner, a negated pattern or a null byte)
/// is dropped as a whole and every problem on it is reported. Parsing always
/// continues with the next line.
pub fn parse(source: &str) -> ParseResult {
    let mut result = ParseResult {
        rules: Vec::new(),
        errors: Vec::new(),
    };
    let mut comments = Vec::new();

    let mut line_start = 0;
    for raw_line in source.split_inclusive('\n') {
        let offset = line_start;
        line_start += raw_line.len();
        let text = raw_line.strip_suffix('\n').unwrap_or(raw_line);
        let text = text.strip_suffix('\r').unwrap_or(text);

        let line = Line::scan(text, offset);
        let mut fields = line.fields.into_iter();
        let Some(pattern) = fields.next() else {
            // Blank lines keep pending comments attached to the next rule
            comments.extend(line.comment);
            continue;
        };

        let errors = pattern_errors(source, &pattern);
        let (owners, owner_errors): (Vec<_>, Vec<_>) = fields
            .map(|field| {
                let span = field.1;
                Owner::try_from(field.0)
                    .map(|owner| Spanned(owner, span.clone()))
                    .map_err(|err| ParseError::new(err.to_string(), span))
            })
            .partition(Result::is_ok);

        let leading_comments = std::mem::take(&mut comments);
        if errors.is_empty() && owner_errors.is_empty() {
            result.rules.push(Rule {
                pattern,
                owners: owners.into_iter().flatten().collect(),
                leading_comments,
                trailing_comment: line.comment,
            });
        } else {
            result.errors.extend(errors);
            result
                .errors
                .extend(owner_errors.into_iter().filter_map(Result::err));
        }
    }

    result
}

/// Read and parse the CODEOWNERS file at `path`.
pub fn parse_file(path: &Path) -> std::io::Result<ParseResult> {
    let source = fs::read_to_string(path)?;
    Ok(parse(&source))
}

/// Rules and errors found in CODEOWNERS source. Lines with errors are absent
/// from `rules`, so a result with errors describes only part of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub rules: Vec<Rule>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// True if the source parsed without any errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Compile the rules that parsed cleanly. Errors are discarded.
    pub fn into_ruleset(self) -> ruleset::RuleSet {
        ruleset::RuleSet::new(self.rules.into_iter().map(|r| r.into()).collect())
    }
}

/// A rule as written in the source, with the location of every part and the
/// comments around it. Convert it into a [`ruleset::Rule`] to resolve owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: Spanned<String>,
    pub owners: Vec<Spanned<Owner>>,
    pub leading_comments: Vec<Spanned<String>>,
    pub trailing_comment: Option<Spanned<String>>,
}

impl From<Rule> for ruleset::Rule {
    fn from(rule: Rule) -> Self {
        ruleset::Rule::new(rule.pattern.0, rule.owners.into_iter().map(|owner| owner.0))
    }
}

/// A problem with one line of a CODEOWNERS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: impl Into<Span>) -> ParseError {
        ParseError {
            message: message.into(),
            span: span.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at bytes {}..{}", self.message, self.span.0, self.span.1)
    }
}

impl std::error::Error for ParseError {}

/// Byte range `start..end` in the parsed source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span(pub usize, pub usize);

impl Span {
    /// The 1-based line and column of the start of the span within `source`.
    /// Columns count characters, not bytes.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let start = self.0.min(source.len());
        let before = source.get(..start).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Span(start, end)
    }
}

/// A value and where it came from in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<T>(pub T, pub Span);

impl<T> Spanned<T> {
    fn new(value: impl Into<T>, span: impl Into<Span>) -> Spanned<T> {
        Spanned(value.into(), span.into())
    }
}

fn pattern_errors(source: &str, pattern: &Spanned<String>) -> Vec<ParseError> {
    let Span(start, end) = pattern.1;
    let mut errors = Vec::new();
    if let Some(idx) = source[start..end].find('\0') {
        errors.push(ParseError::new(
            "patterns cannot contain null bytes",
            (start + idx, start + idx + 1),
        ));
    }
    if pattern.0.starts_with('!') {
        errors.push(ParseError::new(
            "negated patterns are not supported",
            pattern.1.clone(),
        ));
    }
    errors
}

/// One line split into whitespace-separated fields, with escapes resolved,
/// and its trailing comment.
struct Line {
    fields: Vec<Spanned<String>>,
    comment: Option<Spanned<String>>,
}

impl Line {
    fn scan(text: &str, offset: usize) -> Line {
        let mut fields = Vec::new();
        let mut comment = None;
        let mut field: Option<(usize, String)> = None;

        let mut chars = text.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            match c {
                ' ' | '\t' => {
                    if let Some((start, value)) = field.take() {
                        fields.push(Spanned::new(value, (offset + start, offset + idx)));
                    }
                }
                '#' => {
                    comment = Some(Spanned::new(&text[idx..], (offset + idx, offset + text.len())));
                    break;
                }
                _ => {
                    let (_, value) = field.get_or_insert_with(|| (idx, String::new()));
                    if c != '\\' {
                        value.push(c);
                        continue;
                    }
                    match chars.next_if(|&(_, next)| matches!(next, ' ' | '\t' | '#')) {
                        Some((_, separator)) => value.push(separator),
                        None => {
                            value.push('\\');
                            if let Some((_, next)) = chars.next() {
                                value.push(next);
                            }
                        }
                    }
                }
            }
        }

        if let Some((start, value)) = field {
            let end = comment.as_ref().map_or(text.len(), |comment| comment.1.0 - offset);
            fields.push(Spanned::new(value, (offset + start, offset + end)));
        }

        Line { fields, comment }
    }
}


#[cfg(test)]
mod tests {
    use super::ruleset::OwnerKind;
    use super::*;

    fn rule(pattern: (&str, usize, usize), owners: Vec<Spanned<Owner>>) -> Rule {
        Rule {
            pattern: Spanned::new(pattern.0, (pattern.1, pattern.2)),
            owners,
            leading_comments: Vec::new(),
            trailing_comment: None,
        }
    }

    fn owner(value: &str, kind: OwnerKind, start: usize) -> Spanned<Owner> {
        Spanned::new(
            Owner::new(value.to_owned(), kind),
            (start, start + value.len()),
        )
    }

    fn user(value: &str, start: usize) -> Spanned<Owner> {
        owner(value, OwnerKind::User, start)
    }

    fn comment(text: &str, start: usize) -> Spanned<String> {
        Spanned::new(text, (start, start + text.len()))
    }

    fn assert_parses(source: &str, rules: Vec<Rule>, errors: Vec<ParseError>) {
        assert_eq!(
            parse(source),
            ParseResult { rules, errors },
            "result mismatch for {:?}",
            source
        );
    }

    #[test]
    fn test_rules_and_comments() {
        let source = "# Default owner\n* @lengau\n\n# Docs\n# (writers)\n\
                      /docs/ @medubelko @lengau # review\n\
                      /craft_platforms/rock @tigarmo\n";

        assert_parses(
            source,
            vec![
                Rule {
                    leading_comments: vec![comment("# Default owner", 0)],
                    ..rule(("*", 16, 17), vec![user("@lengau", 18)])
                },
                Rule {
                    leading_comments: vec![comment("# Docs", 27), comment("# (writers)", 34)],
                    trailing_comment: Some(comment("# review", 72)),
                    ..rule(
                        ("/docs/", 46, 52),
                        vec![user("@medubelko", 53), user("@lengau", 64)],
                    )
                },
                rule(("/craft_platforms/rock", 81, 102), vec![user("@tigarmo", 103)]),
            ],
            vec![],
        );
    }

    #[test]
    fn test_whitespace_and_line_endings() {
        assert_parses(
            " *.py\t@lengau \r\n\r\n/craft_platforms/rock  @tigarmo",
            vec![
                rule(("*.py", 1, 5), vec![user("@lengau", 6)]),
                rule(("/craft_platforms/rock", 18, 39), vec![user("@tigarmo", 41)]),
            ],
            vec![],
        );
        assert_parses("", vec![], vec![]);
        assert_parses("\n\t\n   ", vec![], vec![]);
        assert_parses("/vendor/", vec![rule(("/vendor/", 0, 8), vec![])], vec![]);
    }

    #[test]
    fn test_owner_kinds() {
        assert_parses(
            "/craft_platforms/ @canonical/starcraft dev@example.com @lengau",
            vec![rule(
                ("/craft_platforms/", 0, 17),
                vec![
                    owner("@canonical/starcraft", OwnerKind::Team, 18),
                    owner("dev@example.com", OwnerKind::Email, 39),
                    user("@lengau", 55),
                ],
            )],
            vec![],
        );
    }

    #[test]
    fn test_escapes() {
        assert_parses(
            "docs/My\\ Notes @medubelko",
            vec![rule(("docs/My Notes", 0, 14), vec![user("@medubelko", 15)])],
            vec![],
        );
        assert_parses(
            "\\#hash @lengau#trailing",
            vec![Rule {
                trailing_comment: Some(comment("#trailing", 14)),
                ..rule(("#hash", 0, 6), vec![user("@lengau", 7)])
            }],
            vec![],
        );
        // Glob escapes are kept for the pattern compiler, as is a lone
        // backslash at the end of a line
        assert_parses(
            "f\\*o @x\nnotes\\",
            vec![
                rule(("f\\*o", 0, 4), vec![user("@x", 5)]),
                rule(("notes\\", 8, 14), vec![]),
            ],
            vec![],
        );
    }

    #[test]
    fn test_errors_drop_the_line() {
        assert_parses(
            "* @lengau\n/docs/ not-an-owner @medubelko\n",
            vec![rule(("*", 0, 1), vec![user("@lengau", 2)])],
            vec![ParseError::new("invalid owner: not-an-owner", (17, 29))],
        );
        // The comment above a dropped rule goes with it
        assert_parses(
            "# negation\n!docs/ @x\nsrc @y",
            vec![rule(("src", 21, 24), vec![user("@y", 25)])],
            vec![ParseError::new("negated patterns are not supported", (11, 17))],
        );
        assert_parses(
            "f\0oo @lengau",
            vec![],
            vec![ParseError::new("patterns cannot contain null bytes", (1, 2))],
        );
        assert_parses(
            "!a\0 bad @ok",
            vec![],
            vec![
                ParseError::new("patterns cannot contain null bytes", (2, 3)),
                ParseError::new("negated patterns are not supported", (0, 3)),
                ParseError::new("invalid owner: bad", (4, 7)),
            ],
        );
    }

    #[test]
    fn test_span_line_col() {
        let source = "# owners\n* @lengau\n/docs/ oops\n";
        let result = parse(source);
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);

        let error = &result.errors[0];
        assert_eq!(error.span.line_col(source), (3, 8));
        assert_eq!(error.to_string(), "invalid owner: oops at bytes 26..30");
        assert_eq!(Span(0, 0).line_col(source), (1, 1));
        assert_eq!(Span(500, 500).line_col(source), (4, 1));
    }

    #[test]
    fn test_into_ruleset() {
        let result = parse("* @lengau\n/docs/ @medubelko @lengau\n/docs/ oops\n");
        assert_eq!(result.rules.len(), 2);

        let ruleset = result.into_ruleset();
        assert_eq!(ruleset.rules()[1].pattern, "/docs/");
        assert_eq!(
            ruleset
                .owners("docs/readme.md")
                .map(|owners| owners.iter().map(|o| o.to_string()).collect::<Vec<_>>()),
            Some(vec!["@medubelko".to_owned(), "@lengau".to_owned()])
        );
    }
}
