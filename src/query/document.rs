//! Selection-set documents: fragment parsing and printing.
//!
//! Fragment files are plain GraphQL fragment definitions. Only the subset
//! needed for field selection is understood: fields (with aliases and
//! arguments), nested selections, fragment spreads and inline fragments.
//! Field arguments are kept as verbatim text and re-emitted unchanged.

use std::fmt::Write as _;

/// One entry of a selection set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(String),
    InlineFragment {
        type_condition: Option<String>,
        selections: Vec<Selection>,
    },
}

impl Selection {
    /// A leaf field selection.
    #[must_use]
    pub fn field(name: &str) -> Self {
        Self::Field(Field::new(name))
    }

    /// A field with a sub-selection.
    #[must_use]
    pub fn object(name: &str, selections: Vec<Selection>) -> Self {
        Self::Field(Field {
            selections,
            ..Field::new(name)
        })
    }

    #[must_use]
    pub fn spread(fragment: &str) -> Self {
        Self::FragmentSpread(fragment.to_string())
    }
}

/// A selected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    /// Argument list without the surrounding parentheses.
    pub arguments: Option<String>,
    pub selections: Vec<Selection>,
}

impl Field {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            alias: None,
            name: name.to_string(),
            arguments: None,
            selections: Vec::new(),
        }
    }
}

/// `fragment <name> on <type_condition> { ... }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

impl FragmentDefinition {
    /// Render as GraphQL text.
    #[must_use]
    pub fn print(&self) -> String {
        let mut out = format!("fragment {} on {} {{\n", self.name, self.type_condition);
        print_selections(&self.selections, 1, &mut out);
        out.push('}');
        out
    }
}

/// Append `selections` to `out`, one per line, at `depth` levels of indentation.
pub fn print_selections(selections: &[Selection], depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    for selection in selections {
        out.push_str(&indent);
        match selection {
            Selection::Field(field) => {
                if let Some(alias) = &field.alias {
                    let _ = write!(out, "{alias}: ");
                }
                out.push_str(&field.name);
                if let Some(args) = &field.arguments {
                    let _ = write!(out, "({args})");
                }
                if !field.selections.is_empty() {
                    out.push_str(" {\n");
                    print_selections(&field.selections, depth + 1, out);
                    out.push_str(&indent);
                    out.push('}');
                }
            }
            Selection::FragmentSpread(name) => {
                let _ = write!(out, "...{name}");
            }
            Selection::InlineFragment {
                type_condition,
                selections,
            } => {
                out.push_str("...");
                if let Some(t) = type_condition {
                    let _ = write!(out, " on {t}");
                }
                out.push_str(" {\n");
                print_selections(selections, depth + 1, out);
                out.push_str(&indent);
                out.push('}');
            }
        }
        out.push('\n');
    }
}

/// Failure to parse a fragment document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

type ParseResult<T> = std::result::Result<T, ParseError>;

/// Parse a document made only of fragment definitions.
///
/// # Errors
///
/// Returns a `ParseError` with the offending line on malformed input,
/// including directives and operations, which are not allowed here.
pub fn parse_fragments(source: &str) -> ParseResult<Vec<FragmentDefinition>> {
    let mut parser = Parser::new(source);
    let mut fragments = Vec::new();

    parser.skip_ignored();
    while !parser.at_end() {
        fragments.push(parser.fragment_definition()?);
        parser.skip_ignored();
    }

    Ok(fragments)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        1 + self.chars[..self.pos.min(self.chars.len())]
            .iter()
            .filter(|c| **c == '\n')
            .count()
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError {
            line: self.line(),
            message: message.into(),
        })
    }

    /// Whitespace, commas and `#` comments are insignificant.
    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' || c == '\u{feff}' {
                self.pos += 1;
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, expected: char) -> ParseResult<()> {
        self.skip_ignored();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => self.error(format!("expected `{expected}`, found `{c}`")),
            None => self.error(format!("expected `{expected}`, found end of input")),
        }
    }

    fn name(&mut self) -> ParseResult<String> {
        self.skip_ignored();
        let start = self.pos;
        match self.peek() {
            Some(c) if c == '_' || c.is_ascii_alphabetic() => self.pos += 1,
            Some(c) => return self.error(format!("expected a name, found `{c}`")),
            None => return self.error("expected a name, found end of input"),
        }
        while let Some(c) = self.peek() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn keyword(&mut self, keyword: &str) -> ParseResult<()> {
        let found = self.name()?;
        if found == keyword {
            Ok(())
        } else {
            self.error(format!("expected `{keyword}`, found `{found}`"))
        }
    }

    fn fragment_definition(&mut self) -> ParseResult<FragmentDefinition> {
        self.keyword("fragment")?;
        let name = self.name()?;
        if name == "on" {
            return self.error("fragment name cannot be `on`");
        }
        self.keyword("on")?;
        let type_condition = self.name()?;
        let selections = self.selection_set()?;

        Ok(FragmentDefinition {
            name,
            type_condition,
            selections,
        })
    }

    fn selection_set(&mut self) -> ParseResult<Vec<Selection>> {
        self.expect('{')?;
        let mut selections = Vec::new();

        loop {
            self.skip_ignored();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => selections.push(self.selection()?),
                None => return self.error("unterminated selection set"),
            }
        }

        if selections.is_empty() {
            return self.error("selection set cannot be empty");
        }
        Ok(selections)
    }

    fn selection(&mut self) -> ParseResult<Selection> {
        if self.chars[self.pos..].starts_with(&['.', '.', '.']) {
            self.pos += 3;
            self.skip_ignored();

            if self.peek() == Some('{') {
                return Ok(Selection::InlineFragment {
                    type_condition: None,
                    selections: self.selection_set()?,
                });
            }

            let name = self.name()?;
            self.reject_directive()?;
            if name == "on" {
                let type_condition = self.name()?;
                self.reject_directive()?;
                return Ok(Selection::InlineFragment {
                    type_condition: Some(type_condition),
                    selections: self.selection_set()?,
                });
            }
            return Ok(Selection::FragmentSpread(name));
        }

        let first = self.name()?;
        self.skip_ignored();
        let (alias, name) = if self.peek() == Some(':') {
            self.pos += 1;
            (Some(first), self.name()?)
        } else {
            (None, first)
        };

        self.skip_ignored();
        let arguments = if self.peek() == Some('(') {
            Some(self.raw_arguments()?)
        } else {
            None
        };

        self.reject_directive()?;
        self.skip_ignored();
        let selections = if self.peek() == Some('{') {
            self.selection_set()?
        } else {
            Vec::new()
        };

        Ok(Selection::Field(Field {
            alias,
            name,
            arguments,
            selections,
        }))
    }

    fn reject_directive(&mut self) -> ParseResult<()> {
        self.skip_ignored();
        if self.peek() == Some('@') {
            return self.error("directives are not supported in fragment files");
        }
        Ok(())
    }

    /// Consume a balanced `( ... )` and return its contents.
    ///
    /// Whitespace runs outside string literals collapse to one space;
    /// string literals are kept verbatim.
    fn raw_arguments(&mut self) -> ParseResult<String> {
        self.expect('(')?;
        let mut out = String::new();
        let mut depth = 1usize;
        let mut in_string = false;
        let mut pending_space = false;

        while let Some(c) = self.peek() {
            self.pos += 1;

            if in_string {
                out.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = self.peek() {
                            out.push(escaped);
                            self.pos += 1;
                        }
                    }
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            if c.is_whitespace() {
                pending_space = !out.is_empty();
                continue;
            }
            if c == ')' && depth == 1 {
                if out.is_empty() {
                    return self.error("argument list cannot be empty");
                }
                return Ok(out);
            }

            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
            match c {
                '"' => in_string = true,
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }

        self.error("unterminated argument list")
    }
}
