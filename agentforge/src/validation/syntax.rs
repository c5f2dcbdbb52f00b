//! Per-artifact content grammars.
//!
//! Python sources get a lexical check (strings, brackets, block headers and
//! indentation) rather than a full parse. JSON is parsed with `serde_json`;
//! requirement and env files are checked line by line.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// A syntax error with a 1-indexed position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxError {
    /// Line of the error.
    pub line: usize,
    /// Column of the error.
    pub column: usize,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for SyntaxError {}

/// The grammar an artifact's content is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// Python source.
    Python,
    /// A JSON document.
    Json,
    /// A pip requirements file.
    Requirements,
    /// A `KEY=VALUE` environment file.
    EnvFile,
    /// Free text; always valid.
    Text,
}

impl Grammar {
    /// Picks the grammar for an artifact from its name.
    ///
    /// Both key-style names (`agent_py`) and file names (`agent.py`) are
    /// recognized.
    #[must_use]
    pub fn for_artifact(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let has_suffix = |ext: &str| {
            lower.ends_with(&format!("_{ext}")) || lower.ends_with(&format!(".{ext}"))
        };

        if has_suffix("py") {
            Self::Python
        } else if has_suffix("json") {
            Self::Json
        } else if lower.starts_with("requirements") && has_suffix("txt") {
            Self::Requirements
        } else if lower == "env_example"
            || lower == ".env"
            || lower.ends_with(".env")
            || lower.ends_with(".env.example")
        {
            Self::EnvFile
        } else {
            Self::Text
        }
    }

    /// Checks `content` against this grammar.
    ///
    /// # Errors
    ///
    /// Returns the first `SyntaxError` found.
    pub fn check(self, content: &str) -> Result<(), SyntaxError> {
        match self {
            Self::Python => check_python(content),
            Self::Json => check_json(content),
            Self::Requirements => check_requirements(content),
            Self::EnvFile => check_env(content),
            Self::Text => Ok(()),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Python => "python",
            Self::Json => "json",
            Self::Requirements => "requirements",
            Self::EnvFile => "env",
            Self::Text => "text",
        };
        write!(f, "{name}")
    }
}

const BLOCK_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally", "with",
    "async",
];

/// An unterminated triple-quoted string.
struct OpenString {
    delimiter: char,
    line: usize,
    column: usize,
}

/// State of the logical line being scanned.
#[derive(Default)]
struct LogicalLine {
    keyword: Option<&'static str>,
    saw_colon: bool,
}

impl LogicalLine {
    fn start(rest: &[char]) -> Self {
        let word: String = rest
            .iter()
            .take_while(|c| c.is_alphanumeric() || **c == '_')
            .collect();
        Self {
            keyword: BLOCK_KEYWORDS.iter().copied().find(|k| *k == word),
            saw_colon: false,
        }
    }
}

/// Checks Python source lexically.
///
/// # Errors
///
/// Returns the first unterminated string, unbalanced bracket, block header
/// without a colon, or inconsistent indentation.
pub fn check_python(source: &str) -> Result<(), SyntaxError> {
    let mut indents = vec![0usize];
    let mut brackets: Vec<(char, usize, usize)> = Vec::new();
    let mut triple: Option<OpenString> = None;
    let mut continuation = false;
    let mut pending_block: Option<usize> = None;
    let mut logical = LogicalLine::default();
    let mut last_line = 0;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let chars: Vec<char> = raw.chars().collect();
        let mut pos = 0;
        let mut last_significant = None;

        if let Some(open) = &triple {
            let Some(end) = find_triple_close(&chars, 0, open.delimiter) else {
                continue;
            };
            last_significant = Some(open.delimiter);
            triple = None;
            pos = end;
        } else if brackets.is_empty() && !continuation {
            let Some((width, first)) = indentation(&chars) else {
                continue;
            };
            if chars[first] == '#' {
                continue;
            }

            let current = indents.last().copied().unwrap_or(0);
            if let Some(header) = pending_block.take() {
                if width <= current {
                    return Err(SyntaxError::new(
                        line_no,
                        first + 1,
                        format!("expected an indented block after line {header}"),
                    ));
                }
                indents.push(width);
            } else if width > current {
                return Err(SyntaxError::new(line_no, first + 1, "unexpected indent"));
            } else {
                while indents.last().is_some_and(|top| width < *top) {
                    indents.pop();
                }
                if indents.last().copied().unwrap_or(0) != width {
                    return Err(SyntaxError::new(
                        line_no,
                        first + 1,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }

            logical = LogicalLine::start(&chars[first..]);
            pos = first;
        }
        continuation = false;

        while pos < chars.len() {
            let c = chars[pos];
            match c {
                '#' => break,
                '"' | '\'' => {
                    let is_triple =
                        chars.get(pos + 1) == Some(&c) && chars.get(pos + 2) == Some(&c);
                    let close = if is_triple {
                        find_triple_close(&chars, pos + 3, c)
                    } else {
                        find_quote_close(&chars, pos + 1, c)
                    };
                    match close {
                        Some(end) => {
                            last_significant = Some(c);
                            pos = end;
                            continue;
                        }
                        None if is_triple => {
                            triple = Some(OpenString {
                                delimiter: c,
                                line: line_no,
                                column: pos + 1,
                            });
                            break;
                        }
                        None => {
                            return Err(SyntaxError::new(
                                line_no,
                                pos + 1,
                                "unterminated string literal",
                            ))
                        }
                    }
                }
                '(' | '[' | '{' => brackets.push((c, line_no, pos + 1)),
                ')' | ']' | '}' => match brackets.pop() {
                    Some((open, ..)) if closer(open) == c => {}
                    Some((open, line, column)) => {
                        return Err(SyntaxError::new(
                            line_no,
                            pos + 1,
                            format!(
                                "closing '{c}' does not match '{open}' opened at line {line}, column {column}"
                            ),
                        ))
                    }
                    None => {
                        return Err(SyntaxError::new(line_no, pos + 1, format!("unmatched '{c}'")))
                    }
                },
                ':' if brackets.is_empty() => logical.saw_colon = true,
                _ => {}
            }
            if !c.is_whitespace() {
                last_significant = Some(c);
            }
            pos += 1;
        }

        if triple.is_some() || !brackets.is_empty() {
            continue;
        }
        if last_significant == Some('\\') {
            continuation = true;
            continue;
        }

        if let Some(keyword) = logical.keyword {
            if !logical.saw_colon {
                return Err(SyntaxError::new(
                    line_no,
                    chars.len().max(1),
                    format!("expected ':' to end the '{keyword}' statement"),
                ));
            }
        }
        if last_significant == Some(':') {
            pending_block = Some(line_no);
        }
    }

    if let Some(open) = triple {
        return Err(SyntaxError::new(
            open.line,
            open.column,
            "unterminated triple-quoted string literal",
        ));
    }
    if let Some((open, line, column)) = brackets.pop() {
        return Err(SyntaxError::new(line, column, format!("'{open}' was never closed")));
    }
    if let Some(header) = pending_block {
        return Err(SyntaxError::new(
            last_line + 1,
            1,
            format!("expected an indented block after line {header}"),
        ));
    }
    Ok(())
}

/// Returns the indentation width and the index of the first visible char.
fn indentation(chars: &[char]) -> Option<(usize, usize)> {
    let mut width = 0;
    for (i, c) in chars.iter().enumerate() {
        match c {
            ' ' => width += 1,
            '\t' => width = (width / 8 + 1) * 8,
            '\x0c' => width = 0,
            _ => return Some((width, i)),
        }
    }
    None
}

fn find_quote_close(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

fn find_triple_close(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start;
    while i + 2 < chars.len() {
        if chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote && chars[i + 1] == quote && chars[i + 2] == quote {
            return Some(i + 3);
        }
        i += 1;
    }
    None
}

const fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Parses a JSON document.
///
/// # Errors
///
/// Returns the parser's error and position.
pub fn check_json(content: &str) -> Result<(), SyntaxError> {
    serde_json::from_str::<serde_json::Value>(content)
        .map(|_| ())
        .map_err(|e| {
            let full = e.to_string();
            let position = format!(" at line {} column {}", e.line(), e.column());
            let message = full.strip_suffix(&position).unwrap_or(&full).to_string();
            SyntaxError::new(e.line(), e.column(), message)
        })
}

#[allow(clippy::expect_used)]
static REQUIREMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^[A-Za-z0-9][A-Za-z0-9._-]*                       # project name
        (\[[A-Za-z0-9._-]+(\s*,\s*[A-Za-z0-9._-]+)*\])?  # extras
        \s*
        (
            @\s*\S+                                      # direct reference
          | ((===|==|!=|~=|>=|<=|>|<)\s*[A-Za-z0-9.*+!_-]+
             (\s*,\s*(===|==|!=|~=|>=|<=|>|<)\s*[A-Za-z0-9.*+!_-]+)*)
        )?
        \s*(;.*)?$                                       # environment marker
        ",
    )
    .expect("requirement pattern is valid")
});

#[allow(clippy::expect_used)]
static ENV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(export\s+)?[A-Za-z_][A-Za-z0-9_]*\s*=.*$").expect("env pattern is valid")
});

/// Checks a pip requirements file.
///
/// Blank lines, comments and option lines (`-r`, `--index-url`) are
/// accepted as-is.
///
/// # Errors
///
/// Returns the first line that is not a requirement specifier.
pub fn check_requirements(content: &str) -> Result<(), SyntaxError> {
    for (idx, raw) in content.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        if !REQUIREMENT_LINE.is_match(line) {
            return Err(SyntaxError::new(
                idx + 1,
                raw.len() - raw.trim_start().len() + 1,
                format!("invalid requirement specifier '{line}'"),
            ));
        }
    }
    Ok(())
}

/// Checks a `KEY=VALUE` environment file.
///
/// # Errors
///
/// Returns the first line that is not an assignment or comment.
pub fn check_env(content: &str) -> Result<(), SyntaxError> {
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !ENV_LINE.is_match(line) {
            return Err(SyntaxError::new(
                idx + 1,
                raw.len() - raw.trim_start().len() + 1,
                "expected KEY=VALUE",
            ));
        }
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None => line,
    }
}
