use crate::core::path::SzsPath;
use crate::utils::error::{Result, SzsError};
use regex::Regex;

pub const GLOB_SYNTAX: &str = "glob";
pub const REGEX_SYNTAX: &str = "regex";

fn invalid(pattern: &str, message: &str) -> SzsError {
    SzsError::InvalidPattern {
        pattern: pattern.to_string(),
        message: message.to_string(),
    }
}

fn escaped(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0u8; 4]))
}

/// Translates a glob into an anchored regular expression.
///
/// `*` matches within one name, `**` across names, `?` one character other
/// than `/`, `[...]` a class (`[!...]` negated) and `{a,b}` either branch.
pub fn glob_to_regex(glob: &str) -> Result<String> {
    let mut regex = String::from("^");
    let mut chars = glob.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let next = chars
                    .next()
                    .ok_or_else(|| invalid(glob, "no character to escape"))?;
                regex.push_str(&escaped(next));
            }
            '[' => {
                let mut class = String::new();
                match chars.peek() {
                    Some('!') => {
                        chars.next();
                        class.push('^');
                    }
                    Some('^') => {
                        chars.next();
                        class.push_str("\\^");
                    }
                    _ => {}
                }
                let mut closed = false;
                let mut members = 0;
                for c in chars.by_ref() {
                    match c {
                        ']' if members > 0 => {
                            closed = true;
                            break;
                        }
                        '/' => return Err(invalid(glob, "explicit name separator in class")),
                        '-' if members > 0 => class.push('-'),
                        c if c.is_alphanumeric() => class.push(c),
                        c => class.push_str(&escaped(c)),
                    }
                    members += 1;
                }
                if !closed {
                    return Err(invalid(glob, "missing ']'"));
                }
                // Classes never match the separator
                regex.push_str("[[^/]&&[");
                regex.push_str(&class);
                regex.push_str("]]");
            }
            '{' => {
                if in_group {
                    return Err(invalid(glob, "cannot nest groups"));
                }
                regex.push_str("(?:(?:");
                in_group = true;
            }
            '}' if in_group => {
                regex.push_str("))");
                in_group = false;
            }
            ',' if in_group => regex.push_str(")|(?:"),
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    regex.push_str(".*");
                } else {
                    regex.push_str("[^/]*");
                }
            }
            '?' => regex.push_str("[^/]"),
            c => regex.push_str(&escaped(c)),
        }
    }

    if in_group {
        return Err(invalid(glob, "missing '}'"));
    }
    regex.push('$');
    Ok(regex)
}

/// Matches archive paths against a `glob:` or `regex:` pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
}

impl PathMatcher {
    /// Parses `syntax:pattern`; the syntax name is case-insensitive.
    pub fn new(syntax_and_pattern: &str) -> Result<Self> {
        let (syntax, pattern) = syntax_and_pattern
            .split_once(':')
            .filter(|(syntax, _)| !syntax.is_empty())
            .ok_or_else(|| invalid(syntax_and_pattern, "expected 'syntax:pattern'"))?;

        let expression = if syntax.eq_ignore_ascii_case(GLOB_SYNTAX) {
            glob_to_regex(pattern)?
        } else if syntax.eq_ignore_ascii_case(REGEX_SYNTAX) {
            format!("^(?:{})$", pattern)
        } else {
            return Err(SzsError::UnsupportedSyntax {
                syntax: syntax.to_string(),
            });
        };

        let regex = Regex::new(&expression).map_err(|e| invalid(pattern, &e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn glob(pattern: &str) -> Result<Self> {
        Self::new(&format!("{}:{}", GLOB_SYNTAX, pattern))
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn matches(&self, path: &SzsPath) -> bool {
        self.is_match(&path.to_string())
    }
}
