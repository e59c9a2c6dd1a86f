//! Replacement templates for general-field rules.
//!
//! Rules reference capture groups with backslash syntax (`\1`, `\g<1>`, `\g<name>`), and
//! `$` is an ordinary character. [`expand_template`] rewrites such a template into the
//! `${group}` form the regex crate expands, checking group references against the pattern.

use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    BadEscape(char),
    UnknownGroup(String),
    MissingGroupName,
    TrailingBackslash,
    OctalOutOfRange(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::BadEscape(c) => write!(f, "bad escape \\{}", c),
            TemplateError::UnknownGroup(group) => write!(f, "invalid group reference {}", group),
            TemplateError::MissingGroupName => write!(f, "missing group name"),
            TemplateError::TrailingBackslash => write!(f, "bad escape (end of pattern)"),
            TemplateError::OctalOutOfRange(digits) => {
                write!(f, "octal escape value \\{} outside of range 0-0o377", digits)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Translates `template` into a replacement string for `regex`'s `replace_all`.
pub fn expand_template(template: &str, regex: &Regex) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => {
                let Some(next) = chars.next() else {
                    return Err(TemplateError::TrailingBackslash);
                };
                match next {
                    '0' => {
                        // octal escape, up to three digits
                        let mut value = 0u32;
                        for _ in 0..2 {
                            match chars.peek().and_then(|d| d.to_digit(8)) {
                                Some(d) => {
                                    value = value * 8 + d;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        out.push(char::from_u32(value).unwrap_or('\0'));
                    }
                    '1'..='9' => {
                        let mut group = String::from(next);
                        if let Some(&d) = chars.peek() {
                            if d.is_ascii_digit() {
                                group.push(d);
                                chars.next();
                            }
                        }
                        // three octal digits form a character escape, not a group
                        let third = chars.peek().and_then(|d| d.to_digit(8));
                        if let (Some(third), Some(value)) = (third, octal_value(&group)) {
                            chars.next();
                            let value = value * 8 + third;
                            if value > 0o377 {
                                group.push_str(&third.to_string());
                                return Err(TemplateError::OctalOutOfRange(group));
                            }
                            out.push(char::from_u32(value).unwrap_or('\0'));
                            continue;
                        }
                        push_group(&mut out, &group, regex)?;
                    }
                    'g' => {
                        if chars.next() != Some('<') {
                            return Err(TemplateError::MissingGroupName);
                        }
                        let mut group = String::new();
                        loop {
                            match chars.next() {
                                Some('>') => break,
                                Some(ch) => group.push(ch),
                                None => return Err(TemplateError::MissingGroupName),
                            }
                        }
                        if group.is_empty() {
                            return Err(TemplateError::MissingGroupName);
                        }
                        push_group(&mut out, &group, regex)?;
                    }
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'f' => out.push('\x0c'),
                    'v' => out.push('\x0b'),
                    'a' => out.push('\x07'),
                    'b' => out.push('\x08'),
                    '\\' => out.push('\\'),
                    other if other.is_ascii_alphabetic() => {
                        return Err(TemplateError::BadEscape(other));
                    }
                    other => {
                        out.push('\\');
                        if other == '$' {
                            out.push_str("$$");
                        } else {
                            out.push(other);
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Value of a two-digit string when both digits are octal.
fn octal_value(digits: &str) -> Option<u32> {
    if digits.len() != 2 {
        return None;
    }
    digits
        .chars()
        .try_fold(0u32, |acc, d| d.to_digit(8).map(|d| acc * 8 + d))
}

fn push_group(out: &mut String, group: &str, regex: &Regex) -> Result<(), TemplateError> {
    let known = match group.parse::<usize>() {
        Ok(index) => index < regex.captures_len(),
        Err(_) => regex.capture_names().flatten().any(|name| name == group),
    };
    if !known {
        return Err(TemplateError::UnknownGroup(group.to_string()));
    }
    out.push_str("${");
    out.push_str(group);
    out.push('}');
    Ok(())
}
