//! Glob, glob-to-regex, and brace-expansion helpers for addressing paths.
//!
//! Glob semantics follow the usual shell/minimatch conventions used by the
//! addressing API:
//!
//! - `*` and `?` never cross a `/`
//! - `**` as a whole path component matches any number of components
//! - `{a,b}` alternation, `[abc]` classes, `\` escapes
//!
//! Globs are compiled through [`globset`]; brace expansion is done here
//! because it produces literal strings rather than a matcher.

use globset::{Glob, GlobBuilder, GlobMatcher};
use regex::bytes::Regex;

/// Upper bound on literal strings produced by [`expand_braces`].
pub const MAX_BRACE_EXPANSION: usize = 10_000;

/// Errors from compiling or expanding a pattern.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// The glob syntax is invalid.
    #[error("invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// The regex derived from a glob failed to compile.
    #[error("glob '{pattern}' produced an invalid regex: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Opening and closing braces do not pair up.
    #[error("unbalanced braces in '{pattern}'")]
    UnbalancedBraces { pattern: String },

    /// Expansion would produce more literals than [`MAX_BRACE_EXPANSION`].
    #[error("brace expansion of '{pattern}' exceeds {limit} entries")]
    ExpansionTooLarge { pattern: String, limit: usize },
}

fn build_glob(pattern: &str) -> Result<Glob, PatternError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|source| PatternError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

/// Compile a glob into a reusable matcher.
///
/// # Errors
///
/// Returns [`PatternError::Glob`] for invalid glob syntax.
pub fn glob_matcher(pattern: &str) -> Result<GlobMatcher, PatternError> {
    Ok(build_glob(pattern)?.compile_matcher())
}

/// Return the candidates matching `pattern`, preserving input order.
///
/// # Errors
///
/// Returns [`PatternError::Glob`] for invalid glob syntax.
pub fn glob_match<'a, I>(candidates: I, pattern: &str) -> Result<Vec<&'a str>, PatternError>
where
    I: IntoIterator<Item = &'a str>,
{
    let matcher = glob_matcher(pattern)?;
    Ok(candidates
        .into_iter()
        .filter(|candidate| matcher.is_match(candidate))
        .collect())
}

/// Compile a glob to an anchored regular expression with the same semantics.
///
/// # Errors
///
/// Returns [`PatternError::Glob`] for invalid glob syntax or
/// [`PatternError::Regex`] if the derived regex is rejected.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, PatternError> {
    let glob = build_glob(pattern)?;
    Regex::new(glob.regex()).map_err(|source| PatternError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Expand `{a,b}` lists and `{1..3}` / `{a..c}` sequences into literals.
///
/// A brace pair without a top-level comma or a valid sequence is kept
/// literally (`{x}` stays `{x}`), as in shell brace expansion.
///
/// # Errors
///
/// Returns [`PatternError::UnbalancedBraces`] when braces do not pair up and
/// [`PatternError::ExpansionTooLarge`] when the result would exceed
/// [`MAX_BRACE_EXPANSION`] entries.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, PatternError> {
    if !braces_balanced(pattern) {
        return Err(PatternError::UnbalancedBraces {
            pattern: pattern.to_string(),
        });
    }

    let mut out = Vec::new();
    expand_into(pattern, &mut out, pattern)?;
    Ok(out)
}

fn braces_balanced(pattern: &str) -> bool {
    let mut depth = 0usize;
    let mut escaped = false;
    for ch in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// Byte offsets of the first unescaped `{` and its matching `}`.
fn first_group(s: &str) -> Option<(usize, usize)> {
    let mut start = None;
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| (s, idx));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a brace body on commas that are not nested inside inner braces.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut escaped = false;
    let mut last = 0;
    for (idx, ch) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[last..idx]);
                last = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[last..]);
    parts
}

fn push_checked(out: &mut Vec<String>, value: String, pattern: &str) -> Result<(), PatternError> {
    if out.len() >= MAX_BRACE_EXPANSION {
        return Err(PatternError::ExpansionTooLarge {
            pattern: pattern.to_string(),
            limit: MAX_BRACE_EXPANSION,
        });
    }
    out.push(value);
    Ok(())
}

fn expand_into(s: &str, out: &mut Vec<String>, pattern: &str) -> Result<(), PatternError> {
    let Some((open, close)) = first_group(s) else {
        return push_checked(out, s.to_string(), pattern);
    };

    let prefix = &s[..open];
    let body = &s[open + 1..close];
    let suffix = &s[close + 1..];

    let parts = split_top_level(body);
    if parts.len() > 1 {
        for part in parts {
            expand_into(&format!("{prefix}{part}{suffix}"), out, pattern)?;
        }
        return Ok(());
    }

    if let Some(items) = sequence(body) {
        for item in items {
            expand_into(&format!("{prefix}{item}{suffix}"), out, pattern)?;
        }
        return Ok(());
    }

    // Not an expansion: keep the braces, expand whatever is inside/after.
    let mut inner = Vec::new();
    expand_into(body, &mut inner, pattern)?;
    let mut tails = Vec::new();
    expand_into(suffix, &mut tails, pattern)?;
    for mid in &inner {
        for tail in &tails {
            push_checked(out, format!("{prefix}{{{mid}}}{tail}"), pattern)?;
        }
    }
    Ok(())
}

/// Expand `a..b` or `a..b..step` for integers (with zero padding) or
/// single characters. Returns `None` when `body` is not a sequence.
fn sequence(body: &str) -> Option<Vec<String>> {
    let pieces: Vec<&str> = body.split("..").collect();
    let (start, end, step) = match pieces.as_slice() {
        [start, end] => (*start, *end, None),
        [start, end, step] => (*start, *end, Some(*step)),
        _ => return None,
    };

    let step: i64 = match step {
        Some(raw) => raw.parse::<i64>().ok()?.checked_abs()?.max(1),
        None => 1,
    };

    if let (Ok(a), Ok(b)) = (start.parse::<i64>(), end.parse::<i64>()) {
        let width = if has_leading_zero(start) || has_leading_zero(end) {
            start.len().max(end.len())
        } else {
            0
        };
        let span = a.abs_diff(b) / step.unsigned_abs();
        if span >= MAX_BRACE_EXPANSION as u64 {
            return None;
        }
        let mut items = Vec::new();
        let mut current = a;
        loop {
            items.push(if width > 0 {
                pad_number(current, width)
            } else {
                current.to_string()
            });
            if current == b {
                break;
            }
            let next = if a <= b {
                current.checked_add(step)?
            } else {
                current.checked_sub(step)?
            };
            if (a <= b && next > b) || (a > b && next < b) {
                break;
            }
            current = next;
        }
        return Some(items);
    }

    let mut a_chars = start.chars();
    let mut b_chars = end.chars();
    match (a_chars.next(), a_chars.next(), b_chars.next(), b_chars.next()) {
        (Some(a), None, Some(b), None) => {
            let (lo, hi) = (u32::from(a), u32::from(b));
            let step = u32::try_from(step).ok()?;
            let codes: Vec<u32> = if lo <= hi {
                (lo..=hi).step_by(step as usize).collect()
            } else {
                (hi..=lo).rev().step_by(step as usize).collect()
            };
            Some(
                codes
                    .into_iter()
                    .filter_map(char::from_u32)
                    .map(String::from)
                    .collect(),
            )
        }
        _ => None,
    }
}

fn has_leading_zero(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    digits.len() > 1 && digits.starts_with('0')
}

fn pad_number(value: i64, width: usize) -> String {
    if value < 0 {
        format!("-{:0>w$}", value.unsigned_abs(), w = width.saturating_sub(1))
    } else {
        format!("{value:0>width$}")
    }
}
