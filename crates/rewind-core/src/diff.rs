//! Invertible JSON patches between consecutive node states.
//!
//! Commands stored on the diff chain are RFC 6902 JSON patches written in the
//! *invertible* style: every `remove` and `replace` is immediately preceded
//! by a `test` op carrying the value being discarded. That extra `test` is
//! what lets [`invert`] rebuild the previous state without consulting the
//! document.
//!
//! All functions here are pure: [`apply`] consumes its input document and
//! returns a new one, leaving nothing half-applied on error from the caller's
//! point of view.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    /// The op name as written on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
            Self::Test { .. } => "test",
        }
    }

    /// Target pointer of the op.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }
}

/// An ordered list of operations. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub Vec<PatchOp>);

impl Patch {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOp> {
        self.0.iter()
    }
}

impl From<Vec<PatchOp>> for Patch {
    fn from(ops: Vec<PatchOp>) -> Self {
        Self(ops)
    }
}

/// Errors from applying or inverting a patch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// The pointer is not a valid RFC 6901 JSON pointer.
    #[error("invalid JSON pointer '{pointer}'")]
    InvalidPointer { pointer: String },

    /// The pointer (or its parent) does not exist in the document.
    #[error("path '{path}' not found in document")]
    PathNotFound { path: String },

    /// An array index is out of bounds or not a number.
    #[error("invalid array index at '{path}'")]
    InvalidIndex { path: String },

    /// A `test` op did not hold.
    #[error("test failed at '{path}'")]
    TestFailed { path: String },

    /// A `move` whose target lies inside its own source.
    #[error("cannot move '{from}' into its own child '{path}'")]
    MoveIntoSelf { from: String, path: String },

    /// The op cannot be inverted (e.g. `remove` without a preceding `test`).
    #[error("cannot invert '{op}' at '{path}' without a preceding test")]
    NotInvertible { op: &'static str, path: String },
}

// ---------------------------------------------------------------------------
// Pointers
// ---------------------------------------------------------------------------

fn parse_pointer(pointer: &str) -> Result<Vec<String>, DiffError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(DiffError::InvalidPointer {
            pointer: pointer.to_string(),
        });
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn child_pointer(parent: &str, token: &str) -> String {
    format!("{parent}/{}", escape_token(token))
}

fn not_found(path: &str) -> DiffError {
    DiffError::PathNotFound {
        path: path.to_string(),
    }
}

fn invalid_index(path: &str) -> DiffError {
    DiffError::InvalidIndex {
        path: path.to_string(),
    }
}

fn parse_index(token: &str, path: &str) -> Result<usize, DiffError> {
    if token.len() > 1 && token.starts_with('0') {
        return Err(invalid_index(path));
    }
    token.parse().map_err(|_| invalid_index(path))
}

fn resolve_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, DiffError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token).ok_or_else(|| not_found(path))?,
            Value::Array(items) => {
                let idx = parse_index(token, path)?;
                items.get_mut(idx).ok_or_else(|| invalid_index(path))?
            }
            _ => return Err(not_found(path)),
        };
    }
    Ok(current)
}

fn get<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, DiffError> {
    let tokens = parse_pointer(path)?;
    let mut current = doc;
    for token in &tokens {
        current = match current {
            Value::Object(map) => map.get(token).ok_or_else(|| not_found(path))?,
            Value::Array(items) => {
                let idx = parse_index(token, path)?;
                items.get(idx).ok_or_else(|| invalid_index(path))?
            }
            _ => return Err(not_found(path)),
        };
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), DiffError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parent_tokens, path)? {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let idx = parse_index(last, path)?;
            if idx > items.len() {
                return Err(invalid_index(path));
            }
            items.insert(idx, value);
            Ok(())
        }
        _ => Err(not_found(path)),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, DiffError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Err(not_found(path));
    };
    match resolve_mut(doc, parent_tokens, path)? {
        Value::Object(map) => map.remove(last).ok_or_else(|| not_found(path)),
        Value::Array(items) => {
            let idx = parse_index(last, path)?;
            if idx >= items.len() {
                return Err(invalid_index(path));
            }
            Ok(items.remove(idx))
        }
        _ => Err(not_found(path)),
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), DiffError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(drop),
        PatchOp::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            *resolve_mut(doc, &tokens, path)? = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if path.starts_with(from.as_str()) && path[from.len()..].starts_with('/') {
                return Err(DiffError::MoveIntoSelf {
                    from: from.clone(),
                    path: path.clone(),
                });
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOp::Copy { from, path } => {
            let value = get(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOp::Test { path, value } => {
            if get(doc, path)? == value {
                Ok(())
            } else {
                Err(DiffError::TestFailed { path: path.clone() })
            }
        }
    }
}

/// Apply `patch` to `doc`, returning the patched document.
///
/// # Errors
///
/// Returns a [`DiffError`] when an op targets a path absent from the
/// evolving document, an index is out of range, or a `test` fails.
pub fn apply(patch: &Patch, mut doc: Value) -> Result<Value, DiffError> {
    for op in patch.iter() {
        apply_op(&mut doc, op)?;
    }
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Invert
// ---------------------------------------------------------------------------

/// Build the patch that undoes `patch`.
///
/// Ops are walked from last to first. `remove` and `replace` consume the
/// `test` directly before them to recover the discarded value; a bare
/// `test` is kept as-is.
///
/// # Errors
///
/// Returns [`DiffError::NotInvertible`] for a `remove`/`replace` that is
/// not preceded by a `test` on the same path.
pub fn invert(patch: &Patch) -> Result<Patch, DiffError> {
    let ops = &patch.0;
    let mut inverted = Vec::with_capacity(ops.len());
    let mut idx = ops.len();

    while idx > 0 {
        idx -= 1;
        let op = &ops[idx];
        match op {
            PatchOp::Add { path, value } => {
                inverted.push(PatchOp::Test {
                    path: path.clone(),
                    value: value.clone(),
                });
                inverted.push(PatchOp::Remove { path: path.clone() });
            }
            PatchOp::Remove { path } => {
                let prior = preceding_test(ops, idx, op)?;
                inverted.push(PatchOp::Add {
                    path: path.clone(),
                    value: prior.clone(),
                });
                idx -= 1;
            }
            PatchOp::Replace { path, value } => {
                let prior = preceding_test(ops, idx, op)?;
                inverted.push(PatchOp::Test {
                    path: path.clone(),
                    value: value.clone(),
                });
                inverted.push(PatchOp::Replace {
                    path: path.clone(),
                    value: prior.clone(),
                });
                idx -= 1;
            }
            PatchOp::Move { from, path } => inverted.push(PatchOp::Move {
                from: path.clone(),
                path: from.clone(),
            }),
            PatchOp::Copy { path, .. } => inverted.push(PatchOp::Remove { path: path.clone() }),
            PatchOp::Test { .. } => inverted.push(op.clone()),
        }
    }

    Ok(Patch(inverted))
}

fn preceding_test<'a>(
    ops: &'a [PatchOp],
    idx: usize,
    op: &PatchOp,
) -> Result<&'a Value, DiffError> {
    let err = || DiffError::NotInvertible {
        op: op.name(),
        path: op.path().to_string(),
    };
    let prev = idx.checked_sub(1).and_then(|i| ops.get(i)).ok_or_else(err)?;
    match prev {
        PatchOp::Test { path, value } if path == op.path() => Ok(value),
        _ => Err(err()),
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Produce an invertible patch turning `from` into `to`.
///
/// Objects are diffed key by key (recursively); any other differing value,
/// arrays included, is replaced wholesale.
#[must_use]
pub fn diff(from: &Value, to: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_at("", from, to, &mut ops);
    Patch(ops)
}

fn diff_at(path: &str, from: &Value, to: &Value, ops: &mut Vec<PatchOp>) {
    if from == to {
        return;
    }
    match (from, to) {
        (Value::Object(a), Value::Object(b)) => diff_objects(path, a, b, ops),
        _ => {
            ops.push(PatchOp::Test {
                path: path.to_string(),
                value: from.clone(),
            });
            ops.push(PatchOp::Replace {
                path: path.to_string(),
                value: to.clone(),
            });
        }
    }
}

fn diff_objects(
    path: &str,
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    ops: &mut Vec<PatchOp>,
) {
    for (key, old) in a {
        let child = child_pointer(path, key);
        match b.get(key) {
            Some(new) => diff_at(&child, old, new, ops),
            None => {
                ops.push(PatchOp::Test {
                    path: child.clone(),
                    value: old.clone(),
                });
                ops.push(PatchOp::Remove { path: child });
            }
        }
    }
    for (key, new) in b {
        if !a.contains_key(key) {
            ops.push(PatchOp::Add {
                path: child_pointer(path, key),
                value: new.clone(),
            });
        }
    }
}
