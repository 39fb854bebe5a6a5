//! Dotted / bracket-indexed lookup into JSON documents.
//!
//! Paths look like `choices[0].message.content` or `output[*].content[*].text`.
//! A literal index selects one element, `[*]` fans out over every element and
//! evaluates the rest of the path against each of them.

use serde_json::Value;
use thiserror::Error;

/// Raised only for a malformed path literal, never for missing data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid JSON path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed path, reusable across documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    steps: Vec<Step>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.trim().is_empty() {
            return Err(PathError::new(path, "path is empty"));
        }

        let mut steps = Vec::new();
        for segment in path.split('.') {
            if segment.is_empty() {
                return Err(PathError::new(path, "empty segment"));
            }

            let (key, mut rest) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };

            if key.contains(']') {
                return Err(PathError::new(path, format!("unexpected ']' in '{}'", segment)));
            }
            if !key.is_empty() {
                steps.push(Step::Key(key.to_string()));
            } else if rest.is_empty() {
                return Err(PathError::new(path, "empty segment"));
            }

            while !rest.is_empty() {
                let inner = rest
                    .strip_prefix('[')
                    .ok_or_else(|| PathError::new(path, format!("expected '[' in '{}'", segment)))?;
                let close = inner
                    .find(']')
                    .ok_or_else(|| PathError::new(path, format!("unclosed '[' in '{}'", segment)))?;
                let index = &inner[..close];
                steps.push(match index {
                    "*" => Step::Wildcard,
                    _ => Step::Index(index.parse::<usize>().map_err(|_| {
                        PathError::new(path, format!("invalid index '{}'", index))
                    })?),
                });
                rest = &inner[close + 1..];
            }
        }

        Ok(Self {
            raw: path.to_string(),
            steps,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every non-empty leaf reachable through this path, in document order
    pub fn find_all(&self, doc: &Value) -> Vec<String> {
        let mut found = Vec::new();
        collect(doc, &self.steps, &mut found);
        found
    }

    /// The first non-empty leaf; whitespace-only leaves count as found
    pub fn find(&self, doc: &Value) -> Option<String> {
        self.find_all(doc).into_iter().next()
    }
}

fn collect(node: &Value, steps: &[Step], found: &mut Vec<String>) {
    let Some((step, rest)) = steps.split_first() else {
        if let Some(text) = leaf_text(node) {
            found.push(text);
        }
        return;
    };

    match step {
        Step::Key(key) => {
            if let Some(child) = node.get(key.as_str()) {
                collect(child, rest, found);
            }
        }
        Step::Index(index) => {
            if let Some(child) = node.as_array().and_then(|items| items.get(*index)) {
                collect(child, rest, found);
            }
        }
        Step::Wildcard => {
            if let Some(items) = node.as_array() {
                for child in items {
                    collect(child, rest, found);
                }
            }
        }
    }
}

fn leaf_text(node: &Value) -> Option<String> {
    match node {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Look up a single path, returning `Ok(None)` when nothing is there
pub fn extract(doc: &Value, path: &str) -> Result<Option<String>, PathError> {
    Ok(JsonPath::parse(path)?.find(doc))
}

/// Look up a single path and keep every match of a wildcard fan-out
pub fn extract_all(doc: &Value, path: &str) -> Result<Vec<String>, PathError> {
    Ok(JsonPath::parse(path)?.find_all(doc))
}

/// Try `paths` in order and return the first value that is not blank after trimming
pub fn first_non_blank<S: AsRef<str>>(doc: &Value, paths: &[S]) -> Result<Option<String>, PathError> {
    for path in paths {
        let parsed = JsonPath::parse(path.as_ref())?;
        if let Some(value) = parsed
            .find_all(doc)
            .into_iter()
            .find(|value| !value.trim().is_empty())
        {
            return Ok(Some(value));
        }
    }
    Ok(None)
}
