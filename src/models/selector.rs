//! Which file fields an extractor expects, and how it shapes its results.

use std::collections::HashMap;

/// One expected file field for [`Selector::Fields`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Upper bound on files under `name`; `None` means unbounded.
    pub max_count: Option<usize>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, max_count: usize) -> Self {
        Self {
            name: name.into(),
            max_count: Some(max_count),
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_count: None,
        }
    }
}

/// The five extraction entry points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// At most one file under the given field, exposed as `file`.
    Single(String),
    /// Files under one field, exposed as a flat `files` list.
    Array(String, Option<usize>),
    /// Files under several named fields, exposed as `files` keyed by field.
    Fields(Vec<FieldSpec>),
    /// Any file under any field, exposed as a flat `files` list.
    Any,
    /// Text fields only; any file is unexpected.
    None,
}

/// How accepted files are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FileStrategy {
    Value,
    List,
    Keyed,
    Discard,
}

impl Selector {
    pub(crate) fn strategy(&self) -> FileStrategy {
        match self {
            Selector::Single(_) => FileStrategy::Value,
            Selector::Array(..) | Selector::Any => FileStrategy::List,
            Selector::Fields(_) => FileStrategy::Keyed,
            Selector::None => FileStrategy::Discard,
        }
    }

    /// Remaining file allowance per field for one request, or `None` when any
    /// file is welcome. A `None` allowance inside the map is unbounded.
    pub(crate) fn allowance(&self) -> Option<HashMap<String, Option<usize>>> {
        match self {
            Selector::Single(name) => Some(HashMap::from([(name.clone(), Some(1))])),
            Selector::Array(name, max) => Some(HashMap::from([(name.clone(), *max)])),
            Selector::Fields(specs) => {
                let mut allowance = HashMap::new();
                for spec in specs {
                    allowance.insert(spec.name.clone(), spec.max_count);
                }
                Some(allowance)
            }
            Selector::Any => None,
            Selector::None => Some(HashMap::new()),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Selector::Single(_) => "single",
            Selector::Array(..) => "array",
            Selector::Fields(_) => "fields",
            Selector::Any => "any",
            Selector::None => "none",
        }
    }
}
