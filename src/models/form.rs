//! Parsed form contents: the text-field body and the collected files.
//!
//! Text fields are merged into a JSON object following the HTML JSON form
//! encoding rules, so `pet[0][name]=Hypatia` becomes
//! `{"pet": [{"name": "Hypatia"}]}` and a repeated key becomes an array.

use crate::models::file::UploadedFile;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Text fields of a multipart form.
pub type FormBody = Map<String, Value>;

/// Indices above this are kept as object keys instead of growing an array.
const MAX_ARRAY_INDEX: usize = 10_000;

/// Files collected by an extractor, shaped by its selector.
#[derive(Serialize, Clone, Debug)]
#[serde(untagged)]
pub enum Files {
    /// `array` and `any`: every accepted file in arrival order.
    List(Vec<UploadedFile>),
    /// `fields`: accepted files grouped by field name.
    Fields(BTreeMap<String, Vec<UploadedFile>>),
}

impl Files {
    /// Number of files across all fields.
    pub fn len(&self) -> usize {
        match self {
            Files::List(files) => files.len(),
            Files::Fields(map) => map.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_list(&self) -> Option<&[UploadedFile]> {
        match self {
            Files::List(files) => Some(files),
            Files::Fields(_) => None,
        }
    }

    /// Files stored under `field`. For a flat list this filters by field name.
    pub fn field(&self, field: &str) -> Vec<&UploadedFile> {
        match self {
            Files::List(files) => files.iter().filter(|f| f.field_name == field).collect(),
            Files::Fields(map) => map
                .get(field)
                .map(|files| files.iter().collect())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn push(&mut self, file: UploadedFile) {
        match self {
            Files::List(files) => files.push(file),
            Files::Fields(map) => map.entry(file.field_name.clone()).or_default().push(file),
        }
    }
}

/// Everything an extractor produced for one request.
///
/// Stored in the request extensions by [`crate::Extractor::handle`]. A slot is
/// `None` when the selector does not produce it or when the request was not
/// multipart.
#[derive(Serialize, Clone, Debug, Default)]
pub struct UploadedForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<FormBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<UploadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Files>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    fn as_name(&self) -> String {
        match self {
            Key::Name(name) => name.clone(),
            Key::Index(index) => index.to_string(),
        }
    }
}

#[derive(Debug)]
struct Step {
    key: Key,
    append: bool,
    next_is_array: bool,
    last: bool,
}

impl Step {
    fn new(key: Key) -> Self {
        Self {
            key,
            append: false,
            next_is_array: false,
            last: false,
        }
    }
}

/// Merge one text field into `body`, expanding bracketed names.
pub fn append_field(body: &mut FormBody, name: &str, value: impl Into<String>) {
    let value = Value::String(value.into());
    let steps = parse_path(name);

    let mut root = Value::Object(std::mem::take(body));
    let mut context = &mut root;
    for step in &steps {
        if step.last {
            set_last(slot(context, &step.key), step.append, value);
            break;
        }
        context = descend(context, step);
    }

    if let Value::Object(map) = root {
        *body = map;
    }
}

fn parse_path(path: &str) -> Vec<Step> {
    let verbatim = || {
        let mut step = Step::new(Key::Name(path.to_string()));
        step.last = true;
        vec![step]
    };

    let first_len = path.find('[').unwrap_or(path.len());
    if first_len == 0 {
        return verbatim();
    }

    let mut steps = vec![Step::new(Key::Name(path[..first_len].to_string()))];
    let mut rest = &path[first_len..];
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("[]") {
            if !after.is_empty() {
                return verbatim();
            }
            if let Some(tail) = steps.last_mut() {
                tail.append = true;
            }
            rest = after;
            continue;
        }

        let Some(inner) = rest.strip_prefix('[') else {
            return verbatim();
        };
        let Some(close) = inner.find(']') else {
            return verbatim();
        };
        let segment = &inner[..close];
        let key = match segment.parse::<usize>() {
            Ok(index) if segment.bytes().all(|b| b.is_ascii_digit()) && index <= MAX_ARRAY_INDEX => {
                Key::Index(index)
            }
            _ => Key::Name(segment.to_string()),
        };

        if let Some(tail) = steps.last_mut() {
            tail.next_is_array = matches!(key, Key::Index(_));
        }
        steps.push(Step::new(key));
        rest = &inner[close + 1..];
    }

    if let Some(tail) = steps.last_mut() {
        tail.last = true;
    }
    steps
}

/// The value slot for `key` inside `context`, created as `Null` if missing.
fn slot<'a>(context: &'a mut Value, key: &Key) -> &'a mut Value {
    let array_slot = matches!((&*context, key), (Value::Array(_), Key::Index(_)));
    if !array_slot && !context.is_object() {
        *context = Value::Object(into_object(context.take()));
    }

    match (context, key) {
        (Value::Array(items), Key::Index(index)) => {
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[*index]
        }
        (Value::Object(map), key) => map.entry(key.as_name()).or_insert(Value::Null),
        (other, _) => other,
    }
}

/// Make the slot for a non-final step a container and return it.
fn descend<'a>(context: &'a mut Value, step: &Step) -> &'a mut Value {
    let current = slot(context, &step.key);
    let keep = match &*current {
        Value::Object(_) => true,
        Value::Array(_) => step.next_is_array,
        _ => false,
    };
    if !keep {
        *current = match current.take() {
            Value::Null if step.next_is_array => Value::Array(Vec::new()),
            other => Value::Object(into_object(other)),
        };
    }
    current
}

fn set_last(current: &mut Value, append: bool, value: Value) {
    if current.is_null() {
        *current = if append { Value::Array(vec![value]) } else { value };
        return;
    }
    match current {
        Value::Array(items) => items.push(value),
        Value::Object(map) => set_last(map.entry("").or_insert(Value::Null), false, value),
        scalar => {
            let previous = scalar.take();
            *scalar = Value::Array(vec![previous, value]);
        }
    }
}

fn into_object(value: Value) -> FormBody {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Null => Map::new(),
        scalar => Map::from_iter([(String::new(), scalar)]),
    }
}
