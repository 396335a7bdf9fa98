//! Data shapes produced by the extraction engine.
//!
//! Parsed text fields live in a JSON object (`FormBody`), uploaded files are
//! described by `UploadedFile`, and `Selector` names which files a request
//! may carry. All of them serialize naturally as JSON via `serde`.

pub mod file;
pub mod form;
pub mod selector;
