//! Persistence of trained maps: a line-oriented text format and compact
//! binary snapshots.

mod format;
mod snapshot;

pub use format::{format_list, parse_list, SomFormat, TagReader, TagWriter};
pub use snapshot::{load_snapshot, save_snapshot};
