//! Recursive comparison of two document trees.
//!
//! Keys are visited in textual order over the union of both sides. A key
//! present on only one side yields a `Missing*` entry, two unequal
//! documents are descended into, and any other unequal pair is a single
//! `ValueMismatch` at that path. Whether two documents differ is derived
//! from the finished report alone.

use crate::document::{Document, KeyPath, Value};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum DiffEntry {
    MissingInLeft(KeyPath),
    MissingInRight(KeyPath),
    ValueMismatch {
        path: KeyPath,
        left: Value,
        right: Value,
    },
}

impl DiffEntry {
    pub fn path(&self) -> &KeyPath {
        match self {
            DiffEntry::MissingInLeft(path)
            | DiffEntry::MissingInRight(path)
            | DiffEntry::ValueMismatch { path, .. } => path,
        }
    }

    /// Renders the entry as a log line, naming each side.
    pub fn describe(&self, left_name: &str, right_name: &str) -> String {
        match self {
            DiffEntry::MissingInLeft(path) => {
                format!("Key {path} missing in {left_name}, present in {right_name}")
            }
            DiffEntry::MissingInRight(path) => {
                format!("Key {path} missing in {right_name}, present in {left_name}")
            }
            DiffEntry::ValueMismatch { path, left, right } => format!(
                "Key {path} differing: {left_name} gives: {left}. {right_name} gives: {right}."
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    entries: Vec<DiffEntry>,
}

impl DiffReport {
    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn differs(&self) -> bool {
        !self.entries.is_empty()
    }

    /// One log line per entry.
    pub fn describe<'a>(
        &'a self,
        left_name: &'a str,
        right_name: &'a str,
    ) -> impl Iterator<Item = String> + 'a {
        self.entries
            .iter()
            .map(move |entry| entry.describe(left_name, right_name))
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.describe("left", "right") {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

pub fn diff(left: &Document, right: &Document) -> DiffReport {
    let mut entries = Vec::new();
    diff_into(left, right, &KeyPath::root(), &mut entries);
    DiffReport { entries }
}

pub fn differs(left: &Document, right: &Document) -> bool {
    diff(left, right).differs()
}

fn diff_into(left: &Document, right: &Document, prefix: &KeyPath, out: &mut Vec<DiffEntry>) {
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    for key in keys {
        let path = prefix.child(key);
        match (left.get(key), right.get(key)) {
            (None, _) => out.push(DiffEntry::MissingInLeft(path)),
            (_, None) => out.push(DiffEntry::MissingInRight(path)),
            (Some(l), Some(r)) if l == r => {}
            (Some(Value::Document(l)), Some(Value::Document(r))) => diff_into(l, r, &path, out),
            (Some(l), Some(r)) => out.push(DiffEntry::ValueMismatch {
                path,
                left: l.clone(),
                right: r.clone(),
            }),
        }
    }
}
