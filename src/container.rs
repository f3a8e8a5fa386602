//! The in-memory archive model (spec.md C4): an ordered name→entry
//! mapping plus archive-level state (comment, ZIP64 promotion,
//! zipalign policy) and the "input snapshot" that backs `unchange_*`.

use crate::entry::Entry;
use crate::error::{Error, Result};
use indexmap::IndexMap;

/// Entry count past which the classical EOCD can no longer hold the
/// total (spec.md 3/8): 0xFFFE is the last value representable without
/// promoting to ZIP64.
const MAX_ENTRIES_WITHOUT_ZIP64: usize = 0xFFFE;

#[derive(Debug, Clone, Default)]
pub struct Container {
    entries: IndexMap<String, Entry>,
    comment: String,
    zip_align: Option<u32>,
    /// Snapshot of entries/comment captured at open, for `unchange_*`
    /// (spec.md 4.8). `None` for containers created fresh (nothing to
    /// revert to).
    input_entries: Option<IndexMap<String, Entry>>,
    input_comment: Option<String>,
}

impl Container {
    pub fn new() -> Self {
        Container::default()
    }

    /// Record the current entries/comment as the "input" snapshot,
    /// called once by the reader right after populating a freshly
    /// opened container.
    pub fn snapshot_input(&mut self) {
        self.input_entries = Some(self.entries.clone());
        self.input_comment = Some(self.comment.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Entry)> {
        self.entries.iter_mut()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Insert a brand-new entry, preserving insertion order. Rejects a
    /// name already present (spec.md 4.8 `add_*` guarantees).
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        let name = entry.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(Error::DuplicateEntry(name));
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Insert or overwrite, used by the reader populating a container
    /// from a central directory (names there are already unique by
    /// construction, but silently last-wins matches common unzip tools).
    pub fn insert_or_replace(&mut self, entry: Entry) {
        let name = entry.name().to_string();
        self.entries.insert(name, entry);
    }

    pub fn remove(&mut self, name: &str) -> Result<Entry> {
        self.entries
            .shift_remove(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Rename, preserving the entry's position in iteration order
    /// (spec.md 5). Destination must not already exist.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.entries.contains_key(new) {
            return Err(Error::DuplicateEntry(new.to_string()));
        }
        let index = self
            .entries
            .get_index_of(old)
            .ok_or_else(|| Error::EntryNotFound(old.to_string()))?;
        let mut entry = self.entries.shift_remove_index(index).unwrap().1;
        entry.set_name(new)?;
        self.entries.shift_insert(index, new.to_string(), entry);
        Ok(())
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: &str) -> Result<()> {
        if comment.len() > 0xFFFF {
            return Err(Error::InvalidArgument(
                "archive comment exceeds 0xFFFF bytes".to_string(),
            ));
        }
        self.comment = comment.to_string();
        Ok(())
    }

    pub fn zip_align(&self) -> Option<u32> {
        self.zip_align
    }

    pub fn set_zip_align(&mut self, multiple: Option<u32>) -> Result<()> {
        if let Some(m) = multiple {
            if m == 0 {
                return Err(Error::InvalidArgument("zip_align multiple must be >= 1".to_string()));
            }
        }
        self.zip_align = multiple;
        Ok(())
    }

    /// Whether the archive as a whole requires ZIP64 (spec.md 3): any
    /// entry individually needs it, or the entry count itself overflows
    /// the classical EOCD's 16-bit counter.
    pub fn needs_zip64(&self) -> bool {
        self.entries.len() > MAX_ENTRIES_WITHOUT_ZIP64 || self.entries.values().any(|e| e.needs_zip64())
    }

    /// Revert every entry to its state at open, discarding additions
    /// made since (spec.md 4.8 `unchange_all`). No-op if this container
    /// was never populated by the reader.
    pub fn unchange_all(&mut self) {
        if let Some(input) = &self.input_entries {
            self.entries = input.clone();
        }
    }

    pub fn unchange_entry(&mut self, name: &str) -> Result<()> {
        let input = self
            .input_entries
            .as_ref()
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        match input.get(name) {
            Some(original) => {
                self.entries.insert(name.to_string(), original.clone());
                Ok(())
            }
            None => {
                self.entries.shift_remove(name);
                Ok(())
            }
        }
    }

    pub fn unchange_archive_comment(&mut self) {
        if let Some(comment) = &self.input_comment {
            self.comment = comment.clone();
        }
    }
}
