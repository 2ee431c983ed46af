//! Core registry types
//!
//! [`ItemId`] is the registry-assigned identifier, [`Item`] the stored record
//! (parts as ids) and [`FullItem`] the resolved record (parts as nested items).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::str::FromStr;

/// Registry-assigned item identifier
///
/// Ids are handed out contiguously from zero in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    /// First id a fresh registry assigns
    pub const FIRST: Self = Self(0);

    /// Raw numeric value
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Id following this one, `None` on overflow
    #[inline]
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// Lifecycle state of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Usable; the state every item is created in
    Active,
    /// Terminal
    Broken,
}

/// Item record as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Registry-assigned id
    pub id: ItemId,
    /// Caller-chosen unique code
    pub code: String,
    /// Free-form classification
    #[serde(rename = "type")]
    pub item_type: String,
    /// Contributor identity
    pub added_by: String,
    /// Location or station tag
    pub bench: String,
    /// Opaque payload, stored as given
    pub params: Value,
    /// Ids of consumed sub-components, in the order supplied
    pub parts: Vec<ItemId>,
    /// Broken flag
    pub broken: bool,
    /// Opaque payload, stored as given
    pub additional_info: Value,
}

impl Item {
    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ItemState {
        if self.broken {
            ItemState::Broken
        } else {
            ItemState::Active
        }
    }

    /// True if the item references no parts
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Item with every part replaced by its resolved record, recursively
///
/// Part chains can be as long as the registry itself, so every traversal
/// here (clone, comparison, JSON output, drop) uses an explicit stack.
/// The JSON shape is that of [`Item`] with `parts` holding nested objects.
pub struct FullItem {
    /// Registry-assigned id
    pub id: ItemId,
    /// Caller-chosen unique code
    pub code: String,
    /// Free-form classification
    pub item_type: String,
    /// Contributor identity
    pub added_by: String,
    /// Location or station tag
    pub bench: String,
    /// Opaque payload
    pub params: Value,
    /// Resolved sub-components
    pub parts: Vec<FullItem>,
    /// Broken flag
    pub broken: bool,
    /// Opaque payload
    pub additional_info: Value,
}

/// Step of an iterative JSON walk
enum JsonStep<'a> {
    Open { item: &'a FullItem, first: bool },
    Close(&'a FullItem),
}

impl FullItem {
    /// Attach resolved parts to a stored record
    ///
    /// `parts` must be the resolutions of `item.parts`, in the same order.
    #[must_use]
    pub fn assemble(item: Item, parts: Vec<FullItem>) -> Self {
        debug_assert_eq!(item.parts.len(), parts.len());
        Self {
            id: item.id,
            code: item.code,
            item_type: item.item_type,
            added_by: item.added_by,
            bench: item.bench,
            params: item.params,
            parts,
            broken: item.broken,
            additional_info: item.additional_info,
        }
    }

    /// Number of items in this tree, including the root
    #[must_use]
    pub fn tree_size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.parts.iter());
        }
        count
    }

    /// Write the tree as a JSON object
    pub fn write_json<W: io::Write>(&self, mut out: W) -> serde_json::Result<()> {
        let mut steps = vec![JsonStep::Open { item: self, first: true }];
        while let Some(step) = steps.pop() {
            match step {
                JsonStep::Open { item, first } => {
                    if !first {
                        put(&mut out, b",")?;
                    }
                    put(&mut out, b"{\"id\":")?;
                    serde_json::to_writer(&mut out, &item.id)?;
                    put(&mut out, b",\"code\":")?;
                    serde_json::to_writer(&mut out, &item.code)?;
                    put(&mut out, b",\"type\":")?;
                    serde_json::to_writer(&mut out, &item.item_type)?;
                    put(&mut out, b",\"addedBy\":")?;
                    serde_json::to_writer(&mut out, &item.added_by)?;
                    put(&mut out, b",\"bench\":")?;
                    serde_json::to_writer(&mut out, &item.bench)?;
                    put(&mut out, b",\"params\":")?;
                    serde_json::to_writer(&mut out, &item.params)?;
                    put(&mut out, b",\"parts\":[")?;

                    steps.push(JsonStep::Close(item));
                    for (i, part) in item.parts.iter().enumerate().rev() {
                        steps.push(JsonStep::Open { item: part, first: i == 0 });
                    }
                }
                JsonStep::Close(item) => {
                    put(&mut out, b"],\"broken\":")?;
                    serde_json::to_writer(&mut out, &item.broken)?;
                    put(&mut out, b",\"additionalInfo\":")?;
                    serde_json::to_writer(&mut out, &item.additional_info)?;
                    put(&mut out, b"}")?;
                }
            }
        }
        Ok(())
    }

    /// The tree as a JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut buf = Vec::new();
        self.write_json(&mut buf)?;
        into_string(buf)
    }

    /// `items` as a JSON array of trees
    pub fn list_to_json(items: &[FullItem]) -> serde_json::Result<String> {
        let mut buf = vec![b'['];
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                buf.push(b',');
            }
            item.write_json(&mut buf)?;
        }
        buf.push(b']');
        into_string(buf)
    }

    /// Copy of this node with `parts` in place of its own
    fn with_parts(&self, parts: Vec<FullItem>) -> Self {
        Self {
            id: self.id,
            code: self.code.clone(),
            item_type: self.item_type.clone(),
            added_by: self.added_by.clone(),
            bench: self.bench.clone(),
            params: self.params.clone(),
            parts,
            broken: self.broken,
            additional_info: self.additional_info.clone(),
        }
    }

    fn same_node(&self, other: &Self) -> bool {
        self.id == other.id
            && self.code == other.code
            && self.item_type == other.item_type
            && self.added_by == other.added_by
            && self.bench == other.bench
            && self.params == other.params
            && self.parts.len() == other.parts.len()
            && self.broken == other.broken
            && self.additional_info == other.additional_info
    }
}

fn put<W: io::Write>(out: &mut W, bytes: &[u8]) -> serde_json::Result<()> {
    out.write_all(bytes).map_err(serde::ser::Error::custom)
}

fn into_string(buf: Vec<u8>) -> serde_json::Result<String> {
    String::from_utf8(buf).map_err(serde::ser::Error::custom)
}

impl Clone for FullItem {
    fn clone(&self) -> Self {
        let mut current = (self, Vec::with_capacity(self.parts.len()));
        let mut ancestors: Vec<(&FullItem, Vec<FullItem>)> = Vec::new();
        loop {
            let source: &FullItem = current.0;
            if let Some(part) = source.parts.get(current.1.len()) {
                let child = (part, Vec::with_capacity(part.parts.len()));
                ancestors.push(std::mem::replace(&mut current, child));
                continue;
            }

            let (source, parts) = current;
            let done = source.with_parts(parts);
            match ancestors.pop() {
                Some(mut parent) => {
                    parent.1.push(done);
                    current = parent;
                }
                None => return done,
            }
        }
    }
}

impl PartialEq for FullItem {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if !a.same_node(b) {
                return false;
            }
            pending.extend(a.parts.iter().zip(b.parts.iter()));
        }
        true
    }
}

// Parts are listed by id only.
impl fmt::Debug for FullItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts: Vec<ItemId> = self.parts.iter().map(|part| part.id).collect();
        f.debug_struct("FullItem")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("item_type", &self.item_type)
            .field("added_by", &self.added_by)
            .field("bench", &self.bench)
            .field("params", &self.params)
            .field("parts", &parts)
            .field("broken", &self.broken)
            .field("additional_info", &self.additional_info)
            .finish()
    }
}

// Flattens the tree before dropping so long part chains do not recurse.
impl Drop for FullItem {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.parts);
        while let Some(mut part) = pending.pop() {
            pending.append(&mut part.parts);
        }
    }
}

/// Summary of a registry instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    /// Owner address
    pub owner: String,
    /// Registry type tag, `"other"` by default
    pub kind: String,
    /// Number of items created so far
    pub items: u64,
}
