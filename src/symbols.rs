use std::fmt;

use indexmap::IndexMap;

use crate::operand::ValueType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// ASCII block; shown as `String` in the names table. No directive
    /// declares one yet.
    Ascii,
    Byte,
    Word,
    Label,
}

impl From<ValueType> for SymbolKind {
    fn from(t: ValueType) -> Self {
        match t {
            ValueType::Byte => SymbolKind::Byte,
            ValueType::Word => SymbolKind::Word,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Ascii => "String",
            SymbolKind::Byte => "Byte",
            SymbolKind::Word => "Word",
            SymbolKind::Label => "Label",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub kind: SymbolKind,
    pub address: u16,
}

/// Names table: uppercase identifier -> (kind, address), in insertion order.
#[derive(Debug, Default, Clone)]
pub struct NamesTable {
    map: IndexMap<String, SymbolEntry>,
}

impl NamesTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new name. An existing name is left untouched and returned
    /// back as the error.
    pub fn insert(&mut self, name: &str, kind: SymbolKind, address: u16) -> Result<(), String> {
        let key = name.to_uppercase();
        if self.map.contains_key(&key) {
            return Err(key);
        }
        self.map.insert(key, SymbolEntry { kind, address });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SymbolEntry> {
        self.map.get(&name.to_uppercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolEntry)> {
        self.map.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
