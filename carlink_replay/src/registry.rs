use carlink::config::RegistryEntry;
use std::collections::HashMap;

pub const NOT_FOUND: &str = "NOT FOUND";

/// Identifier -> vehicle number table used to authenticate decoded values.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<u32, String>,
}

impl Registry {
    /// Builds the table; when an id repeats, its first registration wins.
    pub fn from_entries(entries: &[RegistryEntry]) -> Self {
        let mut table = HashMap::with_capacity(entries.len());
        for entry in entries {
            table.entry(entry.id).or_insert_with(|| entry.vehicle.clone());
        }
        Self { entries: table }
    }

    pub fn lookup(&self, id: u32) -> &str {
        self.entries.get(&id).map_or(NOT_FOUND, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
