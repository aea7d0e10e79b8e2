// Key-value table used to publish configuration and receive overrides
//
// Keys are slash-separated paths ("wheelController/kP"). Values written by the
// local side are queued for publishing; values arriving from outside are
// stored with `apply_remote` and read back by the configuration objects.

use std::collections::BTreeMap;

/// Flat table of numeric configuration entries
#[derive(Debug, Default)]
pub struct ConfigTable {
    values: BTreeMap<String, f64>,
    outgoing: Vec<(String, f64)>,
}

impl ConfigTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// View of the whole table
    pub fn root(&mut self) -> TableScope<'_> {
        TableScope {
            table: self,
            prefix: String::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Store a value received from outside; it is not re-published
    pub fn apply_remote(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    /// Entries written locally since the last call
    pub fn take_outgoing(&mut self) -> Vec<(String, f64)> {
        std::mem::take(&mut self.outgoing)
    }
}

/// A sub-table: every key is prefixed with the scope's path
pub struct TableScope<'t> {
    table: &'t mut ConfigTable,
    prefix: String,
}

impl TableScope<'_> {
    pub fn subtable(&mut self, name: &str) -> TableScope<'_> {
        TableScope {
            prefix: self.key(name),
            table: &mut *self.table,
        }
    }

    pub fn set_f64(&mut self, name: &str, value: f64) {
        let key = self.key(name);
        self.table.values.insert(key.clone(), value);
        self.table.outgoing.push((key, value));
    }

    /// Value under `name`, or `default` when nothing is stored
    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        self.table.get(&self.key(name)).unwrap_or(default)
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

/// Something that mirrors its tunable values into a config table
///
/// The first call publishes current values; later calls pick up overrides.
pub trait TablePopulator {
    fn populate_table(&mut self, table: &mut TableScope<'_>);
}
