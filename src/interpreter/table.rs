//! Hybrid array/hash table
//!
//! Positive integer keys `1..=n` live in a dense array part; every other key
//! lives in a hash part that remembers insertion order. Removing a hash key
//! leaves a tombstone behind so `next` can still continue from it while a
//! traversal clears fields. Keys that move into the array part are dropped
//! from the hash index entirely.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use thiserror::Error;

use crate::interpreter::value::{Address, Value};

pub type TableRef = Rc<RefCell<Table>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table index is nil")]
    NilKey,
    #[error("table index is NaN")]
    NaNKey,
    #[error("invalid key to 'next'")]
    InvalidNextKey,
}

#[derive(Default, Debug)]
pub struct Table {
    array: Vec<Value>,
    /// Key address -> slot in `entries`
    index: HashMap<Address, usize>,
    /// Hash part in insertion order; a nil value marks a removed key
    entries: Vec<(Value, Value)>,
    live: usize,
    metatable: Option<TableRef>,
}

/// Zero-based array slot for keys that are positive integers
fn array_slot(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if n.fract() == 0.0 && *n >= 1.0 && *n <= u32::MAX as f64 => {
            Some(*n as usize - 1)
        }
        _ => None,
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose array part holds `values`, stopping at the first nil
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let mut table = Self::new();
        for (i, value) in values.into_iter().enumerate() {
            // integer keys are never rejected
            let _ = table.set(Value::Number((i + 1) as f64), value);
        }
        table
    }

    pub fn into_ref(self) -> TableRef {
        Rc::new(RefCell::new(self))
    }

    // ==================== Raw access ====================

    pub fn get(&self, key: &Value) -> Value {
        if let Some(slot) = array_slot(key) {
            if let Some(value) = self.array.get(slot) {
                return value.clone();
            }
        }
        match key {
            Value::Nil => Value::Nil,
            Value::Number(n) if n.is_nan() => Value::Nil,
            _ => self.hash_get(&key.address()),
        }
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.hash_get(&Address::String(key.into()))
    }

    pub fn get_index(&self, index: usize) -> Value {
        self.get(&Value::Number(index as f64))
    }

    /// Store `value` under `key`; assigning nil removes the key.
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), TableError> {
        match key {
            Value::Nil => return Err(TableError::NilKey),
            Value::Number(n) if n.is_nan() => return Err(TableError::NaNKey),
            _ => {}
        }

        if let Some(slot) = array_slot(&key) {
            let len = self.array.len();
            if slot < len {
                if !value.is_nil() {
                    self.array[slot] = value;
                } else if slot + 1 == len {
                    self.array.pop();
                } else {
                    self.split_array(slot);
                }
                return Ok(());
            }
            if slot == len && !value.is_nil() {
                self.hash_take(&key.address());
                self.array.push(value);
                self.migrate_from_hash();
                return Ok(());
            }
        }

        if value.is_nil() {
            self.hash_remove(&key.address());
        } else {
            self.hash_insert(key, value);
        }
        Ok(())
    }

    pub fn set_str(&mut self, key: &str, value: Value) {
        if value.is_nil() {
            self.hash_remove(&Address::String(key.into()));
        } else {
            self.hash_insert(Value::string(key), value);
        }
    }

    /// The border of the array part
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.live == 0
    }

    pub fn array(&self) -> &[Value] {
        &self.array
    }

    pub fn array_mut(&mut self) -> &mut Vec<Value> {
        &mut self.array
    }

    /// Insert into the array part at a zero-based position, shifting up
    pub fn insert(&mut self, position: usize, value: Value) {
        if value.is_nil() {
            return;
        }
        let position = position.min(self.array.len());
        self.array.insert(position, value);
        self.migrate_from_hash();
    }

    /// Remove from the array part at a zero-based position, shifting down
    pub fn remove(&mut self, position: usize) -> Value {
        if position < self.array.len() {
            self.array.remove(position)
        } else {
            Value::Nil
        }
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }

    // ==================== Traversal ====================

    /// The entry after `key`: array part first, then the hash part in
    /// insertion order. `nil` starts a traversal.
    pub fn next(&self, key: &Value) -> Result<Option<(Value, Value)>, TableError> {
        let start = match key {
            Value::Nil => Cursor::Array(0),
            _ => match array_slot(key) {
                Some(slot) if slot < self.array.len() => Cursor::Array(slot + 1),
                slot => match self.index.get(&key.address()) {
                    Some(&entry) => Cursor::Hash(entry + 1),
                    // an array key cleared during the traversal; nothing in
                    // the hash part has been visited yet
                    None if slot.is_some() => Cursor::Hash(0),
                    None => return Err(TableError::InvalidNextKey),
                },
            },
        };

        let hash_start = match start {
            Cursor::Array(slot) => {
                if let Some(value) = self.array.get(slot) {
                    return Ok(Some((Value::Number((slot + 1) as f64), value.clone())));
                }
                0
            }
            Cursor::Hash(entry) => entry,
        };

        Ok(self.entries[hash_start.min(self.entries.len())..]
            .iter()
            .find(|(_, value)| !value.is_nil())
            .cloned())
    }

    /// All live entries in traversal order
    pub fn pairs(&self) -> Vec<(Value, Value)> {
        let array = self
            .array
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::Number((i + 1) as f64), v.clone()));
        let hash = self.entries.iter().filter(|(_, v)| !v.is_nil()).cloned();
        array.chain(hash).collect()
    }

    // ==================== Hash part ====================

    fn hash_get(&self, address: &Address) -> Value {
        self.index
            .get(address)
            .map(|&entry| self.entries[entry].1.clone())
            .unwrap_or_default()
    }

    fn hash_insert(&mut self, key: Value, value: Value) {
        let address = key.address();
        if let Some(&entry) = self.index.get(&address) {
            if self.entries[entry].1.is_nil() {
                self.live += 1;
            }
            self.entries[entry].1 = value;
            return;
        }
        if self.entries.len() >= 8 && self.entries.len() > self.live * 2 {
            self.compact();
        }
        self.index.insert(address, self.entries.len());
        self.entries.push((key, value));
        self.live += 1;
    }

    fn hash_remove(&mut self, address: &Address) -> Value {
        match self.index.get(address) {
            Some(&entry) if !self.entries[entry].1.is_nil() => {
                self.live -= 1;
                std::mem::take(&mut self.entries[entry].1)
            }
            _ => Value::Nil,
        }
    }

    /// Remove a key from the hash part without leaving a tombstone
    fn hash_take(&mut self, address: &Address) -> Value {
        match self.index.remove(address) {
            Some(entry) => {
                let value = std::mem::take(&mut self.entries[entry].1);
                if !value.is_nil() {
                    self.live -= 1;
                }
                value
            }
            None => Value::Nil,
        }
    }

    /// Drop tombstones, keeping insertion order
    fn compact(&mut self) {
        self.entries.retain(|(_, value)| !value.is_nil());
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.address(), i))
            .collect();
    }

    /// Pull keys `len+1, len+2, ...` out of the hash part into the array
    fn migrate_from_hash(&mut self) {
        loop {
            let address = Address::number((self.array.len() + 1) as f64);
            let value = self.hash_take(&address);
            if value.is_nil() {
                break;
            }
            self.array.push(value);
        }
    }

    /// Clear array slot `slot` and move everything after it to the hash part
    fn split_array(&mut self, slot: usize) {
        let tail = self.array.split_off(slot + 1);
        self.array.truncate(slot);
        for (offset, value) in tail.into_iter().enumerate() {
            self.hash_insert(Value::Number((slot + 2 + offset) as f64), value);
        }
    }
}

enum Cursor {
    Array(usize),
    Hash(usize),
}

// ==================== Pretty printing ====================

/// Tables nested deeper than this print as `{...}`
const MAX_PRINT_DEPTH: usize = 100;

/// Multi-line rendering used by `print` for tables. Tables that are already
/// being printed further up are shown as a cycle marker.
pub fn stringify(table: &TableRef) -> String {
    let mut out = String::new();
    let mut visiting = HashSet::new();
    write_table(table, 0, &mut visiting, &mut out);
    out
}

fn write_table(table: &TableRef, depth: usize, visiting: &mut HashSet<Address>, out: &mut String) {
    if depth >= MAX_PRINT_DEPTH {
        out.push_str("{...}");
        return;
    }
    let address = Value::Table(table.clone()).address();
    if !visiting.insert(address.clone()) {
        out.push_str("** cyclic table detected **");
        return;
    }

    let entries = table.borrow().pairs();
    if entries.is_empty() {
        out.push_str("{}");
    } else {
        out.push_str("{\n");
        for (key, value) in entries {
            out.push_str(&"  ".repeat(depth + 1));
            match &key {
                Value::String(s) => out.push_str(&format!("[{:?}]: ", s)),
                other => out.push_str(&format!("[{}]: ", other)),
            }
            match &value {
                Value::Table(inner) => write_table(inner, depth + 1, visiting, out),
                Value::String(s) => out.push_str(&format!("{:?}", s)),
                other => out.push_str(&other.to_string()),
            }
            out.push('\n');
        }
        out.push_str(&"  ".repeat(depth));
        out.push('}');
    }

    visiting.remove(&address);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn keys(table: &Table) -> Vec<String> {
        let mut keys = Vec::new();
        let mut key = Value::Nil;
        while let Some((k, _)) = table.next(&key).unwrap() {
            keys.push(k.to_string());
            key = k;
        }
        keys
    }

    #[test]
    fn test_sequential_keys_fill_array() {
        let mut t = Table::new();
        for i in 1..=5 {
            t.set(num(i as f64), num(i as f64 * 10.0)).unwrap();
        }
        assert_eq!(t.len(), 5);
        assert_eq!(t.get(&num(3.0)).as_number(), Some(30.0));
    }

    #[test]
    fn test_out_of_order_keys_migrate() {
        let mut t = Table::new();
        t.set(num(3.0), "c".into()).unwrap();
        t.set(num(2.0), "b".into()).unwrap();
        assert_eq!(t.len(), 0);
        t.set(num(1.0), "a".into()).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&num(3.0)).to_string(), "c");
    }

    #[test]
    fn test_nil_in_middle_splits_array() {
        let mut t = Table::from_values(vec![num(1.0), num(2.0), num(3.0), num(4.0)]);
        t.set(num(2.0), Value::Nil).unwrap();
        assert_eq!(t.len(), 1);
        assert!(t.get(&num(2.0)).is_nil());
        assert_eq!(t.get(&num(4.0)).as_number(), Some(4.0));
    }

    #[test]
    fn test_invalid_keys() {
        let mut t = Table::new();
        assert_eq!(t.set(Value::Nil, num(1.0)), Err(TableError::NilKey));
        assert_eq!(t.set(num(f64::NAN), num(1.0)), Err(TableError::NaNKey));
        assert!(t.get(&Value::Nil).is_nil());
    }

    #[test]
    fn test_number_and_string_keys_differ() {
        let mut t = Table::new();
        t.set(num(1.0), "number".into()).unwrap();
        t.set("1".into(), "string".into()).unwrap();
        assert_eq!(t.get(&num(1.0)).to_string(), "number");
        assert_eq!(t.get_str("1").to_string(), "string");
    }

    #[test]
    fn test_next_visits_array_then_insertion_order() {
        let mut t = Table::from_values(vec![num(1.0), num(2.0)]);
        t.set_str("z", num(1.0));
        t.set_str("a", num(2.0));
        t.set(num(2.5), num(3.0)).unwrap();
        assert_eq!(keys(&t), vec!["1", "2", "z", "a", "2.5"]);
    }

    #[test]
    fn test_next_survives_clearing_during_traversal() {
        let mut t = Table::from_values(vec![num(1.0), num(2.0), num(3.0)]);
        t.set_str("x", num(1.0));
        t.set_str("y", num(2.0));

        let mut seen = 0;
        let mut key = Value::Nil;
        while let Some((k, _)) = t.next(&key).unwrap() {
            t.set(k.clone(), Value::Nil).unwrap();
            seen += 1;
            key = k;
        }
        assert_eq!(seen, 5);
        assert!(t.is_empty());
    }

    #[test]
    fn test_next_with_unknown_key() {
        let t = Table::new();
        assert_eq!(t.next(&Value::string("nope")), Err(TableError::InvalidNextKey));
    }

    #[test]
    fn test_reinserting_keeps_position_and_compaction_keeps_order() {
        let mut t = Table::new();
        for name in ["a", "b", "c", "d", "e", "f", "g", "h", "i"] {
            t.set_str(name, num(1.0));
        }
        for name in ["a", "b", "c", "d", "e", "f"] {
            t.set_str(name, Value::Nil);
        }
        t.set_str("j", num(1.0));
        assert_eq!(keys(&t), vec!["g", "h", "i", "j"]);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut t = Table::from_values(vec![num(1.0), num(3.0)]);
        t.insert(1, num(2.0));
        assert_eq!(keys(&t), vec!["1", "2", "3"]);
        assert_eq!(t.remove(0).as_number(), Some(1.0));
        assert_eq!(t.len(), 2);
        assert!(t.remove(10).is_nil());
    }

    #[test]
    fn test_stringify() {
        let inner = Table::from_values(vec![Value::string("x")]).into_ref();
        let mut outer = Table::from_values(vec![num(1.0)]);
        outer.set_str("inner", Value::Table(inner));
        let outer = outer.into_ref();
        assert_eq!(
            stringify(&outer),
            "{\n  [1]: 1\n  [\"inner\"]: {\n    [1]: \"x\"\n  }\n}"
        );
        assert_eq!(stringify(&Table::new().into_ref()), "{}");
    }

    #[test]
    fn test_stringify_stops_at_depth_limit() {
        let mut nested = Table::new().into_ref();
        for _ in 0..500 {
            let mut outer = Table::new();
            outer.set_str("next", Value::Table(nested));
            nested = outer.into_ref();
        }
        let text = stringify(&nested);
        assert!(text.contains("{...}"));
        assert_eq!(text.matches("[\"next\"]").count(), MAX_PRINT_DEPTH);
    }

    #[test]
    fn test_stringify_detects_cycles() {
        let t = Table::new().into_ref();
        t.borrow_mut().set_str("self", Value::Table(t.clone()));
        assert_eq!(stringify(&t), "{\n  [\"self\"]: ** cyclic table detected **\n}");
    }
}
