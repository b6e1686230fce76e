//! Open-addressing hash table keyed by interned strings.
//!
//! Linear probing over a power-of-two slot array. Deleted entries leave a
//! tombstone so probe chains stay intact; `count` includes tombstones and is
//! recomputed when the table grows.

use super::object::{Obj, ObjRef, StringKey};
use super::value::Value;

const MAX_LOAD_NUMERATOR: usize = 3;
const MAX_LOAD_DENOMINATOR: usize = 4;
const MIN_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Empty,
    Tombstone,
    Occupied { key: StringKey, value: Value },
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    slots: Vec<Slot>,
    /// Occupied slots plus tombstones.
    count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: StringKey) -> Option<Value> {
        if self.slots.is_empty() {
            return None;
        }
        match self.slots[find_slot(&self.slots, key)] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Insert or overwrite. Returns true when `key` was not already present.
    pub fn set(&mut self, key: StringKey, value: Value) -> bool {
        if (self.count + 1) * MAX_LOAD_DENOMINATOR > self.capacity() * MAX_LOAD_NUMERATOR {
            let capacity = if self.capacity() < MIN_CAPACITY {
                MIN_CAPACITY
            } else {
                self.capacity() * 2
            };
            self.adjust_capacity(capacity);
        }

        let index = find_slot(&self.slots, key);
        let is_new = !matches!(self.slots[index], Slot::Occupied { .. });
        if self.slots[index] == Slot::Empty {
            self.count += 1;
        }
        self.slots[index] = Slot::Occupied { key, value };
        is_new
    }

    /// Remove `key`, leaving a tombstone. Returns false if it was absent.
    pub fn delete(&mut self, key: StringKey) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let index = find_slot(&self.slots, key);
        if !matches!(self.slots[index], Slot::Occupied { .. }) {
            return false;
        }
        self.slots[index] = Slot::Tombstone;
        true
    }

    /// Look up a string by content rather than handle. Only interning needs
    /// this; every other lookup compares handles.
    pub fn find_string(&self, chars: &str, hash: u32, objects: &[Obj]) -> Option<ObjRef> {
        if self.slots.is_empty() {
            return None;
        }
        let mask = self.capacity() - 1;
        let mut index = hash as usize & mask;
        loop {
            match self.slots[index] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { key, .. } => {
                    if key.hash == hash && objects[key.obj.index()].as_string().as_str() == chars {
                        return Some(key.obj);
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn adjust_capacity(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.count = 0;
        for slot in old {
            if let Slot::Occupied { key, value } = slot {
                let index = find_slot(&self.slots, key);
                self.slots[index] = Slot::Occupied { key, value };
                self.count += 1;
            }
        }
    }
}

/// Index of the slot holding `key`, or of the slot where it should be
/// inserted (the first tombstone passed, else the terminating empty slot).
/// The load factor guarantees at least one empty slot.
fn find_slot(slots: &[Slot], key: StringKey) -> usize {
    let mask = slots.len() - 1;
    let mut index = key.hash as usize & mask;
    let mut tombstone = None;
    loop {
        match slots[index] {
            Slot::Empty => return tombstone.unwrap_or(index),
            Slot::Tombstone => {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            }
            Slot::Occupied { key: existing, .. } => {
                if existing.obj == key.obj {
                    return index;
                }
            }
        }
        index = (index + 1) & mask;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::object::ObjString;
    use pretty_assertions::assert_eq;

    fn key(id: u32, hash: u32) -> StringKey {
        StringKey {
            obj: ObjRef(id),
            hash,
        }
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.get(key(0, 0)), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut table = Table::new();
        assert!(table.set(key(1, 10), Value::Number(1.0)));
        assert!(!table.set(key(1, 10), Value::Number(2.0)));
        assert_eq!(table.get(key(1, 10)), Some(Value::Number(2.0)));
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_colliding_keys_are_all_reachable() {
        let mut table = Table::new();
        for id in 0..5 {
            table.set(key(id, 3), Value::Number(id as f64));
        }
        for id in 0..5 {
            assert_eq!(table.get(key(id, 3)), Some(Value::Number(id as f64)));
        }
        assert_eq!(table.get(key(99, 3)), None);
    }

    #[test]
    fn test_delete_keeps_probe_chain() {
        let mut table = Table::new();
        table.set(key(1, 0), Value::Bool(true));
        table.set(key(2, 0), Value::Bool(false));
        table.set(key(3, 0), Value::Nil);

        assert!(table.delete(key(2, 0)));
        assert!(!table.delete(key(2, 0)));
        assert_eq!(table.get(key(2, 0)), None);
        // Entry past the tombstone is still found.
        assert_eq!(table.get(key(3, 0)), Some(Value::Nil));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_tombstone_is_reused() {
        let mut table = Table::new();
        table.set(key(1, 5), Value::Number(1.0));
        table.set(key(2, 5), Value::Number(2.0));
        table.delete(key(1, 5));
        assert_eq!(table.count, 2);

        assert!(table.set(key(3, 5), Value::Number(3.0)));
        assert_eq!(table.count, 2);
        assert_eq!(table.get(key(3, 5)), Some(Value::Number(3.0)));
        assert_eq!(table.get(key(2, 5)), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_growth_keeps_live_entries_and_drops_tombstones() {
        let mut table = Table::new();
        for id in 0..6 {
            table.set(key(id, id * 7), Value::Number(id as f64));
        }
        table.delete(key(0, 0));
        table.delete(key(1, 7));
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.count, 6);

        // Seventh slot use crosses the 3/4 load factor.
        table.set(key(100, 100), Value::Nil);
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.count, 5);
        assert_eq!(table.len(), 5);

        assert_eq!(table.get(key(0, 0)), None);
        assert_eq!(table.get(key(1, 7)), None);
        for id in 2..6 {
            assert_eq!(table.get(key(id, id * 7)), Some(Value::Number(id as f64)));
        }
        assert_eq!(table.get(key(100, 100)), Some(Value::Nil));
    }

    #[test]
    fn test_find_string_compares_content() {
        let objects = vec![
            Obj::String(ObjString::new("one".to_string())),
            Obj::String(ObjString::new("two".to_string())),
        ];
        let mut table = Table::new();
        for (i, obj) in objects.iter().enumerate() {
            table.set(key(i as u32, obj.as_string().hash()), Value::Nil);
        }

        let two_hash = objects[1].as_string().hash();
        assert_eq!(table.find_string("two", two_hash, &objects), Some(ObjRef(1)));
        assert_eq!(table.find_string("three", two_hash, &objects), None);
    }
}
