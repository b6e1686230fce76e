//! Heap objects and the arena that owns them.
//!
//! Every object lives in `Heap::objects` and is addressed by an [`ObjRef`]
//! index. Strings are interned: equal content always maps to the same handle.

use super::table::Table;
use super::value::Value;

/// Handle to an object in the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An immutable string with its cached hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjString {
    chars: String,
    hash: u32,
}

impl ObjString {
    pub fn new(chars: String) -> Self {
        let hash = hash_string(&chars);
        Self { chars, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }
}

/// A heap-allocated object.
#[derive(Debug, Clone, PartialEq)]
pub enum Obj {
    String(ObjString),
}

impl Obj {
    pub fn as_string(&self) -> &ObjString {
        match self {
            Obj::String(s) => s,
        }
    }
}

/// Table key: an interned string handle plus its hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringKey {
    pub obj: ObjRef,
    pub hash: u32,
}

/// 32-bit FNV-1a.
pub fn hash_string(chars: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in chars.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// Object arena plus the intern set.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Obj>,
    strings: Table,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical string object for `chars`, creating it if needed.
    pub fn intern(&mut self, chars: &str) -> ObjRef {
        let hash = hash_string(chars);
        match self.strings.find_string(chars, hash, &self.objects) {
            Some(existing) => existing,
            None => self.allocate_string(chars.to_owned(), hash),
        }
    }

    /// Like [`Heap::intern`], but takes ownership so a miss needs no copy.
    pub fn intern_owned(&mut self, chars: String) -> ObjRef {
        let hash = hash_string(&chars);
        match self.strings.find_string(&chars, hash, &self.objects) {
            Some(existing) => existing,
            None => self.allocate_string(chars, hash),
        }
    }

    /// Look up an already interned string without creating one.
    pub fn find_interned(&self, chars: &str) -> Option<ObjRef> {
        self.strings
            .find_string(chars, hash_string(chars), &self.objects)
    }

    fn allocate_string(&mut self, chars: String, hash: u32) -> ObjRef {
        let obj = ObjRef(self.objects.len() as u32);
        self.objects.push(Obj::String(ObjString { chars, hash }));
        self.strings.set(StringKey { obj, hash }, Value::Nil);
        obj
    }

    pub fn get(&self, obj: ObjRef) -> &Obj {
        &self.objects[obj.index()]
    }

    pub fn string(&self, obj: ObjRef) -> &ObjString {
        self.get(obj).as_string()
    }

    pub fn key(&self, obj: ObjRef) -> StringKey {
        StringKey {
            obj,
            hash: self.string(obj).hash(),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn interned_count(&self) -> usize {
        self.strings.len()
    }

    /// Release every object and empty the intern set.
    pub fn free_objects(&mut self) {
        log::debug!("freeing {} heap objects", self.objects.len());
        self.strings = Table::new();
        self.objects = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(hash_string(""), 2_166_136_261);
        assert_eq!(hash_string("a"), 0xe40c_292c);
        assert_eq!(hash_string("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_intern_is_idempotent() {
        let mut heap = Heap::new();
        let first = heap.intern("hello");
        let before = heap.object_count();
        let second = heap.intern("hello");
        let third = heap.intern_owned("hello".to_string());
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(heap.object_count(), before);
        assert_eq!(before, 1);
    }

    #[test]
    fn test_distinct_content_gets_distinct_objects() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let b = heap.intern("b");
        assert_ne!(a, b);
        assert_eq!(heap.object_count(), 2);
        assert_eq!(heap.interned_count(), 2);
        assert_eq!(heap.string(a).as_str(), "a");
        assert_eq!(heap.string(b).as_str(), "b");
    }

    #[test]
    fn test_key_carries_cached_hash() {
        let mut heap = Heap::new();
        let obj = heap.intern("key");
        let key = heap.key(obj);
        assert_eq!(key.obj, obj);
        assert_eq!(key.hash, hash_string("key"));
    }

    #[test]
    fn test_many_interned_strings_survive_growth() {
        let mut heap = Heap::new();
        let handles: Vec<_> = (0..100).map(|i| heap.intern(&format!("s{}", i))).collect();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(heap.intern(&format!("s{}", i)), *handle);
        }
        assert_eq!(heap.object_count(), 100);
    }

    #[test]
    fn test_free_objects_empties_heap() {
        let mut heap = Heap::new();
        heap.intern("x");
        heap.intern("y");
        heap.free_objects();
        assert_eq!(heap.object_count(), 0);
        assert_eq!(heap.interned_count(), 0);

        let again = heap.intern("x");
        assert_eq!(again.index(), 0);
    }
}
