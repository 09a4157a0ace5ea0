//! Hash containers that remember insertion order.
//!
//! `OrderedMap` and `OrderedSet` combine a bucketed hash index with a doubly
//! linked chain over an arena of entries. New entries are linked in at the
//! head, so traversal visits the most recent insertion first. The simulation
//! relies on this order for reproducibility: which host is visited first
//! decides which draw of the generator it consumes.
//!
//! Keys are identified by their [`BucketKey::bucket_hash`] alone. Two keys with
//! the same hash are the same key.
//!
//! The bucket array grows to `4n + 1` once the load exceeds 0.8 and shrinks to
//! roughly a fifth (kept odd) once it falls below 0.05, but never below five
//! times the default bucket count.

use std::fmt;

pub const DEFAULT_BUCKETS: usize = 53;

const GROW_LOAD: f64 = 0.8;
const SHRINK_LOAD: f64 = 0.05;

pub trait BucketKey {
    fn bucket_hash(&self) -> u32;
}

impl BucketKey for u32 {
    fn bucket_hash(&self) -> u32 {
        *self
    }
}

#[derive(Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Clone)]
pub struct OrderedMap<K, V> {
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    buckets: Vec<Vec<usize>>,
    head: Option<usize>,
    len: usize,
}

impl<K: BucketKey, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BucketKey, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    pub fn with_buckets(n_buckets: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: vec![Vec::new(); n_buckets.max(1)],
            head: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    fn entry(&self, slot: usize) -> &Entry<K, V> {
        self.slots[slot]
            .as_ref()
            .unwrap_or_else(|| panic!("Dangling slot {slot} in ordered map."))
    }

    fn entry_mut(&mut self, slot: usize) -> &mut Entry<K, V> {
        self.slots[slot]
            .as_mut()
            .unwrap_or_else(|| panic!("Dangling slot {slot} in ordered map."))
    }

    fn find(&self, hash: u32) -> Option<(usize, usize)> {
        let bucket = self.bucket_of(hash);
        self.buckets[bucket]
            .iter()
            .position(|&slot| self.entry(slot).key.bucket_hash() == hash)
            .map(|position| (bucket, position))
    }

    /// Insert at the head of the chain, replacing any entry with the same key.
    pub fn put(&mut self, key: K, value: V) {
        let hash = key.bucket_hash();
        self.remove(&key);

        let entry = Entry {
            key,
            value,
            prev: None,
            next: self.head,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        if let Some(head) = self.head {
            self.entry_mut(head).prev = Some(slot);
        }
        self.head = Some(slot);
        let bucket = self.bucket_of(hash);
        self.buckets[bucket].push(slot);
        self.len += 1;

        if self.len as f64 > self.buckets.len() as f64 * GROW_LOAD {
            self.resize(self.buckets.len() * 4 + 1);
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key.bucket_hash()).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key.bucket_hash())
            .map(|(bucket, position)| &self.entry(self.buckets[bucket][position]).value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (bucket, position) = self.find(key.bucket_hash())?;
        let slot = self.buckets[bucket][position];
        Some(&mut self.entry_mut(slot).value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (bucket, position) = self.find(key.bucket_hash())?;
        let slot = self.buckets[bucket].remove(position);
        let entry = self.slots[slot]
            .take()
            .unwrap_or_else(|| panic!("Dangling slot {slot} in ordered map."));
        self.free.push(slot);

        if let Some(prev) = entry.prev {
            self.entry_mut(prev).next = entry.next;
        }
        if let Some(next) = entry.next {
            self.entry_mut(next).prev = entry.prev;
        }
        if self.head == Some(slot) {
            self.head = entry.next;
        }
        self.len -= 1;

        if (self.len as f64) < self.buckets.len() as f64 * SHRINK_LOAD
            && self.buckets.len() > DEFAULT_BUCKETS * 5
        {
            let n_buckets = self.buckets.len() / 5;
            self.resize(n_buckets - if n_buckets % 2 == 0 { 1 } else { 0 });
        }
        Some(entry.value)
    }

    /// Rebuild the bucket index; chain order is untouched.
    pub fn resize(&mut self, n_buckets: usize) {
        let n_buckets = n_buckets.max(1);
        let mut buckets = vec![Vec::new(); n_buckets];
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let entry = self.entry(slot);
            buckets[entry.key.bucket_hash() as usize % n_buckets].push(slot);
            cursor = entry.next;
        }
        self.buckets = buckets;
    }

    /// Flip the chain in place so the oldest entry becomes the head.
    pub fn reverse(&mut self) {
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            self.head = Some(slot);
            let entry = self.entry_mut(slot);
            std::mem::swap(&mut entry.prev, &mut entry.next);
            cursor = entry.prev;
        }
    }

    pub fn head(&self) -> Option<&K> {
        self.head.map(|slot| &self.entry(slot).key)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            map: self,
            cursor: self.head,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Consume the map, yielding entries in chain order.
    pub fn into_entries(mut self) -> Vec<(K, V)> {
        let mut entries = Vec::with_capacity(self.len);
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let entry = self.slots[slot]
                .take()
                .unwrap_or_else(|| panic!("Dangling slot {slot} in ordered map."));
            cursor = entry.next;
            entries.push((entry.key, entry.value));
        }
        entries
    }
}

impl<K: BucketKey + Clone, V> OrderedMap<K, V> {
    /// Snapshot of the keys in chain order.
    pub fn key_vec(&self) -> Vec<K> {
        self.keys().cloned().collect()
    }
}

pub struct Iter<'a, K, V> {
    map: &'a OrderedMap<K, V>,
    cursor: Option<usize>,
}

impl<'a, K: BucketKey, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let entry = self.map.entry(slot);
        self.cursor = entry.next;
        Some((&entry.key, &entry.value))
    }
}

impl<K: BucketKey + fmt::Debug, V: fmt::Debug> fmt::Debug for OrderedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Set variant of [`OrderedMap`].
#[derive(Clone)]
pub struct OrderedSet<K> {
    map: OrderedMap<K, ()>,
}

impl<K: BucketKey> Default for OrderedSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BucketKey> OrderedSet<K> {
    pub fn new() -> Self {
        Self {
            map: OrderedMap::new(),
        }
    }

    /// Insert at the head; an existing key is moved to the head.
    pub fn add(&mut self, key: K) {
        self.map.put(key, ());
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains(key)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn add_all(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.add(key);
        }
    }

    pub fn remove_all<'a>(&mut self, keys: impl IntoIterator<Item = &'a K>)
    where
        K: 'a,
    {
        for key in keys {
            self.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.map = OrderedMap::with_buckets(self.map.bucket_count());
    }

    pub fn reverse(&mut self) {
        self.map.reverse();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.map.bucket_count()
    }

    pub fn head(&self) -> Option<&K> {
        self.map.head()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }
}

impl<K: BucketKey + Clone> OrderedSet<K> {
    pub fn to_vec(&self) -> Vec<K> {
        self.map.key_vec()
    }
}

impl<K: BucketKey + fmt::Debug> fmt::Debug for OrderedSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K: BucketKey> FromIterator<K> for OrderedSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = Self::new();
        set.add_all(iter);
        set
    }
}
