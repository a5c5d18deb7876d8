use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A bounded LRU (Least Recently Used) map.
///
/// Nodes live in a slab and are threaded into a doubly linked list ordered
/// from most recently used (head) to least recently used (tail). Entries that
/// were never read after insertion keep their insertion order.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: NonZeroUsize,
    nodes: Vec<Option<Node<K, V>>>,
    free_list: Vec<usize>,
    index_map: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Creates a new, empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            nodes: Vec::new(),
            free_list: Vec::new(),
            index_map: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Looks up a key and marks it as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index_map.get(key)?;
        self.move_to_head(idx);
        self.node(idx).map(|node| &node.value)
    }

    /// Inserts or updates a key as the most recently used entry.
    ///
    /// Returns the entry evicted to make room, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index_map.get(&key) {
            if let Some(node) = self.node_mut(idx) {
                node.value = value;
            }
            self.move_to_head(idx);
            return None;
        }

        let evicted = if self.index_map.len() >= self.capacity.get() {
            self.pop_lru()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free_list.pop() {
            Some(free_idx) => {
                self.nodes[free_idx] = Some(node);
                free_idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };

        self.index_map.insert(key, idx);
        self.push_head(idx);
        evicted
    }

    /// Removes the specified key, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.index_map.get(key)?;
        self.remove_at(idx).map(|(_, value)| value)
    }

    /// Pops the least recently used entry (from tail).
    fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        self.remove_at(idx)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.index_map.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        self.nodes.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(idx).and_then(Option::as_mut)
    }

    fn remove_at(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        let node = self.nodes.get_mut(idx)?.take()?;
        self.free_list.push(idx);
        self.index_map.remove(&node.key);
        Some((node.key, node.value))
    }

    fn move_to_head(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_head(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.node(idx).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev {
            Some(prev_idx) => {
                if let Some(node) = self.node_mut(prev_idx) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(node) = self.node_mut(next_idx) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_head(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(old_head_idx) => {
                if let Some(node) = self.node_mut(old_head_idx) {
                    node.prev = Some(idx);
                }
            }
            // List was empty, this is also the tail
            None => self.tail = Some(idx),
        }

        self.head = Some(idx);
    }
}
