//! Order-statistics index over the active scores of one leaderboard.
//!
//! Entries live in a randomized treap whose nodes are stored in an arena
//! (`Vec<Node>` plus a free list) and carry their subtree size, so rank and
//! positional lookups are O(log n) expected. A `player_id -> node` map gives
//! O(1) access to a player's node for update-in-place and removal.
//!
//! Ordering is strict: value per the board's sort direction, then earlier
//! `submitted_at`, then lower insertion sequence number, then player id.
//! Two distinct players can never share a rank. The sequence is carried on
//! [`ScoreEntry`], so an index rebuilt from the store orders ties exactly as
//! the live one did.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;

use crate::models::{RankedEntry, ScoreEntry, ScoreValue, SortDirection};

type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RankKey {
    value: ScoreValue,
    submitted_at: DateTime<Utc>,
    seq: u64,
    player: Arc<str>,
}

#[derive(Debug)]
struct Node {
    key: RankKey,
    metadata: Option<Value>,
    priority: u64,
    size: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

#[derive(Debug)]
pub struct RankIndex {
    direction: SortDirection,
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    players: HashMap<Arc<str>, NodeId>,
    next_seq: u64,
    rng: StdRng,
}

impl RankIndex {
    pub fn new(direction: SortDirection) -> Self {
        Self {
            direction,
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            players: HashMap::new(),
            next_seq: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Builds an index from stored entries, keeping their sequence numbers.
    pub fn from_entries(direction: SortDirection, entries: Vec<ScoreEntry>) -> Self {
        let mut index = Self::new(direction);
        for entry in entries {
            index.place(
                &entry.player_id,
                entry.value,
                entry.submitted_at,
                entry.sequence,
                entry.metadata,
            );
        }
        index
    }

    /// Sequence number the next applied entry should carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_seq
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.players.keys().map(|p| p.as_ref())
    }

    /// Inserts the player's entry under the next sequence number, replacing
    /// any previous one, and returns the resulting 1-based rank.
    pub fn insert_or_update(
        &mut self,
        player_id: &str,
        value: ScoreValue,
        submitted_at: DateTime<Utc>,
        metadata: Option<Value>,
    ) -> usize {
        let seq = self.next_seq;
        self.place(player_id, value, submitted_at, seq, metadata)
    }

    /// Inserts a stored entry with its own sequence number.
    pub fn insert_entry(&mut self, entry: &ScoreEntry) -> usize {
        self.place(
            &entry.player_id,
            entry.value,
            entry.submitted_at,
            entry.sequence,
            entry.metadata.clone(),
        )
    }

    fn place(
        &mut self,
        player_id: &str,
        value: ScoreValue,
        submitted_at: DateTime<Utc>,
        seq: u64,
        metadata: Option<Value>,
    ) -> usize {
        let name: Arc<str> = match self.players.remove_entry(player_id) {
            Some((name, old)) => {
                let old_key = self.nodes[old].key.clone();
                let root = self.root;
                self.root = self.erase(root, &old_key);
                name
            }
            None => Arc::from(player_id),
        };
        self.next_seq = self.next_seq.max(seq.saturating_add(1));

        let key = RankKey {
            value,
            submitted_at,
            seq,
            player: name.clone(),
        };

        let priority = self.rng.gen();
        let id = self.alloc(Node {
            key: key.clone(),
            metadata,
            priority,
            size: 1,
            left: None,
            right: None,
        });
        let root = self.root;
        let (left, right) = self.split(root, &key);
        let joined = self.merge(left, Some(id));
        self.root = self.merge(joined, right);
        self.players.insert(name, id);

        self.rank_of_key(&key)
    }

    /// Drops the player's entry. Returns whether one existed.
    pub fn remove(&mut self, player_id: &str) -> bool {
        let Some(id) = self.players.remove(player_id) else {
            return false;
        };
        let key = self.nodes[id].key.clone();
        let root = self.root;
        self.root = self.erase(root, &key);
        true
    }

    pub fn rank_of(&self, player_id: &str) -> Option<usize> {
        let id = *self.players.get(player_id)?;
        Some(self.rank_of_key(&self.nodes[id].key))
    }

    pub fn entry(&self, player_id: &str) -> Option<RankedEntry> {
        let id = *self.players.get(player_id)?;
        let rank = self.rank_of_key(&self.nodes[id].key);
        Some(self.ranked(id, rank))
    }

    /// The first `k` entries in rank order; `k` is clamped to the size.
    pub fn top_k(&self, k: usize) -> Vec<RankedEntry> {
        self.range(1, k)
    }

    /// Entries ranked `max(1, r - window)..=min(n, r + window)` around the
    /// player's rank `r`, or `None` if the player has no entry.
    pub fn around(&self, player_id: &str, window: usize) -> Option<Vec<RankedEntry>> {
        let rank = self.rank_of(player_id)?;
        let first = rank.saturating_sub(window).max(1);
        let last = rank.saturating_add(window).min(self.len());
        Some(self.range(first, last - first + 1))
    }

    /// Up to `count` entries starting at the 1-based rank `first_rank`.
    pub fn range(&self, first_rank: usize, count: usize) -> Vec<RankedEntry> {
        let len = self.len();
        if first_rank == 0 || first_rank > len || count == 0 {
            return Vec::new();
        }
        let lo = first_rank - 1;
        let hi = lo.saturating_add(count).min(len);
        let mut out = Vec::with_capacity(hi - lo);
        self.collect(self.root, lo, hi, lo, &mut out);
        out
    }

    fn compare(&self, a: &RankKey, b: &RankKey) -> Ordering {
        self.direction
            .compare(a.value, b.value)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.seq.cmp(&b.seq))
            .then_with(|| a.player.cmp(&b.player))
    }

    fn size(&self, node: Option<NodeId>) -> usize {
        node.map_or(0, |id| self.nodes[id].size)
    }

    fn update(&mut self, id: NodeId) {
        let size = 1 + self.size(self.nodes[id].left) + self.size(self.nodes[id].right);
        self.nodes[id].size = size;
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.metadata = None;
        node.left = None;
        node.right = None;
        self.free.push(id);
    }

    /// Splits into (keys < `key`, keys >= `key`).
    fn split(&mut self, node: Option<NodeId>, key: &RankKey) -> (Option<NodeId>, Option<NodeId>) {
        let Some(id) = node else {
            return (None, None);
        };
        if self.compare(&self.nodes[id].key, key) == Ordering::Less {
            let right = self.nodes[id].right;
            let (l, r) = self.split(right, key);
            self.nodes[id].right = l;
            self.update(id);
            (Some(id), r)
        } else {
            let left = self.nodes[id].left;
            let (l, r) = self.split(left, key);
            self.nodes[id].left = r;
            self.update(id);
            (l, Some(id))
        }
    }

    /// Every key in `a` must order before every key in `b`.
    fn merge(&mut self, a: Option<NodeId>, b: Option<NodeId>) -> Option<NodeId> {
        match (a, b) {
            (None, other) | (other, None) => other,
            (Some(x), Some(y)) => {
                if self.nodes[x].priority > self.nodes[y].priority {
                    let right = self.nodes[x].right;
                    self.nodes[x].right = self.merge(right, Some(y));
                    self.update(x);
                    Some(x)
                } else {
                    let left = self.nodes[y].left;
                    self.nodes[y].left = self.merge(Some(x), left);
                    self.update(y);
                    Some(y)
                }
            }
        }
    }

    fn erase(&mut self, node: Option<NodeId>, key: &RankKey) -> Option<NodeId> {
        let id = node?;
        match self.compare(key, &self.nodes[id].key) {
            Ordering::Equal => {
                let (left, right) = (self.nodes[id].left, self.nodes[id].right);
                self.release(id);
                return self.merge(left, right);
            }
            Ordering::Less => {
                let left = self.nodes[id].left;
                self.nodes[id].left = self.erase(left, key);
            }
            Ordering::Greater => {
                let right = self.nodes[id].right;
                self.nodes[id].right = self.erase(right, key);
            }
        }
        self.update(id);
        Some(id)
    }

    fn rank_of_key(&self, key: &RankKey) -> usize {
        let mut ahead = 0;
        let mut node = self.root;
        while let Some(id) = node {
            let n = &self.nodes[id];
            match self.compare(key, &n.key) {
                Ordering::Less => node = n.left,
                Ordering::Equal => return ahead + self.size(n.left) + 1,
                Ordering::Greater => {
                    ahead += self.size(n.left) + 1;
                    node = n.right;
                }
            }
        }
        // Only reachable for keys that are not in the tree.
        ahead + 1
    }

    /// In-order collection of the positions `lo..hi` (0-based, relative to
    /// `node`'s subtree). `base` is the absolute position of `lo`.
    fn collect(
        &self,
        node: Option<NodeId>,
        lo: usize,
        hi: usize,
        base: usize,
        out: &mut Vec<RankedEntry>,
    ) {
        let Some(id) = node else {
            return;
        };
        if lo >= hi {
            return;
        }
        let n = &self.nodes[id];
        let left_size = self.size(n.left);
        if lo < left_size {
            self.collect(n.left, lo, hi.min(left_size), base, out);
        }
        if lo <= left_size && left_size < hi {
            let rank = base - lo + left_size + 1;
            out.push(self.ranked(id, rank));
        }
        if hi > left_size + 1 {
            let skip = left_size + 1;
            let sub_lo = lo.saturating_sub(skip);
            self.collect(n.right, sub_lo, hi - skip, base + (sub_lo + skip - lo), out);
        }
    }

    fn ranked(&self, id: NodeId, rank: usize) -> RankedEntry {
        let n = &self.nodes[id];
        RankedEntry {
            rank,
            player_id: n.key.player.to_string(),
            value: n.key.value,
            submitted_at: n.key.submitted_at,
            metadata: n.metadata.clone(),
            sequence: n.key.seq,
        }
    }
}
