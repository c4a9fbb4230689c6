// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::compute_seed_hash;

/// Maximum theta value (signed max for compatibility with Java)
pub const MAX_THETA: u64 = i64::MAX as u64;

/// Minimum log2 of K
pub const MIN_LG_K: u8 = 5;

/// Maximum log2 of K
pub const MAX_LG_K: u8 = 26;

/// Default log2 of K
pub const DEFAULT_LG_K: u8 = 12;

/// Resize threshold (0.5 = 50% load factor)
const RESIZE_THRESHOLD: f64 = 0.5;

/// Rebuild threshold (15/16 = 93.75% load factor)
pub(crate) const REBUILD_THRESHOLD: f64 = 15.0 / 16.0;

/// Stride hash bits (7 bits for stride calculation)
const STRIDE_HASH_BITS: u8 = 7;

/// Stride mask
const STRIDE_MASK: u64 = (1 << STRIDE_HASH_BITS) - 1;

/// A retained slot: hash key and its multiplicity. A zero hash marks an
/// empty slot, and a live slot always carries a count of at least one.
pub(crate) type Entry = (u64, u64);

/// Probe stride: odd, and independent of the index bits assuming the lowest
/// `lg_size` bits of the hash were used for the initial index. An odd stride
/// on a power-of-two table walks every slot before cycling.
#[inline]
fn get_stride(hash: u64, lg_size: u8) -> usize {
    (2 * ((hash >> lg_size) & STRIDE_MASK) + 1) as usize
}

/// Double-hashing walk. Returns the slot holding `hash`, or the empty slot
/// that terminated the search. `None` means the probe cycled through the
/// whole table without hitting either, which can only happen on a full
/// table.
fn probe(entries: &[Entry], hash: u64, lg_size: u8) -> Option<usize> {
    if entries.is_empty() {
        return None;
    }

    let mask = entries.len() - 1;
    let stride = get_stride(hash, lg_size);
    let mut index = (hash as usize) & mask;
    let loop_index = index;

    loop {
        let key = entries[index].0;
        if key == 0 || key == hash {
            return Some(index);
        }
        index = (index + stride) & mask;
        if index == loop_index {
            return None;
        }
    }
}

/// Search-or-insert: a duplicate key bumps its multiplicity, an empty slot
/// receives the key with multiplicity one. `Some(true)` reports a structural
/// insert, `Some(false)` a duplicate; `None` means the probe cycle completed
/// on a full table, which resize/rebuild scheduling rules out.
pub(crate) fn search_or_insert(entries: &mut [Entry], hash: u64, lg_size: u8) -> Option<bool> {
    let index = probe(entries, hash, lg_size)?;
    if entries[index].0 == hash {
        entries[index].1 += 1;
        return Some(false);
    }
    entries[index] = (hash, 1);
    Some(true)
}

/// Search-or-decrement: a matching key loses one from its multiplicity, and
/// the slot is cleared once the count reaches zero (returning `true`).
/// Hitting an empty slot, or completing the cycle without a match, is a
/// silent no-op: deletions may have broken the probe chain, and a missed
/// lookup only costs estimation accuracy, never correctness of the table.
pub(crate) fn search_or_decrement(entries: &mut [Entry], hash: u64, lg_size: u8) -> bool {
    match probe(entries, hash, lg_size) {
        Some(index) if entries[index].0 == hash => {
            entries[index].1 -= 1;
            if entries[index].1 == 0 {
                entries[index] = (0, 0);
                return true;
            }
            false
        }
        _ => false,
    }
}

/// Membership test over a table built with the same stride rule.
pub(crate) fn search(entries: &[Entry], hash: u64, lg_size: u8) -> bool {
    match probe(entries, hash, lg_size) {
        Some(index) => entries[index].0 == hash,
        None => false,
    }
}

/// Insert an entry carrying its multiplicity. Used when re-probing into a
/// fresh table during resize and rebuild, where the key is known absent.
fn insert_entry(entries: &mut [Entry], entry: Entry, lg_size: u8) -> Option<()> {
    let index = probe(entries, entry.0, lg_size)?;
    debug_assert_eq!(entries[index].0, 0, "entry should be absent");
    entries[index] = entry;
    Some(())
}

/// Smallest table log-size that keeps `count` entries under `load_factor`.
pub(crate) fn lg_size_from_count(count: usize, load_factor: f64) -> u8 {
    let lg = usize::BITS - count.max(1).leading_zeros() - 1;
    let lg = lg as u8;
    if count > ((1usize << (lg + 1)) as f64 * load_factor) as usize {
        lg + 2
    } else {
        lg + 1
    }
}

/// Compute initial lg_size for the hash table based on target lg_size,
/// minimum lg_size, and resize factor. Guarantees
/// `lg_target = lg_init + n * lg_resize_factor` for integer `n >= 0` with
/// `lg_init >= lg_min`.
pub(crate) fn starting_sub_multiple(lg_target: u8, lg_min: u8, lg_resize_factor: u8) -> u8 {
    if lg_target <= lg_min {
        lg_min
    } else if lg_resize_factor == 0 {
        lg_target
    } else {
        ((lg_target - lg_min) % lg_resize_factor) + lg_min
    }
}

/// Compute initial theta for the hash table based on sampling probability.
pub(crate) fn starting_theta_from_sampling_probability(sampling_probability: f32) -> u64 {
    if sampling_probability < 1.0 {
        (MAX_THETA as f64 * sampling_probability as f64) as u64
    } else {
        MAX_THETA
    }
}

/// Growable open-addressed table of `(hash, multiplicity)` pairs backing the
/// update sketch and the set-operation gadgets.
///
/// The table starts at a sub-multiple of `2^(lg_nom_size + 1)` and grows by
/// the resize factor while `lg_cur_size <= lg_nom_size`. Past that point,
/// exceeding the rebuild threshold lowers theta to the k-th smallest
/// retained hash and shrinks the retained set back to `2^lg_nom_size`
/// entries.
#[derive(Debug, Clone)]
pub(crate) struct ThetaDupHashTable {
    lg_cur_size: u8,
    lg_nom_size: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    hash_seed: u64,

    // Logical emptiness of the source stream. Stays false once any update or
    // remove was observed, even if nothing is retained.
    is_empty: bool,

    theta: u64,

    entries: Vec<Entry>,

    // Number of live slots currently stored in `entries`.
    num_keys: u32,
}

impl ThetaDupHashTable {
    pub fn new(
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        hash_seed: u64,
    ) -> Self {
        let lg_cur_size = starting_sub_multiple(
            lg_nom_size + 1,
            MIN_LG_K,
            resize_factor.lg_value(),
        );
        Self::from_raw_parts(
            lg_cur_size,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            starting_theta_from_sampling_probability(sampling_probability),
            hash_seed,
            true,
        )
    }

    /// Build an empty table with explicit state. Used by deserialization and
    /// the set operations.
    pub fn from_raw_parts(
        lg_cur_size: u8,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        theta: u64,
        hash_seed: u64,
        is_empty: bool,
    ) -> Self {
        let size = if lg_cur_size > 0 { 1 << lg_cur_size } else { 0 };
        Self {
            lg_cur_size,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            hash_seed,
            is_empty,
            theta,
            entries: vec![(0, 0); size],
            num_keys: 0,
        }
    }

    /// Rehydrate a table from a serialized image: the raw slot array is
    /// adopted verbatim, so the probe layout survives a round trip.
    #[allow(clippy::too_many_arguments)]
    pub fn from_loaded(
        lg_cur_size: u8,
        lg_nom_size: u8,
        resize_factor: ResizeFactor,
        sampling_probability: f32,
        theta: u64,
        hash_seed: u64,
        is_empty: bool,
        entries: Vec<Entry>,
        num_keys: u32,
    ) -> Self {
        debug_assert_eq!(entries.len(), 1 << lg_cur_size);
        Self {
            lg_cur_size,
            lg_nom_size,
            resize_factor,
            sampling_probability,
            hash_seed,
            is_empty,
            theta,
            entries,
            num_keys,
        }
    }

    /// Insert a pre-screened hash, growing or rebuilding as needed. Returns
    /// true if a new entry was created, false when a duplicate's count was
    /// bumped or the hash was screened out by theta.
    pub fn insert_hash(&mut self, hash: u64) -> bool {
        self.is_empty = false;

        if hash == 0 || hash >= self.theta {
            return false;
        }

        let Some(inserted) = search_or_insert(&mut self.entries, hash, self.lg_cur_size) else {
            unreachable!("resize or rebuild keeps the table below its capacity");
        };
        if !inserted {
            return false;
        }

        self.num_keys += 1;
        if self.num_keys as usize > self.capacity() {
            if self.lg_cur_size <= self.lg_nom_size {
                self.resize();
            } else {
                self.rebuild();
            }
        }
        true
    }

    /// Remove one occurrence of a pre-screened hash. A miss is a no-op.
    pub fn remove_hash(&mut self, hash: u64) {
        self.is_empty = false;

        if hash == 0 || hash >= self.theta {
            return;
        }

        if search_or_decrement(&mut self.entries, hash, self.lg_cur_size) {
            self.num_keys -= 1;
        }
    }

    /// Load an entry that must not already be present, without growth. Used
    /// by set operations filling a pre-sized table from sketch input.
    ///
    /// # Errors
    ///
    /// `LogicFault` if the probe cycle completes (the table was undersized
    /// or the input corrupted); `InvalidArgument` on a duplicate key.
    pub fn load_entry(&mut self, hash: u64, count: u64) -> Result<(), Error> {
        let Some(index) = probe(&self.entries, hash, self.lg_cur_size) else {
            return Err(Error::logic_fault(
                "probe cycle completed, possibly corrupted input sketch",
            ));
        };
        if self.entries[index].0 == hash {
            return Err(Error::invalid_argument(
                "duplicate key, possibly corrupted input sketch",
            ));
        }
        self.entries[index] = (hash, count);
        self.num_keys += 1;
        Ok(())
    }

    pub fn contains_hash(&self, hash: u64) -> bool {
        search(&self.entries, hash, self.lg_cur_size)
    }

    /// Capacity threshold before the next resize or rebuild.
    fn capacity(&self) -> usize {
        let fraction = if self.lg_cur_size <= self.lg_nom_size {
            RESIZE_THRESHOLD
        } else {
            REBUILD_THRESHOLD
        };
        (fraction * self.entries.len() as f64) as usize
    }

    /// Grow the table, re-probing every live entry with its multiplicity.
    fn resize(&mut self) {
        let lg_tgt_size = self.lg_nom_size + 1;
        let factor = (self.resize_factor.lg_value()).clamp(1, lg_tgt_size - self.lg_cur_size);
        let lg_new_size = self.lg_cur_size + factor;

        let mut new_entries = vec![(0, 0); 1 << lg_new_size];
        for &entry in &self.entries {
            if entry.0 != 0 {
                insert_entry(&mut new_entries, entry, lg_new_size)
                    .expect("fresh larger table cannot fill up");
            }
        }

        self.entries = new_entries;
        self.lg_cur_size = lg_new_size;
    }

    /// Lower theta to the k-th smallest retained hash and keep only the
    /// entries below it, multiplicities intact.
    fn rebuild(&mut self) {
        let k = 1usize << self.lg_nom_size;
        let mut live: Vec<Entry> = self.entries.iter().copied().filter(|e| e.0 != 0).collect();
        debug_assert!(live.len() > k, "rebuild requires more than k live entries");
        let (_, pivot, _) = live.select_nth_unstable_by_key(k, |e| e.0);
        self.theta = pivot.0;

        let mut new_entries = vec![(0, 0); self.entries.len()];
        let mut num_keys = 0;
        for &entry in &live {
            if entry.0 < self.theta {
                insert_entry(&mut new_entries, entry, self.lg_cur_size)
                    .expect("k entries fit a table sized for more than k");
                num_keys += 1;
            }
        }

        self.entries = new_entries;
        self.num_keys = num_keys;
    }

    /// Drop retained entries in excess of the nominal size k, if any.
    pub fn trim(&mut self) {
        if self.num_keys as usize > (1 << self.lg_nom_size) {
            self.rebuild();
        }
    }

    /// Restore the freshly-built state.
    pub fn reset(&mut self) {
        let init_lg_cur = starting_sub_multiple(
            self.lg_nom_size + 1,
            MIN_LG_K,
            self.resize_factor.lg_value(),
        );

        if self.entries.len() != 1 << init_lg_cur {
            self.entries.resize(1 << init_lg_cur, (0, 0));
        }
        self.entries.fill((0, 0));
        self.num_keys = 0;
        self.theta = starting_theta_from_sampling_probability(self.sampling_probability);
        self.is_empty = true;
        self.lg_cur_size = init_lg_cur;
    }

    pub fn num_retained(&self) -> u32 {
        self.num_keys
    }

    pub fn theta(&self) -> u64 {
        self.theta
    }

    pub fn set_theta(&mut self, theta: u64) {
        self.theta = theta;
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn set_empty(&mut self, is_empty: bool) {
        self.is_empty = is_empty;
    }

    /// Iterate the live entries as `(hash, multiplicity)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = Entry> + '_ {
        self.entries.iter().copied().filter(|e| e.0 != 0)
    }

    /// The full slot array, empty slots included. The update-sketch wire
    /// format persists the table verbatim.
    pub fn raw_entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn lg_cur_size(&self) -> u8 {
        self.lg_cur_size
    }

    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    pub fn resize_factor(&self) -> ResizeFactor {
        self.resize_factor
    }

    pub fn sampling_probability(&self) -> f32 {
        self.sampling_probability
    }

    pub fn hash_seed(&self) -> u64 {
        self.hash_seed
    }

    pub fn seed_hash(&self) -> u16 {
        compute_seed_hash(self.hash_seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::DEFAULT_UPDATE_SEED;
    use crate::hash::Hashable;

    fn hash_of(value: impl Hashable) -> u64 {
        value.sketch_hash(DEFAULT_UPDATE_SEED).unwrap()
    }

    fn new_table(lg_nom: u8, rf: ResizeFactor) -> ThetaDupHashTable {
        ThetaDupHashTable::new(lg_nom, rf, 1.0, DEFAULT_UPDATE_SEED)
    }

    #[test]
    fn test_new_table() {
        let table = new_table(8, ResizeFactor::X8);
        assert_eq!(
            table.lg_cur_size(),
            starting_sub_multiple(8 + 1, MIN_LG_K, ResizeFactor::X8.lg_value())
        );
        assert_eq!(table.theta(), MAX_THETA);
        assert_eq!(table.num_retained(), 0);
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_insert_and_duplicate_count() {
        let mut table = new_table(8, ResizeFactor::X8);
        let hash = hash_of("value");

        assert!(table.insert_hash(hash));
        assert_eq!(table.num_retained(), 1);
        assert!(!table.is_empty());

        // duplicates bump the multiplicity instead of retaining a new entry
        assert!(!table.insert_hash(hash));
        assert!(!table.insert_hash(hash));
        assert_eq!(table.num_retained(), 1);
        let entry = table.iter().next().unwrap();
        assert_eq!(entry, (hash, 3));
    }

    #[test]
    fn test_theta_screening() {
        let mut table = new_table(8, ResizeFactor::X8);
        table.set_theta(1);
        assert!(!table.insert_hash(hash_of("anything")));
        assert_eq!(table.num_retained(), 0);
        // screened updates still mark the stream non-empty
        assert!(!table.is_empty());
    }

    #[test]
    fn test_remove_counts_down_to_clear() {
        let mut table = new_table(8, ResizeFactor::X8);
        let hash = hash_of(42u64);

        table.insert_hash(hash);
        table.insert_hash(hash);
        assert_eq!(table.num_retained(), 1);

        table.remove_hash(hash);
        assert_eq!(table.num_retained(), 1);
        assert_eq!(table.iter().next().unwrap(), (hash, 1));

        table.remove_hash(hash);
        assert_eq!(table.num_retained(), 0);
        assert_eq!(table.iter().count(), 0);

        // removing an absent key is a silent no-op
        table.remove_hash(hash);
        assert_eq!(table.num_retained(), 0);
    }

    #[test]
    fn test_resize_preserves_multiplicities() {
        let mut table = new_table(8, ResizeFactor::X2);
        assert_eq!(table.raw_entries().len(), 32);

        // each key inserted i+1 times; capacity 16 triggers a resize
        let hashes: Vec<u64> = (0..20u64).map(hash_of).collect();
        for (i, &hash) in hashes.iter().enumerate() {
            for _ in 0..=i {
                table.insert_hash(hash);
            }
        }

        assert_eq!(table.raw_entries().len(), 64);
        assert_eq!(table.num_retained(), 20);
        for (i, &hash) in hashes.iter().enumerate() {
            let entry = table.iter().find(|e| e.0 == hash).unwrap();
            assert_eq!(entry.1, i as u64 + 1);
        }
    }

    #[test]
    fn test_resize_factors() {
        let mut table = new_table(8, ResizeFactor::X4);
        assert_eq!(table.raw_entries().len(), 32);
        for i in 0..20u64 {
            table.insert_hash(hash_of(i));
        }
        assert_eq!(table.raw_entries().len(), 128);
        assert_eq!(table.num_retained(), 20);
    }

    #[test]
    fn test_rebuild_lowers_theta_to_kth_smallest() {
        let mut table = new_table(5, ResizeFactor::X8);
        assert_eq!(table.lg_cur_size(), 6);

        let mut hashes = vec![];
        let mut i = 0u64;
        // insert until the first rebuild fires
        while table.theta() == MAX_THETA {
            let hash = hash_of(i);
            if table.insert_hash(hash) {
                hashes.push(hash);
            }
            i += 1;
        }

        hashes.sort_unstable();
        let kth = hashes[1 << 5];
        assert_eq!(table.theta(), kth);
        assert_eq!(table.num_retained(), 1 << 5);
        assert!(table.iter().all(|e| e.0 < kth));

        // keep going; theta only decreases
        let first_theta = table.theta();
        for j in i..i + 200 {
            table.insert_hash(hash_of(j));
        }
        assert!(table.theta() < first_theta);
    }

    #[test]
    fn test_rebuild_preserves_multiplicities() {
        let mut table = new_table(5, ResizeFactor::X8);
        for i in 0..100u64 {
            let hash = hash_of(i);
            table.insert_hash(hash);
            table.insert_hash(hash);
        }
        assert!(table.theta() < MAX_THETA);
        assert!(table.iter().all(|e| e.1 == 2));
    }

    #[test]
    fn test_trim() {
        let mut table = new_table(5, ResizeFactor::X8);
        for i in 0..60u64 {
            table.insert_hash(hash_of(i));
        }
        assert!(table.num_retained() > 32);

        table.trim();
        assert!(table.num_retained() <= 32);
        assert!(table.theta() < MAX_THETA);

        // trimming an already-nominal table changes nothing
        let theta = table.theta();
        let retained = table.num_retained();
        table.trim();
        assert_eq!(table.theta(), theta);
        assert_eq!(table.num_retained(), retained);
    }

    #[test]
    fn test_reset() {
        let mut table = new_table(8, ResizeFactor::X8);
        let init_theta = table.theta();
        let init_lg_cur = table.lg_cur_size();
        let init_len = table.raw_entries().len();

        for i in 0..600u64 {
            table.insert_hash(hash_of(i));
        }
        assert!(!table.is_empty());

        table.reset();
        assert!(table.is_empty());
        assert_eq!(table.num_retained(), 0);
        assert_eq!(table.theta(), init_theta);
        assert_eq!(table.lg_cur_size(), init_lg_cur);
        assert_eq!(table.raw_entries().len(), init_len);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_sampling_probability_sets_theta() {
        let table = ThetaDupHashTable::new(8, ResizeFactor::X8, 0.5, DEFAULT_UPDATE_SEED);
        assert_eq!(table.theta(), (MAX_THETA as f64 * 0.5) as u64);
    }

    #[test]
    fn test_search_after_inserts() {
        let mut table = new_table(8, ResizeFactor::X8);
        let present = hash_of("present");
        let absent = hash_of("absent");
        table.insert_hash(present);
        assert!(table.contains_hash(present));
        assert!(!table.contains_hash(absent));
    }

    #[test]
    fn test_load_entry_rejects_duplicates() {
        let mut table = ThetaDupHashTable::from_raw_parts(
            5,
            4,
            ResizeFactor::X1,
            1.0,
            MAX_THETA,
            DEFAULT_UPDATE_SEED,
            false,
        );
        table.load_entry(17, 1).unwrap();
        let err = table.load_entry(17, 1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_empty_sentinel_invariant() {
        let mut table = new_table(6, ResizeFactor::X2);
        for i in 0..200u64 {
            table.insert_hash(hash_of(i));
            if i % 3 == 0 {
                table.remove_hash(hash_of(i / 3));
            }
        }
        let live = table
            .raw_entries()
            .iter()
            .filter(|e| e.0 != 0)
            .collect::<Vec<_>>();
        assert_eq!(live.len(), table.num_retained() as usize);
        for entry in table.raw_entries() {
            assert_eq!(entry.0 == 0, entry.1 == 0);
        }
        for entry in live {
            assert!(entry.0 < table.theta());
        }
    }

    #[test]
    fn test_starting_sub_multiple() {
        assert_eq!(starting_sub_multiple(13, 5, 3), 7);
        assert_eq!(starting_sub_multiple(6, 5, 3), 6);
        assert_eq!(starting_sub_multiple(4, 5, 3), 5);
        assert_eq!(starting_sub_multiple(13, 5, 0), 13);
    }

    #[test]
    fn test_lg_size_from_count() {
        assert_eq!(lg_size_from_count(1, REBUILD_THRESHOLD), 1);
        assert_eq!(lg_size_from_count(32, REBUILD_THRESHOLD), 6);
        // just above the threshold for a 64-slot table needs 128 slots
        assert_eq!(lg_size_from_count(61, REBUILD_THRESHOLD), 7);
    }
}
