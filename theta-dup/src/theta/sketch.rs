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

//! Mutable theta-dup sketch and its builder.

use std::fmt::Write as _;
use std::io;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::common::ResizeFactor;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::Hashable;
use crate::theta::CompactThetaDupSketch;
use crate::theta::ThetaDupSketchView;
use crate::theta::hash_table::DEFAULT_LG_K;
use crate::theta::hash_table::Entry;
use crate::theta::hash_table::MAX_LG_K;
use crate::theta::hash_table::MIN_LG_K;
use crate::theta::hash_table::ThetaDupHashTable;
use crate::theta::serialization::*;

/// Mutable theta-dup sketch built from input data.
///
/// Every retained entry tracks how many times its element was inserted, so
/// [`remove`](Self::remove) can undo an insertion. The estimate remains the
/// number of distinct elements.
///
/// # Examples
///
/// ```
/// use theta_dup::theta::ThetaDupSketchView;
/// use theta_dup::theta::UpdateThetaDupSketch;
///
/// let mut sketch = UpdateThetaDupSketch::builder().lg_k(12).build().unwrap();
/// sketch.update("apple");
/// sketch.update("apple");
/// sketch.update("banana");
/// assert_eq!(sketch.estimate(), 2.0);
///
/// sketch.remove("banana");
/// assert_eq!(sketch.estimate(), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct UpdateThetaDupSketch {
    table: ThetaDupHashTable,
}

impl UpdateThetaDupSketch {
    /// Create a new builder with default parameters.
    pub fn builder() -> UpdateThetaDupSketchBuilder {
        UpdateThetaDupSketchBuilder::default()
    }

    /// Update the sketch with a value.
    ///
    /// Inserting the same value again bumps its multiplicity rather than
    /// changing the estimate. Values whose hash falls above theta are
    /// screened out but still mark the sketch non-empty.
    pub fn update<T: Hashable>(&mut self, value: T) {
        if let Some(hash) = value.sketch_hash(self.table.hash_seed()) {
            self.table.insert_hash(hash);
        }
    }

    /// Remove one occurrence of a value.
    ///
    /// The entry disappears once its multiplicity reaches zero. Removing a
    /// value that is not present is a silent no-op, though it still marks
    /// the sketch non-empty.
    pub fn remove<T: Hashable>(&mut self, value: T) {
        if let Some(hash) = value.sketch_hash(self.table.hash_seed()) {
            self.table.remove_hash(hash);
        }
    }

    /// Drop retained entries in excess of the nominal size k, if any.
    pub fn trim(&mut self) {
        self.table.trim();
    }

    /// Reset the sketch to its freshly-built state.
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Take an immutable snapshot, sorted by hash if `ordered`.
    pub fn compact(&self, ordered: bool) -> CompactThetaDupSketch {
        let mut entries: Vec<Entry> = self.table.iter().collect();
        if ordered {
            entries.sort_unstable();
        }
        CompactThetaDupSketch::from_parts(
            self.table.theta(),
            entries,
            self.table.seed_hash(),
            self.table.is_empty(),
            ordered,
        )
    }

    /// Sketch equality as used by the round-trip laws: two sketches are
    /// considered equal when their thetas match.
    pub fn equals(&self, other: &Self) -> bool {
        self.table.theta() == other.table.theta()
    }

    /// log2 of the configured nominal entry count.
    pub fn lg_k(&self) -> u8 {
        self.table.lg_nom_size()
    }

    /// The configured resize factor.
    pub fn resize_factor(&self) -> ResizeFactor {
        self.table.resize_factor()
    }

    /// The configured sampling probability.
    pub fn sampling_probability(&self) -> f32 {
        self.table.sampling_probability()
    }

    /// Serialize to bytes. The full probe table is persisted, so a
    /// deserialized sketch continues updating exactly where this one left
    /// off.
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with_header(0)
    }

    /// Serialize to bytes, reserving a zero-filled region of
    /// `header_size_bytes` in front of the sketch for downstream embedding.
    pub fn serialize_with_header(&self, header_size_bytes: usize) -> Vec<u8> {
        let raw = self.table.raw_entries();
        let size = (PREAMBLE_LONGS_ESTIMATION as usize) * 8 + raw.len() * ENTRY_SIZE_BYTES;
        let mut bytes = SketchBytes::with_header(header_size_bytes, size);

        bytes.write_u8(PREAMBLE_LONGS_ESTIMATION | (self.table.resize_factor().lg_value() << 6));
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(SKETCH_TYPE_UPDATE);
        bytes.write_u8(self.table.lg_nom_size());
        bytes.write_u8(self.table.lg_cur_size());
        bytes.write_u8(if self.table.is_empty() { FLAG_IS_EMPTY } else { 0 });
        bytes.write_u16_le(self.table.seed_hash());

        bytes.write_u32_le(self.table.num_retained());
        bytes.write_f32_le(self.table.sampling_probability());
        bytes.write_u64_le(self.table.theta());
        for &entry in raw {
            bytes.write_entry_le(entry);
        }

        bytes.into_bytes()
    }

    /// Serialize into a caller-supplied writer.
    ///
    /// # Errors
    ///
    /// `IoFailure` if the writer signals an error.
    pub fn serialize_into<W: io::Write>(&self, writer: &mut W) -> Result<(), Error> {
        let write = |err| Error::io_failure("write", err);

        writer
            .write_u8(PREAMBLE_LONGS_ESTIMATION | (self.table.resize_factor().lg_value() << 6))
            .map_err(write)?;
        writer.write_u8(SERIAL_VERSION).map_err(write)?;
        writer.write_u8(SKETCH_TYPE_UPDATE).map_err(write)?;
        writer.write_u8(self.table.lg_nom_size()).map_err(write)?;
        writer.write_u8(self.table.lg_cur_size()).map_err(write)?;
        writer
            .write_u8(if self.table.is_empty() { FLAG_IS_EMPTY } else { 0 })
            .map_err(write)?;
        writer
            .write_u16::<LittleEndian>(self.table.seed_hash())
            .map_err(write)?;

        writer
            .write_u32::<LittleEndian>(self.table.num_retained())
            .map_err(write)?;
        writer
            .write_f32::<LittleEndian>(self.table.sampling_probability())
            .map_err(write)?;
        writer
            .write_u64::<LittleEndian>(self.table.theta())
            .map_err(write)?;
        for &(hash, count) in self.table.raw_entries() {
            writer.write_u64::<LittleEndian>(hash).map_err(write)?;
            writer.write_u64::<LittleEndian>(count).map_err(write)?;
        }
        Ok(())
    }

    /// Deserialize from bytes with the default seed.
    ///
    /// # Errors
    ///
    /// See [`deserialize_with_seed`](Self::deserialize_with_seed).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize from bytes, validating against the seed the sketch was
    /// built with.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` on empty input or out-of-range layout fields
    /// - `Truncated` if the buffer is shorter than the declared layout
    /// - `VersionMismatch` / `TypeMismatch` / `SeedMismatch` on a bad header
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::invalid_argument("input bytes are empty"));
        }
        if bytes.len() < 8 {
            return Err(Error::truncated("preamble"));
        }

        let mut cursor = SketchSlice::new(bytes);
        let preamble_byte = cursor.read_u8().map_err(slice_error("preamble_longs"))?;
        let serial_version = cursor.read_u8().map_err(slice_error("serial_version"))?;
        let sketch_type = cursor.read_u8().map_err(slice_error("sketch_type"))?;
        let lg_nom_size = cursor.read_u8().map_err(slice_error("lg_nom_size"))?;
        let lg_cur_size = cursor.read_u8().map_err(slice_error("lg_cur_size"))?;
        let flags = cursor.read_u8().map_err(slice_error("flags"))?;
        let seed_hash = cursor.read_u16_le().map_err(slice_error("seed_hash"))?;
        validate_head(SKETCH_TYPE_UPDATE, serial_version, sketch_type, seed_hash, seed)?;
        validate_table_layout(lg_nom_size, lg_cur_size)?;

        let resize_factor = ResizeFactor::from_bits(preamble_byte >> 6);
        let num_keys = cursor.read_u32_le().map_err(slice_error("num_keys"))?;
        let p = cursor.read_f32_le().map_err(slice_error("p"))?;
        let theta = cursor.read_u64_le().map_err(slice_error("theta"))?;

        let table_size = 1usize << lg_cur_size;
        let mut entries = Vec::with_capacity(table_size);
        for _ in 0..table_size {
            entries.push(cursor.read_entry_le().map_err(slice_error("table entry"))?);
        }

        Ok(Self {
            table: ThetaDupHashTable::from_loaded(
                lg_cur_size,
                lg_nom_size,
                resize_factor,
                p,
                theta,
                seed,
                (flags & FLAG_IS_EMPTY) != 0,
                entries,
                num_keys,
            ),
        })
    }

    /// Deserialize from a caller-supplied reader with the default seed.
    ///
    /// # Errors
    ///
    /// See [`deserialize_from_with_seed`](Self::deserialize_from_with_seed).
    pub fn deserialize_from<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        Self::deserialize_from_with_seed(reader, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize from a caller-supplied reader.
    ///
    /// # Errors
    ///
    /// As [`deserialize_with_seed`](Self::deserialize_with_seed), plus
    /// `IoFailure` when the reader fails for reasons other than running out
    /// of bytes.
    pub fn deserialize_from_with_seed<R: io::Read>(
        reader: &mut R,
        seed: u64,
    ) -> Result<Self, Error> {
        let mut head = [0u8; 8];
        reader
            .read_exact(&mut head)
            .map_err(stream_error("preamble"))?;
        Self::deserialize_tail(head, reader, seed)
    }

    /// Continue after an already-consumed 8-byte preamble head. Shared with
    /// the tagged-dispatch deserializer.
    pub(crate) fn deserialize_tail<R: io::Read>(
        head: [u8; 8],
        reader: &mut R,
        seed: u64,
    ) -> Result<Self, Error> {
        let seed_hash = u16::from_le_bytes([head[6], head[7]]);
        validate_head(SKETCH_TYPE_UPDATE, head[1], head[2], seed_hash, seed)?;
        let lg_nom_size = head[3];
        let lg_cur_size = head[4];
        validate_table_layout(lg_nom_size, lg_cur_size)?;

        let resize_factor = ResizeFactor::from_bits(head[0] >> 6);
        let num_keys = reader
            .read_u32::<LittleEndian>()
            .map_err(stream_error("num_keys"))?;
        let p = reader
            .read_f32::<LittleEndian>()
            .map_err(stream_error("p"))?;
        let theta = reader
            .read_u64::<LittleEndian>()
            .map_err(stream_error("theta"))?;

        let table_size = 1usize << lg_cur_size;
        let mut entries = Vec::with_capacity(table_size);
        for _ in 0..table_size {
            let hash = reader
                .read_u64::<LittleEndian>()
                .map_err(stream_error("table entry"))?;
            let count = reader
                .read_u64::<LittleEndian>()
                .map_err(stream_error("table entry"))?;
            entries.push((hash, count));
        }

        Ok(Self {
            table: ThetaDupHashTable::from_loaded(
                lg_cur_size,
                lg_nom_size,
                resize_factor,
                p,
                theta,
                seed,
                (head[5] & FLAG_IS_EMPTY) != 0,
                entries,
                num_keys,
            ),
        })
    }

    /// Writes a human-readable summary of this sketch.
    pub fn to_summary_string(&self, print_items: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### Update theta-dup sketch summary:");
        let _ = writeln!(out, "   lg nominal size      : {}", self.table.lg_nom_size());
        let _ = writeln!(out, "   lg current size      : {}", self.table.lg_cur_size());
        let _ = writeln!(out, "   num retained keys    : {}", self.num_retained());
        let _ = writeln!(
            out,
            "   resize factor        : {}",
            1 << self.table.resize_factor().lg_value()
        );
        let _ = writeln!(
            out,
            "   sampling probability : {}",
            self.table.sampling_probability()
        );
        let _ = writeln!(out, "   seed hash            : {}", self.seed_hash());
        let _ = writeln!(out, "   empty?               : {}", self.is_empty());
        let _ = writeln!(out, "   ordered?             : {}", self.is_ordered());
        let _ = writeln!(
            out,
            "   estimation mode?     : {}",
            self.is_estimation_mode()
        );
        let _ = writeln!(out, "   theta (fraction)     : {}", self.theta());
        let _ = writeln!(out, "   theta (raw 64-bit)   : {}", self.theta64());
        let _ = writeln!(out, "   estimate             : {}", self.estimate());
        let _ = writeln!(
            out,
            "   lower bound 95% conf : {}",
            self.lower_bound(NumStdDev::Two)
        );
        let _ = writeln!(
            out,
            "   upper bound 95% conf : {}",
            self.upper_bound(NumStdDev::Two)
        );
        let _ = writeln!(out, "### End sketch summary");
        if print_items {
            let _ = writeln!(out, "### Retained keys");
            for (hash, count) in self.iter() {
                let _ = writeln!(out, "   ({hash},{count})");
            }
            let _ = writeln!(out, "### End retained keys");
        }
        out
    }
}

impl ThetaDupSketchView for UpdateThetaDupSketch {
    fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn is_ordered(&self) -> bool {
        false
    }

    fn theta64(&self) -> u64 {
        self.table.theta()
    }

    fn num_retained(&self) -> u32 {
        self.table.num_retained()
    }

    fn seed_hash(&self) -> u16 {
        self.table.seed_hash()
    }

    fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.table.iter()
    }
}

fn validate_table_layout(lg_nom_size: u8, lg_cur_size: u8) -> Result<(), Error> {
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_nom_size) {
        return Err(Error::invalid_argument("lg_nom_size out of range")
            .with_context("lg_nom_size", lg_nom_size)
            .with_context("min", MIN_LG_K)
            .with_context("max", MAX_LG_K));
    }
    if !(MIN_LG_K..=lg_nom_size + 1).contains(&lg_cur_size) {
        return Err(Error::invalid_argument("lg_cur_size out of range")
            .with_context("lg_cur_size", lg_cur_size)
            .with_context("lg_nom_size", lg_nom_size));
    }
    Ok(())
}

/// Builder for [`UpdateThetaDupSketch`].
#[derive(Debug)]
pub struct UpdateThetaDupSketchBuilder {
    lg_k: u8,
    resize_factor: ResizeFactor,
    sampling_probability: f32,
    seed: u64,
}

impl Default for UpdateThetaDupSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            resize_factor: ResizeFactor::X8,
            sampling_probability: 1.0,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl UpdateThetaDupSketchBuilder {
    /// Set log2(k), where k is the nominal number of retained entries.
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        self.lg_k = lg_k;
        self
    }

    /// Set the resize factor for the internal hash table (defaults to X8).
    pub fn resize_factor(mut self, resize_factor: ResizeFactor) -> Self {
        self.resize_factor = resize_factor;
        self
    }

    /// Set the sampling probability (initial theta). The default is 1, so
    /// the sketch retains every entry until it reaches its limit, at which
    /// point it enters estimation mode and lowers theta as necessary.
    pub fn sampling_probability(mut self, p: f32) -> Self {
        self.sampling_probability = p;
        self
    }

    /// Set the seed for the hash function. Sketches produced with different
    /// seeds are not compatible and cannot be mixed in set operations.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the sketch.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `lg_k` is outside `[5, 26]` or the sampling
    /// probability is outside `(0, 1]`.
    pub fn build(self) -> Result<UpdateThetaDupSketch, Error> {
        if !(MIN_LG_K..=MAX_LG_K).contains(&self.lg_k) {
            return Err(Error::invalid_argument("lg_k out of range")
                .with_context("lg_k", self.lg_k)
                .with_context("min", MIN_LG_K)
                .with_context("max", MAX_LG_K));
        }
        if !(self.sampling_probability > 0.0 && self.sampling_probability <= 1.0) {
            return Err(Error::invalid_argument("sampling probability out of range")
                .with_context("p", self.sampling_probability));
        }
        Ok(UpdateThetaDupSketch {
            table: ThetaDupHashTable::new(
                self.lg_k,
                self.resize_factor,
                self.sampling_probability,
                self.seed,
            ),
        })
    }
}

/// A deserialized sketch of either kind.
///
/// The generic deserializers return this tagged form; match on it, or query
/// it directly through [`ThetaDupSketchView`].
#[derive(Debug, Clone)]
pub enum ThetaDupSketch {
    /// A mutable update sketch.
    Update(UpdateThetaDupSketch),
    /// An immutable compact sketch.
    Compact(CompactThetaDupSketch),
}

impl ThetaDupSketch {
    /// Deserialize a sketch of either kind with the default seed.
    ///
    /// # Errors
    ///
    /// See [`deserialize_with_seed`](Self::deserialize_with_seed).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_seed(bytes, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a sketch of either kind, dispatching on the sketch-type
    /// byte of the preamble.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for an unknown sketch type; otherwise as the concrete
    /// deserializers.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::invalid_argument("input bytes are empty"));
        }
        if bytes.len() < 8 {
            return Err(Error::truncated("preamble"));
        }
        match bytes[2] {
            SKETCH_TYPE_UPDATE => {
                UpdateThetaDupSketch::deserialize_with_seed(bytes, seed).map(Self::Update)
            }
            SKETCH_TYPE_COMPACT => {
                CompactThetaDupSketch::deserialize_with_seed(bytes, seed).map(Self::Compact)
            }
            other => Err(Error::new(
                crate::error::ErrorKind::TypeMismatch,
                "unknown sketch type",
            )
            .with_context("actual", other)),
        }
    }

    /// Deserialize a sketch of either kind from a reader with the default
    /// seed.
    ///
    /// # Errors
    ///
    /// See [`deserialize_from_with_seed`](Self::deserialize_from_with_seed).
    pub fn deserialize_from<R: io::Read>(reader: &mut R) -> Result<Self, Error> {
        Self::deserialize_from_with_seed(reader, DEFAULT_UPDATE_SEED)
    }

    /// Deserialize a sketch of either kind from a reader.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` for an unknown sketch type; otherwise as the concrete
    /// deserializers, plus `IoFailure` for reader failures.
    pub fn deserialize_from_with_seed<R: io::Read>(
        reader: &mut R,
        seed: u64,
    ) -> Result<Self, Error> {
        let mut head = [0u8; 8];
        reader
            .read_exact(&mut head)
            .map_err(stream_error("preamble"))?;
        match head[2] {
            SKETCH_TYPE_UPDATE => {
                UpdateThetaDupSketch::deserialize_tail(head, reader, seed).map(Self::Update)
            }
            SKETCH_TYPE_COMPACT => {
                CompactThetaDupSketch::deserialize_tail(head, reader, seed).map(Self::Compact)
            }
            other => Err(Error::new(
                crate::error::ErrorKind::TypeMismatch,
                "unknown sketch type",
            )
            .with_context("actual", other)),
        }
    }

    /// Sketch equality as used by the round-trip laws: thetas match.
    pub fn equals(&self, other: &Self) -> bool {
        self.theta64() == other.theta64()
    }
}

impl ThetaDupSketchView for ThetaDupSketch {
    fn is_empty(&self) -> bool {
        match self {
            Self::Update(s) => s.is_empty(),
            Self::Compact(s) => s.is_empty(),
        }
    }

    fn is_ordered(&self) -> bool {
        match self {
            Self::Update(s) => s.is_ordered(),
            Self::Compact(s) => s.is_ordered(),
        }
    }

    fn theta64(&self) -> u64 {
        match self {
            Self::Update(s) => s.theta64(),
            Self::Compact(s) => s.theta64(),
        }
    }

    fn num_retained(&self) -> u32 {
        match self {
            Self::Update(s) => s.num_retained(),
            Self::Compact(s) => s.num_retained(),
        }
    }

    fn seed_hash(&self) -> u16 {
        match self {
            Self::Update(s) => s.seed_hash(),
            Self::Compact(s) => s.seed_hash(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        match self {
            Self::Update(s) => EitherIter::Update(s.iter()),
            Self::Compact(s) => EitherIter::Compact(s.iter()),
        }
    }
}

// Unifies the two variants' iterator types behind one concrete type.
enum EitherIter<U, C> {
    Update(U),
    Compact(C),
}

impl<U, C> Iterator for EitherIter<U, C>
where
    U: Iterator<Item = (u64, u64)>,
    C: Iterator<Item = (u64, u64)>,
{
    type Item = (u64, u64);

    fn next(&mut self) -> Option<(u64, u64)> {
        match self {
            EitherIter::Update(it) => it.next(),
            EitherIter::Compact(it) => it.next(),
        }
    }
}
