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

//! Compact, immutable form of the theta-dup sketch.

use std::fmt::Write as _;
use std::io;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::NumStdDev;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::theta::ThetaDupSketchView;
use crate::theta::hash_table::Entry;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::serialization::*;

/// An immutable snapshot of a theta-dup sketch.
///
/// Instances are obtained by [`compacting`](super::UpdateThetaDupSketch::compact)
/// an update sketch, as the result of a set operation, or by deserializing a
/// previously serialized compact sketch. They cannot be updated, only
/// queried, serialized and fed to set operations.
#[derive(Debug, Clone)]
pub struct CompactThetaDupSketch {
    theta: u64,
    entries: Vec<Entry>,
    seed_hash: u16,
    is_empty: bool,
    is_ordered: bool,
}

impl CompactThetaDupSketch {
    pub(crate) fn from_parts(
        theta: u64,
        entries: Vec<Entry>,
        seed_hash: u16,
        is_empty: bool,
        is_ordered: bool,
    ) -> Self {
        Self {
            theta,
            entries,
            seed_hash,
            is_empty,
            is_ordered,
        }
    }

    /// Sketch equality as used by the round-trip laws: two sketches are
    /// considered equal when their thetas match.
    pub fn equals(&self, other: &Self) -> bool {
        self.theta == other.theta
    }

    fn preamble_longs(&self) -> u8 {
        if self.is_empty || self.is_single_item() {
            PREAMBLE_LONGS_EMPTY
        } else if self.is_estimation_mode() {
            PREAMBLE_LONGS_ESTIMATION
        } else {
            PREAMBLE_LONGS_EXACT
        }
    }

    fn flags_byte(&self) -> u8 {
        let mut flags = FLAG_IS_COMPACT | FLAG_IS_READ_ONLY;
        if self.is_empty {
            flags |= FLAG_IS_EMPTY;
        }
        if self.is_ordered {
            flags |= FLAG_IS_ORDERED;
        }
        flags
    }

    fn is_single_item(&self) -> bool {
        self.entries.len() == 1 && !self.is_estimation_mode()
    }

    /// Serialize to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.serialize_with_header(0)
    }

    /// Serialize to bytes, reserving a zero-filled region of
    /// `header_size_bytes` in front of the sketch for downstream embedding.
    pub fn serialize_with_header(&self, header_size_bytes: usize) -> Vec<u8> {
        let preamble_longs = self.preamble_longs();
        let size = (preamble_longs as usize) * 8 + self.entries.len() * ENTRY_SIZE_BYTES;
        let mut bytes = SketchBytes::with_header(header_size_bytes, size);

        bytes.write_u8(preamble_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(SKETCH_TYPE_COMPACT);
        bytes.write_u16_le(0); // two reserved layout bytes
        bytes.write_u8(self.flags_byte());
        bytes.write_u16_le(self.seed_hash);

        if !self.is_empty && !self.is_single_item() {
            bytes.write_u32_le(self.entries.len() as u32);
            bytes.write_u32_le(0); // reserved
            if self.is_estimation_mode() {
                bytes.write_u64_le(self.theta);
            }
        }
        if !self.is_empty {
            for &entry in &self.entries {
                bytes.write_entry_le(entry);
            }
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

        writer.write_u8(self.preamble_longs()).map_err(write)?;
        writer.write_u8(SERIAL_VERSION).map_err(write)?;
        writer.write_u8(SKETCH_TYPE_COMPACT).map_err(write)?;
        writer.write_u16::<LittleEndian>(0).map_err(write)?;
        writer.write_u8(self.flags_byte()).map_err(write)?;
        writer
            .write_u16::<LittleEndian>(self.seed_hash)
            .map_err(write)?;

        if !self.is_empty && !self.is_single_item() {
            writer
                .write_u32::<LittleEndian>(self.entries.len() as u32)
                .map_err(write)?;
            writer.write_u32::<LittleEndian>(0).map_err(write)?;
            if self.is_estimation_mode() {
                writer
                    .write_u64::<LittleEndian>(self.theta)
                    .map_err(write)?;
            }
        }
        if !self.is_empty {
            for &(hash, count) in &self.entries {
                writer.write_u64::<LittleEndian>(hash).map_err(write)?;
                writer.write_u64::<LittleEndian>(count).map_err(write)?;
            }
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
    /// - `InvalidArgument` on empty input
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
        let preamble_longs =
            cursor.read_u8().map_err(slice_error("preamble_longs"))? & PREAMBLE_LONGS_MASK;
        let serial_version = cursor.read_u8().map_err(slice_error("serial_version"))?;
        let sketch_type = cursor.read_u8().map_err(slice_error("sketch_type"))?;
        let _reserved = cursor.read_u16_le().map_err(slice_error("reserved"))?;
        let flags = cursor.read_u8().map_err(slice_error("flags"))?;
        let seed_hash = cursor.read_u16_le().map_err(slice_error("seed_hash"))?;
        validate_head(SKETCH_TYPE_COMPACT, serial_version, sketch_type, seed_hash, seed)?;

        let is_empty = (flags & FLAG_IS_EMPTY) != 0;
        let is_ordered = (flags & FLAG_IS_ORDERED) != 0;

        let mut theta = MAX_THETA;
        let mut num_keys = 0u32;
        if !is_empty {
            if preamble_longs == PREAMBLE_LONGS_EMPTY {
                // single-item fast path: one entry right after the head
                num_keys = 1;
            } else {
                num_keys = cursor.read_u32_le().map_err(slice_error("num_keys"))?;
                let _reserved = cursor.read_u32_le().map_err(slice_error("reserved"))?;
                if preamble_longs > PREAMBLE_LONGS_EXACT {
                    theta = cursor.read_u64_le().map_err(slice_error("theta"))?;
                }
            }
        }

        let mut entries = Vec::with_capacity(num_keys as usize);
        for _ in 0..num_keys {
            entries.push(cursor.read_entry_le().map_err(slice_error("entry"))?);
        }

        Ok(Self {
            theta,
            entries,
            seed_hash,
            is_empty,
            is_ordered,
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
        let preamble_longs = head[0] & PREAMBLE_LONGS_MASK;
        let flags = head[5];
        let seed_hash = u16::from_le_bytes([head[6], head[7]]);
        validate_head(SKETCH_TYPE_COMPACT, head[1], head[2], seed_hash, seed)?;

        let is_empty = (flags & FLAG_IS_EMPTY) != 0;
        let is_ordered = (flags & FLAG_IS_ORDERED) != 0;

        let mut theta = MAX_THETA;
        let mut num_keys = 0u32;
        if !is_empty {
            if preamble_longs == PREAMBLE_LONGS_EMPTY {
                num_keys = 1;
            } else {
                num_keys = reader
                    .read_u32::<LittleEndian>()
                    .map_err(stream_error("num_keys"))?;
                let _reserved = reader
                    .read_u32::<LittleEndian>()
                    .map_err(stream_error("reserved"))?;
                if preamble_longs > PREAMBLE_LONGS_EXACT {
                    theta = reader
                        .read_u64::<LittleEndian>()
                        .map_err(stream_error("theta"))?;
                }
            }
        }

        let mut entries = Vec::with_capacity(num_keys as usize);
        for _ in 0..num_keys {
            let hash = reader
                .read_u64::<LittleEndian>()
                .map_err(stream_error("entry hash"))?;
            let count = reader
                .read_u64::<LittleEndian>()
                .map_err(stream_error("entry count"))?;
            entries.push((hash, count));
        }

        Ok(Self {
            theta,
            entries,
            seed_hash,
            is_empty,
            is_ordered,
        })
    }

    /// Writes a human-readable summary of this sketch.
    pub fn to_summary_string(&self, print_items: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "### Compact theta-dup sketch summary:");
        let _ = writeln!(out, "   num retained keys    : {}", self.entries.len());
        let _ = writeln!(out, "   seed hash            : {}", self.seed_hash);
        let _ = writeln!(out, "   empty?               : {}", self.is_empty);
        let _ = writeln!(out, "   ordered?             : {}", self.is_ordered);
        let _ = writeln!(
            out,
            "   estimation mode?     : {}",
            self.is_estimation_mode()
        );
        let _ = writeln!(out, "   theta (fraction)     : {}", self.theta());
        let _ = writeln!(out, "   theta (raw 64-bit)   : {}", self.theta);
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

impl ThetaDupSketchView for CompactThetaDupSketch {
    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn is_ordered(&self) -> bool {
        self.is_ordered
    }

    fn theta64(&self) -> u64 {
        self.theta
    }

    fn num_retained(&self) -> u32 {
        self.entries.len() as u32
    }

    fn seed_hash(&self) -> u16 {
        self.seed_hash
    }

    fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.entries.iter().copied()
    }
}
