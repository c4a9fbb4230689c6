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

//! Binary serialization format constants and header validation.
//!
//! Both sketch kinds share an 8-byte preamble head: preamble length and
//! resize factor, serial version, sketch type, two layout bytes, flags, and
//! the 16-bit seed hash. Everything on the wire is little-endian.

use std::io;

use crate::error::Error;
use crate::hash::compute_seed_hash;

/// Current serialization version.
pub const SERIAL_VERSION: u8 = 3;

/// Sketch type byte for the mutable update sketch.
pub const SKETCH_TYPE_UPDATE: u8 = 2;

/// Sketch type byte for the compact sketch.
pub const SKETCH_TYPE_COMPACT: u8 = 3;

/// Preamble size for an empty or single-item compact sketch (1 long).
pub const PREAMBLE_LONGS_EMPTY: u8 = 1;

/// Preamble size for a non-estimation compact sketch (2 longs).
pub const PREAMBLE_LONGS_EXACT: u8 = 2;

/// Preamble size for an estimation-mode compact sketch and for every update
/// sketch (3 longs).
pub const PREAMBLE_LONGS_ESTIMATION: u8 = 3;

/// Mask extracting the preamble length from byte 0; the resize factor
/// occupies the top two bits.
pub const PREAMBLE_LONGS_MASK: u8 = 0x3f;

// Flags (byte 5) - bit masks
/// Flag: data is in big-endian format (reserved, never set).
#[allow(dead_code)]
pub const FLAG_IS_BIG_ENDIAN: u8 = 1 << 0;
/// Flag: sketch is read-only (set on compact sketches).
pub const FLAG_IS_READ_ONLY: u8 = 1 << 1;
/// Flag: sketch is empty.
pub const FLAG_IS_EMPTY: u8 = 1 << 2;
/// Flag: sketch is in compact format.
pub const FLAG_IS_COMPACT: u8 = 1 << 3;
/// Flag: retained entries are ordered by hash.
pub const FLAG_IS_ORDERED: u8 = 1 << 4;

/// Size of a retained entry on the wire: hash plus multiplicity.
pub const ENTRY_SIZE_BYTES: usize = 16;

/// Validate the version, type and seed-hash fields of a preamble head.
pub(crate) fn validate_head(
    expected_type: u8,
    serial_version: u8,
    sketch_type: u8,
    stored_seed_hash: u16,
    seed: u64,
) -> Result<(), Error> {
    if serial_version != SERIAL_VERSION {
        return Err(Error::version_mismatch(SERIAL_VERSION, serial_version));
    }
    if sketch_type != expected_type {
        return Err(Error::type_mismatch(expected_type, sketch_type));
    }
    let expected_seed_hash = compute_seed_hash(seed);
    if stored_seed_hash != expected_seed_hash {
        return Err(Error::seed_mismatch(expected_seed_hash, stored_seed_hash));
    }
    Ok(())
}

/// Error mapper for byte-slice reads: the only way a slice read fails is by
/// running out of bytes.
pub(crate) fn slice_error(field: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |_| Error::truncated(field)
}

/// Error mapper for stream reads: running out of bytes is a truncation, any
/// other failure comes from the byte source itself.
pub(crate) fn stream_error(field: &'static str) -> impl FnOnce(io::Error) -> Error {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::truncated(field)
        } else {
            Error::io_failure("read", err)
        }
    }
}
