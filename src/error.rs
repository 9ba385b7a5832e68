// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the OTP core.
//!
//! All protocol-level errors are recovered locally by the engines that
//! encounter them (decode failures are logged and the datagram dropped,
//! stale folios are logged and discarded); this enum exists for the
//! handful of call sites where a result must be surfaced synchronously
//! (the codec, and encoder-side size checks).

use std::fmt;

/// Errors returned by OTP core operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Codec errors (C1)
    // ========================================================================
    /// A layer's structure did not match the wire format (bad identifier,
    /// bad vector for depth, length mismatch against consumed bytes, or a
    /// truncated buffer).
    MalformedLayer(&'static str),
    /// A decoded field fell outside its valid range (system/group/point/priority).
    OutOfRange(&'static str),
    /// A manufacturer/module-number pair was not recognized; the enclosing
    /// frame is still valid, only this module's payload is skipped.
    UnknownModule { manufacturer_id: u16, module_number: u16 },
    /// Encoder-side: the assembled message would exceed the layer's wire
    /// size bound and must be split into additional folio pages.
    MessageTooLarge { attempted: usize, max: usize },

    // ========================================================================
    // Reassembly errors (C2)
    // ========================================================================
    /// A folio or sequence number was older than the last accepted one for
    /// the same (cid, vector); the datagram is dropped.
    OutOfSequence,

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// The underlying `Network` collaborator failed to send or receive.
    NetworkUnavailable(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedLayer(reason) => write!(f, "malformed PDU layer: {}", reason),
            Error::OutOfRange(field) => write!(f, "field out of range: {}", field),
            Error::UnknownModule { manufacturer_id, module_number } => write!(
                f,
                "unknown module {:#06x}/{:#06x}",
                manufacturer_id, module_number
            ),
            Error::MessageTooLarge { attempted, max } => {
                write!(f, "message too large: {} bytes (max {})", attempted, max)
            }
            Error::OutOfSequence => write!(f, "folio or sequence number is out of sequence"),
            Error::NetworkUnavailable(e) => write!(f, "network unavailable: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NetworkUnavailable(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenient alias for results using the crate's `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
