// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Root Layer and OTP Layer framing for every OTP datagram.
//!
//! The wire form nests two PDUs: an outer Root Layer (preamble/postamble,
//! the 12-octet packet identifier, a combined flags-and-length field, the
//! root vector, and the CID) wrapping an inner OTP Layer (its own
//! flags-and-length field, the message vector, protocol version, sequence
//! number, folio/page/lastPage, options, reserved octets, and the
//! component name). Both length fields are written bottom-up: each counts
//! only the bytes that follow its own length field, so the root length
//! also covers the entire OTP Layer and its payload.

use crate::error::{Error, Result};
use crate::identifiers::{Cid, Name};
use crate::wire::{Reader, Writer};

/// 12-octet ASCII packet identifier present at the start of every datagram.
pub const PACKET_IDENTIFIER: [u8; 12] = *b"ASC-E1.17\0\0\0";

/// Fixed preamble size carried in the Root Layer.
const PREAMBLE_SIZE: u16 = 0x0010;

/// Fixed postamble size carried in the Root Layer (no postamble is used).
const POSTAMBLE_SIZE: u16 = 0x0000;

/// Constant flags nibble shared by every flags-and-length field (VECTOR |
/// HEADER | DATA all present).
const FLAGS: u8 = 0x7;

/// Root Layer vector identifying the PDU it wraps as an OTP Layer. Not
/// defined anywhere in the available reference material (marked
/// "context-defined by standard" upstream); see `DESIGN.md`.
const VECTOR_ROOT_OTP: u16 = 0x0001;

/// OTP Layer protocol version.
const PROTOCOL_VERSION: u16 = 0x0001;

/// Fixed OTP Layer octets that follow its own flags-and-length field:
/// vector, protocol version, sequence, folio, page, lastPage, options,
/// reserved, component name.
const OTP_TAIL_AFTER_LENGTH: usize = 2 + 2 + 2 + 4 + 2 + 2 + 1 + 4 + 32;

/// Fixed Root Layer octets that follow its own flags-and-length field and
/// precede the OTP Layer's length value: vector, CID, the OTP Layer's own
/// flags octet and 3-byte length field.
const ROOT_TAIL_BEFORE_OTP_LENGTH: u32 = 2 + 16 + 1 + 3;

/// Top-level message discriminator carried in the OTP Layer's vector field.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MessageVector {
    Transform,
    Advertisement,
}

impl MessageVector {
    pub fn to_wire(self) -> u16 {
        match self {
            MessageVector::Transform => 0x0001,
            MessageVector::Advertisement => 0x0002,
        }
    }

    pub fn from_wire(v: u16) -> Result<Self> {
        match v {
            0x0001 => Ok(MessageVector::Transform),
            0x0002 => Ok(MessageVector::Advertisement),
            _ => Err(Error::MalformedLayer("unrecognized OTP header vector")),
        }
    }
}

/// The fixed header shared by every OTP datagram (Root Layer + OTP Layer).
#[derive(Clone, Debug)]
pub struct Header {
    pub vector: MessageVector,
    pub cid: Cid,
    /// Per-datagram sequence number, assigned once per transmitted
    /// datagram (not once per folio): every page of a multi-page folio
    /// carries its own, strictly increasing, sequence value.
    pub sequence: u16,
    pub folio: u32,
    pub page: u16,
    pub last_page: u16,
    pub options: u8,
    pub component_name: Name,
}

/// Byte offsets of the two reserved length fields, returned by `encode` so
/// the caller can patch both once the nested layers have been written.
pub struct HeaderLengths {
    root_length_at: usize,
    otp_length_at: usize,
}

impl Header {
    /// Encode the Root Layer and OTP Layer, reserving (and zero-filling)
    /// both length fields. The caller must patch both, via
    /// [`HeaderLengths::finish`], once the rest of the datagram has been
    /// written.
    pub fn encode(&self, w: &mut Writer) -> HeaderLengths {
        // Root Layer
        w.u16(PREAMBLE_SIZE);
        w.u16(POSTAMBLE_SIZE);
        w.bytes(&PACKET_IDENTIFIER);
        w.u8(FLAGS);
        let root_length_at = w.u24_placeholder();
        w.u16(VECTOR_ROOT_OTP);
        w.bytes(&self.cid.as_bytes());

        // OTP Layer
        w.u8(FLAGS);
        let otp_length_at = w.u24_placeholder();
        w.u16(self.vector.to_wire());
        w.u16(PROTOCOL_VERSION);
        w.u16(self.sequence);
        w.u32(self.folio);
        w.u16(self.page);
        w.u16(self.last_page);
        w.u8(self.options);
        w.u32(0); // reserved
        w.bytes(&self.component_name.to_wire());

        HeaderLengths { root_length_at, otp_length_at }
    }

    /// Decode the Root Layer and OTP Layer, returning the header alongside
    /// the OTP Layer's wire `length` field (which the caller validates
    /// against the remaining datagram once the whole message has been
    /// parsed).
    pub fn decode(r: &mut Reader) -> Result<(Self, u32)> {
        let preamble = r.u16()?;
        let postamble = r.u16()?;
        if preamble != PREAMBLE_SIZE || postamble != POSTAMBLE_SIZE {
            return Err(Error::MalformedLayer("unexpected Root Layer preamble/postamble"));
        }
        let ident = r.bytes(12)?;
        if ident != PACKET_IDENTIFIER {
            return Err(Error::MalformedLayer("bad OTP packet identifier"));
        }
        let _root_flags = r.u8()?;
        let root_length = r.u24()?;
        let root_vector = r.u16()?;
        if root_vector != VECTOR_ROOT_OTP {
            return Err(Error::MalformedLayer("unrecognized Root Layer vector"));
        }
        let cid = Cid::from_bytes(r.array16()?);
        if cid.is_zero() {
            return Err(Error::MalformedLayer("CID must not be all zeros"));
        }

        let _otp_flags = r.u8()?;
        let otp_length = r.u24()?;
        if root_length != ROOT_TAIL_BEFORE_OTP_LENGTH + otp_length {
            return Err(Error::MalformedLayer("Root Layer length does not match OTP Layer length"));
        }
        let vector = MessageVector::from_wire(r.u16()?)?;
        let protocol_version = r.u16()?;
        if protocol_version != PROTOCOL_VERSION {
            return Err(Error::MalformedLayer("unsupported OTP protocol version"));
        }
        let sequence = r.u16()?;
        let folio = r.u32()?;
        let page = r.u16()?;
        let last_page = r.u16()?;
        let options = r.u8()?;
        let _reserved = r.u32()?;
        let component_name = Name::from_wire(r.array32()?);
        Ok((
            Header { vector, cid, sequence, folio, page, last_page, options, component_name },
            otp_length,
        ))
    }

    /// Validate a decoded OTP Layer `length` field against what remains in
    /// the reader once the header (but not the payload) has been consumed.
    pub fn validate_length(length: u32, remaining_after_header: usize) -> Result<()> {
        let expected = length as usize;
        if expected != OTP_TAIL_AFTER_LENGTH + remaining_after_header {
            return Err(Error::MalformedLayer("header length does not match datagram size"));
        }
        Ok(())
    }
}

impl HeaderLengths {
    /// Patch both reserved length fields once every nested layer has been
    /// written to `w`.
    pub fn finish(self, w: &mut Writer) {
        w.finish_flags_length(self.root_length_at);
        w.finish_flags_length(self.otp_length_at);
    }
}
