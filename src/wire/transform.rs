// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transform Layer and nested Point sub-PDU.

use crate::error::{Error, Result};
use crate::wire::{Reader, Timestamp128, Writer};

const VECTOR: u16 = 0x0001;
const POINT_VECTOR: u16 = 0x0001;

/// Bit 7 of the Transform Layer options byte: this folio carries every
/// owned point's full current state, not just points that changed.
const FULL_POINT_SET_BIT: u8 = 0b1000_0000;

/// Transform Layer: one per Transform Message, carrying a list of
/// [`PointPdu`] entries (encoded/decoded by the caller, which assembles
/// the bottom-up length).
#[derive(Clone, Debug)]
pub struct TransformLayer {
    pub system: u8,
    pub timestamp: Timestamp128,
    pub full_point_set: bool,
}

impl TransformLayer {
    /// Encode the fixed part of the layer, returning the offset of its
    /// length field for the caller to patch once points are appended.
    pub fn encode(&self, w: &mut Writer) -> usize {
        w.u16(VECTOR);
        let length_at = w.len();
        w.u16(0);
        w.u8(self.system);
        self.timestamp.encode(w);
        let options = if self.full_point_set { FULL_POINT_SET_BIT } else { 0 };
        w.u8(options);
        w.u32(0); // reserved
        length_at
    }

    /// Decode the fixed part of the layer, returning it with its declared
    /// `length` (the caller then decodes `length`-bounded point entries).
    pub fn decode(r: &mut Reader) -> Result<(Self, u16)> {
        let vector = r.u16()?;
        if vector != VECTOR {
            return Err(Error::MalformedLayer("unexpected Transform Layer vector"));
        }
        let length = r.u16()?;
        let system = r.u8()?;
        let timestamp = Timestamp128::decode(r)?;
        let options = r.u8()?;
        let _reserved = r.u32()?;
        Ok((
            TransformLayer { system, timestamp, full_point_set: options & FULL_POINT_SET_BIT != 0 },
            length,
        ))
    }
}

/// Point sub-PDU: identifies a point and carries its module list (encoded
/// by the caller, a [`crate::wire::ModulePdu`] list).
#[derive(Clone, Debug)]
pub struct PointPdu {
    pub priority: u8,
    pub group: u16,
    pub point: u32,
    pub timestamp: u64,
    pub options: u8,
}

impl PointPdu {
    pub fn encode(&self, w: &mut Writer) -> usize {
        w.u16(POINT_VECTOR);
        let length_at = w.len();
        w.u16(0);
        w.u8(self.priority);
        w.u16(self.group);
        w.u32(self.point);
        w.u64(self.timestamp);
        w.u8(self.options);
        w.u32(0); // reserved
        length_at
    }

    pub fn decode(r: &mut Reader) -> Result<(Self, u16)> {
        let vector = r.u16()?;
        if vector != POINT_VECTOR {
            return Err(Error::MalformedLayer("unexpected Point sub-PDU vector"));
        }
        let length = r.u16()?;
        let priority = r.u8()?;
        let group = r.u16()?;
        let point = r.u32()?;
        let timestamp = r.u64()?;
        let options = r.u8()?;
        let _reserved = r.u32()?;
        Ok((PointPdu { priority, group, point, timestamp, options }, length))
    }
}
