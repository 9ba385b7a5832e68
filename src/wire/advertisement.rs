// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Advertisement Layer and its three inner layers (Module/Name/System).
//!
//! Unlike the Transform and Module sub-PDUs, every vector at this depth is
//! a single octet, not two.

use crate::error::{Error, Result};
use crate::identifiers::Name;
use crate::wire::module::ModuleIdent;
use crate::wire::{Reader, Writer};

/// Bit 7 of a Name/System-Advertisement's options byte: this datagram is a
/// response to a request, not a periodic/unsolicited advertisement.
const RESPONSE_BIT: u8 = 0b1000_0000;

/// Which inner layer an Advertisement Layer carries.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AdvertisementVector {
    Module,
    Name,
    System,
}

impl AdvertisementVector {
    pub fn to_wire(self) -> u8 {
        match self {
            AdvertisementVector::Module => 0x01,
            AdvertisementVector::Name => 0x02,
            AdvertisementVector::System => 0x03,
        }
    }

    pub fn from_wire(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(AdvertisementVector::Module),
            0x02 => Ok(AdvertisementVector::Name),
            0x03 => Ok(AdvertisementVector::System),
            _ => Err(Error::MalformedLayer("unrecognized Advertisement Layer vector")),
        }
    }
}

/// Outer Advertisement Layer: selects which of the three inner layers
/// follows. The inner layer's bytes are written/read by the caller.
#[derive(Clone, Debug)]
pub struct AdvertisementLayer {
    pub vector: AdvertisementVector,
}

impl AdvertisementLayer {
    pub fn encode(&self, w: &mut Writer) -> usize {
        w.u8(self.vector.to_wire());
        let length_at = w.len();
        w.u16(0);
        w.u32(0); // reserved
        length_at
    }

    pub fn decode(r: &mut Reader) -> Result<(Self, u16)> {
        let vector = AdvertisementVector::from_wire(r.u8()?)?;
        let length = r.u16()?;
        let _reserved = r.u32()?;
        Ok((AdvertisementLayer { vector }, length))
    }
}

/// Inner Module-Advertisement layer: lists every module a component can
/// send (Producer) or wishes to receive (Consumer request/response).
#[derive(Clone, Debug)]
pub struct ModuleAdvertisement;

impl ModuleAdvertisement {
    pub fn encode(w: &mut Writer, idents: &[ModuleIdent]) -> usize {
        w.u8(0x01);
        let length_at = w.len();
        w.u16(0);
        w.u32(0); // reserved
        for ident in idents {
            w.u16(ident.manufacturer_id);
            w.u16(ident.module_number);
        }
        length_at
    }

    pub fn decode(r: &mut Reader) -> Result<(Self, Vec<ModuleIdent>)> {
        let vector = r.u8()?;
        if vector != 0x01 {
            return Err(Error::MalformedLayer("unexpected Module-Advertisement vector"));
        }
        let length = r.u16()?;
        let _reserved = r.u32()?;
        // `length` counts everything after its own field: the 4 reserved
        // bytes just consumed, plus the ident list.
        let payload_len = usize::from(length)
            .checked_sub(4)
            .ok_or(Error::MalformedLayer("module-advertisement length shorter than its own header"))?;
        if payload_len % 4 != 0 {
            return Err(Error::MalformedLayer("module-advertisement list size not a multiple of 4"));
        }
        let mut idents = Vec::with_capacity(payload_len / 4);
        for _ in 0..payload_len / 4 {
            let manufacturer_id = r.u16()?;
            let module_number = r.u16()?;
            idents.push(ModuleIdent { manufacturer_id, module_number });
        }
        Ok((ModuleAdvertisement, idents))
    }
}

/// One entry in a Name-Advertisement's point list.
#[derive(Clone, Debug)]
pub struct PointDescription {
    pub system: u8,
    pub group: u16,
    pub point: u32,
    pub name: Name,
}

const POINT_DESCRIPTION_LEN: usize = 1 + 2 + 4 + 32;

/// Inner Name-Advertisement layer: requests or reports human-readable
/// names for one or more points.
#[derive(Clone, Debug)]
pub struct NameAdvertisement;

impl NameAdvertisement {
    pub fn encode(w: &mut Writer, response: bool, points: &[PointDescription]) -> usize {
        w.u8(0x01);
        let length_at = w.len();
        w.u16(0);
        w.u8(if response { RESPONSE_BIT } else { 0 });
        w.u32(0); // reserved
        for p in points {
            w.u8(p.system);
            w.u16(p.group);
            w.u32(p.point);
            w.bytes(&p.name.to_wire());
        }
        length_at
    }

    pub fn decode(r: &mut Reader) -> Result<(bool, Vec<PointDescription>)> {
        let vector = r.u8()?;
        if vector != 0x01 {
            return Err(Error::MalformedLayer("unexpected Name-Advertisement vector"));
        }
        let length = r.u16()?;
        let options = r.u8()?;
        let _reserved = r.u32()?;
        // `length` counts the options byte and reserved word just consumed
        // plus the descriptor list.
        let payload_len = usize::from(length)
            .checked_sub(5)
            .ok_or(Error::MalformedLayer("name-advertisement length shorter than its own header"))?;
        if payload_len % POINT_DESCRIPTION_LEN != 0 {
            return Err(Error::MalformedLayer("name-advertisement list size misaligned"));
        }
        let mut points = Vec::with_capacity(payload_len / POINT_DESCRIPTION_LEN);
        for _ in 0..payload_len / POINT_DESCRIPTION_LEN {
            let system = r.u8()?;
            let group = r.u16()?;
            let point = r.u32()?;
            let name = Name::from_wire(r.array32()?);
            points.push(PointDescription { system, group, point, name });
        }
        Ok((options & RESPONSE_BIT != 0, points))
    }
}

/// Inner System-Advertisement layer: requests or reports the set of
/// system numbers a component is aware of.
#[derive(Clone, Debug)]
pub struct SystemAdvertisement;

impl SystemAdvertisement {
    pub fn encode(w: &mut Writer, response: bool, systems: &[u8]) -> usize {
        w.u8(0x01);
        let length_at = w.len();
        w.u16(0);
        w.u8(if response { RESPONSE_BIT } else { 0 });
        w.u32(0); // reserved
        w.bytes(systems);
        length_at
    }

    pub fn decode(r: &mut Reader) -> Result<(bool, Vec<u8>)> {
        let vector = r.u8()?;
        if vector != 0x01 {
            return Err(Error::MalformedLayer("unexpected System-Advertisement vector"));
        }
        let length = r.u16()?;
        let options = r.u8()?;
        let _reserved = r.u32()?;
        let payload_len = usize::from(length)
            .checked_sub(5)
            .ok_or(Error::MalformedLayer("system-advertisement length shorter than its own header"))?;
        let systems = r.bytes(payload_len)?.to_vec();
        Ok((options & RESPONSE_BIT != 0, systems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_advertisement_round_trips() {
        let idents = vec![
            ModuleIdent { manufacturer_id: 0, module_number: 1 },
            ModuleIdent { manufacturer_id: 0, module_number: 3 },
        ];
        let mut w = Writer::new();
        let at = ModuleAdvertisement::encode(&mut w, &idents);
        w.finish_length(at);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let (_, decoded) = ModuleAdvertisement::decode(&mut r).unwrap();
        assert_eq!(decoded, idents);
    }

    #[test]
    fn name_advertisement_round_trips_empty_request() {
        let mut w = Writer::new();
        let at = NameAdvertisement::encode(&mut w, false, &[]);
        w.finish_length(at);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let (response, points) = NameAdvertisement::decode(&mut r).unwrap();
        assert!(!response);
        assert!(points.is_empty());
    }

    #[test]
    fn system_advertisement_round_trips_response() {
        let mut w = Writer::new();
        let at = SystemAdvertisement::encode(&mut w, true, &[1, 2, 3]);
        w.finish_length(at);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let (response, systems) = SystemAdvertisement::decode(&mut r).unwrap();
        assert!(response);
        assert_eq!(systems, vec![1, 2, 3]);
    }

    #[test]
    fn advertisement_layer_round_trips() {
        let layer = AdvertisementLayer { vector: AdvertisementVector::System };
        let mut w = Writer::new();
        let at = layer.encode(&mut w);
        w.patch_u16(at, 7);
        let buf = w.into_vec();

        let mut r = Reader::new(&buf);
        let (decoded, length) = AdvertisementLayer::decode(&mut r).unwrap();
        assert_eq!(decoded.vector, AdvertisementVector::System);
        assert_eq!(length, 7);
    }
}
