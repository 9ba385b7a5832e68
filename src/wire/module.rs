// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module sub-PDU and the standard (manufacturer `0x0000`) module payloads.

use crate::config;
use crate::error::{Error, Result};
use crate::wire::{Reader, Writer};

/// Module sub-PDU header fields sufficient to identify a module without
/// decoding its payload.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ModuleIdent {
    pub manufacturer_id: u16,
    pub module_number: u16,
}

/// A still-opaque module sub-PDU: manufacturer/module identifier plus raw
/// payload bytes. Standard payloads are interpreted via [`StandardModule`].
#[derive(Clone, Debug)]
pub struct ModulePdu {
    pub manufacturer_id: u16,
    pub module_number: u16,
    pub payload: Vec<u8>,
}

impl ModulePdu {
    pub fn ident(&self) -> ModuleIdent {
        ModuleIdent { manufacturer_id: self.manufacturer_id, module_number: self.module_number }
    }

    pub fn encode(&self, w: &mut Writer) {
        let length = 4 + self.payload.len();
        w.u16(length as u16);
        w.u16(self.manufacturer_id);
        w.u16(self.module_number);
        w.bytes(&self.payload);
    }

    pub fn decode(r: &mut Reader) -> Result<Self> {
        let length = usize::from(r.u16()?);
        if length < 4 {
            return Err(Error::MalformedLayer("module length shorter than its own header"));
        }
        let manufacturer_id = r.u16()?;
        let module_number = r.u16()?;
        let payload = r.bytes(length - 4)?.to_vec();
        Ok(Self { manufacturer_id, module_number, payload })
    }
}

/// Rotation values are micro-degrees, wrapping at a full turn.
pub const ROTATION_MODULO: u32 = 360_000_000;
/// RotationVelAcc values are bounded, not modular.
const ROTATION_RATE_BOUND: i32 = 360_000_000;

/// A decoded standard (manufacturer `0x0000`) module payload.
///
/// `Orientation`/`OrientationVelAcc` are present in the module-number
/// table but undocumented by the ratified standard; they round-trip as
/// opaque bytes and are never interpreted.
#[derive(Clone, Debug, PartialEq)]
pub enum StandardModule {
    Position { micrometers: bool, x: i32, y: i32, z: i32 },
    PositionVelAcc { velocity: [i32; 3], acceleration: [i32; 3] },
    Rotation { x: u32, y: u32, z: u32 },
    RotationVelAcc { velocity: [i32; 3], acceleration: [i32; 3] },
    Orientation(Vec<u8>),
    OrientationVelAcc(Vec<u8>),
}

impl StandardModule {
    pub fn module_number(&self) -> u16 {
        match self {
            StandardModule::Position { .. } => 0x0001,
            StandardModule::PositionVelAcc { .. } => 0x0002,
            StandardModule::Rotation { .. } => 0x0003,
            StandardModule::RotationVelAcc { .. } => 0x0004,
            StandardModule::Orientation(_) => 0x0005,
            StandardModule::OrientationVelAcc(_) => 0x0006,
        }
    }

    pub fn encode_payload(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            StandardModule::Position { micrometers, x, y, z } => {
                w.u8(if *micrometers { 0b1000_0000 } else { 0 });
                w.i32(*x);
                w.i32(*y);
                w.i32(*z);
            }
            StandardModule::PositionVelAcc { velocity, acceleration } => {
                for v in velocity {
                    w.i32(*v);
                }
                for a in acceleration {
                    w.i32(*a);
                }
            }
            StandardModule::Rotation { x, y, z } => {
                w.u32(*x);
                w.u32(*y);
                w.u32(*z);
            }
            StandardModule::RotationVelAcc { velocity, acceleration } => {
                for v in velocity {
                    w.i32(*v);
                }
                for a in acceleration {
                    w.i32(*a);
                }
            }
            StandardModule::Orientation(bytes) | StandardModule::OrientationVelAcc(bytes) => {
                w.bytes(bytes);
            }
        }
        w.into_vec()
    }

    pub fn to_module_pdu(&self) -> ModulePdu {
        ModulePdu {
            manufacturer_id: config::ESTA_MANUFACTURER_ID,
            module_number: self.module_number(),
            payload: self.encode_payload(),
        }
    }

    /// Interpret a module sub-PDU's payload, given its module number.
    /// Unknown standard module numbers yield [`Error::UnknownModule`]; the
    /// caller treats that as "skip this module, keep the rest of the frame".
    pub fn decode(module_number: u16, payload: &[u8]) -> Result<Self> {
        let mut r = Reader::new(payload);
        Ok(match module_number {
            0x0001 => {
                let options = r.u8()?;
                StandardModule::Position {
                    micrometers: options & 0b1000_0000 != 0,
                    x: r.i32()?,
                    y: r.i32()?,
                    z: r.i32()?,
                }
            }
            0x0002 => StandardModule::PositionVelAcc {
                velocity: [r.i32()?, r.i32()?, r.i32()?],
                acceleration: [r.i32()?, r.i32()?, r.i32()?],
            },
            0x0003 => {
                let (x, y, z) = (r.u32()?, r.u32()?, r.u32()?);
                for v in [x, y, z] {
                    if v >= ROTATION_MODULO {
                        return Err(Error::OutOfRange("rotation"));
                    }
                }
                StandardModule::Rotation { x, y, z }
            }
            0x0004 => {
                let velocity = [r.i32()?, r.i32()?, r.i32()?];
                let acceleration = [r.i32()?, r.i32()?, r.i32()?];
                for v in velocity.iter().chain(acceleration.iter()) {
                    if v.unsigned_abs() > ROTATION_RATE_BOUND as u32 {
                        return Err(Error::OutOfRange("rotation rate"));
                    }
                }
                StandardModule::RotationVelAcc { velocity, acceleration }
            }
            0x0005 => StandardModule::Orientation(payload.to_vec()),
            0x0006 => StandardModule::OrientationVelAcc(payload.to_vec()),
            other => {
                return Err(Error::UnknownModule {
                    manufacturer_id: config::ESTA_MANUFACTURER_ID,
                    module_number: other,
                })
            }
        })
    }
}
