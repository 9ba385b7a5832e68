// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-point storage, multi-producer arbitration, and reference-frame
//! chain resolution.

use crate::identifiers::{Address, Cid, Name};
use crate::wire::module::ROTATION_MODULO;
use crate::wire::StandardModule;
use std::collections::HashSet;
use std::time::Instant;

/// One module's last-reported value, with the 64-bit microsecond
/// timestamp carried by the Point sub-PDU that delivered it and the
/// wall-clock time it was received.
#[derive(Clone, Debug)]
pub struct ModuleSlot<T> {
    pub value: T,
    pub timestamp: u64,
    pub last_seen: Instant,
}

impl<T> ModuleSlot<T> {
    pub fn new(value: T, timestamp: u64) -> Self {
        Self { value, timestamp, last_seen: Instant::now() }
    }
}

/// All state a single component reports for a single point address.
///
/// `reference_frame` is not a wire module: the standard does not allocate
/// one a module number, so it is populated through the local API rather
/// than decoded from a Module sub-PDU.
#[derive(Clone, Debug, Default)]
pub struct PointDetails {
    pub name: Name,
    pub priority: u8,
    pub last_seen: Option<Instant>,
    pub is_expired: bool,
    pub position: Option<ModuleSlot<StandardModule>>,
    pub position_vel_acc: Option<ModuleSlot<StandardModule>>,
    pub rotation: Option<ModuleSlot<StandardModule>>,
    pub rotation_vel_acc: Option<ModuleSlot<StandardModule>>,
    pub orientation: Option<ModuleSlot<StandardModule>>,
    pub orientation_vel_acc: Option<ModuleSlot<StandardModule>>,
    pub reference_frame: Option<ModuleSlot<Address>>,
}

impl PointDetails {
    pub fn new(priority: u8) -> Self {
        Self { priority, ..Default::default() }
    }
}

/// Consumer-selectable override applied when more than one producer
/// reports a value for the same address.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ValuePreference {
    /// Default: priority, then recency, then lowest CID.
    WinningProducer,
    Newest,
    Largest,
    Smallest,
}

/// The result of a Consumer transform query: a resolved value plus its
/// provenance, matching the `{value, unit, timestamp, scale?, sourceCID,
/// priority}` shape of the query API surface.
#[derive(Copy, Clone, Debug)]
pub struct QueryResult<T> {
    pub value: T,
    /// The 64-bit microsecond timestamp carried by the Point sub-PDU that
    /// last delivered this value.
    pub timestamp: u64,
    /// The component that reported this value.
    pub source_cid: Cid,
    pub priority: u8,
    /// Position-only: `true` if the reporting producer encoded the value
    /// in micrometers rather than millimeters.
    pub micrometers: Option<bool>,
}

/// Select the winning producer for an address out of its reporting
/// components, using the standard total order: highest priority, then
/// most recent `last_seen`, then lowest CID (byte-wise).
pub fn winning_producer<'a, I>(candidates: I) -> Option<Cid>
where
    I: IntoIterator<Item = (&'a Cid, &'a PointDetails)>,
{
    candidates
        .into_iter()
        .max_by(|(cid_a, a), (cid_b, b)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.last_seen.cmp(&b.last_seen))
                .then_with(|| cid_b.as_bytes().cmp(&cid_a.as_bytes()))
        })
        .map(|(cid, _)| *cid)
}

/// Walk a point's reference-frame chain starting at `start`, following
/// each hop's `reference_frame` target. Stops when the next target is
/// missing, invalid, or would revisit an address already on the walk
/// (cycle break: the revisited hop is not added).
pub fn reference_frame_chain<F>(start: Address, lookup: F) -> Vec<PointDetails>
where
    F: Fn(Address) -> Option<PointDetails>,
{
    let mut visited = HashSet::new();
    let mut chain = Vec::new();
    let mut current = start;

    loop {
        if !visited.insert(current) {
            break;
        }
        let Some(details) = lookup(current) else { break };
        let next = details.reference_frame.as_ref().map(|slot| slot.value);
        chain.push(details);
        match next {
            Some(target) if target.is_valid() && !visited.contains(&target) => current = target,
            _ => break,
        }
    }

    chain
}

/// Sum the Position value along a reference-frame chain (absolute
/// transform). `None` if no hop in the chain reports a Position.
pub fn accumulate_position(chain: &[PointDetails]) -> Option<(i32, i32, i32)> {
    let mut acc = (0i64, 0i64, 0i64);
    let mut any = false;
    for details in chain {
        if let Some(StandardModule::Position { x, y, z, .. }) =
            details.position.as_ref().map(|s| &s.value)
        {
            acc.0 += i64::from(*x);
            acc.1 += i64::from(*y);
            acc.2 += i64::from(*z);
            any = true;
        }
    }
    any.then(|| (acc.0 as i32, acc.1 as i32, acc.2 as i32))
}

/// Sum velocity and acceleration along a reference-frame chain.
pub fn accumulate_position_vel_acc(chain: &[PointDetails]) -> Option<([i32; 3], [i32; 3])> {
    let mut velocity = [0i64; 3];
    let mut acceleration = [0i64; 3];
    let mut any = false;
    for details in chain {
        if let Some(StandardModule::PositionVelAcc { velocity: v, acceleration: a }) =
            details.position_vel_acc.as_ref().map(|s| &s.value)
        {
            for i in 0..3 {
                velocity[i] += i64::from(v[i]);
                acceleration[i] += i64::from(a[i]);
            }
            any = true;
        }
    }
    any.then(|| {
        (
            [velocity[0] as i32, velocity[1] as i32, velocity[2] as i32],
            [acceleration[0] as i32, acceleration[1] as i32, acceleration[2] as i32],
        )
    })
}

/// Sum Rotation along a reference-frame chain, modulo a full turn.
pub fn accumulate_rotation(chain: &[PointDetails]) -> Option<(u32, u32, u32)> {
    let modulo = u64::from(ROTATION_MODULO);
    let mut acc = (0u64, 0u64, 0u64);
    let mut any = false;
    for details in chain {
        if let Some(StandardModule::Rotation { x, y, z }) =
            details.rotation.as_ref().map(|s| &s.value)
        {
            acc.0 = (acc.0 + u64::from(*x)) % modulo;
            acc.1 = (acc.1 + u64::from(*y)) % modulo;
            acc.2 = (acc.2 + u64::from(*z)) % modulo;
            any = true;
        }
    }
    any.then(|| (acc.0 as u32, acc.1 as u32, acc.2 as u32))
}
