// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address container (C3): the `cid -> system -> group -> point` map and
//! the flat component map, with change notification over a bounded
//! channel.

use crate::config;
use crate::identifiers::{Address, Cid, Name};
use crate::point::{self, PointDetails};
use crate::wire::ModuleIdent;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::mpsc::{self, SyncSender};
use std::time::Instant;

/// Whether a component was last observed acting as a Producer or Consumer.
/// A component may hold both roles at once on the wire; this records
/// which PDU kinds it has actually sent.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ObservedRoles {
    pub producer: bool,
    pub consumer: bool,
}

/// A component known to this endpoint, keyed by CID.
#[derive(Clone, Debug)]
pub struct Component {
    pub ip: Option<IpAddr>,
    pub name: Name,
    pub roles: ObservedRoles,
    pub modules: HashSet<ModuleIdent>,
    pub last_seen: Instant,
}

/// Notifications the container emits as its state changes. Consumers of
/// the event stream read these from a bounded channel rather than
/// polling the container directly.
#[derive(Clone, Debug)]
pub enum Event {
    NewComponent(Cid),
    UpdatedComponent(Cid),
    NewPoint { cid: Cid, address: Address },
    UpdatedPoint { cid: Cid, address: Address },
    ExpiredPoint { cid: Cid, address: Address },
    RemovedPoint { cid: Cid, address: Address },
    RemovedGroup { cid: Cid, system: u8, group: u16 },
    RemovedSystem { cid: Cid, system: u8 },
}

type PointMap = HashMap<u8, HashMap<u16, HashMap<u32, PointDetails>>>;

/// The 4-level `cid -> system -> group -> point -> PointDetails` map, plus
/// the flat `cid -> Component` map, as described for the address
/// container.
pub struct AddressContainer {
    components: HashMap<Cid, Component>,
    points: HashMap<Cid, PointMap>,
    /// Per-`cid` set of system entries known to exist (created by
    /// advertisement or Transform reception; diffed away by a System-Ad
    /// response, see [`AddressContainer::apply_system_advertisement`]).
    systems: HashMap<Cid, HashSet<u8>>,
    events: SyncSender<Event>,
}

impl AddressContainer {
    /// Build a container whose change events are delivered on a bounded
    /// channel of the given capacity; the paired receiver is returned.
    pub fn new(event_capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::sync_channel(event_capacity);
        (
            Self {
                components: HashMap::new(),
                points: HashMap::new(),
                systems: HashMap::new(),
                events: tx,
            },
            rx,
        )
    }

    fn emit(&self, event: Event) {
        if self.events.try_send(event).is_err() {
            log::warn!("address container event channel full or disconnected, dropping event");
        }
    }

    /// Upsert a component's metadata. Emits `NewComponent` on first sight,
    /// `UpdatedComponent` when any tracked field actually changes.
    pub fn add_component(
        &mut self,
        cid: Cid,
        ip: Option<IpAddr>,
        name: Name,
        roles: ObservedRoles,
        modules: impl IntoIterator<Item = ModuleIdent>,
    ) {
        let modules: HashSet<ModuleIdent> = modules.into_iter().collect();
        match self.components.get_mut(&cid) {
            None => {
                self.components.insert(
                    cid,
                    Component { ip, name, roles, modules, last_seen: Instant::now() },
                );
                self.emit(Event::NewComponent(cid));
            }
            Some(existing) => {
                let changed = existing.ip != ip
                    || existing.name != name
                    || existing.roles != roles
                    || existing.modules != modules;
                existing.ip = ip;
                existing.name = name;
                existing.roles.producer |= roles.producer;
                existing.roles.consumer |= roles.consumer;
                existing.modules.extend(modules);
                existing.last_seen = Instant::now();
                if changed {
                    self.emit(Event::UpdatedComponent(cid));
                }
            }
        }
    }

    /// Record that `system` is known to exist for `cid`, created either by
    /// an Advertisement or by Transform reception.
    pub fn note_system(&mut self, cid: Cid, system: u8) {
        self.systems.entry(cid).or_default().insert(system);
    }

    /// Apply a System-Advertisement response's reported set of systems for
    /// `cid`: systems previously known for this `cid` but absent from
    /// `reported` are removed (subtree plus `RemovedSystem` event, see
    /// [`AddressContainer::remove_system`]); systems in `reported` are
    /// recorded as known.
    pub fn apply_system_advertisement(&mut self, cid: Cid, reported: &HashSet<u8>) {
        let previously_known = self.systems.get(&cid).cloned().unwrap_or_default();
        for system in previously_known.difference(reported) {
            self.remove_system(cid, *system);
        }
        let known = self.systems.entry(cid).or_default();
        known.retain(|s| reported.contains(s));
        known.extend(reported);
    }

    /// Create a point if missing (emits `NewPoint`), otherwise refresh its
    /// `last_seen` and priority (emits `UpdatedPoint` when priority moves).
    pub fn add_point(&mut self, cid: Cid, address: Address, priority: u8) {
        self.note_system(cid, address.system);
        let system_map = self.points.entry(cid).or_default();
        let group_map = system_map.entry(address.system).or_default();
        let point_map = group_map.entry(address.group).or_default();

        match point_map.get_mut(&address.point) {
            None => {
                let mut details = PointDetails::new(priority);
                details.last_seen = Some(Instant::now());
                point_map.insert(address.point, details);
                self.emit(Event::NewPoint { cid, address });
            }
            Some(details) => {
                let changed = details.priority != priority;
                details.priority = priority;
                details.last_seen = Some(Instant::now());
                details.is_expired = false;
                if changed {
                    self.emit(Event::UpdatedPoint { cid, address });
                }
            }
        }
    }

    pub fn point(&self, cid: Cid, address: Address) -> Option<&PointDetails> {
        self.points.get(&cid)?.get(&address.system)?.get(&address.group)?.get(&address.point)
    }

    pub fn point_mut(&mut self, cid: Cid, address: Address) -> Option<&mut PointDetails> {
        self.points
            .get_mut(&cid)?
            .get_mut(&address.system)?
            .get_mut(&address.group)?
            .get_mut(&address.point)
    }

    /// Every `(cid, PointDetails)` currently reporting `address`.
    pub fn reporters(&self, address: Address) -> Vec<(Cid, &PointDetails)> {
        self.points
            .iter()
            .filter_map(|(cid, systems)| {
                systems
                    .get(&address.system)?
                    .get(&address.group)?
                    .get(&address.point)
                    .map(|details| (*cid, details))
            })
            .collect()
    }

    /// Every known component, by CID.
    pub fn components(&self) -> impl Iterator<Item = (&Cid, &Component)> {
        self.components.iter()
    }

    /// The union of every known component's advertised module-interest
    /// list (used by a Producer to decide which modules are worth
    /// sending at all).
    pub fn union_module_interest(&self) -> HashSet<ModuleIdent> {
        self.components.values().flat_map(|c| c.modules.iter().copied()).collect()
    }

    /// The CID currently "winning" `address` under the standard
    /// arbitration order, or `None` if nobody reports it.
    pub fn winning_component(&self, address: Address) -> Option<Cid> {
        point::winning_producer(self.reporters(address))
    }

    /// Resolve a point's reference-frame chain against this container.
    pub fn reference_frame_chain(&self, cid: Cid, start: Address) -> Vec<PointDetails> {
        point::reference_frame_chain(start, |addr| self.point(cid, addr).cloned())
    }

    /// Remove an entire system subtree for a component, emitting
    /// `RemovedPoint`/`RemovedGroup` for every leaf and `RemovedSystem`
    /// for the system itself.
    pub fn remove_system(&mut self, cid: Cid, system: u8) {
        let known = self
            .systems
            .get_mut(&cid)
            .map(|set| set.remove(&system))
            .unwrap_or(false);

        let groups = self.points.get_mut(&cid).and_then(|systems| systems.remove(&system));
        if let Some(groups) = groups {
            for (group, points) in groups {
                for point in points.keys() {
                    self.emit(Event::RemovedPoint {
                        cid,
                        address: Address::new(system, group, *point),
                    });
                }
                self.emit(Event::RemovedGroup { cid, system, group });
            }
        }

        if known {
            self.emit(Event::RemovedSystem { cid, system });
        }
    }

    /// Flag points idle since `lastSeen + TRANSFORM_DATA_LOSS_TIMEOUT` as
    /// expired, and remove points idle since `lastSeen + 2 *
    /// TRANSFORM_DATA_LOSS_TIMEOUT` outright.
    pub fn sweep_expirations(&mut self, now: Instant) {
        let timeout = config::TRANSFORM_DATA_LOSS_TIMEOUT;
        let removal_timeout = timeout * 2;
        let mut removed = Vec::new();

        for (cid, systems) in self.points.iter_mut() {
            for (system, groups) in systems.iter_mut() {
                for (group, points) in groups.iter_mut() {
                    points.retain(|point, details| {
                        let Some(last_seen) = details.last_seen else { return true };
                        let idle = now.saturating_duration_since(last_seen);
                        if idle >= removal_timeout {
                            removed.push((*cid, Address::new(*system, *group, *point)));
                            false
                        } else {
                            if idle >= timeout && !details.is_expired {
                                details.is_expired = true;
                                removed.push((*cid, Address::new(*system, *group, *point)));
                            }
                            true
                        }
                    });
                }
            }
        }

        for (cid, address) in removed {
            let expired = self.point(cid, address).map(|d| d.is_expired).unwrap_or(true);
            if expired {
                self.emit(Event::ExpiredPoint { cid, address });
            } else {
                self.emit(Event::RemovedPoint { cid, address });
            }
        }
    }

    /// Drop module interest for components idle since `last_seen +
    /// ADVERTISEMENT_TIMEOUT`; the component entry itself is retained.
    pub fn sweep_component_module_timeouts(&mut self, now: Instant) {
        for component in self.components.values_mut() {
            if now.saturating_duration_since(component.last_seen) >= config::ADVERTISEMENT_TIMEOUT
                && !component.modules.is_empty()
            {
                component.modules.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(b: u8) -> Cid {
        Cid::from_bytes([b; 16])
    }

    #[test]
    fn add_component_emits_new_then_updated() {
        let (mut c, rx) = AddressContainer::new(8);
        c.add_component(cid(1), None, Name::default(), ObservedRoles::default(), []);
        c.add_component(
            cid(1),
            None,
            Name::from_str_truncated("changed"),
            ObservedRoles::default(),
            [],
        );
        assert!(matches!(rx.try_recv().unwrap(), Event::NewComponent(_)));
        assert!(matches!(rx.try_recv().unwrap(), Event::UpdatedComponent(_)));
    }

    #[test]
    fn add_point_creates_then_refreshes() {
        let (mut c, rx) = AddressContainer::new(8);
        let addr = Address::new(1, 1, 1);
        c.add_point(cid(1), addr, 100);
        c.add_point(cid(1), addr, 100);
        assert!(matches!(rx.try_recv().unwrap(), Event::NewPoint { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(c.point(cid(1), addr).unwrap().priority, 100);
    }

    #[test]
    fn remove_system_emits_leaf_then_system_events() {
        let (mut c, rx) = AddressContainer::new(8);
        let addr = Address::new(1, 1, 1);
        c.add_point(cid(1), addr, 100);
        let _ = rx.try_recv();
        c.remove_system(cid(1), 1);

        let mut saw_point = false;
        let mut saw_group = false;
        let mut saw_system = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::RemovedPoint { .. } => saw_point = true,
                Event::RemovedGroup { .. } => saw_group = true,
                Event::RemovedSystem { .. } => saw_system = true,
                _ => {}
            }
        }
        assert!(saw_point && saw_group && saw_system);
        assert!(c.point(cid(1), addr).is_none());
    }

    #[test]
    fn winning_component_picks_highest_priority() {
        let (mut c, _rx) = AddressContainer::new(8);
        let addr = Address::new(1, 1, 1);
        c.add_point(cid(1), addr, 50);
        c.add_point(cid(2), addr, 150);
        assert_eq!(c.winning_component(addr), Some(cid(2)));
    }

    #[test]
    fn apply_system_advertisement_removes_systems_no_longer_reported() {
        let (mut c, rx) = AddressContainer::new(16);
        let addr = Address::new(1, 1, 1);
        c.add_point(cid(1), addr, 100);
        let _ = rx.try_recv(); // NewPoint

        let reported: HashSet<u8> = [1, 5].into_iter().collect();
        c.apply_system_advertisement(cid(1), &reported);
        // System 1 still reported alongside newly-known system 5: no removal.
        assert!(c.point(cid(1), addr).is_some());

        let reported: HashSet<u8> = [5].into_iter().collect();
        c.apply_system_advertisement(cid(1), &reported);
        // System 1 dropped from the report: its subtree is removed.
        assert!(c.point(cid(1), addr).is_none());
        let mut saw_removed_system_1 = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::RemovedSystem { system: 1, .. } = event {
                saw_removed_system_1 = true;
            }
        }
        assert!(saw_removed_system_1);
    }

    #[test]
    fn apply_system_advertisement_tracks_system_with_no_points_yet() {
        let (mut c, rx) = AddressContainer::new(8);
        let reported: HashSet<u8> = [7].into_iter().collect();
        c.apply_system_advertisement(cid(1), &reported);
        assert!(rx.try_recv().is_err()); // nothing to remove yet

        c.apply_system_advertisement(cid(1), &HashSet::new());
        assert!(matches!(rx.try_recv().unwrap(), Event::RemovedSystem { system: 7, .. }));
    }
}
