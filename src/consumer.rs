// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer engine (C6): monitors a set of systems, advertises its
//! interest in standard modules, and reassembles/applies inbound
//! Transform and Advertisement traffic.

use crate::address::{AddressContainer, Component, Event as AddressEvent, ObservedRoles};
use crate::config;
use crate::error::{Error, Result};
use crate::folio::{FolioKey, FolioReassembler, SequenceTracker};
use crate::identifiers::{Address, Cid, Name};
use crate::net::Network;
use crate::point::{self, ModuleSlot, PointDetails, QueryResult, ValuePreference};
use crate::timing::Cadence;
use crate::wire::module::ModuleIdent;
use crate::wire::{
    AdvertisementLayer, AdvertisementVector, Header, MessageVector, ModuleAdvertisement,
    NameAdvertisement, Reader, StandardModule, SystemAdvertisement, TransformLayer, Writer,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

/// A Consumer's view of the network: which systems it monitors, its own
/// advertised module interest, and the points/components it has learned
/// about from Producer traffic.
pub struct Consumer<N: Network> {
    cid: Cid,
    name: Name,
    net: N,
    monitored_systems: HashSet<u8>,
    local_modules: HashSet<ModuleIdent>,
    components: AddressContainer,
    reassembler: FolioReassembler,
    sequences: SequenceTracker,
    advertisement_cadence: Cadence,
    ad_folio: u32,
    ad_sequence: u16,
}

impl<N: Network> Consumer<N> {
    pub fn new(
        cid: Cid,
        name: Name,
        net: N,
        local_modules: impl IntoIterator<Item = ModuleIdent>,
    ) -> (Self, std::sync::mpsc::Receiver<AddressEvent>) {
        let (components, events_rx) = AddressContainer::new(256);
        let consumer = Self {
            cid,
            name,
            net,
            monitored_systems: HashSet::new(),
            local_modules: local_modules.into_iter().collect(),
            components,
            reassembler: FolioReassembler::new(),
            sequences: SequenceTracker::new(),
            advertisement_cadence: Cadence::new(config::ADVERTISEMENT_TIMING),
            ad_folio: 0,
            ad_sequence: 0,
        };
        (consumer, events_rx)
    }

    /// Start monitoring `system`: joins its Transform multicast group.
    pub fn monitor_system(&mut self, system: u8) -> Result<()> {
        if self.monitored_systems.insert(system) {
            self.net.join_multicast(config::transform_multicast_v4(system).into())?;
        }
        Ok(())
    }

    /// Stop monitoring `system`: leaves its Transform multicast group.
    pub fn unmonitor_system(&mut self, system: u8) -> Result<()> {
        if self.monitored_systems.remove(&system) {
            self.net.leave_multicast(config::transform_multicast_v4(system).into())?;
        }
        Ok(())
    }

    pub fn join_advertisement_groups(&self) -> Result<()> {
        self.net.join_multicast(config::ADVERTISEMENT_IPV4.into())
    }

    /// The component known under `cid`, if any.
    pub fn component(&self, cid: Cid) -> Option<&Component> {
        self.components.components().find(|(c, _)| **c == cid).map(|(_, c)| c)
    }

    /// Every component known to this Consumer, by CID.
    pub fn components(&self) -> impl Iterator<Item = (&Cid, &Component)> {
        self.components.components()
    }

    /// A specific component's raw reported state for `address`, with no
    /// arbitration applied.
    pub fn point(&self, cid: Cid, address: Address) -> Option<&PointDetails> {
        self.components.point(cid, address)
    }

    /// The CID currently "winning" `address` under the standard
    /// arbitration order (highest priority, then most recent, then lowest
    /// CID), or `None` if no component reports it.
    pub fn winning_component(&self, address: Address) -> Option<Cid> {
        self.components.winning_component(address)
    }

    /// Resolve which component's report for `address` a query should use:
    /// an explicit `cid` override, or the result of `preference` applied
    /// to every reporting component (`magnitude` extracts the scalar used
    /// to compare `Largest`/`Smallest`; `None` excludes a reporter missing
    /// the relevant module from that comparison).
    fn select_source(
        &self,
        cid: Option<Cid>,
        address: Address,
        preference: ValuePreference,
        magnitude: impl Fn(&PointDetails) -> Option<i64>,
    ) -> Option<Cid> {
        if let Some(cid) = cid {
            return Some(cid);
        }
        let reporters = self.components.reporters(address);
        match preference {
            ValuePreference::WinningProducer => {
                point::winning_producer(reporters.iter().map(|(c, d)| (c, *d)))
            }
            ValuePreference::Newest => {
                reporters.iter().max_by_key(|(_, d)| d.last_seen).map(|(c, _)| *c)
            }
            ValuePreference::Largest => reporters
                .iter()
                .filter_map(|(c, d)| magnitude(d).map(|m| (m, *c)))
                .max_by_key(|(m, _)| *m)
                .map(|(_, c)| c),
            ValuePreference::Smallest => reporters
                .iter()
                .filter_map(|(c, d)| magnitude(d).map(|m| (m, *c)))
                .min_by_key(|(m, _)| *m)
                .map(|(_, c)| c),
        }
    }

    /// Query a point's Position. When `respect_relative` is set, walks the
    /// reference-frame chain and returns the absolute accumulation instead
    /// of the single hop's raw value; the returned provenance (timestamp,
    /// source, priority) is always the queried point's own, not the chain
    /// tail's.
    pub fn get_position(
        &self,
        cid: Option<Cid>,
        address: Address,
        respect_relative: bool,
        preference: ValuePreference,
    ) -> Option<QueryResult<(i32, i32, i32)>> {
        let magnitude = |d: &PointDetails| {
            d.position.as_ref().map(|s| match &s.value {
                StandardModule::Position { x, y, z, .. } => {
                    i64::from(*x).abs() + i64::from(*y).abs() + i64::from(*z).abs()
                }
                _ => 0,
            })
        };
        let source = self.select_source(cid, address, preference, magnitude)?;
        let details = self.components.point(source, address)?;
        let slot = details.position.as_ref()?;
        let StandardModule::Position { micrometers, x, y, z } = &slot.value else { return None };

        let value = if respect_relative {
            let chain = self.components.reference_frame_chain(source, address);
            point::accumulate_position(&chain)?
        } else {
            (*x, *y, *z)
        };

        Some(QueryResult {
            value,
            timestamp: slot.timestamp,
            source_cid: source,
            priority: details.priority,
            micrometers: Some(*micrometers),
        })
    }

    /// Query a point's velocity and acceleration (the `PositionVelAcc`
    /// module), with the same reference-frame-chain semantics as
    /// [`Consumer::get_position`].
    pub fn get_position_vel_acc(
        &self,
        cid: Option<Cid>,
        address: Address,
        respect_relative: bool,
        preference: ValuePreference,
    ) -> Option<QueryResult<([i32; 3], [i32; 3])>> {
        let magnitude = |d: &PointDetails| {
            d.position_vel_acc.as_ref().map(|s| match &s.value {
                StandardModule::PositionVelAcc { velocity, .. } => {
                    velocity.iter().map(|v| i64::from(*v).abs()).sum()
                }
                _ => 0,
            })
        };
        let source = self.select_source(cid, address, preference, magnitude)?;
        let details = self.components.point(source, address)?;
        let slot = details.position_vel_acc.as_ref()?;

        let value = if respect_relative {
            let chain = self.components.reference_frame_chain(source, address);
            point::accumulate_position_vel_acc(&chain)?
        } else {
            let StandardModule::PositionVelAcc { velocity, acceleration } = &slot.value else {
                return None;
            };
            (*velocity, *acceleration)
        };

        Some(QueryResult {
            value,
            timestamp: slot.timestamp,
            source_cid: source,
            priority: details.priority,
            micrometers: None,
        })
    }

    /// Query a point's Rotation, accumulated modulo a full turn along the
    /// reference-frame chain when `respect_relative` is set.
    pub fn get_rotation(
        &self,
        cid: Option<Cid>,
        address: Address,
        respect_relative: bool,
        preference: ValuePreference,
    ) -> Option<QueryResult<(u32, u32, u32)>> {
        let magnitude = |d: &PointDetails| {
            d.rotation.as_ref().map(|s| match &s.value {
                StandardModule::Rotation { x, y, z } => {
                    i64::from(*x) + i64::from(*y) + i64::from(*z)
                }
                _ => 0,
            })
        };
        let source = self.select_source(cid, address, preference, magnitude)?;
        let details = self.components.point(source, address)?;
        let slot = details.rotation.as_ref()?;

        let value = if respect_relative {
            let chain = self.components.reference_frame_chain(source, address);
            point::accumulate_rotation(&chain)?
        } else {
            let StandardModule::Rotation { x, y, z } = &slot.value else { return None };
            (*x, *y, *z)
        };

        Some(QueryResult {
            value,
            timestamp: slot.timestamp,
            source_cid: source,
            priority: details.priority,
            micrometers: None,
        })
    }

    /// Drive the periodic Module-Ad cadence; call once per tick.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if self.advertisement_cadence.poll(now) {
            self.send_module_advertisement()?;
        }
        Ok(())
    }

    pub fn send_module_advertisement(&mut self) -> Result<()> {
        let idents: Vec<ModuleIdent> = self.local_modules.iter().copied().collect();
        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Advertisement,
            cid: self.cid,
            sequence: self.next_ad_sequence(),
            folio: self.next_ad_folio(),
            page: 0,
            last_page: 0,
            options: 0,
            component_name: self.name,
        };
        let lengths = header.encode(&mut w);
        let outer = AdvertisementLayer { vector: AdvertisementVector::Module };
        let outer_at = outer.encode(&mut w);
        let inner_at = ModuleAdvertisement::encode(&mut w, &idents);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);

        let group = SocketAddr::new(config::ADVERTISEMENT_IPV4.into(), config::PORT);
        self.net.send_to(&w.into_vec(), group)
    }

    /// Solicit fresh Name/System advertisements from every Producer.
    pub fn request_name_and_system_advertisements(&mut self) -> Result<()> {
        let group = SocketAddr::new(config::ADVERTISEMENT_IPV4.into(), config::PORT);

        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Advertisement,
            cid: self.cid,
            sequence: self.next_ad_sequence(),
            folio: self.next_ad_folio(),
            page: 0,
            last_page: 0,
            options: 0,
            component_name: self.name,
        };
        let lengths = header.encode(&mut w);
        let outer = AdvertisementLayer { vector: AdvertisementVector::Name };
        let outer_at = outer.encode(&mut w);
        let inner_at = NameAdvertisement::encode(&mut w, false, &[]);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);
        self.net.send_to(&w.into_vec(), group)?;

        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Advertisement,
            cid: self.cid,
            sequence: self.next_ad_sequence(),
            folio: self.next_ad_folio(),
            page: 0,
            last_page: 0,
            options: 0,
            component_name: self.name,
        };
        let lengths = header.encode(&mut w);
        let outer = AdvertisementLayer { vector: AdvertisementVector::System };
        let outer_at = outer.encode(&mut w);
        let inner_at = SystemAdvertisement::encode(&mut w, false, &[]);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);
        self.net.send_to(&w.into_vec(), group)
    }

    fn next_ad_folio(&mut self) -> u32 {
        self.ad_folio = self.ad_folio.wrapping_add(1);
        self.ad_folio
    }

    fn next_ad_sequence(&mut self) -> u16 {
        self.ad_sequence = self.ad_sequence.wrapping_add(1);
        self.ad_sequence
    }

    /// Feed one received datagram through folio reassembly and, once a
    /// folio is complete, decode and apply it.
    pub fn receive_datagram(&mut self, from: SocketAddr, datagram: Vec<u8>) -> Result<()> {
        let mut r = Reader::new(&datagram);
        let (header, length) = Header::decode(&mut r)?;
        Header::validate_length(length, r.remaining())?;

        let key = FolioKey {
            cid: header.cid,
            vector: header.vector.to_wire(),
            system: None,
        };
        self.sequences.accept(key, header.sequence)?;
        let pages = self.reassembler.accept(key, header.folio, header.page, header.last_page, datagram)?;
        let Some(pages) = pages else { return Ok(()) };

        match header.vector {
            MessageVector::Transform => {
                for page in &pages {
                    self.apply_transform_page(from, &header, page)?;
                }
            }
            MessageVector::Advertisement => {
                for page in &pages {
                    self.apply_advertisement_page(from, &header, page)?;
                }
            }
        }
        Ok(())
    }

    fn apply_transform_page(&mut self, from: SocketAddr, header: &Header, page: &[u8]) -> Result<()> {
        let mut r = Reader::new(page);
        // Skip the fixed header fields already consumed by the caller;
        // `page` here is the full datagram this page carried.
        let (_, _) = Header::decode(&mut r)?;
        let (layer, _length) = TransformLayer::decode(&mut r)?;

        self.components.add_component(
            header.cid,
            Some(from.ip()),
            header.component_name,
            ObservedRoles { producer: true, consumer: false },
            [],
        );

        const POINT_FIXED_TAIL: usize = 1 + 2 + 4 + 8 + 1 + 4;

        while r.remaining() > 0 {
            let (point, point_length) = crate::wire::PointPdu::decode(&mut r)?;
            let module_bytes_len = usize::from(point_length)
                .checked_sub(POINT_FIXED_TAIL)
                .ok_or(Error::MalformedLayer("point length shorter than its own header"))?;
            let module_bytes = r.bytes(module_bytes_len)?;

            let address = Address::new(layer.system, point.group, point.point);
            self.components.add_point(header.cid, address, point.priority);

            let mut mr = Reader::new(module_bytes);
            while mr.remaining() > 0 {
                let module = crate::wire::ModulePdu::decode(&mut mr)?;
                match StandardModule::decode(module.module_number, &module.payload) {
                    Ok(value) => self.apply_module(header.cid, address, value, point.timestamp),
                    Err(Error::UnknownModule { manufacturer_id, module_number }) => {
                        log::debug!(
                            "skipping unknown module {:#06x}/{:#06x} on {:?}",
                            manufacturer_id, module_number, address
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn apply_module(&mut self, cid: Cid, address: Address, module: StandardModule, timestamp: u64) {
        let Some(details) = self.components.point_mut(cid, address) else { return };
        let slot = Some(ModuleSlot::new(module.clone(), timestamp));
        match module {
            StandardModule::Position { .. } => details.position = slot,
            StandardModule::PositionVelAcc { .. } => details.position_vel_acc = slot,
            StandardModule::Rotation { .. } => details.rotation = slot,
            StandardModule::RotationVelAcc { .. } => details.rotation_vel_acc = slot,
            StandardModule::Orientation(_) => details.orientation = slot,
            StandardModule::OrientationVelAcc(_) => details.orientation_vel_acc = slot,
        }
    }

    fn apply_advertisement_page(&mut self, from: SocketAddr, header: &Header, page: &[u8]) -> Result<()> {
        let mut r = Reader::new(page);
        let (_, _) = Header::decode(&mut r)?;
        let (layer, _length) = AdvertisementLayer::decode(&mut r)?;

        match layer.vector {
            AdvertisementVector::Module => {
                let (_, idents) = ModuleAdvertisement::decode(&mut r)?;
                self.components.add_component(
                    header.cid,
                    Some(from.ip()),
                    header.component_name,
                    ObservedRoles { producer: true, consumer: false },
                    idents,
                );
            }
            AdvertisementVector::Name => {
                let (response, points) = NameAdvertisement::decode(&mut r)?;
                if response {
                    for p in points {
                        let address = Address::new(p.system, p.group, p.point);
                        self.components.add_point(header.cid, address, config::DEFAULT_PRIORITY);
                        if let Some(details) = self.components.point_mut(header.cid, address) {
                            details.name = p.name;
                        }
                    }
                }
            }
            AdvertisementVector::System => {
                let (response, systems) = SystemAdvertisement::decode(&mut r)?;
                if response {
                    let reported: HashSet<u8> = systems.into_iter().collect();
                    self.components.apply_system_advertisement(header.cid, &reported);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::fake::FakeNetwork;

    #[test]
    fn monitor_system_joins_multicast_once() {
        let net = FakeNetwork::new("127.0.0.1:7100".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([1; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(5).unwrap();
        assert!(consumer.monitored_systems.contains(&5));
    }

    #[test]
    fn send_module_advertisement_does_not_error() {
        let net = FakeNetwork::new("127.0.0.1:7101".parse().unwrap());
        let (mut consumer, _rx) = Consumer::new(
            Cid::from_bytes([2; 16]),
            Name::from_str_truncated("c"),
            net,
            [ModuleIdent { manufacturer_id: 0, module_number: 1 }],
        );
        consumer.send_module_advertisement().unwrap();
    }

    fn module_advertisement_datagram(cid: Cid, idents: &[ModuleIdent]) -> Vec<u8> {
        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Advertisement,
            cid,
            sequence: 1,
            folio: 1,
            page: 0,
            last_page: 0,
            options: 0,
            component_name: Name::from_str_truncated("producer"),
        };
        let lengths = header.encode(&mut w);
        let outer = AdvertisementLayer { vector: AdvertisementVector::Module };
        let outer_at = outer.encode(&mut w);
        let inner_at = ModuleAdvertisement::encode(&mut w, idents);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);
        w.into_vec()
    }

    #[test]
    fn receive_datagram_decodes_module_advertisement_from_producer() {
        let net = FakeNetwork::new("127.0.0.1:7104".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([3; 16]), Name::from_str_truncated("c"), net, []);

        let producer_cid = Cid::from_bytes([4; 16]);
        let idents = [
            ModuleIdent { manufacturer_id: 0, module_number: 1 },
            ModuleIdent { manufacturer_id: 0, module_number: 3 },
        ];
        let datagram = module_advertisement_datagram(producer_cid, &idents);
        consumer.receive_datagram("127.0.0.1:9002".parse().unwrap(), datagram).unwrap();

        let component = consumer.component(producer_cid).unwrap();
        assert!(component.roles.producer);
        assert_eq!(component.modules.len(), 2);
        assert!(component.modules.contains(&idents[0]));
        assert!(component.modules.contains(&idents[1]));
    }

    fn transform_datagram(
        cid: Cid,
        system: u8,
        group: u16,
        point: u32,
        position: StandardModule,
    ) -> Vec<u8> {
        transform_datagram_seq(cid, 1, system, group, point, position)
    }

    fn transform_datagram_seq(
        cid: Cid,
        sequence: u16,
        system: u8,
        group: u16,
        point: u32,
        position: StandardModule,
    ) -> Vec<u8> {
        use crate::wire::{PointPdu, Timestamp128, TransformLayer};

        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Transform,
            cid,
            sequence,
            folio: 1,
            page: 0,
            last_page: 0,
            options: 0,
            component_name: Name::from_str_truncated("producer"),
        };
        let lengths = header.encode(&mut w);
        let layer =
            TransformLayer { system, timestamp: Timestamp128::from_micros(1), full_point_set: true };
        let layer_at = layer.encode(&mut w);
        let point_pdu = PointPdu { priority: 100, group, point, timestamp: 42, options: 0 };
        let point_at = point_pdu.encode(&mut w);
        position.to_module_pdu().encode(&mut w);
        w.finish_length(point_at);
        w.finish_length(layer_at);
        lengths.finish(&mut w);
        w.into_vec()
    }

    #[test]
    fn get_position_returns_winning_producer_value() {
        let net = FakeNetwork::new("127.0.0.1:7102".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let low_priority_cid = Cid::from_bytes([1; 16]);
        let high_priority_cid = Cid::from_bytes([2; 16]);
        let address = Address::new(1, 1, 1);

        let datagram = transform_datagram(
            low_priority_cid,
            1,
            1,
            1,
            StandardModule::Position { micrometers: false, x: 10, y: 20, z: 30 },
        );
        consumer.receive_datagram("127.0.0.1:9000".parse().unwrap(), datagram).unwrap();
        // Override the default priority (100) assigned by add_point to make
        // the ordering between the two producers deterministic.
        consumer.components.point_mut(low_priority_cid, address).unwrap().priority = 50;

        let datagram = transform_datagram(
            high_priority_cid,
            1,
            1,
            1,
            StandardModule::Position { micrometers: false, x: 100, y: 200, z: 300 },
        );
        consumer.receive_datagram("127.0.0.1:9001".parse().unwrap(), datagram).unwrap();
        consumer.components.point_mut(high_priority_cid, address).unwrap().priority = 150;

        let result = consumer
            .get_position(None, address, false, ValuePreference::WinningProducer)
            .unwrap();
        assert_eq!(result.source_cid, high_priority_cid);
        assert_eq!(result.value, (100, 200, 300));
        assert_eq!(result.priority, 150);
    }

    #[test]
    fn get_position_explicit_cid_bypasses_arbitration() {
        let net = FakeNetwork::new("127.0.0.1:7103".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let a = Cid::from_bytes([1; 16]);
        let b = Cid::from_bytes([2; 16]);
        let address = Address::new(1, 1, 1);

        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(a, 1, 1, 1, StandardModule::Position { micrometers: false, x: 1, y: 1, z: 1 }),
            )
            .unwrap();
        consumer
            .receive_datagram(
                "127.0.0.1:9001".parse().unwrap(),
                transform_datagram(b, 1, 1, 1, StandardModule::Position { micrometers: false, x: 9, y: 9, z: 9 }),
            )
            .unwrap();

        let result =
            consumer.get_position(Some(a), address, false, ValuePreference::WinningProducer).unwrap();
        assert_eq!(result.source_cid, a);
        assert_eq!(result.value, (1, 1, 1));
    }

    #[test]
    fn get_position_respect_relative_walks_reference_frame_chain() {
        let net = FakeNetwork::new("127.0.0.1:7105".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let producer_cid = Cid::from_bytes([1; 16]);
        let near = Address::new(1, 1, 1);
        let far = Address::new(1, 1, 2);

        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram_seq(
                    producer_cid,
                    1,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 10, y: 0, z: 0 },
                ),
            )
            .unwrap();
        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram_seq(
                    producer_cid,
                    2,
                    1,
                    1,
                    2,
                    StandardModule::Position { micrometers: false, x: 5, y: 0, z: 0 },
                ),
            )
            .unwrap();
        consumer.components.point_mut(producer_cid, near).unwrap().reference_frame =
            Some(point::ModuleSlot::new(far, 0));

        let result = consumer
            .get_position(Some(producer_cid), near, true, ValuePreference::WinningProducer)
            .unwrap();
        assert_eq!(result.value, (15, 0, 0));
        // Provenance reflects the queried hop, not the chain tail.
        assert_eq!(result.source_cid, producer_cid);
    }

    #[test]
    fn get_position_vel_acc_returns_reported_value() {
        let net = FakeNetwork::new("127.0.0.1:7106".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let producer_cid = Cid::from_bytes([1; 16]);
        let address = Address::new(1, 1, 1);
        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(
                    producer_cid,
                    1,
                    1,
                    1,
                    StandardModule::PositionVelAcc {
                        velocity: [1, 2, 3],
                        acceleration: [4, 5, 6],
                    },
                ),
            )
            .unwrap();

        let result = consumer
            .get_position_vel_acc(None, address, false, ValuePreference::WinningProducer)
            .unwrap();
        assert_eq!(result.value, ([1, 2, 3], [4, 5, 6]));
        assert_eq!(result.source_cid, producer_cid);
    }

    #[test]
    fn get_rotation_returns_reported_value() {
        let net = FakeNetwork::new("127.0.0.1:7107".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let producer_cid = Cid::from_bytes([1; 16]);
        let address = Address::new(1, 1, 1);
        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(
                    producer_cid,
                    1,
                    1,
                    1,
                    StandardModule::Rotation { x: 1_000, y: 2_000, z: 3_000 },
                ),
            )
            .unwrap();

        let result = consumer
            .get_rotation(None, address, false, ValuePreference::WinningProducer)
            .unwrap();
        assert_eq!(result.value, (1_000, 2_000, 3_000));
        assert_eq!(result.source_cid, producer_cid);
    }

    #[test]
    fn get_position_largest_and_smallest_preference_select_by_magnitude() {
        let net = FakeNetwork::new("127.0.0.1:7108".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let small_cid = Cid::from_bytes([1; 16]);
        let large_cid = Cid::from_bytes([2; 16]);
        let address = Address::new(1, 1, 1);

        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(
                    small_cid,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 1, y: 1, z: 1 },
                ),
            )
            .unwrap();
        consumer
            .receive_datagram(
                "127.0.0.1:9001".parse().unwrap(),
                transform_datagram(
                    large_cid,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 100, y: 100, z: 100 },
                ),
            )
            .unwrap();

        let largest =
            consumer.get_position(None, address, false, ValuePreference::Largest).unwrap();
        assert_eq!(largest.source_cid, large_cid);

        let smallest =
            consumer.get_position(None, address, false, ValuePreference::Smallest).unwrap();
        assert_eq!(smallest.source_cid, small_cid);
    }

    fn system_advertisement_datagram(cid: Cid, systems: &[u8]) -> Vec<u8> {
        let mut w = Writer::new();
        let header = Header {
            vector: MessageVector::Advertisement,
            cid,
            sequence: 1,
            folio: 1,
            page: 0,
            last_page: 0,
            options: 0,
            component_name: Name::from_str_truncated("producer"),
        };
        let lengths = header.encode(&mut w);
        let outer = AdvertisementLayer { vector: AdvertisementVector::System };
        let outer_at = outer.encode(&mut w);
        let inner_at = SystemAdvertisement::encode(&mut w, true, systems);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);
        w.into_vec()
    }

    #[test]
    fn system_advertisement_response_drops_systems_no_longer_reported() {
        let net = FakeNetwork::new("127.0.0.1:7110".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);

        let producer_cid = Cid::from_bytes([1; 16]);
        let address = Address::new(1, 1, 1);
        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(
                    producer_cid,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 1, y: 1, z: 1 },
                ),
            )
            .unwrap();
        assert!(consumer.point(producer_cid, address).is_some());

        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                system_advertisement_datagram(producer_cid, &[5]),
            )
            .unwrap();
        assert!(consumer.point(producer_cid, address).is_none());
    }

    #[test]
    fn get_position_newest_preference_selects_most_recently_seen() {
        let net = FakeNetwork::new("127.0.0.1:7109".parse().unwrap());
        let (mut consumer, _rx) =
            Consumer::new(Cid::from_bytes([9; 16]), Name::from_str_truncated("c"), net, []);
        consumer.monitor_system(1).unwrap();

        let first_cid = Cid::from_bytes([1; 16]);
        let second_cid = Cid::from_bytes([2; 16]);
        let address = Address::new(1, 1, 1);

        consumer
            .receive_datagram(
                "127.0.0.1:9000".parse().unwrap(),
                transform_datagram(
                    first_cid,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 1, y: 1, z: 1 },
                ),
            )
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        consumer
            .receive_datagram(
                "127.0.0.1:9001".parse().unwrap(),
                transform_datagram(
                    second_cid,
                    1,
                    1,
                    1,
                    StandardModule::Position { micrometers: false, x: 2, y: 2, z: 2 },
                ),
            )
            .unwrap();

        let newest = consumer.get_position(None, address, false, ValuePreference::Newest).unwrap();
        assert_eq!(newest.source_cid, second_cid);
    }
}
