// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Producer engine (C5): owns a set of points, builds Transform folios on
//! a tick-driven cadence, and answers Advertisement requests.

use crate::address::{AddressContainer, Event as AddressEvent, ObservedRoles};
use crate::config;
use crate::error::Result;
use crate::folio::{FolioKey, FolioReassembler, SequenceTracker};
use crate::identifiers::{Address, Cid, Name};
use crate::net::Network;
use crate::point::{ModuleSlot, PointDetails};
use crate::timing::EngineTimers;
use crate::wire::module::ModuleIdent;
use crate::wire::{
    AdvertisementLayer, AdvertisementVector, Header, MessageVector, ModuleAdvertisement,
    ModulePdu, NameAdvertisement, PointDescription, PointPdu, StandardModule, SystemAdvertisement,
    Timestamp128, TransformLayer, Writer,
};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Instant;

const MAX_MESSAGE_BYTES: usize = 1472;

/// A Producer's owned points, grouped by system for cadence and
/// multicast-group purposes.
pub struct Producer<N: Network> {
    cid: Cid,
    name: Name,
    net: N,
    points: HashMap<Address, PointDetails>,
    folio_counters: HashMap<u8, u32>,
    ad_folio: u32,
    sequence_counters: HashMap<u8, u16>,
    ad_sequence: u16,
    last_transform_sent: HashMap<u8, Instant>,
    consumers: AddressContainer,
    timers: EngineTimers,
    reassembler: FolioReassembler,
    sequences: SequenceTracker,
}

impl<N: Network> Producer<N> {
    pub fn new(cid: Cid, name: Name, net: N, now: Instant) -> (Self, std::sync::mpsc::Receiver<AddressEvent>) {
        let (consumers, events_rx) = AddressContainer::new(256);
        let producer = Self {
            cid,
            name,
            net,
            points: HashMap::new(),
            folio_counters: HashMap::new(),
            ad_folio: 0,
            sequence_counters: HashMap::new(),
            ad_sequence: 0,
            last_transform_sent: HashMap::new(),
            consumers,
            timers: EngineTimers::new(now, config::TRANSFORM_TIMING_DEFAULT),
            reassembler: FolioReassembler::new(),
            sequences: SequenceTracker::new(),
        };
        (producer, events_rx)
    }

    /// Add or update an owned point's static metadata (address/priority).
    /// Module values are set with [`Producer::set_module`].
    pub fn own_point(&mut self, address: Address, priority: u8) {
        self.points.entry(address).or_insert_with(|| PointDetails::new(priority)).priority =
            priority;
    }

    pub fn set_module(&mut self, address: Address, module: StandardModule, timestamp: u64) {
        let Some(details) = self.points.get_mut(&address) else { return };
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

    /// Drive cadence timers at `now`: builds and sends one Transform folio
    /// per owned system that is due (or keepalive-forced).
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        if !self.timers.startup_complete(now) {
            return Ok(());
        }

        let transform_due = self.timers.transform.poll(now);
        let systems: HashSet<u8> = self.points.keys().map(|a| a.system).collect();

        for system in systems {
            let keepalive_due = self
                .last_transform_sent
                .get(&system)
                .map(|last| now.saturating_duration_since(*last) >= config::TRANSFORM_KEEPALIVE_TIMING_MIN)
                .unwrap_or(true);

            if !transform_due && !keepalive_due {
                continue;
            }

            let full_point_set = keepalive_due;
            self.send_transform_for_system(system, now, full_point_set)?;
            self.last_transform_sent.insert(system, now);
        }

        Ok(())
    }

    fn send_transform_for_system(&mut self, system: u8, now: Instant, full_point_set: bool) -> Result<()> {
        // The standard does not scope module-interest by system: a
        // Consumer's Module-Ad names modules, not (system, module) pairs,
        // so every owned system is filtered against the same union.
        let interest = self.consumers.union_module_interest();
        let owned: Vec<(Address, &PointDetails)> =
            self.points.iter().filter(|(a, _)| a.system == system).map(|(a, d)| (*a, d)).collect();

        let folio = {
            let counter = self.folio_counters.entry(system).or_insert(0);
            *counter = counter.wrapping_add(1);
            *counter
        };

        let sequence_counter = self.sequence_counters.entry(system).or_insert(0);
        let pages = build_transform_pages(
            self.cid,
            self.name,
            system,
            folio,
            Timestamp128::from_micros(now_micros(now)),
            full_point_set,
            &owned,
            &interest,
            sequence_counter,
        );

        let group = SocketAddr::new(
            config::transform_multicast_v4(system).into(),
            config::PORT,
        );
        for page in pages {
            self.net.send_to(&page, group)?;
        }
        Ok(())
    }

    /// Feed one received datagram (a Module/Name/System-Advertisement
    /// request from a Consumer) through folio reassembly, applying each
    /// completed page's Advertisement Layer once the folio is whole.
    pub fn receive_datagram(&mut self, from: SocketAddr, datagram: Vec<u8>) -> Result<()> {
        use crate::wire::Reader;
        let mut r = Reader::new(&datagram);
        let (header, length) = Header::decode(&mut r)?;
        Header::validate_length(length, r.remaining())?;

        if header.vector != MessageVector::Advertisement {
            // A Producer has no use for another Producer's Transform
            // traffic; only Advertisement requests are reassembled here.
            return Ok(());
        }

        let key = FolioKey { cid: header.cid, vector: header.vector.to_wire(), system: None };
        self.sequences.accept(key, header.sequence)?;
        let pages =
            self.reassembler.accept(key, header.folio, header.page, header.last_page, datagram)?;
        let Some(pages) = pages else { return Ok(()) };

        for page in &pages {
            let mut pr = Reader::new(page);
            let (page_header, _length) = Header::decode(&mut pr)?;
            let body = pr.bytes(pr.remaining())?;
            self.handle_advertisement(from, &page_header, body)?;
        }
        Ok(())
    }

    /// Handle one already-reassembled Advertisement Layer's bytes (the
    /// datagram's content after its fixed header).
    fn handle_advertisement(&mut self, from: SocketAddr, header: &Header, body: &[u8]) -> Result<()> {
        use crate::wire::Reader;
        let mut r = Reader::new(body);
        let (layer, _length) = AdvertisementLayer::decode(&mut r)?;
        match layer.vector {
            AdvertisementVector::Module => {
                let (_, idents) = ModuleAdvertisement::decode(&mut r)?;
                self.consumers.add_component(
                    header.cid,
                    Some(from.ip()),
                    header.component_name,
                    ObservedRoles { producer: false, consumer: true },
                    idents,
                );
            }
            AdvertisementVector::Name => {
                let (response, _points) = NameAdvertisement::decode(&mut r)?;
                if !response {
                    self.reply_name_advertisement(from)?;
                }
            }
            AdvertisementVector::System => {
                let (response, _systems) = SystemAdvertisement::decode(&mut r)?;
                if !response {
                    self.reply_system_advertisement(from)?;
                }
            }
        }
        Ok(())
    }

    fn reply_name_advertisement(&mut self, to: SocketAddr) -> Result<()> {
        let descriptors: Vec<PointDescription> = self
            .points
            .iter()
            .map(|(addr, details)| PointDescription {
                system: addr.system,
                group: addr.group,
                point: addr.point,
                name: details.name,
            })
            .collect();

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
        let inner_at_placeholder = NameAdvertisement::encode(&mut w, true, &descriptors);
        w.finish_length(inner_at_placeholder);
        w.finish_length(outer_at);
        lengths.finish(&mut w);

        self.net.send_to(&w.into_vec(), to)
    }

    fn reply_system_advertisement(&mut self, to: SocketAddr) -> Result<()> {
        let systems: Vec<u8> = self.points.keys().map(|a| a.system).collect::<HashSet<_>>().into_iter().collect();

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
        let inner_at = SystemAdvertisement::encode(&mut w, true, &systems);
        w.finish_length(inner_at);
        w.finish_length(outer_at);
        lengths.finish(&mut w);

        self.net.send_to(&w.into_vec(), to)
    }

    fn next_ad_folio(&mut self) -> u32 {
        self.ad_folio = self.ad_folio.wrapping_add(1);
        self.ad_folio
    }

    fn next_ad_sequence(&mut self) -> u16 {
        self.ad_sequence = self.ad_sequence.wrapping_add(1);
        self.ad_sequence
    }
}

fn now_micros(now: Instant) -> u64 {
    // Monotonic microsecond count since an arbitrary epoch fixed at the
    // first call; sufficient for ordering and keepalive comparisons.
    static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let epoch = *EPOCH.get_or_init(|| now);
    now.saturating_duration_since(epoch).as_micros() as u64
}

/// Pack owned points whose modules any consumer has shown interest in
/// into one or more Transform Message datagrams (pages), greedily
/// appending points until the next one would exceed [`MAX_MESSAGE_BYTES`].
fn build_transform_pages(
    cid: Cid,
    name: Name,
    system: u8,
    folio: u32,
    timestamp: Timestamp128,
    full_point_set: bool,
    owned: &[(Address, &PointDetails)],
    interest: &HashSet<ModuleIdent>,
    sequence_counter: &mut u16,
) -> Vec<Vec<u8>> {
    let mut point_blobs: Vec<Vec<u8>> = Vec::new();
    for (address, details) in owned {
        let modules = module_pdus_for(details, interest);
        if modules.is_empty() && !full_point_set {
            continue;
        }
        let mut pw = Writer::new();
        let point_pdu = PointPdu {
            priority: details.priority,
            group: address.group,
            point: address.point,
            timestamp: details
                .position
                .as_ref()
                .map(|s| s.timestamp)
                .unwrap_or(0),
            options: 0,
        };
        let at = point_pdu.encode(&mut pw);
        for module in &modules {
            module.encode(&mut pw);
        }
        pw.finish_length(at);
        point_blobs.push(pw.into_vec());
    }

    let mut pages: Vec<Vec<u8>> = Vec::new();
    let mut current = Vec::new();
    for blob in point_blobs {
        // 93 fixed header bytes + 26 fixed Transform Layer bytes precede
        // the point list on every page.
        if !current.is_empty() && current.len() + blob.len() + 93 + 26 > MAX_MESSAGE_BYTES {
            pages.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(&blob);
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }

    let last_page = (pages.len() - 1) as u16;
    pages
        .into_iter()
        .enumerate()
        .map(|(page_no, points_bytes)| {
            *sequence_counter = sequence_counter.wrapping_add(1);
            let mut w = Writer::new();
            let header = Header {
                vector: MessageVector::Transform,
                cid,
                sequence: *sequence_counter,
                folio,
                page: page_no as u16,
                last_page,
                options: 0,
                component_name: name,
            };
            let lengths = header.encode(&mut w);
            let layer = TransformLayer { system, timestamp, full_point_set };
            let layer_at = layer.encode(&mut w);
            w.bytes(&points_bytes);
            w.finish_length(layer_at);
            lengths.finish(&mut w);
            w.into_vec()
        })
        .collect()
}

fn module_pdus_for(details: &PointDetails, interest: &HashSet<ModuleIdent>) -> Vec<ModulePdu> {
    let mut out = Vec::new();
    let mut push = |module: &Option<ModuleSlot<StandardModule>>| {
        if let Some(slot) = module {
            let pdu = slot.value.to_module_pdu();
            if interest.is_empty() || interest.contains(&pdu.ident()) {
                out.push(pdu);
            }
        }
    };
    push(&details.position);
    push(&details.position_vel_acc);
    push(&details.rotation);
    push(&details.rotation_vel_acc);
    push(&details.orientation);
    push(&details.orientation_vel_acc);
    out
}
