// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # otp-core - ESTA E1.59 Object Transform Protocol core
//!
//! A `no_std`-free, sans-io implementation of the wire codec, folio
//! reassembly, address/point state, and Producer/Consumer engines for the
//! ESTA E1.59 Object Transform Protocol (OTP): a UDP/multicast protocol for
//! distributing time-stamped transform data (position, velocity,
//! acceleration, rotation, scale, reference-frame) for addressable "points"
//! in an entertainment-automation network.
//!
//! ## Quick Start
//!
//! Requires the `udp-net` feature for the real socket transport; swap in
//! any other [`net::Network`] implementation to drive the engine sans-io.
//!
//! ```rust,ignore
//! use otp_core::identifiers::{Address, Cid, Name};
//! use otp_core::net::UdpNetwork;
//! use otp_core::producer::Producer;
//! use otp_core::wire::StandardModule;
//! use std::net::Ipv4Addr;
//! use std::time::Instant;
//!
//! let net = UdpNetwork::bind(Ipv4Addr::UNSPECIFIED.into())?;
//! let cid = Cid::from_bytes([0x11; 16]);
//! let (mut producer, _events) =
//!     Producer::new(cid, Name::from_str_truncated("Automation-Server"), net, Instant::now());
//!
//! let address = Address::new(1, 1, 1);
//! producer.own_point(address, 100);
//! producer.set_module(
//!     address,
//!     StandardModule::Position { micrometers: false, x: 1000, y: 2000, z: 3000 },
//!     3_600_000_000,
//! );
//! # Ok::<(), otp_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +----------------------------------------------------------------+
//! |                      Application Layer                         |
//! |  Producer API (own points, set modules) | Consumer API (query)  |
//! +----------------------------------------------------------------+
//! |                  Engines (producer, consumer)                   |
//! |   transform cadence / keepalive | advertisement solicitation    |
//! +----------------------------------------------------------------+
//! |         State (address, point)     |   Timing (timing)          |
//! |   cid/system/group/point map       |   cadences, liveness FSMs  |
//! |   arbitration, reference frames    |                            |
//! +----------------------------------------------------------------+
//! |                     Reassembly (folio)                          |
//! |        per-(cid, vector[, system]) paged-folio reassembly        |
//! +----------------------------------------------------------------+
//! |                       Wire codec (wire)                         |
//! |   Header | Transform/Point/Module PDUs | Advertisement layers   |
//! +----------------------------------------------------------------+
//! |                  Network collaborator (net)                     |
//! |        trait `Network` | optional `udp-net` UDP transport        |
//! +----------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`producer::Producer`] | Transmits Transform messages for owned points |
//! | [`consumer::Consumer`] | Subscribes to Transform messages, advertises interest |
//! | [`address::AddressContainer`] | The `cid -> system -> group -> point` map and change events |
//! | [`point::PointDetails`] | Per-point module storage, arbitration, reference-frame walk |
//! | [`wire::Header`] | The fixed OTP datagram header shared by every message |
//! | [`net::Network`] | Transport collaborator (send/recv/join/leave multicast) |
//!
//! ## Modules Overview
//!
//! - [`identifiers`] - CID, point address, fixed-width name (start here)
//! - [`config`] - Protocol constants: ports, multicast bases, timing, size bounds
//! - [`wire`] - Big-endian wire codec for the layered PDU stack
//! - [`folio`] - Multi-page folio reassembly and sequence-gap detection
//! - [`point`] - Per-point module storage, producer arbitration, reference frames
//! - [`address`] - The component/point address container and its change events
//! - [`timing`] - Named cadence timers and the liveness state machines
//! - [`producer`] - Producer engine: builds and emits Transform messages
//! - [`consumer`] - Consumer engine: advertises interest, ingests Transform traffic
//! - [`net`] - `Network` trait and the optional `udp-net` UDP transport
//! - [`error`] - The crate's error taxonomy
//!
//! ## Out of scope
//!
//! The UDP socket layer beyond the optional `udp-net` feature, host
//! application CLI/GUI, string localization, and ESTA-specific numeric-range
//! formatting helpers are not part of this crate. Security/authentication
//! (the protocol is plaintext multicast), sub-IP packet fragmentation,
//! persistent storage, and vendor modules beyond the pluggable
//! [`wire::ModulePdu`] hook are explicit non-goals.
//!
//! ## See Also
//!
//! - [ANSI E1.59-2021 (ACN-OTP) protocol standard](https://tsp.esta.org/tsp/documents/published_docs.php)

/// The `cid -> system -> group -> point` address container and component map.
pub mod address;
/// Protocol constants: ports, multicast addresses, timing (Table A-2), and wire size bounds.
pub mod config;
/// Consumer engine: advertisement solicitation cadence, inbound Transform/Advertisement handling.
pub mod consumer;
/// The crate's error taxonomy.
pub mod error;
/// Multi-page folio reassembly and sequence-gap detection.
pub mod folio;
/// Component identifiers (CID), point addresses, and fixed-width names.
pub mod identifiers;
/// `Network` collaborator trait and the optional `udp-net` UDP transport.
pub mod net;
/// Per-point module storage, multi-producer arbitration, and reference-frame resolution.
pub mod point;
/// Producer engine: transform cadence, keepalives, advertisement responders.
pub mod producer;
/// Named cadence timers and the point/component liveness state machines.
pub mod timing;
/// Big-endian wire codec for the layered OTP PDU stack.
pub mod wire;

pub use address::{AddressContainer, Component, Event as AddressEvent, ObservedRoles};
pub use consumer::Consumer;
pub use error::{Error, Result};
pub use identifiers::{Address, Cid, Name};
pub use net::Network;
pub use point::{ModuleSlot, PointDetails, ValuePreference};
pub use producer::Producer;

/// Crate version string, matching `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
