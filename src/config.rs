// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol constants: ports, multicast addresses, timing (Table A-2),
//! additional defines (Table A-3), and wire size bounds.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

// ============================================================================
// Table A-3: Additional Defines
// ============================================================================

/// UDP port used by both Transform and Advertisement multicast groups.
pub const PORT: u16 = 5568;

/// ESTA's reserved manufacturer ID for the standard module set.
pub const ESTA_MANUFACTURER_ID: u16 = 0x0000;

// ============================================================================
// Table 15-2 / 15-3: Multicast Addresses
// ============================================================================

/// IPv4 multicast base for Transform messages, excluding the system octet.
/// The wire group for a given `system` is `239.159.1.<system>`.
pub const TRANSFORM_IPV4_BASE: Ipv4Addr = Ipv4Addr::new(239, 159, 1, 0);

/// IPv4 multicast group for Advertisement messages (fixed, not per-system).
pub const ADVERTISEMENT_IPV4: Ipv4Addr = Ipv4Addr::new(239, 159, 2, 1);

/// IPv6 multicast base for Transform messages, excluding the system word.
/// The wire group for a given `system` is this address with `system` added
/// to the low word (computed explicitly, never via pointer/byte arithmetic
/// on the address value).
pub const TRANSFORM_IPV6_BASE: Ipv6Addr =
    Ipv6Addr::new(0xFF15, 0, 0, 0, 0x009f, 0, 0x0001, 0x0000);

/// IPv6 multicast group for Advertisement messages (fixed).
pub const ADVERTISEMENT_IPV6: Ipv6Addr =
    Ipv6Addr::new(0xFF15, 0, 0, 0, 0x009f, 0, 0x0002, 0x0001);

/// Compute the IPv4 Transform multicast group for a given system number.
pub fn transform_multicast_v4(system: u8) -> Ipv4Addr {
    let octets = TRANSFORM_IPV4_BASE.octets();
    Ipv4Addr::new(octets[0], octets[1], octets[2], system)
}

/// Compute the IPv6 Transform multicast group for a given system number.
pub fn transform_multicast_v6(system: u8) -> Ipv6Addr {
    let mut segments = TRANSFORM_IPV6_BASE.segments();
    segments[7] = u16::from(system);
    Ipv6Addr::new(
        segments[0], segments[1], segments[2], segments[3], segments[4], segments[5],
        segments[6], segments[7],
    )
}

// ============================================================================
// Table 6-2: Address Numbering
// ============================================================================

/// Valid `system` range (inclusive).
pub const SYSTEM_RANGE: std::ops::RangeInclusive<u32> = 1..=200;
/// Valid `group` range (inclusive).
pub const GROUP_RANGE: std::ops::RangeInclusive<u32> = 1..=60_000;
/// Valid `point` range (inclusive).
pub const POINT_RANGE: std::ops::RangeInclusive<u64> = 1..=4_000_000_000;
/// Valid `priority` range (inclusive); default is 100.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<u8> = 0..=200;
/// Default priority for a newly created point.
pub const DEFAULT_PRIORITY: u8 = 100;

// ============================================================================
// Table A-2: Timing Defines
// ============================================================================

/// Minimum Transform message cadence.
pub const TRANSFORM_TIMING_MIN: Duration = Duration::from_millis(1);
/// Maximum Transform message cadence.
pub const TRANSFORM_TIMING_MAX: Duration = Duration::from_millis(50);
/// Default Transform cadence, used when the application does not tune it.
pub const TRANSFORM_TIMING_DEFAULT: Duration = Duration::from_millis(50);
/// Minimum keepalive interval: a Transform message must be (re)sent for an
/// owned system at least this often even with no value changes.
pub const TRANSFORM_KEEPALIVE_TIMING_MIN: Duration = Duration::from_millis(2800);
/// Maximum keepalive interval.
pub const TRANSFORM_KEEPALIVE_TIMING_MAX: Duration = Duration::from_millis(3000);
/// A point with no Transform frame for this long is considered stale.
pub const TRANSFORM_DATA_LOSS_TIMEOUT: Duration = Duration::from_millis(7500);

/// Module (and Name/System) advertisement cadence.
pub const ADVERTISEMENT_TIMING: Duration = Duration::from_secs(10);
/// Wait after startup before the first advertisement/transform traffic is sent.
pub const ADVERTISEMENT_STARTUP_WAIT: Duration = Duration::from_secs(12);
/// A component with no advertisement/transform traffic for this long has its
/// module-interest list cleared (component entry itself is retained).
pub const ADVERTISEMENT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Section 5 / 12-14: Fixed Field Widths
// ============================================================================

/// Width in octets of every `name` field on the wire (component name, point
/// name in Name-Advertisement descriptors).
pub const NAME_LENGTH: usize = 32;

// ============================================================================
// Section 7.1 / 12-14: Message Size Bounds
// ============================================================================

/// Valid total byte-size range for a Transform message.
pub const TRANSFORM_MESSAGE_SIZE: std::ops::RangeInclusive<usize> = 157..=1472;
/// Valid total byte-size range for a Module-Advertisement message.
pub const MODULE_AD_MESSAGE_SIZE: std::ops::RangeInclusive<usize> = 113..=1469;
/// Valid total byte-size range for a Name-Advertisement message.
pub const NAME_AD_MESSAGE_SIZE: std::ops::RangeInclusive<usize> = 110..=1436;
/// Valid total byte-size range for a System-Advertisement message.
pub const SYSTEM_AD_MESSAGE_SIZE: std::ops::RangeInclusive<usize> = 110..=310;

/// Valid byte-size range for a Module-Advertisement's ident list.
pub const MODULE_AD_LIST_SIZE: std::ops::RangeInclusive<usize> = 4..=1280;
/// Valid byte-size range for a Name-Advertisement's descriptor list (0 allowed: a request).
pub const NAME_AD_LIST_SIZE: std::ops::RangeInclusive<usize> = 0..=1326;
/// Valid byte-size range for a System-Advertisement's system list (0 allowed: a request).
pub const SYSTEM_AD_LIST_SIZE: std::ops::RangeInclusive<usize> = 0..=200;
