// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network abstraction (C10, ambient stack). Producer/Consumer engines
//! are generic over [`Network`] so they can be driven by an in-memory
//! fake in tests; [`UdpNetwork`] is the real multicast transport, gated
//! behind the `udp-net` feature the same way optional transports are
//! feature-gated elsewhere in this codebase.

use crate::error::{Error, Result};
use std::net::{IpAddr, SocketAddr};

/// What a Producer/Consumer engine needs from the network: send a
/// datagram to a multicast group, receive the next inbound datagram, and
/// join/leave multicast groups as the engine's interest set changes.
pub trait Network {
    fn send_to(&self, datagram: &[u8], group: SocketAddr) -> Result<()>;

    /// Receive the next datagram into `buf`, returning its length and the
    /// sender's address, or `Ok(None)` if none is available right now
    /// (non-blocking).
    fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    fn join_multicast(&self, group: IpAddr) -> Result<()>;
    fn leave_multicast(&self, group: IpAddr) -> Result<()>;
}

#[cfg(feature = "udp-net")]
pub use udp::UdpNetwork;

#[cfg(feature = "udp-net")]
mod udp {
    use super::{Network, Result};
    use crate::config;
    use crate::error::Error;
    use socket2::{Domain, Protocol, SockAddr, Socket, Type};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

    /// A UDP multicast socket bound to [`config::PORT`], built with
    /// `socket2` for explicit control over `SO_REUSEADDR` and multicast
    /// group membership, the same construction shape used for this
    /// crate's other UDP-based transports.
    pub struct UdpNetwork {
        socket: Socket,
    }

    impl UdpNetwork {
        pub fn bind(bind_addr: IpAddr) -> Result<Self> {
            let domain = if bind_addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
            let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
                .map_err(Error::NetworkUnavailable)?;
            socket.set_reuse_address(true).map_err(Error::NetworkUnavailable)?;
            #[cfg(unix)]
            socket.set_reuse_port(true).map_err(Error::NetworkUnavailable)?;
            socket.set_nonblocking(true).map_err(Error::NetworkUnavailable)?;
            let addr = SocketAddr::new(bind_addr, config::PORT);
            socket.bind(&SockAddr::from(addr)).map_err(Error::NetworkUnavailable)?;
            Ok(Self { socket })
        }
    }

    impl Network for UdpNetwork {
        fn send_to(&self, datagram: &[u8], group: SocketAddr) -> Result<()> {
            self.socket
                .send_to(datagram, &SockAddr::from(group))
                .map_err(Error::NetworkUnavailable)?;
            Ok(())
        }

        fn recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
            let uninit = unsafe {
                &mut *(buf as *mut [u8] as *mut [std::mem::MaybeUninit<u8>])
            };
            match self.socket.recv_from(uninit) {
                Ok((n, addr)) => Ok(Some((n, addr.as_socket().ok_or(Error::MalformedLayer(
                    "peer address family unsupported",
                ))?))),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(Error::NetworkUnavailable(e)),
            }
        }

        fn join_multicast(&self, group: IpAddr) -> Result<()> {
            match group {
                IpAddr::V4(v4) => self
                    .socket
                    .join_multicast_v4(&v4, &Ipv4Addr::UNSPECIFIED)
                    .map_err(Error::NetworkUnavailable),
                IpAddr::V6(v6) => {
                    self.socket.join_multicast_v6(&v6, 0).map_err(Error::NetworkUnavailable)
                }
            }
        }

        fn leave_multicast(&self, group: IpAddr) -> Result<()> {
            match group {
                IpAddr::V4(v4) => self
                    .socket
                    .leave_multicast_v4(&v4, &Ipv4Addr::UNSPECIFIED)
                    .map_err(Error::NetworkUnavailable),
                IpAddr::V6(v6) => {
                    self.socket.leave_multicast_v6(&v6, 0).map_err(Error::NetworkUnavailable)
                }
            }
        }
    }

    #[allow(dead_code)]
    fn unused_v6_default() -> Ipv6Addr {
        Ipv6Addr::UNSPECIFIED
    }
}
