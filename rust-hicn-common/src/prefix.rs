//! hICN name prefixes.
//!
//! hICN names are IP addresses: a name prefix is an IPv4 or IPv6 address
//! together with a prefix length. Host bits beyond the length are always
//! cleared so that two spellings of the same prefix compare equal, which is
//! what exact-prefix-match lookups rely on.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

mod tests;

/// An hICN name prefix (`address/length`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// Creates a prefix, masking the host bits of `addr`.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self, Error> {
        let max = max_len(&addr);
        if len > max {
            return Err(Error::Prefix(format!(
                "length {} exceeds {} bits for {}",
                len, max, addr
            )));
        }

        Ok(Self {
            addr: mask(addr, len),
            len,
        })
    }

    /// Creates a full-length prefix naming a single address.
    pub fn host(addr: IpAddr) -> Self {
        let len = max_len(&addr);
        Self { addr, len }
    }

    /// Network address of the prefix.
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits.
    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_ipv4(&self) -> bool {
        self.addr.is_ipv4()
    }

    /// Checks whether `addr` falls inside this prefix.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        if addr.is_ipv4() != self.addr.is_ipv4() {
            return false;
        }
        mask(*addr, self.len) == self.addr
    }

    /// Checks if this prefix covers `other`.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len <= other.len && self.contains(&other.addr)
    }

    /// Encodes this prefix as a TLV element: one length byte followed by the
    /// 4 or 16 address bytes.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::with_capacity(17);
        buf.put_u8(self.len);
        match self.addr {
            IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
            IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
        }
        TlvElement::new(tlv::TLV_PREFIX, buf.freeze())
    }

    /// Decodes a prefix from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        element.expect_type(tlv::TLV_PREFIX)?;

        let value = &element.value;
        let addr = match value.len() {
            5 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&value[1..]);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            17 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&value[1..]);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            n => {
                return Err(Error::Tlv(format!(
                    "prefix TLV must carry 5 or 17 bytes, got {}",
                    n
                )))
            }
        };

        Self::new(addr, value[0])
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for Prefix {
    type Err = Error;

    /// Parses `addr/len`, or a bare address as a full-length prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((addr, len)) => {
                let addr = addr
                    .parse::<IpAddr>()
                    .map_err(|e| Error::Prefix(format!("{}: {}", s, e)))?;
                let len = len
                    .parse::<u8>()
                    .map_err(|e| Error::Prefix(format!("{}: {}", s, e)))?;
                Self::new(addr, len)
            }
            None => s
                .parse::<IpAddr>()
                .map(Self::host)
                .map_err(|e| Error::Prefix(format!("{}: {}", s, e))),
        }
    }
}

fn max_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(addr: IpAddr, len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let mask = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
            IpAddr::V4(Ipv4Addr::from(bits & mask))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let mask = if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) };
            IpAddr::V6(Ipv6Addr::from(bits & mask))
        }
    }
}
