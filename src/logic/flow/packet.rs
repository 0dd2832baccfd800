//! Packet descriptors handed to the flow aggregator

use std::net::IpAddr;

use super::key::Endpoint;

/// TCP control flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TcpFlag {
    Fin,
    Syn,
    Rst,
    Psh,
    Ack,
    Urg,
    Ece,
    Cwr,
}

impl TcpFlag {
    pub const ALL: [TcpFlag; 8] = [
        TcpFlag::Fin,
        TcpFlag::Syn,
        TcpFlag::Rst,
        TcpFlag::Psh,
        TcpFlag::Ack,
        TcpFlag::Urg,
        TcpFlag::Ece,
        TcpFlag::Cwr,
    ];

    fn bit(self) -> u8 {
        match self {
            TcpFlag::Fin => 0x01,
            TcpFlag::Syn => 0x02,
            TcpFlag::Rst => 0x04,
            TcpFlag::Psh => 0x08,
            TcpFlag::Ack => 0x10,
            TcpFlag::Urg => 0x20,
            TcpFlag::Ece => 0x40,
            TcpFlag::Cwr => 0x80,
        }
    }

    /// Single-letter form used by capture tools ("S", "A", "F", ...)
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'F' => Some(TcpFlag::Fin),
            'S' => Some(TcpFlag::Syn),
            'R' => Some(TcpFlag::Rst),
            'P' => Some(TcpFlag::Psh),
            'A' => Some(TcpFlag::Ack),
            'U' => Some(TcpFlag::Urg),
            'E' => Some(TcpFlag::Ece),
            'C' => Some(TcpFlag::Cwr),
            _ => None,
        }
    }
}

/// Set of flags carried by one TCP segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags(u8);

impl TcpFlags {
    pub fn empty() -> Self {
        Self(0)
    }

    /// Parse a letter string like "SA" or "FPA". Unknown letters are ignored.
    pub fn parse(s: &str) -> Self {
        let mut flags = Self::empty();
        for flag in s.chars().filter_map(TcpFlag::from_letter) {
            flags.insert(flag);
        }
        flags
    }

    pub fn insert(&mut self, flag: TcpFlag) {
        self.0 |= flag.bit();
    }

    pub fn contains(&self, flag: TcpFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = TcpFlag> + '_ {
        TcpFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

/// Network layer of a captured packet
#[derive(Debug, Clone, Copy)]
pub struct IpLayer {
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// Transport layer of a captured packet
#[derive(Debug, Clone, Copy)]
pub struct TcpLayer {
    pub src_port: u16,
    pub dst_port: u16,
    pub flags: TcpFlags,
}

/// What the aggregator needs to know about one packet.
///
/// Either layer may be missing (non-IP frames, UDP, ICMP); such packets are
/// not tracked as flows.
#[derive(Debug, Clone, Copy)]
pub struct PacketDescriptor {
    pub ip: Option<IpLayer>,
    pub tcp: Option<TcpLayer>,
    /// Wire length in bytes
    pub len: u64,
    /// Capture time, seconds since the Unix epoch
    pub time: f64,
}

impl PacketDescriptor {
    /// Descriptor for a TCP packet sent from `src` to `dst`
    pub fn tcp(src: Endpoint, dst: Endpoint, flags: TcpFlags, len: u64, time: f64) -> Self {
        Self {
            ip: Some(IpLayer { src: src.addr, dst: dst.addr }),
            tcp: Some(TcpLayer {
                src_port: src.port,
                dst_port: dst.port,
                flags,
            }),
            len,
            time,
        }
    }

    /// Source and destination endpoints, if both layers are present
    pub fn endpoints(&self) -> Option<(Endpoint, Endpoint)> {
        let ip = self.ip?;
        let tcp = self.tcp?;
        Some((
            Endpoint::new(ip.src, tcp.src_port),
            Endpoint::new(ip.dst, tcp.dst_port),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_letters() {
        let flags = TcpFlags::parse("SA");
        assert!(flags.contains(TcpFlag::Syn));
        assert!(flags.contains(TcpFlag::Ack));
        assert!(!flags.contains(TcpFlag::Fin));
        assert_eq!(flags.iter().count(), 2);
    }

    #[test]
    fn test_unknown_letters_ignored() {
        assert_eq!(TcpFlags::parse("xyz"), TcpFlags::empty());
    }
}
