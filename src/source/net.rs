//! Network interface counters from `<proc>/net/dev`, plus link state from
//! sysfs and IPv4 addresses from `getifaddrs`.

use std::collections::HashMap;
use std::ffi::CStr;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use tracing::debug;

use super::{parse_counter, ProcFs};
use crate::error::SourceError;

/// Default location of the sysfs mount.
pub const DEFAULT_SYS_ROOT: &str = "/sys";

/// Reported when an interface has no readable operstate.
pub const UNKNOWN_OPERSTATE: &str = "unknown";

/// Link state and address of one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Kernel operstate: `up`, `down`, `dormant`, `unknown`, ...
    pub operstate: String,
    pub ipv4: Option<Ipv4Addr>,
}

impl InterfaceInfo {
    pub fn is_up(&self) -> bool {
        self.operstate == "up"
    }
}

/// Cumulative byte, packet and error counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
}

impl NetCounters {
    pub fn errors(&self) -> u64 {
        self.rx_errors.saturating_add(self.tx_errors)
    }
}

/// Parses net/dev content into per-interface counters.
///
/// Column layout after `iface:` is eight receive columns followed by eight
/// transmit columns; header lines have no `:` and are skipped.
pub fn parse_net_dev(content: &str) -> HashMap<String, NetCounters> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        let Some((iface, rest)) = line.split_once(':') else {
            continue;
        };
        let iface = iface.trim();
        if iface.is_empty() || iface.contains('|') {
            continue;
        }

        let values: Vec<&str> = rest.split_whitespace().collect();
        let field = |i: usize| parse_counter(values.get(i).copied());

        stats.insert(
            iface.to_string(),
            NetCounters {
                rx_bytes: field(0),
                rx_packets: field(1),
                rx_errors: field(2),
                tx_bytes: field(8),
                tx_packets: field(9),
                tx_errors: field(10),
            },
        );
    }

    stats
}

/// The non-loopback interface that has received the most bytes.
pub fn primary_interface(stats: &HashMap<String, NetCounters>) -> Option<String> {
    stats
        .iter()
        .filter(|(name, _)| name.as_str() != "lo")
        .max_by(|a, b| a.1.rx_bytes.cmp(&b.1.rx_bytes).then_with(|| b.0.cmp(a.0)))
        .map(|(name, _)| name.clone())
}

/// Reads `<sys_root>/class/net/<iface>/operstate`.
pub fn read_operstate(sys_root: &Path, iface: &str) -> String {
    let path = sys_root.join("class/net").join(iface).join("operstate");
    match fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
        Ok(_) => UNKNOWN_OPERSTATE.to_string(),
        Err(e) => {
            debug!("{}: {}", path.display(), e);
            UNKNOWN_OPERSTATE.to_string()
        }
    }
}

/// First IPv4 address of every interface that has one.
///
/// An empty map when the address list cannot be obtained.
pub fn ipv4_addresses() -> HashMap<String, Ipv4Addr> {
    let mut addrs = HashMap::new();
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: on success getifaddrs stores a list head that stays valid until
    // the matching freeifaddrs below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        debug!("getifaddrs failed: {}", io::Error::last_os_error());
        return addrs;
    }

    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: cursor is a node of the live list. ifa_name is NUL-terminated,
        // and an AF_INET ifa_addr points at a sockaddr_in.
        unsafe {
            let ifa = &*cursor;
            if !ifa.ifa_addr.is_null()
                && i32::from((*ifa.ifa_addr).sa_family) == libc::AF_INET
            {
                let sin = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
                let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
                addrs.entry(name).or_insert(ip);
            }
            cursor = ifa.ifa_next;
        }
    }

    // SAFETY: head came from a successful getifaddrs and is freed once.
    unsafe { libc::freeifaddrs(head) };
    addrs
}

impl ProcFs {
    /// Counters of every interface.
    pub fn read_network_all(&self) -> Result<HashMap<String, NetCounters>, SourceError> {
        let content = self.read("net/dev")?;
        Ok(parse_net_dev(&content))
    }

    /// Counters of a single interface.
    pub fn read_network_interface(&self, name: &str) -> Result<NetCounters, SourceError> {
        self.read_network_all()?
            .remove(name)
            .ok_or_else(|| {
                SourceError::incomplete(self.path("net/dev"), format!("no interface {}", name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "Inter-|   Receive                                                |  Transmit\n \
face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n    \
lo: 5000      50    0    0    0     0          0         0     5000      50    0    0    0     0       0          0\n  \
eth0: 1048576  1000    2    0    0     0          0         0   524288     800    1    0    0     0       0          0\n \
wlan0: 2048     10    0    0    0     0          0         0     1024       5    0    0    0     0       0          0\n";

    #[test]
    fn test_parse_net_dev() {
        let stats = parse_net_dev(NET_DEV);
        assert_eq!(stats.len(), 3);
        let eth0 = &stats["eth0"];
        assert_eq!(eth0.rx_bytes, 1_048_576);
        assert_eq!(eth0.rx_packets, 1000);
        assert_eq!(eth0.tx_bytes, 524_288);
        assert_eq!(eth0.tx_packets, 800);
        assert_eq!(eth0.errors(), 3);
    }

    #[test]
    fn test_parse_net_dev_short_line() {
        let stats = parse_net_dev("eth1: 100 2\n");
        let eth1 = &stats["eth1"];
        assert_eq!(eth1.rx_bytes, 100);
        assert_eq!(eth1.rx_packets, 2);
        assert_eq!(eth1.tx_bytes, 0);
    }

    #[test]
    fn test_primary_interface_skips_loopback() {
        let stats = parse_net_dev(NET_DEV);
        assert_eq!(primary_interface(&stats).as_deref(), Some("eth0"));

        let only_lo = parse_net_dev("lo: 10 1\n");
        assert_eq!(primary_interface(&only_lo), None);
    }

    #[test]
    fn test_read_network_interface() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("net")).unwrap();
        std::fs::write(dir.path().join("net/dev"), NET_DEV).unwrap();
        let procfs = ProcFs::new(dir.path());

        assert_eq!(procfs.read_network_interface("wlan0").unwrap().rx_bytes, 2048);
        assert!(procfs.read_network_interface("eth9").is_err());
        assert_eq!(procfs.read_network_all().unwrap().len(), 3);
    }

    #[test]
    fn test_read_operstate() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let eth0 = dir.path().join("class/net/eth0");
        let wlan0 = dir.path().join("class/net/wlan0");
        std::fs::create_dir_all(&eth0).unwrap();
        std::fs::create_dir_all(&wlan0).unwrap();
        std::fs::write(eth0.join("operstate"), "up\n").unwrap();
        std::fs::write(wlan0.join("operstate"), "\n").unwrap();

        assert_eq!(read_operstate(dir.path(), "eth0"), "up");
        assert_eq!(read_operstate(dir.path(), "wlan0"), UNKNOWN_OPERSTATE);
        assert_eq!(read_operstate(dir.path(), "eth9"), UNKNOWN_OPERSTATE);
    }

    #[test]
    fn test_ipv4_addresses_loopback() {
        let addrs = ipv4_addresses();
        assert!(!addrs.contains_key("procpulse-none0"));
        if let Some(ip) = addrs.get("lo") {
            assert!(ip.is_loopback());
        }
    }

    #[test]
    fn test_interface_info_is_up() {
        let info = InterfaceInfo {
            operstate: "up".to_string(),
            ipv4: Some(Ipv4Addr::new(10, 0, 0, 2)),
        };
        assert!(info.is_up());
        assert!(!InterfaceInfo {
            operstate: "dormant".to_string(),
            ipv4: None,
        }
        .is_up());
    }
}
