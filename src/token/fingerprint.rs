//! Machine fingerprint derived from network interface hardware addresses.
//!
//! The fingerprint starts at 91 and adds `91 * byte` for every byte of every
//! physical interface's hardware address, so it is always a multiple of 91.
//! Only the low three bytes travel in a token; the sum is reduced modulo
//! `0xFF_FFFF`, which is itself `91 * 184_365`, so the reduction keeps the
//! divisibility the validator checks.

use std::fs;
use std::path::{Path, PathBuf};

/// Divisor every machine fingerprint is a multiple of.
pub const FINGERPRINT_DIVISOR: u32 = 91;

/// Largest value a three byte fingerprint field can carry. A multiple of 91.
const FINGERPRINT_MODULUS: u64 = 0xFF_FFFF;

/// A network interface as seen by fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    /// `None` when the address could not be resolved.
    pub hardware_address: Option<Vec<u8>>,
    pub loopback: bool,
    pub is_virtual: bool,
}

/// Enumerates the interfaces of the local machine.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self) -> Vec<NetworkInterface>;
}

/// Reads interfaces from Linux sysfs (`/sys/class/net`).
///
/// On platforms without sysfs no interfaces are reported and the fingerprint
/// degrades to the bare seed of 91, which still validates.
#[derive(Debug, Clone)]
pub struct SysfsInterfaces {
    root: PathBuf,
}

impl Default for SysfsInterfaces {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/sys/class/net"),
        }
    }
}

impl SysfsInterfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads from an alternative sysfs-style directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_interface(path: &Path, name: String) -> NetworkInterface {
        const IFF_LOOPBACK: u32 = 0x8;

        let flags = fs::read_to_string(path.join("flags"))
            .ok()
            .and_then(|s| u32::from_str_radix(s.trim().trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);
        let loopback = name == "lo" || flags & IFF_LOOPBACK != 0;

        let is_virtual = fs::canonicalize(path)
            .map(|p| p.to_string_lossy().contains("/devices/virtual/"))
            .unwrap_or(false);

        let hardware_address = match fs::read_to_string(path.join("address")) {
            Ok(raw) => parse_hardware_address(raw.trim()),
            Err(e) => {
                tracing::warn!(
                    "Could not determine hardware address for interface {}: {}",
                    name,
                    e
                );
                None
            }
        };

        NetworkInterface {
            name,
            hardware_address,
            loopback,
            is_virtual,
        }
    }
}

impl InterfaceSource for SysfsInterfaces {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut result: Vec<NetworkInterface> = entries
            .filter_map(Result::ok)
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                Self::read_interface(&entry.path(), name)
            })
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }
}

/// A fixed interface list, for tests and for callers that enumerate
/// interfaces themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<NetworkInterface>);

impl InterfaceSource for StaticInterfaces {
    fn interfaces(&self) -> Vec<NetworkInterface> {
        self.0.clone()
    }
}

/// Parses a colon separated hex address such as `02:42:ac:11:00:02`.
fn parse_hardware_address(raw: &str) -> Option<Vec<u8>> {
    if raw.is_empty() {
        return None;
    }
    raw.split(':')
        .map(|part| u8::from_str_radix(part, 16).ok())
        .collect()
}

/// Computes the machine fingerprint over the given interfaces.
///
/// Loopback and virtual interfaces are skipped, as are interfaces without a
/// hardware address.
pub fn compute_fingerprint(interfaces: &[NetworkInterface]) -> u32 {
    let sum = interfaces
        .iter()
        .filter(|iface| !iface.loopback && !iface.is_virtual)
        .filter_map(|iface| iface.hardware_address.as_deref())
        .flatten()
        .fold(FINGERPRINT_DIVISOR as u64, |acc, byte| {
            acc + FINGERPRINT_DIVISOR as u64 * *byte as u64
        });
    (sum % FINGERPRINT_MODULUS) as u32
}
