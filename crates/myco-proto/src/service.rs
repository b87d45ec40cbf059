//! Declared-service payload: the Deploy packet's body.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A declared service: `id` plus NUL-padded name/uri/exec fields.
///
/// Carried as the body of a Deploy packet, prefixed by an 8-byte HLC
/// version (see `myco-core::node`). `size_of::<Service>()` is 200 bytes,
/// comfortably under the 920-byte budget named for the Deploy payload.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C, packed)]
pub struct Service {
    id: [u8; 8],
    name: [u8; 32],
    flake_uri: [u8; 128],
    exec_name: [u8; 32],
}

impl Service {
    /// Wire size of a `Service` record.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Build a service, truncating `name`/`flake_uri`/`exec_name` to their
    /// fixed field widths (byte-for-byte, not Unicode-aware truncation).
    #[must_use]
    pub fn new(id: u64, name: &str, flake_uri: &str, exec_name: &str) -> Self {
        let mut svc = Self {
            id: id.to_le_bytes(),
            name: [0; 32],
            flake_uri: [0; 128],
            exec_name: [0; 32],
        };
        copy_padded(&mut svc.name, name.as_bytes());
        copy_padded(&mut svc.flake_uri, flake_uri.as_bytes());
        copy_padded(&mut svc.exec_name, exec_name.as_bytes());
        svc
    }

    /// Caller-assigned unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        u64::from_le_bytes(self.id)
    }

    /// Service name, stopping at the first NUL byte. Lossy on invalid UTF-8.
    #[must_use]
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        field_str(&self.name)
    }

    /// Flake URI used to build the service.
    #[must_use]
    pub fn flake_uri(&self) -> std::borrow::Cow<'_, str> {
        field_str(&self.flake_uri)
    }

    /// Executable name within the built flake's output.
    #[must_use]
    pub fn exec_name(&self) -> std::borrow::Cow<'_, str> {
        field_str(&self.exec_name)
    }
}

impl core::fmt::Debug for Service {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("flake_uri", &self.flake_uri())
            .field("exec_name", &self.exec_name())
            .finish()
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for Service {}

fn copy_padded(dest: &mut [u8], src: &[u8]) {
    let n = src.len().min(dest.len());
    dest[..n].copy_from_slice(&src[..n]);
    dest[n..].fill(0);
}

fn field_str(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_under_deploy_payload_budget() {
        assert!(Service::SIZE <= 920);
    }

    #[test]
    fn round_trips_fields() {
        let svc = Service::new(42, "nginx", "github:nixos/nixpkgs#nginx", "nginx");
        assert_eq!(svc.id(), 42);
        assert_eq!(svc.name(), "nginx");
        assert_eq!(svc.flake_uri(), "github:nixos/nixpkgs#nginx");
        assert_eq!(svc.exec_name(), "nginx");
    }

    #[test]
    fn truncates_overlong_fields() {
        let long_name = "x".repeat(200);
        let svc = Service::new(1, &long_name, "uri", "exe");
        assert_eq!(svc.name().len(), 32);
    }
}
