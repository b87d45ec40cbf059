//! Write-ahead log: append-only `{crc32, id, version}` entries plus a
//! CRC-authenticated snapshot buffer. Corruption truncates; the WAL never
//! raises on bad data, it logs and stops.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::WalError;

/// One WAL entry: `crc32` over the 16 `(id, version)` bytes that follow.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C, packed)]
struct WalEntry {
    crc32: [u8; 4],
    id: [u8; 8],
    version: [u8; 8],
}

impl WalEntry {
    const SIZE: usize = core::mem::size_of::<Self>();

    fn new(id: u64, version: u64) -> Self {
        let id_bytes = id.to_le_bytes();
        let version_bytes = version.to_le_bytes();
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&id_bytes);
        hasher.update(&version_bytes);
        Self { crc32: hasher.finalize().to_le_bytes(), id: id_bytes, version: version_bytes }
    }

    fn crc_valid(&self) -> bool {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.id);
        hasher.update(&self.version);
        hasher.finalize() == u32::from_le_bytes(self.crc32)
    }

    fn is_zeroed(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }
}

/// `{magic, data_len, crc32}` header preceding a snapshot payload.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone, Copy)]
#[repr(C, packed)]
struct SnapshotHeader {
    magic: [u8; 4],
    data_len: [u8; 4],
    crc32: [u8; 4],
}

impl SnapshotHeader {
    const SIZE: usize = core::mem::size_of::<Self>();
    const MAGIC: u32 = 0x4D59_534E;

    fn new(data: &[u8]) -> Self {
        Self {
            magic: Self::MAGIC.to_le_bytes(),
            data_len: (data.len() as u32).to_le_bytes(),
            crc32: crc32fast::hash(data).to_le_bytes(),
        }
    }

    fn magic_valid(&self) -> bool {
        u32::from_le_bytes(self.magic) == Self::MAGIC
    }

    fn data_len(&self) -> usize {
        u32::from_le_bytes(self.data_len) as usize
    }

    fn crc(&self) -> u32 {
        u32::from_le_bytes(self.crc32)
    }
}

/// Append-only log buffer + snapshot buffer, both fixed-size and
/// allocation-free after construction.
pub struct Wal {
    log: Vec<u8>,
    log_cursor: usize,
    snapshot: Vec<u8>,
}

impl Wal {
    /// Build a WAL with fixed-size in-memory log and snapshot buffers.
    #[must_use]
    pub fn new(log_capacity: usize, snapshot_capacity: usize) -> Self {
        Self { log: vec![0u8; log_capacity], log_cursor: 0, snapshot: vec![0u8; snapshot_capacity] }
    }

    /// Append a `(id, version)` entry.
    ///
    /// # Errors
    ///
    /// [`WalError::LogFull`] if the log buffer cannot hold another entry.
    pub fn append(&mut self, id: u64, version: u64) -> Result<(), WalError> {
        if self.log_cursor + WalEntry::SIZE > self.log.len() {
            return Err(WalError::LogFull);
        }
        let entry = WalEntry::new(id, version);
        self.log[self.log_cursor..self.log_cursor + WalEntry::SIZE].copy_from_slice(entry.as_bytes());
        self.log_cursor += WalEntry::SIZE;
        Ok(())
    }

    /// Write a snapshot header + `snapshot_bytes` to the snapshot buffer
    /// and reset the log cursor to zero.
    ///
    /// # Errors
    ///
    /// [`WalError::SnapshotFull`] if `snapshot_bytes` (plus header) does
    /// not fit.
    pub fn compact(&mut self, snapshot_bytes: &[u8]) -> Result<(), WalError> {
        if SnapshotHeader::SIZE + snapshot_bytes.len() > self.snapshot.len() {
            return Err(WalError::SnapshotFull);
        }
        let header = SnapshotHeader::new(snapshot_bytes);
        self.snapshot[..SnapshotHeader::SIZE].copy_from_slice(header.as_bytes());
        self.snapshot[SnapshotHeader::SIZE..SnapshotHeader::SIZE + snapshot_bytes.len()]
            .copy_from_slice(snapshot_bytes);
        self.log.fill(0);
        self.log_cursor = 0;
        Ok(())
    }

    /// Best-effort compaction used when the log is full: build the
    /// snapshot from `snapshot_bytes` and reset the cursor. If this also
    /// fails the caller should treat it as [`WalError::Fatal`].
    pub fn append_with_compaction(
        &mut self,
        id: u64,
        version: u64,
        snapshot_bytes: impl FnOnce() -> Vec<u8>,
    ) -> Result<(), WalError> {
        match self.append(id, version) {
            Ok(()) => Ok(()),
            Err(WalError::LogFull) => {
                self.compact(&snapshot_bytes()).map_err(|_| WalError::Fatal)?;
                self.append(id, version).map_err(|_| WalError::Fatal)
            },
            Err(other) => Err(other),
        }
    }

    /// Replay the WAL: if the snapshot header is valid, hand its payload
    /// to `load_snapshot`; then scan the log, handing every CRC-valid
    /// entry to `load_entry` in order, stopping at the first zeroed or
    /// CRC-invalid record.
    pub fn recover(
        &mut self,
        mut load_entry: impl FnMut(u64, u64),
        mut load_snapshot: impl FnMut(&[u8]),
    ) {
        if self.snapshot.len() >= SnapshotHeader::SIZE {
            if let Ok((header, _)) = SnapshotHeader::ref_from_prefix(&self.snapshot) {
                let header = *header;
                if header.magic_valid() {
                    let len = header.data_len();
                    let end = SnapshotHeader::SIZE + len;
                    if end <= self.snapshot.len() {
                        let data = &self.snapshot[SnapshotHeader::SIZE..end];
                        if crc32fast::hash(data) == header.crc() {
                            load_snapshot(data);
                        }
                    }
                }
            }
        }

        let mut cursor = 0usize;
        while cursor + WalEntry::SIZE <= self.log.len() {
            let slice = &self.log[cursor..cursor + WalEntry::SIZE];
            let Ok((entry, _)) = WalEntry::ref_from_prefix(slice) else { break };
            let entry = *entry;
            if entry.is_zeroed() || !entry.crc_valid() {
                break;
            }
            load_entry(u64::from_le_bytes(entry.id), u64::from_le_bytes(entry.version));
            cursor += WalEntry::SIZE;
        }
        self.log_cursor = cursor;
    }

    /// Current write position within the log buffer, in bytes.
    #[must_use]
    pub fn log_cursor(&self) -> usize {
        self.log_cursor
    }

    /// Rebuild a WAL from previously-persisted log and snapshot buffers
    /// (e.g. read off disk at startup). The caller must still call
    /// [`Wal::recover`] to replay them into application state and set the
    /// log cursor; this constructor only restores the raw bytes.
    #[must_use]
    pub fn from_parts(log: Vec<u8>, snapshot: Vec<u8>) -> Self {
        Self { log, log_cursor: 0, snapshot }
    }

    /// The log buffer's raw bytes, for a caller that persists them to disk.
    #[must_use]
    pub fn log_bytes(&self) -> &[u8] {
        &self.log
    }

    /// The snapshot buffer's raw bytes, for a caller that persists them
    /// to disk.
    #[must_use]
    pub fn snapshot_bytes(&self) -> &[u8] {
        &self.snapshot
    }
}
