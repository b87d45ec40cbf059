//! Two-epoch window for zero-downtime AEAD rotation.
//!
//! Unlike a cache of derived keys, [`EpochKeys`] holds only epoch
//! *numbers*. The actual key for an inbound packet is always derived at
//! `open` time from that packet's own `sender_pubkey` field (see
//! `myco_proto::Packet::sender_pubkey`) plus the receiver's own
//! `node_id`, exactly as the sender derived it - there is no single key
//! that would match every peer a node might hear from.
pub struct EpochKeys {
    current_epoch: u32,
    previous_epoch: Option<u32>,
}

impl EpochKeys {
    /// Build a key window. `previous_epoch` is `None` once a rotation's
    /// overlap window has elapsed and the old epoch should be dropped.
    #[must_use]
    pub fn new(current_epoch: u32, previous_epoch: Option<u32>) -> Self {
        Self { current_epoch, previous_epoch }
    }

    /// Current epoch number.
    #[must_use]
    pub fn current_epoch(&self) -> u32 {
        self.current_epoch
    }

    /// Previous epoch number, if a rotation overlap window is open.
    #[must_use]
    pub fn previous_epoch(&self) -> Option<u32> {
        self.previous_epoch
    }

    /// Epochs to try, in order: current, then previous if present.
    pub(crate) fn candidates(&self) -> impl Iterator<Item = u32> {
        std::iter::once(self.current_epoch).chain(self.previous_epoch)
    }

    /// Rotate: the current epoch becomes previous, and `new_epoch`
    /// becomes current.
    pub fn rotate(&mut self, new_epoch: u32) {
        self.previous_epoch = Some(self.current_epoch);
        self.current_epoch = new_epoch;
    }

    /// Drop the previous epoch, ending its acceptance window.
    pub fn drop_previous(&mut self) {
        self.previous_epoch = None;
    }
}
