//! Runtime configuration (spec §6 "Configuration"): loaded from `MYCO_*`
//! environment variables, with an optional TOML file overlay.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors from loading configuration. All variants are fatal at startup
/// (spec §7 Config-class).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was missing or malformed.
    #[error("environment variable {name} is missing or invalid: {reason}")]
    InvalidEnv {
        /// The variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Neither `packet_key` nor `force_plaintext` was set.
    #[error("packet_key is required unless force_plaintext is set")]
    MissingKey,

    /// The overlay file could not be read.
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        /// The file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The overlay file was not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    FileParse {
        /// The file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// A 32-byte AEAD secret, hex-encoded in the environment/TOML overlay.
fn parse_key(raw: &str, name: &'static str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(raw)
        .map_err(|e| ConfigError::InvalidEnv { name, reason: format!("not valid hex: {e}") })?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| ConfigError::InvalidEnv { name, reason: format!("expected 32 bytes, got {}", v.len()) })
}

/// Runtime configuration (spec §6 table). Every field mirrors a
/// recognized `MYCO_*` environment variable plus its TOML-overlay
/// equivalent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// This node's 32-byte identity, hex-encoded: bound into every packet's
    /// associated data as `sender_pubkey` and used as AEAD key-derivation
    /// input (spec §3). Generated once per node and distributed to peers
    /// via the peer list, the same way `packet_key` is distributed.
    pub public_key: Option<String>,
    /// Zone/shard hint advertised in outbound packets.
    pub zone_id: u8,
    /// Destination id used in AEAD key derivation and advertised in packets.
    pub node_id: u16,
    /// Datagram listen port.
    pub udp_port: u16,
    /// Directory holding the peer list and WAL buffers.
    pub state_dir: PathBuf,
    /// Current AEAD secret, 32 bytes hex-encoded. Required unless
    /// `force_plaintext` is set.
    pub packet_key: Option<String>,
    /// Current AEAD epoch.
    pub packet_epoch: u32,
    /// Previous AEAD secret to accept during a key rotation's overlap
    /// window, 32 bytes hex-encoded.
    pub packet_key_prev: Option<String>,
    /// Previous AEAD epoch, paired with `packet_key_prev`.
    pub packet_epoch_prev: Option<u32>,
    /// Optional extra secret mixed into AEAD key derivation, hex-encoded.
    pub gossip_psk: Option<String>,
    /// Accept packets that fail AEAD (diagnostic).
    pub allow_plaintext: bool,
    /// Skip AEAD entirely (diagnostic).
    pub force_plaintext: bool,
    /// Rumor-mongering replication factor.
    pub gossip_fanout: usize,
    /// Bearer token accepted by the admin surface.
    pub auth_token: Option<String>,
    /// Previous bearer token, accepted during rotation.
    pub auth_token_prev: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_key: None,
            zone_id: 0,
            node_id: 1,
            udp_port: 7946,
            state_dir: PathBuf::from("./state"),
            packet_key: None,
            packet_epoch: 1,
            packet_key_prev: None,
            packet_epoch_prev: None,
            gossip_psk: None,
            allow_plaintext: false,
            force_plaintext: false,
            gossip_fanout: 4,
            auth_token: None,
            auth_token_prev: None,
        }
    }
}

impl Config {
    /// Load configuration from `MYCO_*` environment variables, falling
    /// back to [`Config::default`] for anything unset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("MYCO_PUBLIC_KEY") {
            config.public_key = Some(v);
        }
        if let Ok(v) = std::env::var("MYCO_ZONE_ID") {
            config.zone_id = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_ZONE_ID", reason: format!("{e}") })?;
        }
        if let Ok(v) = std::env::var("MYCO_NODE_ID") {
            config.node_id = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_NODE_ID", reason: format!("{e}") })?;
        }
        if let Ok(v) = std::env::var("MYCO_UDP_PORT") {
            config.udp_port = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_UDP_PORT", reason: format!("{e}") })?;
        }
        if let Ok(v) = std::env::var("MYCO_STATE_DIR") {
            config.state_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MYCO_PACKET_KEY") {
            config.packet_key = Some(v);
        }
        if let Ok(v) = std::env::var("MYCO_PACKET_EPOCH") {
            config.packet_epoch = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_PACKET_EPOCH", reason: format!("{e}") })?;
        }
        if let Ok(v) = std::env::var("MYCO_PACKET_KEY_PREV") {
            config.packet_key_prev = Some(v);
        }
        if let Ok(v) = std::env::var("MYCO_PACKET_EPOCH_PREV") {
            config.packet_epoch_prev = Some(
                v.parse()
                    .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_PACKET_EPOCH_PREV", reason: format!("{e}") })?,
            );
        }
        if let Ok(v) = std::env::var("MYCO_GOSSIP_PSK") {
            config.gossip_psk = Some(v);
        }
        if let Ok(v) = std::env::var("MYCO_ALLOW_PLAINTEXT") {
            config.allow_plaintext = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("MYCO_FORCE_PLAINTEXT") {
            config.force_plaintext = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("MYCO_GOSSIP_FANOUT") {
            config.gossip_fanout = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnv { name: "MYCO_GOSSIP_FANOUT", reason: format!("{e}") })?;
        }
        if let Ok(v) = std::env::var("MYCO_AUTH_TOKEN") {
            config.auth_token = Some(v);
        }
        if let Ok(v) = std::env::var("MYCO_AUTH_TOKEN_PREV") {
            config.auth_token_prev = Some(v);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay fields present in a TOML file at `path` on top of `self`.
    /// Fields absent from the file keep their current value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileRead`]/[`ConfigError::FileParse`] on I/O or
    /// parse failure.
    pub fn merge_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
        let overlay: TomlOverlay =
            toml::from_str(&text).map_err(|source| ConfigError::FileParse { path: path.to_path_buf(), source })?;
        overlay.apply(&mut self);
        self.validate()?;
        Ok(self)
    }

    /// Resolve this node's identity public key as raw bytes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if set but not valid hex, or
    /// [`ConfigError::MissingKey`] if unset.
    pub fn public_key_bytes(&self) -> Result<[u8; 32], ConfigError> {
        match &self.public_key {
            Some(raw) => parse_key(raw, "public_key"),
            None => Err(ConfigError::MissingKey),
        }
    }

    /// Resolve the current AEAD key as raw bytes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if `packet_key` is set but not valid
    /// hex, or [`ConfigError::MissingKey`] if unset and plaintext isn't
    /// forced.
    pub fn packet_key_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        match &self.packet_key {
            Some(raw) => Ok(Some(parse_key(raw, "packet_key")?)),
            None if self.force_plaintext => Ok(None),
            None => Err(ConfigError::MissingKey),
        }
    }

    /// Resolve the previous-epoch AEAD key, if a rotation overlap window
    /// is configured.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if set but not valid hex.
    pub fn packet_key_prev_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        self.packet_key_prev.as_deref().map(|raw| parse_key(raw, "packet_key_prev")).transpose()
    }

    /// Resolve the optional gossip PSK as raw bytes.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if set but not valid hex.
    pub fn gossip_psk_bytes(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        self.gossip_psk
            .as_deref()
            .map(|raw| hex::decode(raw).map_err(|e| ConfigError::InvalidEnv {
                name: "gossip_psk",
                reason: format!("not valid hex: {e}"),
            }))
            .transpose()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.public_key.is_none() {
            return Err(ConfigError::MissingKey);
        }
        if !self.force_plaintext && self.packet_key.is_none() {
            return Err(ConfigError::MissingKey);
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "TRUE" | "yes" | "on")
}

/// TOML overlay schema: every field optional, applied on top of a
/// previously-built [`Config`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TomlOverlay {
    public_key: Option<String>,
    zone_id: Option<u8>,
    node_id: Option<u16>,
    udp_port: Option<u16>,
    state_dir: Option<PathBuf>,
    packet_key: Option<String>,
    packet_epoch: Option<u32>,
    packet_key_prev: Option<String>,
    packet_epoch_prev: Option<u32>,
    gossip_psk: Option<String>,
    allow_plaintext: Option<bool>,
    force_plaintext: Option<bool>,
    gossip_fanout: Option<usize>,
    auth_token: Option<String>,
    auth_token_prev: Option<String>,
}

impl TomlOverlay {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.public_key {
            config.public_key = Some(v);
        }
        if let Some(v) = self.zone_id {
            config.zone_id = v;
        }
        if let Some(v) = self.node_id {
            config.node_id = v;
        }
        if let Some(v) = self.udp_port {
            config.udp_port = v;
        }
        if let Some(v) = self.state_dir {
            config.state_dir = v;
        }
        if let Some(v) = self.packet_key {
            config.packet_key = Some(v);
        }
        if let Some(v) = self.packet_epoch {
            config.packet_epoch = v;
        }
        if let Some(v) = self.packet_key_prev {
            config.packet_key_prev = Some(v);
        }
        if let Some(v) = self.packet_epoch_prev {
            config.packet_epoch_prev = Some(v);
        }
        if let Some(v) = self.gossip_psk {
            config.gossip_psk = Some(v);
        }
        if let Some(v) = self.allow_plaintext {
            config.allow_plaintext = v;
        }
        if let Some(v) = self.force_plaintext {
            config.force_plaintext = v;
        }
        if let Some(v) = self.gossip_fanout {
            config.gossip_fanout = v;
        }
        if let Some(v) = self.auth_token {
            config.auth_token = Some(v);
        }
        if let Some(v) = self.auth_token_prev {
            config.auth_token_prev = Some(v);
        }
    }
}
