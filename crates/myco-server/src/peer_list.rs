//! Peer list file (spec §6 "Persisted state"): a line-oriented text file
//! mapping `hex(public_key) node_id ip:port`, one peer per line. Blank
//! lines and lines starting with `#` are ignored.

use std::{net::SocketAddr, path::Path};

use myco_core::Peer;
use thiserror::Error;

/// Failures parsing a peer list file.
#[derive(Debug, Error)]
pub enum PeerListError {
    /// The file could not be read.
    #[error("failed to read peer list {path}: {source}")]
    Io {
        /// The file path.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A non-blank, non-comment line did not have exactly three fields.
    #[error("peer list line {line}: expected `<hex pubkey> <node_id> <ip:port>`, got {content:?}")]
    MalformedLine {
        /// 1-indexed line number.
        line: usize,
        /// The offending line's content.
        content: String,
    },

    /// A public key field was not 64 hex characters.
    #[error("peer list line {line}: invalid public key: {reason}")]
    InvalidPublicKey {
        /// 1-indexed line number.
        line: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// A `node_id` field did not parse as `u16`.
    #[error("peer list line {line}: invalid node_id: {reason}")]
    InvalidNodeId {
        /// 1-indexed line number.
        line: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// An `ip:port` field did not parse as a socket address.
    #[error("peer list line {line}: invalid address: {reason}")]
    InvalidAddress {
        /// 1-indexed line number.
        line: usize,
        /// Why it was rejected.
        reason: String,
    },
}

/// Parse a peer list file into a `Vec<Peer>`.
///
/// # Errors
///
/// See [`PeerListError`] variants.
pub fn load(path: &Path) -> Result<Vec<Peer>, PeerListError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| PeerListError::Io { path: path.to_path_buf(), source })?;
    parse(&text)
}

/// Parse peer list text directly (used by tests and [`load`]).
///
/// # Errors
///
/// See [`PeerListError`] variants.
pub fn parse(text: &str) -> Result<Vec<Peer>, PeerListError> {
    let mut peers = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let (Some(hex_pubkey), Some(node_id_raw), Some(addr_raw), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(PeerListError::MalformedLine { line, content: trimmed.to_string() });
        };

        let key_bytes = hex::decode(hex_pubkey)
            .map_err(|e| PeerListError::InvalidPublicKey { line, reason: format!("{e}") })?;
        let public_key: [u8; 32] = key_bytes
            .try_into()
            .map_err(|v: Vec<u8>| PeerListError::InvalidPublicKey { line, reason: format!("expected 32 bytes, got {}", v.len()) })?;

        let node_id: u16 = node_id_raw
            .parse()
            .map_err(|e| PeerListError::InvalidNodeId { line, reason: format!("{e}") })?;

        let addr: SocketAddr = addr_raw
            .parse()
            .map_err(|e| PeerListError::InvalidAddress { line, reason: format!("{e}") })?;

        peers.push(Peer { public_key, node_id, addr });
    }
    Ok(peers)
}

/// Render a peer list back to text, e.g. to persist a runtime-learned
/// peer table.
#[must_use]
pub fn render(peers: &[Peer]) -> String {
    let mut out = String::new();
    for peer in peers {
        out.push_str(&hex::encode(peer.public_key));
        out.push(' ');
        out.push_str(&peer.node_id.to_string());
        out.push(' ');
        out.push_str(&peer.addr.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_lines_and_skips_comments_and_blanks() {
        let text = format!(
            "# comment\n\n{} 2 127.0.0.1:9000\n{} 3 10.0.0.5:9001\n",
            hex::encode([2u8; 32]),
            hex::encode([3u8; 32]),
        );
        let peers = parse(&text).unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].node_id, 2);
        assert_eq!(peers[1].public_key, [3u8; 32]);
    }

    #[test]
    fn rejects_short_public_key() {
        let text = "aabbcc 1 127.0.0.1:9000\n";
        assert!(matches!(parse(text), Err(PeerListError::InvalidPublicKey { .. })));
    }

    #[test]
    fn rejects_malformed_line_with_wrong_field_count() {
        let text = format!("{} 1\n", hex::encode([1u8; 32]));
        assert!(matches!(parse(&text), Err(PeerListError::MalformedLine { .. })));
    }

    #[test]
    fn render_then_parse_round_trips() {
        let peers =
            vec![Peer { public_key: [9u8; 32], node_id: 5, addr: "127.0.0.1:1234".parse().unwrap() }];
        let text = render(&peers);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].node_id, 5);
    }
}
