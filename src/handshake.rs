//! Owns the outbound probe datagram and the reply accept predicate.
//!
//! Two modes. Without key material the probe is a fixed, precomputed
//! handshake-initiation byte sequence the WARP service answers with a known
//! reply. With a private key the probe is a real Noise-IK initiation built by
//! boringtun, with the 3-byte reserved field patched afterwards. The reserved
//! field sits outside the MAC-covered region, so patching it does not break
//! the message's integrity tags.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use boringtun::noise::{Tunn, TunnResult};
use boringtun::x25519::{PublicKey, StaticSecret};
use log::debug;

use crate::input::Opts;

// Precomputed initiation bytes and the exact reply they elicit from WARP.
const HANDSHAKE_TEMPLATE_HEX: &str = "04e77a11628748824150e38f5c64b4776d82d118ed6ee00d8ede7ae82405df0c380000000000000000000000004154e7e7b6bbbb84ab8cd5e9b0f82a1c";
const VALIDATE_REPLY_HEX: &str = "cf000000628748824150e38f5c64b477";

/// Well-known WARP peer public key, used when `--public-key` is omitted.
pub const WARP_PUBLIC_KEY: &str = "bmXOC+F1FxEMF9dyiK2H5/1SUtzH0Jupp52jlJlZ0yY=";

/// Wire size of a WireGuard handshake-response message.
const HANDSHAKE_RESPONSE_SIZE: usize = 92;

/// Wire size of a WireGuard handshake-initiation message.
const HANDSHAKE_INITIATION_SIZE: usize = 148;

/// Reserved-field value applied when none is configured.
pub const DEFAULT_RESERVED: [u8; 3] = [0, 0, 0];

/// Builds the probe datagram once and validates every inbound reply.
///
/// The packet is immutable after construction and shared read-only across
/// all probe workers.
#[derive(Debug)]
pub struct HandshakeCodec {
    packet: Vec<u8>,
    custom: bool,
}

impl HandshakeCodec {
    /// Selects the construction mode from the configured key material.
    ///
    /// Fatal configuration errors: a reserved value without a private key,
    /// malformed reserved text, bad base64 or non-32-byte keys, or a failure
    /// inside the Noise-IK construction.
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let Some(private_key) = &opts.private_key else {
            if opts.reserved.is_some() {
                bail!("--reserved requires --private-key: the reserved field only exists in a custom-built handshake");
            }
            return Ok(Self {
                packet: hex::decode(HANDSHAKE_TEMPLATE_HEX).expect("static template is valid hex"),
                custom: false,
            });
        };

        let reserved = parse_reserved(opts.reserved.as_deref().unwrap_or(""))?;
        let local = decode_key(private_key).context("invalid private key")?;
        let remote = decode_key(opts.public_key.as_deref().unwrap_or(WARP_PUBLIC_KEY))
            .context("invalid public key")?;

        let packet = build_initiation(local, remote, reserved)?;
        debug!("Built custom handshake initiation, reserved = {reserved:?}");
        Ok(Self {
            packet,
            custom: true,
        })
    }

    /// The outbound probe bytes.
    #[must_use]
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    /// Whether an inbound datagram counts as a valid handshake reply.
    ///
    /// Default mode compares the hex encoding against the known-good reply;
    /// custom mode accepts any datagram of handshake-response size. Anything
    /// else is "no reply", never an error.
    #[must_use]
    pub fn accept(&self, reply: &[u8]) -> bool {
        if self.custom {
            reply.len() == HANDSHAKE_RESPONSE_SIZE
        } else {
            hex::encode(reply) == VALIDATE_REPLY_HEX
        }
    }
}

/// Parses the textual reserved-field override, e.g. `[1,2,3]`.
///
/// The empty string decodes to the zero value. Anything that is not a JSON
/// array of exactly 3 byte values is an error.
pub fn parse_reserved(text: &str) -> Result<[u8; 3]> {
    if text.is_empty() {
        return Ok(DEFAULT_RESERVED);
    }
    let reserved: [u8; 3] = serde_json::from_str(text)
        .with_context(|| format!("reserved value {text:?} is not a 3-element byte array"))?;
    Ok(reserved)
}

/// Decodes a base64 key and insists on exactly 32 raw bytes.
fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    let raw = BASE64
        .decode(encoded)
        .with_context(|| format!("key {encoded:?} is not valid base64"))?;
    raw.try_into()
        .map_err(|raw: Vec<u8>| anyhow!("key must decode to 32 bytes, got {}", raw.len()))
}

/// Delegates the Noise-IK initiation construction to boringtun, then patches
/// the reserved field at offsets 1..4.
fn build_initiation(local: [u8; 32], remote: [u8; 32], reserved: [u8; 3]) -> Result<Vec<u8>> {
    let mut tunn = Tunn::new(
        StaticSecret::from(local),
        PublicKey::from(remote),
        None,
        None,
        0,
        None,
    )
    .map_err(|e| anyhow!("could not initialise handshake state: {e}"))?;

    let mut dst = vec![0u8; HANDSHAKE_INITIATION_SIZE];
    match tunn.format_handshake_initiation(&mut dst, false) {
        TunnResult::WriteToNetwork(packet) => {
            let mut packet = packet.to_vec();
            packet[1..4].copy_from_slice(&reserved);
            Ok(packet)
        }
        TunnResult::Err(e) => Err(anyhow!("could not build handshake initiation: {e:?}")),
        _ => Err(anyhow!("handshake construction produced nothing to send")),
    }
}
