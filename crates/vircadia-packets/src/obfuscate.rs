//! Payload obfuscation.
//!
//! The domain server may direct a client to scramble payload bytes with one
//! of three fixed key streams. This is obfuscation, not encryption: a
//! cyclic XOR whose only purpose is to keep payloads from being trivially
//! greppable on the wire.
//!
//! Because XOR is self-inverse, moving a payload from level `a` to level
//! `b` is a single pass with the combined key stream `key(a) ^ key(b)`;
//! level 0 contributes nothing. Transitions are lossless in every
//! direction.

use crate::header::ObfuscationLevel;

/// Fixed 8-byte keys for levels 1 through 3.
const KEYS: [u64; 3] = [
    0x4E58_D7B0_1F2A_96C3,
    0x9C83_F1E0_42A5_6B7D,
    0x71D3_0A5B_E894_2CF6,
];

fn key_bytes(level: ObfuscationLevel) -> [u8; 8] {
    match level {
        ObfuscationLevel::None => [0u8; 8],
        ObfuscationLevel::Level1 => KEYS[0].to_be_bytes(),
        ObfuscationLevel::Level2 => KEYS[1].to_be_bytes(),
        ObfuscationLevel::Level3 => KEYS[2].to_be_bytes(),
    }
}

/// Re-scramble `payload` in place from `current` to `target` level.
///
/// The key stream starts at the first payload byte regardless of where the
/// payload sits in the packet, so partial-buffer calls must always pass the
/// full payload slice.
pub fn transcode(payload: &mut [u8], current: ObfuscationLevel, target: ObfuscationLevel) {
    if current == target {
        return;
    }
    let from = key_bytes(current);
    let to = key_bytes(target);
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= from[i % 8] ^ to[i % 8];
    }
}
