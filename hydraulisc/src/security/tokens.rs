//! Random tokens for sessions and invites.

use rand::Rng;

/// `bytes` bytes from the thread-local CSPRNG, hex encoded
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill(&mut buf[..]);
    hex::encode(buf)
}
