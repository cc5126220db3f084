//! Encrypted vault storage. Ciphertext is opaque to the server: entries and
//! file attachments arrive as byte maps, are stored hex-encoded, and return
//! unchanged. Every operation is scoped to the authenticated owner.

pub mod entries;
pub mod files;
pub mod types;

mod storage;
