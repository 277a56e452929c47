pub mod envelope;
pub mod handshake;
