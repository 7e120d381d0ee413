//! Double-SHA256, the hash function used for header hashes, txids, and checksums.

use sha2::{Digest, Sha256};

/// An `io::Write` sink that accumulates a double-SHA256 digest of everything
/// written to it, so callers can hash a serialized value without buffering it.
#[derive(Default)]
pub struct Writer(Sha256);

impl Writer {
    /// Finish hashing and return the 32-byte digest.
    pub fn finish(self) -> [u8; 32] {
        let first = self.0.finalize();
        let second = Sha256::digest(&first[..]);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second[..]);
        out
    }
}

impl std::io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Double-SHA256 of `data` in one shot.
pub fn checksum(data: &[u8]) -> [u8; 32] {
    let mut w = Writer::default();
    std::io::Write::write_all(&mut w, data).expect("writing to a Writer is infallible");
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_distinct() {
        let a = checksum(b"hello");
        let b = checksum(b"hello");
        let c = checksum(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn writer_matches_one_shot() {
        let mut w = Writer::default();
        std::io::Write::write_all(&mut w, b"litecoin").unwrap();
        assert_eq!(w.finish(), checksum(b"litecoin"));
    }
}
