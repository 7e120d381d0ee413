//! Parses signed checkpoint bundles and answers "what's the latest
//! checkpoint no later than this time" — the question the chain engine asks
//! once at startup to seed a store without downloading the whole history.

use std::convert::TryInto;

use chrono::{DateTime, Duration, Utc};
use secp256k1::{Message, PublicKey, Secp256k1, Signature};
use sha2::{Digest, Sha256};

use ltc_chain::block::StoredBlock;

use crate::error::CheckpointError;
use crate::store::BlockStore;

const BINARY_MAGIC: &[u8] = b"CHECKPOINTS 1";
const TEXT_MAGIC: &str = "TXT CHECKPOINTS 1";
const MAX_SIGNATURES: u32 = 256;
const SIGNATURE_LEN: usize = 65;
const SEED_CLOCK_DRIFT: i64 = 7;

/// A parsed, signature-verified checkpoint bundle.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    checkpoints: Vec<StoredBlock>,
}

impl CheckpointManager {
    /// Parses `bytes` as a binary bundle and verifies that at least one
    /// embedded signature recovers to a key in `trusted_keys`.
    pub fn from_binary(bytes: &[u8], trusted_keys: &[PublicKey]) -> Result<Self, CheckpointError> {
        if bytes.len() < BINARY_MAGIC.len() || &bytes[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            return Err(CheckpointError::BadMagic);
        }
        let mut cursor = BINARY_MAGIC.len();

        let num_signatures = read_u32_be(bytes, &mut cursor)?;
        if num_signatures > MAX_SIGNATURES {
            return Err(CheckpointError::TooManySignatures(num_signatures));
        }

        let mut signatures = Vec::with_capacity(num_signatures as usize);
        for _ in 0..num_signatures {
            let sig_bytes = read_exact(bytes, &mut cursor, SIGNATURE_LEN)?;
            signatures.push(sig_bytes.to_vec());
        }

        let signed_region_start = cursor;
        let num_checkpoints = read_u32_be(bytes, &mut cursor)?;
        if num_checkpoints == 0 {
            return Err(CheckpointError::NoCheckpoints);
        }

        let records_start = cursor;
        let records_len = num_checkpoints as usize * StoredBlock::COMPACT_LEN;
        let records = read_exact(bytes, &mut cursor, records_len)?;

        let digest = Sha256::digest(&bytes[signed_region_start..records_start + records_len]);
        verify_any_signature(&digest, &signatures, trusted_keys)?;

        let checkpoints = decode_records(records, num_checkpoints)?;
        Ok(CheckpointManager { checkpoints })
    }

    /// Parses the textual variant: the same content, base64- and
    /// line-encoded. Its hash is computed over `BE(numCheckpoints) ||
    /// concat(records)`, matching the binary format's hash exactly.
    pub fn from_text(text: &str, trusted_keys: &[PublicKey]) -> Result<Self, CheckpointError> {
        let mut lines = text.lines();
        let magic = lines
            .next()
            .ok_or(CheckpointError::Malformed("empty bundle"))?;
        if magic != TEXT_MAGIC {
            return Err(CheckpointError::BadMagic);
        }

        let num_signatures: u32 = lines
            .next()
            .ok_or(CheckpointError::Malformed("missing signature count"))?
            .trim()
            .parse()
            .map_err(|_| CheckpointError::Malformed("signature count is not a number"))?;
        if num_signatures > MAX_SIGNATURES {
            return Err(CheckpointError::TooManySignatures(num_signatures));
        }

        let mut signatures = Vec::with_capacity(num_signatures as usize);
        for _ in 0..num_signatures {
            let line = lines
                .next()
                .ok_or(CheckpointError::Malformed("missing signature line"))?;
            let bytes = base64::decode(line.trim())
                .map_err(|_| CheckpointError::Malformed("signature is not valid base64"))?;
            if bytes.len() != SIGNATURE_LEN {
                return Err(CheckpointError::Malformed("signature has the wrong length"));
            }
            signatures.push(bytes);
        }

        let num_checkpoints: u32 = lines
            .next()
            .ok_or(CheckpointError::Malformed("missing checkpoint count"))?
            .trim()
            .parse()
            .map_err(|_| CheckpointError::Malformed("checkpoint count is not a number"))?;
        if num_checkpoints == 0 {
            return Err(CheckpointError::NoCheckpoints);
        }

        let mut records = Vec::with_capacity(num_checkpoints as usize * StoredBlock::COMPACT_LEN);
        for _ in 0..num_checkpoints {
            let line = lines
                .next()
                .ok_or(CheckpointError::Malformed("missing checkpoint line"))?;
            let bytes = base64::decode(line.trim())
                .map_err(|_| CheckpointError::Malformed("checkpoint is not valid base64"))?;
            if bytes.len() != StoredBlock::COMPACT_LEN {
                return Err(CheckpointError::Malformed("checkpoint has the wrong length"));
            }
            records.extend_from_slice(&bytes);
        }

        let mut signed_region = Vec::with_capacity(4 + records.len());
        signed_region.extend_from_slice(&num_checkpoints.to_be_bytes());
        signed_region.extend_from_slice(&records);
        let digest = Sha256::digest(&signed_region);
        verify_any_signature(&digest, &signatures, trusted_keys)?;

        let checkpoints = decode_records(&records, num_checkpoints)?;
        Ok(CheckpointManager { checkpoints })
    }

    /// The latest checkpoint with `header.time <= time`, falling back to the
    /// earliest (genesis) checkpoint if none qualifies.
    pub fn checkpoint_before(&self, time: DateTime<Utc>) -> StoredBlock {
        self.checkpoints
            .iter()
            .rev()
            .find(|c| c.header.time <= time)
            .copied()
            .unwrap_or(self.checkpoints[0])
    }

    /// `[predecessor, latest]` for the checkpoint returned by
    /// [`Self::checkpoint_before`] — both are needed to seed a store usable
    /// for the next difficulty retarget, which looks back a full interval.
    pub fn checkpoints_before(&self, time: DateTime<Utc>) -> Vec<StoredBlock> {
        let latest = self.checkpoint_before(time);
        match self
            .checkpoints
            .iter()
            .position(|c| c.hash() == latest.hash())
        {
            Some(0) | None => vec![latest],
            Some(i) => vec![self.checkpoints[i - 1], latest],
        }
    }

    /// Inserts the checkpoints at or before `time - 7 days` into `store` and
    /// repoints the head at the latest of them. The subtraction tolerates
    /// clock drift between the bundle author and this client.
    pub fn seed_store(
        &self,
        store: &dyn BlockStore,
        time: DateTime<Utc>,
    ) -> Result<(), CheckpointError> {
        let drifted = time - Duration::days(SEED_CLOCK_DRIFT);
        let selected = self.checkpoints_before(drifted);
        for checkpoint in &selected {
            store.put(*checkpoint)?;
        }
        let head = *selected.last().expect("checkpoints_before never empty");
        store.set_chain_head(head)?;
        Ok(())
    }
}

fn verify_any_signature(
    digest: &[u8],
    signatures: &[Vec<u8>],
    trusted_keys: &[PublicKey],
) -> Result<(), CheckpointError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_slice(digest).expect("sha256 digest is 32 bytes");

    for sig_bytes in signatures {
        // The last byte is a recovery id in some checkpoint-signing schemes;
        // here every key is checked directly against the compact signature.
        let sig = match Signature::from_compact(&sig_bytes[..64]) {
            Ok(sig) => sig,
            Err(_) => continue,
        };
        if trusted_keys
            .iter()
            .any(|key| secp.verify(&message, &sig, key).is_ok())
        {
            return Ok(());
        }
    }
    Err(CheckpointError::BadSignature)
}

fn decode_records(bytes: &[u8], count: u32) -> Result<Vec<StoredBlock>, CheckpointError> {
    let mut checkpoints = Vec::with_capacity(count as usize);
    for chunk in bytes.chunks_exact(StoredBlock::COMPACT_LEN) {
        let array: [u8; StoredBlock::COMPACT_LEN] = chunk
            .try_into()
            .expect("chunks_exact yields slices of COMPACT_LEN");
        let stored = StoredBlock::from_compact_bytes(&array)
            .map_err(|_| CheckpointError::Malformed("bad compact checkpoint record"))?;
        checkpoints.push(stored);
    }
    checkpoints.sort_by_key(|c| c.height.0);
    Ok(checkpoints)
}

fn read_u32_be(bytes: &[u8], cursor: &mut usize) -> Result<u32, CheckpointError> {
    let slice = read_exact(bytes, cursor, 4)?;
    Ok(u32::from_be_bytes(slice.try_into().expect("length checked above")))
}

fn read_exact<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
) -> Result<&'a [u8], CheckpointError> {
    let end = cursor
        .checked_add(len)
        .ok_or(CheckpointError::Malformed("length overflow"))?;
    if end > bytes.len() {
        return Err(CheckpointError::Malformed("bundle truncated"));
    }
    let slice = &bytes[*cursor..end];
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlockStore;
    use chrono::TimeZone;
    use ltc_chain::block::{merkle, Hash, Header, Height};
    use ltc_chain::work::difficulty::CompactDifficulty;
    use secp256k1::SecretKey;

    fn block_at(height: u32, time: i64) -> StoredBlock {
        let header = Header::new(
            1,
            Hash([0; 32]),
            merkle::Root([0; 32]),
            Utc.timestamp(time, 0),
            CompactDifficulty(0x1e0ffff0),
            height,
        );
        StoredBlock {
            header,
            chain_work: CompactDifficulty(0x1e0ffff0).to_expanded().unwrap().to_work(),
            height: Height(height),
        }
    }

    fn sign_bundle(digest: &[u8], key: &SecretKey) -> Vec<u8> {
        let secp = Secp256k1::signing_only();
        let message = Message::from_slice(digest).unwrap();
        let sig = secp.sign(&message, key);
        let mut out = sig.serialize_compact().to_vec();
        out.push(0);
        out
    }

    fn build_binary_bundle(checkpoints: &[StoredBlock], key: &SecretKey) -> Vec<u8> {
        let mut records = Vec::new();
        for checkpoint in checkpoints {
            records.extend_from_slice(&checkpoint.to_compact_bytes());
        }
        let mut signed_region = Vec::new();
        signed_region.extend_from_slice(&(checkpoints.len() as u32).to_be_bytes());
        signed_region.extend_from_slice(&records);
        let digest = Sha256::digest(&signed_region);
        let signature = sign_bundle(&digest, key);

        let mut bundle = Vec::new();
        bundle.extend_from_slice(BINARY_MAGIC);
        bundle.extend_from_slice(&1u32.to_be_bytes());
        bundle.extend_from_slice(&signature);
        bundle.extend_from_slice(&signed_region);
        bundle
    }

    #[test]
    fn binary_bundle_round_trips_and_verifies() {
        let secp = Secp256k1::new();
        let key = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &key);

        let checkpoints = vec![block_at(0, 1_317_972_665), block_at(1000, 1_350_000_000)];
        let bundle = build_binary_bundle(&checkpoints, &key);

        let manager = CheckpointManager::from_binary(&bundle, &[public_key]).unwrap();
        let latest = manager.checkpoint_before(Utc.timestamp(1_400_000_000, 0));
        assert_eq!(latest.height, Height(1000));
    }

    #[test]
    fn binary_bundle_rejects_untrusted_key() {
        let secp = Secp256k1::new();
        let key = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let other_key = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let other_public = PublicKey::from_secret_key(&secp, &other_key);

        let checkpoints = vec![block_at(0, 1_317_972_665)];
        let bundle = build_binary_bundle(&checkpoints, &key);

        let result = CheckpointManager::from_binary(&bundle, &[other_public]);
        assert!(matches!(result, Err(CheckpointError::BadSignature)));
    }

    #[test]
    fn seed_store_applies_clock_drift_and_sets_head() {
        let secp = Secp256k1::new();
        let key = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &key);

        let checkpoints = vec![block_at(0, 1_317_972_665), block_at(1000, 1_350_000_000)];
        let bundle = build_binary_bundle(&checkpoints, &key);
        let manager = CheckpointManager::from_binary(&bundle, &[public_key]).unwrap();

        let store = MemoryBlockStore::new(checkpoints[0]);
        manager
            .seed_store(&store, Utc.timestamp(1_350_000_000 + 8 * 86400, 0))
            .unwrap();
        assert_eq!(store.chain_head().unwrap().height, Height(1000));
    }
}
