//! Wire (de)serialization for transparent inputs, outputs, and outpoints.

use std::io::{self, Read};

use crate::{
    block,
    cached::Cached,
    compactint::CompactInt,
    serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError},
};

use super::{CoinbaseData, Input, OutPoint, Script};

/// `OutPoint`s for coinbase inputs are a null txid with this sentinel index.
const COINBASE_INDEX: u32 = 0xffff_ffff;

impl BitcoinDeserialize for OutPoint {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(OutPoint {
            hash: crate::transaction::Hash::bitcoin_deserialize(&mut reader)?,
            index: u32::bitcoin_deserialize(&mut reader)?,
        })
    }
}

impl BitcoinSerialize for Input {
    fn bitcoin_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        match self {
            Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            } => {
                outpoint.bitcoin_serialize(&mut writer)?;
                unlock_script.bitcoin_serialize(&mut writer)?;
                sequence.bitcoin_serialize(&mut writer)
            }
            Input::Coinbase {
                data, sequence, ..
            } => {
                OutPoint {
                    hash: crate::transaction::Hash([0; 32]),
                    index: COINBASE_INDEX,
                }
                .bitcoin_serialize(&mut writer)?;
                data.bitcoin_serialize(&mut writer)?;
                sequence.bitcoin_serialize(&mut writer)
            }
        }
    }
}

impl BitcoinDeserialize for Input {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let outpoint = OutPoint::bitcoin_deserialize(&mut reader)?;
        if outpoint.hash.0 == [0; 32] && outpoint.index == COINBASE_INDEX {
            let len = CompactInt::bitcoin_deserialize(&mut reader)?.value();
            let mut bytes = Vec::new();
            (&mut reader).take(len).read_to_end(&mut bytes)?;
            let height = parse_bip34_height(&bytes).map(|h| Cached::from(block::Height(h)));
            Ok(Input::Coinbase {
                height,
                data: CoinbaseData(bytes),
                sequence: u32::bitcoin_deserialize(&mut reader)?,
            })
        } else {
            Ok(Input::PrevOut {
                outpoint,
                unlock_script: Script::bitcoin_deserialize(&mut reader)?,
                sequence: u32::bitcoin_deserialize(&mut reader)?,
            })
        }
    }
}

/// Parses the BIP 34 block height pushed at the start of a coinbase script,
/// if the first byte is a valid minimal-push opcode for a 1-4 byte integer.
fn parse_bip34_height(data: &[u8]) -> Option<u32> {
    let push_len = *data.first()? as usize;
    if push_len == 0 || push_len > 4 || data.len() < 1 + push_len {
        return None;
    }
    let mut bytes = [0u8; 4];
    bytes[..push_len].copy_from_slice(&data[1..1 + push_len]);
    Some(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coinbase_input_round_trips() {
        let input = Input::Coinbase {
            height: None,
            data: CoinbaseData(vec![0x03, 0x4a, 0x17, 0x09]),
            sequence: 0xffff_ffff,
        };
        let bytes = input.bitcoin_serialize_to_vec().unwrap();
        let decoded = Input::bitcoin_deserialize(&bytes[..]).unwrap();
        match decoded {
            Input::Coinbase { height, .. } => {
                assert_eq!(height.and_then(|h| h.value()), Some(block::Height(0x09174a)))
            }
            _ => panic!("expected coinbase input"),
        }
    }

    #[test]
    fn prevout_input_round_trips() {
        let input = Input::PrevOut {
            outpoint: OutPoint {
                hash: crate::transaction::Hash([7; 32]),
                index: 3,
            },
            unlock_script: Script(vec![0xab, 0xcd]),
            sequence: 1,
        };
        let bytes = input.bitcoin_serialize_to_vec().unwrap();
        let decoded = Input::bitcoin_deserialize(&bytes[..]).unwrap();
        assert!(matches!(decoded, Input::PrevOut { .. }));
    }
}
