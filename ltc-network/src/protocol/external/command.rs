//! The 12-byte ASCII, NUL-padded command string that identifies a message's
//! body in its header.

use std::io::Read;

use ltc_chain::serialization::{BitcoinDeserialize, SerializationError};

const fn pad(s: &str) -> [u8; 12] {
    let mut bytes = [0u8; 12];
    let s = s.as_bytes();
    let mut i = 0;
    while i < s.len() {
        bytes[i] = s[i];
        i += 1;
    }
    bytes
}

macro_rules! command_bytes {
    ($s:expr) => {{
        const BYTES: [u8; 12] = pad($s);
        &BYTES
    }};
}

/// A single 12-byte command string, represented as an enum discriminant rather
/// than a raw byte array so invalid commands can't be constructed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[allow(missing_docs)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    Reject,
    GetAddr,
    Addr,
    GetBlocks,
    Inv,
    GetHeaders,
    Headers,
    GetData,
    Block,
    Tx,
    NotFound,
    MemPool,
    FilterLoad,
    FilterAdd,
    FilterClear,
    MerkleBlock,
    CmpctBlock,
    GetBlockTxn,
    BlockTxn,
    SendCmpct,
    FeeFilter,
    SendHeaders,
    Alert,
}

impl Command {
    /// The 12-byte, NUL-padded ASCII wire representation.
    pub fn bytes(self) -> &'static [u8] {
        match self {
            Command::Version => command_bytes!("version"),
            Command::Verack => command_bytes!("verack"),
            Command::Ping => command_bytes!("ping"),
            Command::Pong => command_bytes!("pong"),
            Command::Reject => command_bytes!("reject"),
            Command::GetAddr => command_bytes!("getaddr"),
            Command::Addr => command_bytes!("addr"),
            Command::GetBlocks => command_bytes!("getblocks"),
            Command::Inv => command_bytes!("inv"),
            Command::GetHeaders => command_bytes!("getheaders"),
            Command::Headers => command_bytes!("headers"),
            Command::GetData => command_bytes!("getdata"),
            Command::Block => command_bytes!("block"),
            Command::Tx => command_bytes!("tx"),
            Command::NotFound => command_bytes!("notfound"),
            Command::MemPool => command_bytes!("mempool"),
            Command::FilterLoad => command_bytes!("filterload"),
            Command::FilterAdd => command_bytes!("filteradd"),
            Command::FilterClear => command_bytes!("filterclear"),
            Command::MerkleBlock => command_bytes!("merkleblock"),
            Command::CmpctBlock => command_bytes!("cmpctblock"),
            Command::GetBlockTxn => command_bytes!("getblocktxn"),
            Command::BlockTxn => command_bytes!("blocktxn"),
            Command::SendCmpct => command_bytes!("sendcmpct"),
            Command::FeeFilter => command_bytes!("feefilter"),
            Command::SendHeaders => command_bytes!("sendheaders"),
            Command::Alert => command_bytes!("alert"),
        }
    }
}

impl BitcoinDeserialize for Command {
    fn bitcoin_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut raw = [0u8; 12];
        reader.read_exact(&mut raw)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(12);
        match &raw[..end] {
            b"version" => Ok(Command::Version),
            b"verack" => Ok(Command::Verack),
            b"ping" => Ok(Command::Ping),
            b"pong" => Ok(Command::Pong),
            b"reject" => Ok(Command::Reject),
            b"getaddr" => Ok(Command::GetAddr),
            b"addr" => Ok(Command::Addr),
            b"getblocks" => Ok(Command::GetBlocks),
            b"inv" => Ok(Command::Inv),
            b"getheaders" => Ok(Command::GetHeaders),
            b"headers" => Ok(Command::Headers),
            b"getdata" => Ok(Command::GetData),
            b"block" => Ok(Command::Block),
            b"tx" => Ok(Command::Tx),
            b"notfound" => Ok(Command::NotFound),
            b"mempool" => Ok(Command::MemPool),
            b"filterload" => Ok(Command::FilterLoad),
            b"filteradd" => Ok(Command::FilterAdd),
            b"filterclear" => Ok(Command::FilterClear),
            b"merkleblock" => Ok(Command::MerkleBlock),
            b"cmpctblock" => Ok(Command::CmpctBlock),
            b"getblocktxn" => Ok(Command::GetBlockTxn),
            b"blocktxn" => Ok(Command::BlockTxn),
            b"sendcmpct" => Ok(Command::SendCmpct),
            b"feefilter" => Ok(Command::FeeFilter),
            b"sendheaders" => Ok(Command::SendHeaders),
            b"alert" => Ok(Command::Alert),
            _ => Err(SerializationError::Parse("unrecognized message command")),
        }
    }
}
