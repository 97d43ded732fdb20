//! BIP122 block URIs used as deployment keys:
//! `blockchain://<genesis hash>/block/<block hash>`.

use std::fmt;
use std::str::FromStr;

use alloy::hex;
use alloy::primitives::B256;
use error_stack::Report;

use crate::errors::{ManifestError, ManifestResult};

pub const BLOCK_URI_SCHEME: &str = "blockchain";
pub const BLOCK_RESOURCE: &str = "block";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockUri {
    pub chain_id: B256,
    pub block_hash: B256,
}

impl BlockUri {
    pub fn new(chain_id: B256, block_hash: B256) -> Self {
        Self { chain_id, block_hash }
    }

    pub fn parse(uri: &str) -> ManifestResult<Self> {
        let invalid = || Report::new(ManifestError::InvalidBlockUri(uri.to_string()));

        let rest = uri
            .strip_prefix(BLOCK_URI_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(invalid)?;
        let mut parts = rest.split('/');
        let (Some(chain_id), Some(resource), Some(block_hash), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if resource != BLOCK_RESOURCE {
            return Err(invalid());
        }

        Ok(Self {
            chain_id: parse_hash(chain_id).ok_or_else(invalid)?,
            block_hash: parse_hash(block_hash).ok_or_else(invalid)?,
        })
    }

    /// Whether this uri points into the chain with the given genesis hash.
    pub fn is_on_chain(&self, genesis_hash: &B256) -> bool {
        &self.chain_id == genesis_hash
    }
}

impl fmt::Display for BlockUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}/{}",
            BLOCK_URI_SCHEME,
            hex::encode(self.chain_id),
            BLOCK_RESOURCE,
            hex::encode(self.block_hash)
        )
    }
}

impl FromStr for BlockUri {
    type Err = Report<ManifestError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockUri::parse(s)
    }
}

pub fn create_block_uri(chain_id: B256, block_hash: B256) -> String {
    BlockUri::new(chain_id, block_hash).to_string()
}

pub fn is_block_uri(uri: &str) -> bool {
    BlockUri::parse(uri).is_ok()
}

fn parse_hash(value: &str) -> Option<B256> {
    if value.len() != 64 {
        return None;
    }
    let bytes = hex::decode(value).ok()?;
    Some(B256::from_slice(&bytes))
}
