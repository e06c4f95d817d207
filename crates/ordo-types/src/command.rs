//! Ledger commands and their failure type

use crate::account::{AccountId, AssetId};
use crate::peer::Peer;
use ordo_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A state-changing instruction carried inside a transaction.
///
/// Commands are applied sequentially against a temporary world-state view;
/// the first failing command rejects the whole transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Register a new account under a domain
    CreateAccount {
        /// Identifier of the account to create
        account_id: AccountId,
        /// Signing key registered for the account
        public_key: PublicKey,
    },
    /// Mint an amount of an asset onto an account
    AddAsset {
        /// Receiving account
        account_id: AccountId,
        /// Asset to mint
        asset_id: AssetId,
        /// Amount to mint
        amount: u128,
    },
    /// Move an amount of an asset between accounts
    TransferAsset {
        /// Paying account
        src: AccountId,
        /// Receiving account
        dest: AccountId,
        /// Asset to move
        asset_id: AssetId,
        /// Amount to move
        amount: u128,
    },
    /// Admit a peer into the cluster from the next block on
    AddPeer {
        /// Peer to admit
        peer: Peer,
    },
    /// Change the signature quorum required by an account
    SetAccountQuorum {
        /// Account whose quorum changes
        account_id: AccountId,
        /// New quorum
        quorum: u8,
    },
}

impl Command {
    /// Stable command name used in errors and logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateAccount { .. } => "CreateAccount",
            Command::AddAsset { .. } => "AddAsset",
            Command::TransferAsset { .. } => "TransferAsset",
            Command::AddPeer { .. } => "AddPeer",
            Command::SetAccountQuorum { .. } => "SetAccountQuorum",
        }
    }
}

/// Failure of a single command during stateful application
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    /// Name of the failed command
    pub command: String,
    /// Zero-based position of the command inside its transaction
    pub index: u32,
    /// Human-readable failure reason
    pub reason: String,
}

impl CommandError {
    /// Create a new command error
    pub fn new(command: &Command, index: u32, reason: impl Into<String>) -> Self {
        Self {
            command: command.name().to_string(),
            index,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.command, self.index, self.reason)
    }
}
