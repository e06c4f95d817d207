//! World state and the temporary validation view

use ordo_crypto::PublicKey;
use ordo_types::{AccountId, AssetId, Command, CommandError, Peer, Transaction};
use std::collections::HashMap;

/// An account as the world state sees it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    /// Registered signing keys
    pub public_keys: Vec<PublicKey>,
    /// Signature quorum required from this account
    pub quorum: u8,
}

/// The materialized ledger state: accounts, asset balances and the peer set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: HashMap<AccountId, AccountRecord>,
    balances: HashMap<(AccountId, AssetId), u128>,
    peers: Vec<Peer>,
}

impl WorldState {
    /// Empty world state
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an account
    pub fn account(&self, id: &AccountId) -> Option<&AccountRecord> {
        self.accounts.get(id)
    }

    /// Asset balance of an account; absent means zero
    pub fn balance(&self, account: &AccountId, asset: &AssetId) -> u128 {
        self.balances
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Current peer set
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Admit a peer directly; rejects duplicate keys
    pub fn add_peer(&mut self, peer: Peer) -> Result<(), String> {
        if self.peers.iter().any(|p| p.public_key == peer.public_key) {
            return Err(format!("peer {} already registered", peer.public_key.short()));
        }
        self.peers.push(peer);
        Ok(())
    }

    fn apply_command(&mut self, command: &Command, index: u32) -> Result<(), CommandError> {
        match command {
            Command::CreateAccount {
                account_id,
                public_key,
            } => {
                if self.accounts.contains_key(account_id) {
                    return Err(CommandError::new(
                        command,
                        index,
                        format!("account {} already exists", account_id),
                    ));
                }
                self.accounts.insert(
                    account_id.clone(),
                    AccountRecord {
                        public_keys: vec![*public_key],
                        quorum: 1,
                    },
                );
                Ok(())
            }
            Command::AddAsset {
                account_id,
                asset_id,
                amount,
            } => {
                if !self.accounts.contains_key(account_id) {
                    return Err(CommandError::new(
                        command,
                        index,
                        format!("account {} not found", account_id),
                    ));
                }
                let balance = self
                    .balances
                    .entry((account_id.clone(), asset_id.clone()))
                    .or_insert(0);
                *balance = balance.checked_add(*amount).ok_or_else(|| {
                    CommandError::new(command, index, "balance overflow")
                })?;
                Ok(())
            }
            Command::TransferAsset {
                src,
                dest,
                asset_id,
                amount,
            } => {
                if !self.accounts.contains_key(src) {
                    return Err(CommandError::new(
                        command,
                        index,
                        format!("account {} not found", src),
                    ));
                }
                if !self.accounts.contains_key(dest) {
                    return Err(CommandError::new(
                        command,
                        index,
                        format!("account {} not found", dest),
                    ));
                }
                let src_balance = self.balance(src, asset_id);
                if src_balance < *amount {
                    return Err(CommandError::new(
                        command,
                        index,
                        format!("insufficient balance: {} < {}", src_balance, amount),
                    ));
                }
                self.balances
                    .insert((src.clone(), asset_id.clone()), src_balance - amount);
                let dest_balance = self
                    .balances
                    .entry((dest.clone(), asset_id.clone()))
                    .or_insert(0);
                *dest_balance = dest_balance.checked_add(*amount).ok_or_else(|| {
                    CommandError::new(command, index, "balance overflow")
                })?;
                Ok(())
            }
            Command::AddPeer { peer } => self
                .add_peer(peer.clone())
                .map_err(|reason| CommandError::new(command, index, reason)),
            Command::SetAccountQuorum { account_id, quorum } => {
                if *quorum == 0 {
                    return Err(CommandError::new(command, index, "quorum must be positive"));
                }
                match self.accounts.get_mut(account_id) {
                    Some(account) => {
                        account.quorum = *quorum;
                        Ok(())
                    }
                    None => Err(CommandError::new(
                        command,
                        index,
                        format!("account {} not found", account_id),
                    )),
                }
            }
        }
    }

    /// Apply a transaction atomically: all commands succeed or none take
    /// effect. The error of the first failing command is returned.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), CommandError> {
        let backup = self.clone();
        for (index, command) in tx.payload.commands.iter().enumerate() {
            if let Err(err) = self.apply_command(command, index as u32) {
                *self = backup;
                return Err(err);
            }
        }
        Ok(())
    }
}

/// A throwaway world-state view.
///
/// Owns a private copy of the world state taken at creation; every mutation
/// stays inside the view and vanishes when it is dropped. Never shared
/// across tasks.
#[derive(Debug)]
pub struct TemporaryWsv {
    state: WorldState,
}

impl TemporaryWsv {
    /// Snapshot the given world state into a view
    pub fn new(state: WorldState) -> Self {
        Self { state }
    }

    /// Apply a transaction against the view
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), CommandError> {
        self.state.apply_transaction(tx)
    }

    /// Read access to the staged state
    pub fn state(&self) -> &WorldState {
        &self.state
    }
}
