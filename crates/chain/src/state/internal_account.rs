//! Account management
//! CRUD akun, operasi balance yang dicek, dan burn fee ke blackhole.

use tracing::debug;

use super::{Account, ChainState};
use crate::error::{ExecutionError, StoreResult};
use crate::store::Table;
use crate::types::Address;

impl<'a> ChainState<'a> {
    pub fn account(&self, addr: &Address) -> StoreResult<Option<Account>> {
        self.read(Table::Accounts, addr.as_bytes())
    }

    pub fn account_exists(&self, addr: &Address) -> StoreResult<bool> {
        self.store().has(Table::Accounts, addr.as_bytes())
    }

    pub fn put_account(&mut self, account: &Account) -> StoreResult<()> {
        self.write(Table::Accounts, account.address.as_bytes(), account)
    }

    /// Load an account that must exist during execution.
    pub fn require_account(&self, addr: &Address) -> Result<Account, ExecutionError> {
        self.account(addr)?
            .ok_or_else(|| ExecutionError::Failed(format!("account {} missing", addr)))
    }

    pub fn balance_of(&self, addr: &Address) -> StoreResult<u128> {
        Ok(self.account(addr)?.map(|a| a.balance).unwrap_or(0))
    }

    /// Create an empty account if absent. Returns true if created.
    pub fn ensure_account(&mut self, addr: &Address, now: u64) -> StoreResult<bool> {
        if self.account_exists(addr)? {
            return Ok(false);
        }
        self.put_account(&Account::new(*addr, now))?;
        debug!(address = %addr, "account created");
        Ok(true)
    }

    pub fn credit(&mut self, addr: &Address, amount: u128) -> Result<(), ExecutionError> {
        let mut acct = self.require_account(addr)?;
        acct.balance = acct
            .balance
            .checked_add(amount)
            .ok_or(ExecutionError::Overflow("balance credit"))?;
        self.put_account(&acct)?;
        Ok(())
    }

    pub fn debit(&mut self, addr: &Address, amount: u128) -> Result<(), ExecutionError> {
        let mut acct = self.require_account(addr)?;
        acct.balance = acct
            .balance
            .checked_sub(amount)
            .ok_or(ExecutionError::BalanceInsufficient {
                required: amount,
                available: acct.balance,
            })?;
        self.put_account(&acct)?;
        Ok(())
    }

    /// Move `amount` between two accounts. Both sides are checked before either
    /// is written.
    pub fn transfer_balance(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), ExecutionError> {
        if from == to {
            return Ok(());
        }
        let mut src = self.require_account(from)?;
        let mut dst = self.require_account(to)?;
        src.balance = src
            .balance
            .checked_sub(amount)
            .ok_or(ExecutionError::BalanceInsufficient {
                required: amount,
                available: src.balance,
            })?;
        dst.balance = dst
            .balance
            .checked_add(amount)
            .ok_or(ExecutionError::Overflow("balance credit"))?;
        self.put_account(&src)?;
        self.put_account(&dst)?;
        Ok(())
    }

    /// Burn `amount` from `owner` into the blackhole account.
    pub fn burn(&mut self, owner: &Address, amount: u128) -> Result<(), ExecutionError> {
        if amount == 0 {
            return Ok(());
        }
        let blackhole = self.properties()?.blackhole;
        self.transfer_balance(owner, &blackhole, amount)?;
        debug!(owner = %owner, amount, "burned to blackhole");
        Ok(())
    }

    /// account name → address, for uniqueness checks
    pub fn account_by_name(&self, name: &[u8]) -> StoreResult<Option<Address>> {
        self.read(Table::AccountNameIndex, name)
    }

    pub fn index_account_name(&mut self, name: &[u8], addr: &Address) -> StoreResult<()> {
        self.write(Table::AccountNameIndex, name, addr)
    }

    pub fn account_by_id(&self, id: &[u8]) -> StoreResult<Option<Address>> {
        let key = id.to_ascii_lowercase();
        self.read(Table::AccountIdIndex, &key)
    }

    pub fn index_account_id(&mut self, id: &[u8], addr: &Address) -> StoreResult<()> {
        let key = id.to_ascii_lowercase();
        self.write(Table::AccountIdIndex, &key, addr)
    }

    /// Voting power of an account under the current tier table.
    pub fn voting_power_of(&self, account: &Account) -> StoreResult<u64> {
        Ok(self.properties()?.voting_power(account.total_stake()))
    }
}
