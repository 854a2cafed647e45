//! Ledger store
//!
//! Owns every account, keyed `customer_id → sub_key → Account`, and
//! implements the money-movement operations against that map.
//!
//! The store does no locking of its own. Callers share it as a
//! [`SharedLedger`] and run every operation while holding its mutex; the
//! [`TaskController`](crate::controller::TaskController) does exactly that
//! for each queued task.
//!
//! Every mutating operation validates all of its inputs and resolves every
//! stored entry it will touch before changing a single balance.
//!
//! # Example
//!
//! ```
//! use payment_core::{AccountKind, Currency, Customer, LedgerStore, SpecialAccount};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> payment_core::Result<()> {
//! let mut store = LedgerStore::new();
//! let government = Customer::new("0", "GOVERNMENT", AccountKind::EMISSION);
//!
//! store.create_account(&government, AccountKind::EMISSION, Currency::BYN, Decimal::ZERO)?;
//! store.emit(Decimal::from(2_000_000))?;
//!
//! let emission = store.get_special_account(SpecialAccount::Emission)?;
//! assert_eq!(emission.balance, Decimal::from(2_000_000));
//! # Ok(())
//! # }
//! ```

use crate::{
    codec,
    types::{
        Account, AccountKind, AccountStatus, Currency, Customer, SpecialAccount, TransferData,
        RESERVED_CUSTOMER_ID,
    },
    Error, Result,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// `customer_id → sub_key → Account`
pub type AccountMap = HashMap<String, HashMap<String, Account>>;

/// Store behind the single coarse lock.
///
/// `lock()` hands out the guard; dropping the guard unlocks.
pub type SharedLedger = Arc<Mutex<LedgerStore>>;

/// In-memory account ledger
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LedgerStore {
    accounts: AccountMap,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into the shared, lock-guarded form
    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    /// Create an account for `customer`.
    ///
    /// Special kinds occupy a fixed slot in the customer's bucket, so
    /// creating one again replaces the previous singleton. Returns the
    /// number of the new account.
    pub fn create_account(
        &mut self,
        customer: &Customer,
        kind: AccountKind,
        currency: Currency,
        amount: Decimal,
    ) -> Result<String> {
        info!(
            customer_id = %customer.id,
            currency = %currency,
            amount = %amount,
            "Creating account"
        );

        if amount < Decimal::ZERO {
            return Err(rejected(
                "create_account",
                Error::Validation(format!("opening balance {amount} is negative")),
            ));
        }

        if customer.id.is_empty() {
            return Err(rejected(
                "create_account",
                Error::Validation("customer id is empty".to_string()),
            ));
        }

        let (sub_key, num) = match kind {
            AccountKind::Special(special) => {
                (special.sub_key().to_string(), special.number().to_string())
            }
            AccountKind::Ordinary => (
                codec::generate_identifier(),
                codec::generate(codec::ORDINARY_PREFIX),
            ),
        };

        let account = Account::new(customer.id.clone(), currency, num.clone(), amount);
        self.accounts
            .entry(customer.id.clone())
            .or_default()
            .insert(sub_key, account);

        info!(customer_id = %customer.id, num = %num, "Account created");
        Ok(num)
    }

    /// Look up the emission or terminate singleton under the reserved customer
    pub fn get_special_account(&self, special: SpecialAccount) -> Result<Account> {
        let account = self
            .accounts
            .get(RESERVED_CUSTOMER_ID)
            .and_then(|bucket| bucket.get(special.sub_key()))
            .ok_or_else(|| {
                rejected(
                    "get_special_account",
                    Error::NotFound(format!("special {special} account")),
                )
            })?;

        codec::validate(&account.num)?;

        info!(kind = %special, num = %account.num, "Special account resolved");
        Ok(account.clone())
    }

    /// Find the customer's account in `currency`.
    ///
    /// With several matching accounts the one returned is whichever the map
    /// yields last; map order is unspecified. No match fails the same way
    /// as a malformed number.
    pub fn find_account(&self, customer: &Customer, currency: Currency) -> Result<Account> {
        let found = self
            .accounts
            .get(&customer.id)
            .into_iter()
            .flat_map(|bucket| bucket.values())
            .filter(|account| account.currency_code == currency)
            .last();

        match found {
            Some(account) => {
                codec::validate(&account.num)?;
                Ok(account.clone())
            }
            None => Err(rejected(
                "find_account",
                Error::InvalidFormat(String::new()),
            )),
        }
    }

    /// Exact match on the stored account number within the customer's bucket
    pub fn get_account_by_number(&self, customer: &Customer, num: &str) -> Result<Account> {
        self.accounts
            .get(&customer.id)
            .and_then(|bucket| bucket.values().find(|account| account.num == num))
            .cloned()
            .ok_or_else(|| {
                rejected(
                    "get_account_by_number",
                    Error::NotFound(format!("account {num} of customer {}", customer.id)),
                )
            })
    }

    /// Block the stored entry matching `account`; it stays queryable
    pub fn close_account(&mut self, account: &Account) -> Result<()> {
        self.set_status(account, AccountStatus::Blocked)
    }

    /// Re-activate the stored entry matching `account`
    pub fn activate_account(&mut self, account: &Account) -> Result<()> {
        self.set_status(account, AccountStatus::Active)
    }

    /// Add newly created money to the emission account
    pub fn emit(&mut self, amount: Decimal) -> Result<()> {
        info!(amount = %amount, "Emitting to emission account");

        if amount <= Decimal::ZERO {
            return Err(rejected(
                "emit",
                Error::Validation(format!("emission amount {amount} is not positive")),
            ));
        }

        let emission = self.get_special_account(SpecialAccount::Emission)?;
        let credited = credit(&emission, amount).map_err(|e| rejected("emit", e))?;
        let stored = self.stored_mut(&emission)?;
        stored.balance = credited;

        info!(amount = %amount, num = %stored.num, balance = %stored.balance, "Emission done");
        Ok(())
    }

    /// Withdraw `amount` from `source` into the terminate account.
    ///
    /// There is no overdraft check; the source balance may go negative.
    pub fn terminate(&mut self, source: &Account, amount: Decimal) -> Result<()> {
        info!(num = %source.num, amount = %amount, "Terminating amount");

        ensure_available(source).map_err(|e| rejected("terminate", e))?;

        if amount <= Decimal::ZERO {
            return Err(rejected(
                "terminate",
                Error::Validation(format!("termination amount {amount} is not positive")),
            ));
        }

        let sink = self.get_special_account(SpecialAccount::Terminate)?;
        let stored_source = self.stored(source).map_err(|e| rejected("terminate", e))?;
        ensure_available(stored_source).map_err(|e| rejected("terminate", e))?;
        let stored_sink = self.stored(&sink).map_err(|e| rejected("terminate", e))?;

        let (debited, credited) = move_balances(stored_source, stored_sink, amount)
            .map_err(|e| rejected("terminate", e))?;
        if !stored_source.same_entry(stored_sink) {
            self.stored_mut(source)?.balance = debited;
            self.stored_mut(&sink)?.balance = credited;
        }

        info!(
            num = %source.num,
            sink = %sink.num,
            amount = %amount,
            "Amount terminated"
        );
        Ok(())
    }

    /// Move `amount` between two accounts of the same currency.
    ///
    /// Both entries are re-read from the store; the balances carried by the
    /// arguments are ignored. There is no overdraft check, but a balance
    /// pushed out of `Decimal` range fails with `Validation` and neither
    /// entry changes.
    pub fn transfer(
        &mut self,
        source: &Account,
        destination: &Account,
        amount: Decimal,
    ) -> Result<()> {
        info!(
            source = %source.num,
            destination = %destination.num,
            amount = %amount,
            "Transferring amount"
        );

        ensure_available(source).map_err(|e| rejected("transfer", e))?;
        ensure_available(destination).map_err(|e| rejected("transfer", e))?;

        if amount <= Decimal::ZERO {
            return Err(rejected(
                "transfer",
                Error::Validation(format!("transfer amount {amount} is not positive")),
            ));
        }

        if source.currency_code != destination.currency_code {
            return Err(rejected("transfer", currency_mismatch(source, destination)));
        }

        let stored_source = self.stored(source).map_err(|e| rejected("transfer", e))?;
        ensure_available(stored_source).map_err(|e| rejected("transfer", e))?;

        let stored_destination = self
            .stored(destination)
            .map_err(|e| rejected("transfer", e))?;
        ensure_available(stored_destination).map_err(|e| rejected("transfer", e))?;

        if stored_source.currency_code != stored_destination.currency_code {
            return Err(rejected(
                "transfer",
                currency_mismatch(stored_source, stored_destination),
            ));
        }

        let (debited, credited) = move_balances(stored_source, stored_destination, amount)
            .map_err(|e| rejected("transfer", e))?;
        if !stored_source.same_entry(stored_destination) {
            self.stored_mut(source)?.balance = debited;
            self.stored_mut(destination)?.balance = credited;
        }

        info!(
            source = %source.num,
            destination = %destination.num,
            amount = %amount,
            "Transfer done"
        );
        Ok(())
    }

    /// Decode a JSON [`TransferData`] and run [`transfer`](Self::transfer)
    pub fn transfer_from_encoded(&mut self, bytes: &[u8]) -> Result<()> {
        let request: TransferData = serde_json::from_slice(bytes)
            .map_err(|e| rejected("transfer_from_encoded", Error::Decode(e.to_string())))?;

        self.transfer(&request.source, &request.destination, request.amount)
    }

    /// Serialize the whole account map
    pub fn dump(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.accounts).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Replace the whole account map with a snapshot from [`dump`](Self::dump).
    ///
    /// The snapshot is decoded before anything is replaced, so a malformed
    /// snapshot leaves the store as it was.
    pub fn restore(&mut self, snapshot: &[u8]) -> Result<()> {
        let accounts: AccountMap = serde_json::from_slice(snapshot)
            .map_err(|e| rejected("restore", Error::Decode(e.to_string())))?;

        self.accounts = accounts;
        info!(customers = self.accounts.len(), "Store restored from snapshot");
        Ok(())
    }

    /// Indented JSON of the whole store, for diagnostics
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.accounts).map_err(|e| Error::Encode(e.to_string()))
    }

    /// Customer ids with at least one account, sorted
    pub fn customers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.accounts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Accounts of one customer, sorted by number
    pub fn accounts_of(&self, customer_id: &str) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self
            .accounts
            .get(customer_id)
            .map(|bucket| bucket.values().collect())
            .unwrap_or_default();
        accounts.sort_by(|a, b| a.num.cmp(&b.num));
        accounts
    }

    /// Total number of accounts across all customers
    pub fn account_count(&self) -> usize {
        self.accounts.values().map(HashMap::len).sum()
    }

    fn set_status(&mut self, account: &Account, status: AccountStatus) -> Result<()> {
        info!(num = %account.num, status = ?status, "Changing account status");

        let stored = self
            .stored_mut(account)
            .map_err(|e| rejected("set_status", e))?;
        stored.status = status;

        info!(
            num = %stored.num,
            customer_id = %stored.customer_id,
            status = ?status,
            "Account status changed"
        );
        Ok(())
    }

    fn stored(&self, account: &Account) -> Result<&Account> {
        self.accounts
            .get(&account.customer_id)
            .ok_or_else(|| missing_bucket(account))?
            .values()
            .find(|stored| stored.same_entry(account))
            .ok_or_else(|| missing_entry(account))
    }

    fn stored_mut(&mut self, account: &Account) -> Result<&mut Account> {
        self.accounts
            .get_mut(&account.customer_id)
            .ok_or_else(|| missing_bucket(account))?
            .values_mut()
            .find(|stored| stored.same_entry(account))
            .ok_or_else(|| missing_entry(account))
    }
}

/// Number must validate and status must be Active
fn ensure_available(account: &Account) -> Result<()> {
    codec::validate(&account.num)?;

    if account.status != AccountStatus::Active {
        return Err(Error::UnavailableAccount(format!(
            "account {} is blocked",
            account.num
        )));
    }

    Ok(())
}

/// New `(from, to)` balances for moving `amount`; nothing is written
fn move_balances(from: &Account, to: &Account, amount: Decimal) -> Result<(Decimal, Decimal)> {
    let debited = from
        .balance
        .checked_sub(amount)
        .ok_or_else(|| out_of_range(from, "debit", amount))?;
    Ok((debited, credit(to, amount)?))
}

fn credit(account: &Account, amount: Decimal) -> Result<Decimal> {
    account
        .balance
        .checked_add(amount)
        .ok_or_else(|| out_of_range(account, "credit", amount))
}

fn out_of_range(account: &Account, operation: &str, amount: Decimal) -> Error {
    Error::Validation(format!(
        "{operation} of {amount} takes account {} out of range (balance {})",
        account.num, account.balance
    ))
}

fn currency_mismatch(source: &Account, destination: &Account) -> Error {
    Error::Validation(format!(
        "currency mismatch: {} is {}, {} is {}",
        source.num, source.currency_code, destination.num, destination.currency_code
    ))
}

fn missing_bucket(account: &Account) -> Error {
    Error::NotFound(format!("customer {} has no accounts", account.customer_id))
}

fn missing_entry(account: &Account) -> Error {
    Error::NotFound(format!(
        "account {} of customer {}",
        account.num, account.customer_id
    ))
}

fn rejected(operation: &'static str, err: Error) -> Error {
    warn!(operation, kind = err.kind(), error = %err, "Operation rejected");
    err
}
