//! Core types for the payment ledger
//!
//! All types are designed for:
//! - JSON snapshots that match the diagnostic/rollback encoding
//! - Exact arithmetic (Decimal for money)

use crate::codec;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Customer id under which the special accounts are filed
pub const RESERVED_CUSTOMER_ID: &str = "0";

/// Number of the state emission account
pub const EMISSION_ACCOUNT_NUMBER: &str = "SE00MMMM00000000000000000001";

/// Number of the state terminate account
pub const TERMINATE_ACCOUNT_NUMBER: &str = "ST00MMMM00000000000000000002";

/// Supported currency codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    /// Belarusian Ruble
    #[default]
    BYN,
    /// Russian Ruble
    RU,
    /// US Dollar
    USD,
    /// Euro
    EUR,
}

impl Currency {
    /// Currency code as used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Currency::BYN => "BYN",
            Currency::RU => "RU",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
        }
    }
}

impl FromStr for Currency {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "BYN" => Ok(Currency::BYN),
            "RU" => Ok(Currency::RU),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            other => Err(crate::Error::Validation(format!(
                "unsupported currency code {other}"
            ))),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Usable for money movement
    #[default]
    Active,
    /// Closed; still queryable
    Blocked,
}

/// The two state-owned singleton accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialAccount {
    /// Source of newly emitted money
    Emission,
    /// Sink of terminated money
    Terminate,
}

impl SpecialAccount {
    /// Fixed sub-key of the singleton slot
    pub fn sub_key(&self) -> &'static str {
        match self {
            SpecialAccount::Emission => codec::EMISSION_PREFIX,
            SpecialAccount::Terminate => codec::TERMINATE_PREFIX,
        }
    }

    /// Fixed account number
    pub fn number(&self) -> &'static str {
        match self {
            SpecialAccount::Emission => EMISSION_ACCOUNT_NUMBER,
            SpecialAccount::Terminate => TERMINATE_ACCOUNT_NUMBER,
        }
    }
}

impl fmt::Display for SpecialAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecialAccount::Emission => write!(f, "emission"),
            SpecialAccount::Terminate => write!(f, "terminate"),
        }
    }
}

/// Kind of account to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccountKind {
    /// Customer account with a generated number
    #[default]
    Ordinary,
    /// One of the special singletons
    Special(SpecialAccount),
}

impl AccountKind {
    /// Emission singleton
    pub const EMISSION: AccountKind = AccountKind::Special(SpecialAccount::Emission);

    /// Terminate singleton
    pub const TERMINATE: AccountKind = AccountKind::Special(SpecialAccount::Terminate);

    /// Number class prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            AccountKind::Ordinary => codec::ORDINARY_PREFIX,
            AccountKind::Special(special) => special.sub_key(),
        }
    }
}

impl From<SpecialAccount> for AccountKind {
    fn from(special: SpecialAccount) -> Self {
        AccountKind::Special(special)
    }
}

/// External actor owning accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    /// Customer id (must be non-empty for mutating calls)
    pub id: String,

    /// Display name
    pub name: String,

    /// Kind of account this customer normally opens
    pub account_prefix: AccountKind,
}

impl Customer {
    /// Create new customer
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        account_prefix: AccountKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            account_prefix,
        }
    }
}

/// Ledger account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Account {
    /// Owning customer
    pub customer_id: String,

    /// Account number
    pub num: String,

    /// Currency
    pub currency_code: Currency,

    /// Status
    pub status: AccountStatus,

    /// Balance (may go negative), an exact JSON number on the wire
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub balance: Decimal,

    /// Free-form description
    #[serde(rename = "desc", default)]
    pub description: String,
}

impl Account {
    /// Create an active account
    pub fn new(
        customer_id: impl Into<String>,
        currency_code: Currency,
        num: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            num: num.into(),
            currency_code,
            status: AccountStatus::Active,
            balance,
            description: String::new(),
        }
    }

    /// Placeholder carrying only a number, e.g. a destination typed in by hand
    pub fn with_number(num: impl Into<String>) -> Self {
        Self {
            num: num.into(),
            ..Self::default()
        }
    }

    /// Number validates and status is Active
    pub fn is_available(&self) -> bool {
        codec::is_valid(&self.num) && self.status == AccountStatus::Active
    }

    /// Same stored entry: matching number and owner
    pub fn same_entry(&self, other: &Account) -> bool {
        self.num == other.num && self.customer_id == other.customer_id
    }
}

/// Transfer request carried across a serialization boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    /// Debited account
    pub source: Account,

    /// Credited account
    pub destination: Account,

    /// Amount to move
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
}

impl TransferData {
    /// Create new transfer request
    pub fn new(source: Account, destination: Account, amount: Decimal) -> Self {
        Self {
            source,
            destination,
            amount,
        }
    }

    /// JSON encoding
    pub fn encode(&self) -> crate::Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| crate::Error::Encode(e.to_string()))
    }
}
