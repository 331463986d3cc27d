//! Ledger entry domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Decimal places kept by storage (`DECIMAL(38, 8)`)
pub const MONEY_SCALE: u32 = 8;

/// True if storing `value` would round it
pub fn exceeds_money_scale(value: Decimal) -> bool {
    value.normalize().scale() > MONEY_SCALE
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Send,
    Receive,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Send => "send",
            TransactionType::Receive => "receive",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "send" => Ok(TransactionType::Send),
            "receive" => Ok(TransactionType::Receive),
            other => Err(format!(
                "unknown transaction type '{}', expected 'send' or 'receive'",
                other
            )),
        }
    }
}

/// An immutable ledger entry belonging to a wallet
///
/// Fields are private: once built, an entry cannot be altered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: Uuid,
    wallet_id: Uuid,
    amount: Decimal,
    #[serde(rename = "type")]
    kind: TransactionType,
    category: String,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a new entry stamped with the current time
    pub fn new(
        wallet_id: Uuid,
        amount: Decimal,
        kind: TransactionType,
        category: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            Uuid::new_v4(),
            wallet_id,
            amount,
            kind,
            category,
            Utc::now(),
        )
    }

    /// Rebuild an entry read back from storage
    pub fn from_parts(
        id: Uuid,
        wallet_id: Uuid,
        amount: Decimal,
        kind: TransactionType,
        category: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            wallet_id,
            amount,
            kind,
            category: category.into(),
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn wallet_id(&self) -> Uuid {
        self.wallet_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Validate entry data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount <= Decimal::ZERO {
            return Err("transaction amount must be greater than zero");
        }
        if exceeds_money_scale(self.amount) {
            return Err("transaction amount has more than 8 decimal places");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("send".parse::<TransactionType>(), Ok(TransactionType::Send));
        assert_eq!(" Receive ".parse::<TransactionType>(), Ok(TransactionType::Receive));
        assert!("refund".parse::<TransactionType>().is_err());
        assert!("".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_entry_serializes_type_field() {
        let entry = LedgerEntry::new(Uuid::new_v4(), Decimal::new(5000, 2), TransactionType::Receive, "deposit");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "receive");
        assert_eq!(json["category"], "deposit");
    }

    #[test]
    fn test_entry_validation() {
        let wallet_id = Uuid::new_v4();
        assert!(LedgerEntry::new(wallet_id, Decimal::ONE, TransactionType::Send, "rent").validate().is_ok());
        assert!(LedgerEntry::new(wallet_id, Decimal::ZERO, TransactionType::Send, "rent").validate().is_err());
        assert!(LedgerEntry::new(wallet_id, Decimal::NEGATIVE_ONE, TransactionType::Send, "rent").validate().is_err());
    }

    #[test]
    fn test_entry_scale_limit() {
        let wallet_id = Uuid::new_v4();
        let eight_places = Decimal::new(1, 8);
        let nine_places = Decimal::new(1, 9);
        // Trailing zeros beyond the limit do not change the value
        let padded = Decimal::new(1_000_000_000, 12);

        assert!(LedgerEntry::new(wallet_id, eight_places, TransactionType::Receive, "dust").validate().is_ok());
        assert!(LedgerEntry::new(wallet_id, padded, TransactionType::Receive, "dust").validate().is_ok());
        assert_eq!(
            LedgerEntry::new(wallet_id, nine_places, TransactionType::Receive, "dust").validate(),
            Err("transaction amount has more than 8 decimal places")
        );
    }
}
