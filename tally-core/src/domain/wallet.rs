//! Wallet domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::transaction::exceeds_money_scale;

/// A financial container owned by exactly one account
///
/// `balance` is stored as-is and is not derived from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub account_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(account_id: Uuid, balance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            balance,
            created_at: Utc::now(),
        }
    }

    /// Validate wallet data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.balance < Decimal::ZERO {
            return Err("wallet balance cannot be negative");
        }
        if exceeds_money_scale(self.balance) {
            return Err("wallet balance has more than 8 decimal places");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_validation() {
        let mut wallet = Wallet::new(Uuid::new_v4(), Decimal::ZERO);
        assert!(wallet.validate().is_ok());

        wallet.balance = Decimal::new(-1, 2);
        assert!(wallet.validate().is_err());

        wallet.balance = Decimal::new(123_456_789, 8);
        assert!(wallet.validate().is_ok());

        wallet.balance = Decimal::new(1, 9);
        assert!(wallet.validate().is_err());
    }
}
