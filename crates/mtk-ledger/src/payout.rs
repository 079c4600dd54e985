use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use mtk_types::{Amount, Principal};

/// Refusal reported by a [`ValueSink`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payout rejected: {0}")]
pub struct PayoutRejected(pub String);

/// External recipient of native-currency payouts.
///
/// `withdraw` hands the drained balance to a sink only after the ledger has
/// zeroed its own balance and released its lock. A sink may call back into
/// the ledger, including `withdraw` itself.
pub trait ValueSink: Send + Sync {
    fn send_value(&self, to: &Principal, amount: Amount) -> Result<(), PayoutRejected>;
}

/// Sink that records credited native currency per recipient.
#[derive(Debug, Default)]
pub struct InMemoryPayouts {
    credited: Mutex<BTreeMap<Principal, Amount>>,
}

impl InMemoryPayouts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total native currency paid out to `who`.
    pub fn balance_of(&self, who: &Principal) -> Amount {
        self.credited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(who)
            .copied()
            .unwrap_or(0)
    }

    /// Total native currency paid out to anyone.
    pub fn total(&self) -> Amount {
        self.credited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .fold(0, |acc, v| acc.saturating_add(*v))
    }
}

impl ValueSink for InMemoryPayouts {
    fn send_value(&self, to: &Principal, amount: Amount) -> Result<(), PayoutRejected> {
        let mut credited = self
            .credited
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = credited.entry(*to).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| PayoutRejected("recipient balance overflow".into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credits_accumulate() {
        let sink = InMemoryPayouts::new();
        let owner = Principal::derive("owner");
        sink.send_value(&owner, 5).unwrap();
        sink.send_value(&owner, 7).unwrap();
        assert_eq!(sink.balance_of(&owner), 12);
        assert_eq!(sink.balance_of(&Principal::derive("other")), 0);
        assert_eq!(sink.total(), 12);
    }

    #[test]
    fn overflow_is_rejected() {
        let sink = InMemoryPayouts::new();
        let owner = Principal::derive("owner");
        sink.send_value(&owner, Amount::MAX).unwrap();
        assert!(sink.send_value(&owner, 1).is_err());
        assert_eq!(sink.balance_of(&owner), Amount::MAX);
    }
}
