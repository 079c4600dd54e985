use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use mtk_types::{Amount, Principal, Role};

use crate::error::LedgerError;
use crate::event::{EventRecord, LedgerEvent};
use crate::ledger::LedgerSnapshot;

/// State rebuilt purely from the event log.
///
/// Allowances and the native balance are not reconstructible (spending an
/// allowance and purchases leave no dedicated event), so they are absent.
/// `token_price` is `None` until the log contains a price update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayState {
    pub applied_events: u64,
    pub balances: BTreeMap<Principal, Amount>,
    pub total_supply: Amount,
    pub roles: BTreeMap<Role, BTreeSet<Principal>>,
    pub token_price: Option<Amount>,
    pub withdrawn: Amount,
}

impl ReplayState {
    /// Differences between this replayed state and `snapshot`, one line each.
    pub fn divergences(&self, snapshot: &LedgerSnapshot) -> Vec<String> {
        let mut out = Vec::new();
        if self.total_supply != snapshot.total_supply {
            out.push(format!(
                "total supply: replayed {}, ledger {}",
                self.total_supply, snapshot.total_supply
            ));
        }
        if self.balances != snapshot.balances {
            let accounts: BTreeSet<&Principal> = self
                .balances
                .keys()
                .chain(snapshot.balances.keys())
                .collect();
            for account in accounts {
                let replayed = self.balances.get(account).copied().unwrap_or(0);
                let actual = snapshot.balances.get(account).copied().unwrap_or(0);
                if replayed != actual {
                    out.push(format!(
                        "balance of {}: replayed {replayed}, ledger {actual}",
                        account.short_id()
                    ));
                }
            }
        }
        for role in Role::ALL {
            let replayed: Vec<Principal> = self
                .roles
                .get(&role)
                .map(|holders| holders.iter().copied().collect())
                .unwrap_or_default();
            if replayed != snapshot.roles.members(role) {
                out.push(format!("members of {role} differ"));
            }
        }
        if let Some(price) = self.token_price {
            if price != snapshot.token_price {
                out.push(format!(
                    "token price: replayed {price}, ledger {}",
                    snapshot.token_price
                ));
            }
        }
        out
    }

    pub fn converges_with(&self, snapshot: &LedgerSnapshot) -> bool {
        self.divergences(snapshot).is_empty()
    }

    fn credit(&mut self, seq: u64, account: Principal, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| integrity(seq, "balance overflow"))?;
        Ok(())
    }

    fn debit(&mut self, seq: u64, account: Principal, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balances.get(&account).copied().unwrap_or(0);
        let remaining = balance
            .checked_sub(amount)
            .ok_or_else(|| integrity(seq, "transfer exceeds replayed balance"))?;
        if remaining == 0 {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, remaining);
        }
        Ok(())
    }

    fn apply(&mut self, record: &EventRecord) -> Result<(), LedgerError> {
        let seq = record.seq;
        match &record.event {
            LedgerEvent::Transfer { from, to, amount } => {
                if from.is_zero() {
                    self.total_supply = self
                        .total_supply
                        .checked_add(*amount)
                        .ok_or_else(|| integrity(seq, "supply overflow"))?;
                } else {
                    self.debit(seq, *from, *amount)?;
                }
                if to.is_zero() {
                    self.total_supply = self
                        .total_supply
                        .checked_sub(*amount)
                        .ok_or_else(|| integrity(seq, "burn exceeds replayed supply"))?;
                } else {
                    self.credit(seq, *to, *amount)?;
                }
            }
            LedgerEvent::RoleGranted { role, account, .. } => {
                self.roles.entry(*role).or_default().insert(*account);
            }
            LedgerEvent::RoleRevoked { role, account, .. } => {
                if let Some(holders) = self.roles.get_mut(role) {
                    holders.remove(account);
                    if holders.is_empty() {
                        self.roles.remove(role);
                    }
                }
            }
            LedgerEvent::TokenPriceUpdated { new_price, .. } => {
                self.token_price = Some(*new_price);
            }
            LedgerEvent::Withdrawal { amount, .. } => {
                self.withdrawn = self.withdrawn.saturating_add(*amount);
            }
            LedgerEvent::Approval { .. } | LedgerEvent::Mint { .. } => {}
        }
        self.applied_events += 1;
        Ok(())
    }
}

/// Deterministic replay of ledger event logs.
pub struct EventReplay;

impl EventReplay {
    /// Fold `records` from an empty state.
    pub fn replay(records: &[EventRecord]) -> Result<ReplayState, LedgerError> {
        Self::resume(ReplayState::default(), records)
    }

    /// Continue from a previously replayed state with records after it.
    pub fn resume(
        mut state: ReplayState,
        records: &[EventRecord],
    ) -> Result<ReplayState, LedgerError> {
        for record in records {
            state.apply(record)?;
        }
        Ok(state)
    }

    /// Replay the snapshot's own log and compare the result against it.
    pub fn verify_convergence(snapshot: &LedgerSnapshot) -> Result<bool, LedgerError> {
        Ok(Self::replay(&snapshot.events)?.converges_with(snapshot))
    }
}

fn integrity(seq: u64, reason: &str) -> LedgerError {
    LedgerError::IntegrityViolation {
        seq,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use mtk_types::tokens;

    use super::*;
    use crate::config::DeployParams;
    use crate::ledger::TokenLedger;
    use crate::traits::{TokenReader, TokenWriter};

    fn owner() -> Principal {
        Principal::derive("owner")
    }

    fn busy_ledger() -> TokenLedger {
        let ledger = TokenLedger::deploy(
            owner(),
            DeployParams {
                initial_supply: tokens(1_000),
                initial_token_price: 100_000_000_000_000,
            },
        )
        .unwrap();
        let alice = Principal::derive("alice");
        let bob = Principal::derive("bob");

        ledger.transfer(&owner(), &alice, tokens(100)).unwrap();
        ledger.approve(&alice, &bob, tokens(40)).unwrap();
        ledger.transfer_from(&bob, &alice, &bob, tokens(40)).unwrap();
        ledger.grant_minter_role(&owner(), &bob).unwrap();
        ledger.mint(&bob, &alice, tokens(5)).unwrap();
        ledger.burn(&owner(), tokens(900)).unwrap();
        ledger.buy_tokens(&alice, 1_000_000_000_000_000).unwrap();
        ledger.set_token_price(&owner(), 1).unwrap();
        ledger.revoke_minter_role(&owner(), &bob).unwrap();
        ledger
    }

    #[test]
    fn replay_converges_with_live_state() {
        let ledger = busy_ledger();
        let snapshot = ledger.snapshot();
        let state = EventReplay::replay(&snapshot.events).unwrap();

        assert_eq!(state.applied_events, snapshot.events.len() as u64);
        assert_eq!(state.token_price, Some(1));
        assert!(state.roles.get(&Role::Minter).is_none());
        assert!(state.converges_with(&snapshot), "{:?}", state.divergences(&snapshot));
    }

    #[test]
    fn resume_matches_full_replay() {
        let ledger = busy_ledger();
        let events = ledger.events();
        let (head, tail) = events.split_at(4);

        let partial = EventReplay::replay(head).unwrap();
        let resumed = EventReplay::resume(partial, tail).unwrap();
        assert_eq!(resumed, EventReplay::replay(&events).unwrap());
    }

    #[test]
    fn withdrawals_are_tallied() {
        let ledger = busy_ledger();
        let sink = crate::payout::InMemoryPayouts::new();
        let paid = ledger.withdraw(&owner(), &sink).unwrap();

        let state = EventReplay::replay(&ledger.events()).unwrap();
        assert_eq!(state.withdrawn, paid);
    }

    #[test]
    fn impossible_transfer_is_an_integrity_violation() {
        let record = EventRecord::next(
            None,
            LedgerEvent::Transfer {
                from: Principal::derive("ghost"),
                to: owner(),
                amount: 1,
            },
        )
        .unwrap();
        assert!(matches!(
            EventReplay::replay(&[record]),
            Err(LedgerError::IntegrityViolation { seq: 1, .. })
        ));
    }

    #[test]
    fn divergence_is_described() {
        let ledger = busy_ledger();
        let mut snapshot = ledger.snapshot();
        snapshot.total_supply += 1;

        let state = EventReplay::replay(&snapshot.events).unwrap();
        let diffs = state.divergences(&snapshot);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].starts_with("total supply"));
        assert!(!EventReplay::verify_convergence(&snapshot).unwrap());
    }
}
