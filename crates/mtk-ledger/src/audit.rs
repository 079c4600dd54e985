use serde::Serialize;

use mtk_types::{Amount, Principal};

use crate::ledger::{LedgerSnapshot, TokenLedger};
use crate::replay::EventReplay;

/// Result of auditing a ledger snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub event_count: u64,
    pub total_supply: Amount,
    /// Sum of all balances, `None` if the sum itself overflows.
    pub balance_sum: Option<Amount>,
    pub holder_count: usize,
    pub supply_balanced: bool,
    pub hash_chain_valid: bool,
    pub sequence_monotonic: bool,
    pub replay_converges: bool,
    pub violations: Vec<Violation>,
}

impl AuditReport {
    /// Returns `true` if all checks passed.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation found by the auditor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Log position, for violations tied to a single event.
    pub seq: Option<u64>,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    SupplyMismatch,
    ZeroAddressBalance,
    EmptyEntry,
    SequenceGap,
    HashChainBreak,
    HashMismatch,
    ReplayDivergence,
}

/// Checks the supply invariant, the event log chain and replay convergence.
pub struct SupplyAuditor;

impl SupplyAuditor {
    pub fn audit_ledger(ledger: &TokenLedger) -> AuditReport {
        Self::audit(&ledger.snapshot())
    }

    pub fn audit(snapshot: &LedgerSnapshot) -> AuditReport {
        let mut violations = Vec::new();

        let balance_sum = snapshot
            .balances
            .values()
            .try_fold(0 as Amount, |acc, v| acc.checked_add(*v));
        let supply_balanced = balance_sum == Some(snapshot.total_supply);
        if !supply_balanced {
            violations.push(Violation {
                seq: None,
                kind: ViolationKind::SupplyMismatch,
                description: match balance_sum {
                    Some(sum) => format!(
                        "total supply {} != sum of balances {sum}",
                        snapshot.total_supply
                    ),
                    None => "sum of balances overflows".into(),
                },
            });
        }

        if snapshot.balances.contains_key(&Principal::ZERO) {
            violations.push(Violation {
                seq: None,
                kind: ViolationKind::ZeroAddressBalance,
                description: "zero address holds tokens".into(),
            });
        }

        for (account, _) in snapshot.balances.iter().filter(|(_, v)| **v == 0) {
            violations.push(Violation {
                seq: None,
                kind: ViolationKind::EmptyEntry,
                description: format!("zero balance stored for {}", account.short_id()),
            });
        }
        for (owner, spenders) in &snapshot.allowances {
            if spenders.is_empty() || spenders.values().any(|v| *v == 0) {
                violations.push(Violation {
                    seq: None,
                    kind: ViolationKind::EmptyEntry,
                    description: format!("zero allowance stored for {}", owner.short_id()),
                });
            }
        }

        let mut hash_chain_valid = true;
        let mut sequence_monotonic = true;
        for (index, record) in snapshot.events.iter().enumerate() {
            let expected_seq = index as u64 + 1;
            if record.seq != expected_seq {
                sequence_monotonic = false;
                violations.push(Violation {
                    seq: Some(record.seq),
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", record.seq),
                });
            }

            let expected_prev = index
                .checked_sub(1)
                .map(|prev| snapshot.events[prev].hash);
            if record.prev_hash != expected_prev {
                hash_chain_valid = false;
                violations.push(Violation {
                    seq: Some(record.seq),
                    kind: ViolationKind::HashChainBreak,
                    description: "previous hash link mismatch".into(),
                });
            }

            if let Ok(computed) = record.compute_hash() {
                if computed != record.hash {
                    hash_chain_valid = false;
                    violations.push(Violation {
                        seq: Some(record.seq),
                        kind: ViolationKind::HashMismatch,
                        description: "event hash does not match computed".into(),
                    });
                }
            }
        }

        let replay_converges = match EventReplay::replay(&snapshot.events) {
            Ok(state) => {
                let divergences = state.divergences(snapshot);
                let converges = divergences.is_empty();
                violations.extend(divergences.into_iter().map(|description| Violation {
                    seq: None,
                    kind: ViolationKind::ReplayDivergence,
                    description,
                }));
                converges
            }
            Err(err) => {
                violations.push(Violation {
                    seq: None,
                    kind: ViolationKind::ReplayDivergence,
                    description: err.to_string(),
                });
                false
            }
        };

        AuditReport {
            event_count: snapshot.events.len() as u64,
            total_supply: snapshot.total_supply,
            balance_sum,
            holder_count: snapshot.balances.len(),
            supply_balanced,
            hash_chain_valid,
            sequence_monotonic,
            replay_converges,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use mtk_types::tokens;

    use super::*;
    use crate::config::DeployParams;
    use crate::event::LedgerEvent;
    use crate::traits::TokenWriter;

    fn ledger() -> TokenLedger {
        let owner = Principal::derive("owner");
        let ledger = TokenLedger::deploy(
            owner,
            DeployParams {
                initial_supply: tokens(50),
                initial_token_price: 10,
            },
        )
        .unwrap();
        ledger
            .transfer(&owner, &Principal::derive("alice"), tokens(20))
            .unwrap();
        ledger.buy_tokens(&Principal::derive("bob"), 25).unwrap();
        ledger
    }

    #[test]
    fn healthy_ledger_is_clean() {
        let report = SupplyAuditor::audit_ledger(&ledger());
        assert!(report.is_clean(), "{:?}", report.violations);
        assert_eq!(report.holder_count, 3);
        assert_eq!(report.balance_sum, Some(report.total_supply));
        assert_eq!(report.event_count, 4);
    }

    #[test]
    fn detects_supply_mismatch() {
        let mut snapshot = ledger().snapshot();
        snapshot.balances.insert(Principal::derive("carol"), 1);

        let report = SupplyAuditor::audit(&snapshot);
        assert!(!report.supply_balanced);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::SupplyMismatch));
    }

    #[test]
    fn detects_tampered_event() {
        let mut snapshot = ledger().snapshot();
        snapshot.events[2].event = LedgerEvent::Transfer {
            from: Principal::derive("owner"),
            to: Principal::derive("alice"),
            amount: tokens(21),
        };

        let report = SupplyAuditor::audit(&snapshot);
        assert!(!report.hash_chain_valid);
        assert!(!report.replay_converges);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::HashMismatch && v.seq == Some(3)));
    }

    #[test]
    fn detects_dropped_event() {
        let mut snapshot = ledger().snapshot();
        snapshot.events.remove(1);

        let report = SupplyAuditor::audit(&snapshot);
        assert!(!report.sequence_monotonic);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::HashChainBreak));
    }

    #[test]
    fn detects_stored_zero_balance() {
        let mut snapshot = ledger().snapshot();
        snapshot.balances.insert(Principal::derive("dave"), 0);

        let report = SupplyAuditor::audit(&snapshot);
        assert!(report.supply_balanced);
        assert!(report
            .violations
            .iter()
            .any(|v| v.kind == ViolationKind::EmptyEntry));
    }
}
