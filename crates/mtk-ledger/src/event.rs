use std::fmt;

use serde::{Deserialize, Serialize};

use mtk_types::{Amount, Principal, Role};

use crate::error::LedgerError;

/// Classification of ledger events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    Approval,
    Mint,
    RoleGranted,
    RoleRevoked,
    TokenPriceUpdated,
    Withdrawal,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transfer => "Transfer",
            Self::Approval => "Approval",
            Self::Mint => "Mint",
            Self::RoleGranted => "RoleGranted",
            Self::RoleRevoked => "RoleRevoked",
            Self::TokenPriceUpdated => "TokenPriceUpdated",
            Self::Withdrawal => "Withdrawal",
        };
        write!(f, "{s}")
    }
}

/// A domain event emitted by a successful ledger call.
///
/// Events are the only externally observable log of state changes. Within a
/// single call they are emitted in a fixed order (e.g. `mint` emits `Mint`
/// before `Transfer`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Tokens moved. `from == ZERO` is a mint, `to == ZERO` a burn.
    Transfer {
        from: Principal,
        to: Principal,
        amount: Amount,
    },
    Approval {
        owner: Principal,
        spender: Principal,
        amount: Amount,
    },
    /// Audit record of a privileged mint; always followed by a `Transfer`.
    Mint {
        minter: Principal,
        to: Principal,
        amount: Amount,
    },
    RoleGranted {
        role: Role,
        account: Principal,
        sender: Principal,
    },
    RoleRevoked {
        role: Role,
        account: Principal,
        sender: Principal,
    },
    TokenPriceUpdated {
        admin: Principal,
        old_price: Amount,
        new_price: Amount,
    },
    Withdrawal {
        admin: Principal,
        amount: Amount,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Transfer { .. } => EventKind::Transfer,
            Self::Approval { .. } => EventKind::Approval,
            Self::Mint { .. } => EventKind::Mint,
            Self::RoleGranted { .. } => EventKind::RoleGranted,
            Self::RoleRevoked { .. } => EventKind::RoleRevoked,
            Self::TokenPriceUpdated { .. } => EventKind::TokenPriceUpdated,
            Self::Withdrawal { .. } => EventKind::Withdrawal,
        }
    }

    /// Every principal named by the event, in field order.
    pub fn participants(&self) -> Vec<Principal> {
        match self {
            Self::Transfer { from, to, .. } => vec![*from, *to],
            Self::Approval { owner, spender, .. } => vec![*owner, *spender],
            Self::Mint { minter, to, .. } => vec![*minter, *to],
            Self::RoleGranted {
                account, sender, ..
            }
            | Self::RoleRevoked {
                account, sender, ..
            } => vec![*account, *sender],
            Self::TokenPriceUpdated { admin, .. } | Self::Withdrawal { admin, .. } => {
                vec![*admin]
            }
        }
    }

    pub fn involves(&self, principal: &Principal) -> bool {
        self.participants().contains(principal)
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer { from, to, amount } => write!(
                f,
                "Transfer({}, {}, {amount})",
                from.short_id(),
                to.short_id()
            ),
            Self::Approval {
                owner,
                spender,
                amount,
            } => write!(
                f,
                "Approval({}, {}, {amount})",
                owner.short_id(),
                spender.short_id()
            ),
            Self::Mint { minter, to, amount } => write!(
                f,
                "Mint({}, {}, {amount})",
                minter.short_id(),
                to.short_id()
            ),
            Self::RoleGranted {
                role,
                account,
                sender,
            } => write!(
                f,
                "RoleGranted({role}, {}, {})",
                account.short_id(),
                sender.short_id()
            ),
            Self::RoleRevoked {
                role,
                account,
                sender,
            } => write!(
                f,
                "RoleRevoked({role}, {}, {})",
                account.short_id(),
                sender.short_id()
            ),
            Self::TokenPriceUpdated {
                admin,
                old_price,
                new_price,
            } => write!(
                f,
                "TokenPriceUpdated({}, {old_price}, {new_price})",
                admin.short_id()
            ),
            Self::Withdrawal { admin, amount } => {
                write!(f, "Withdrawal({}, {amount})", admin.short_id())
            }
        }
    }
}

/// An event as recorded in the ledger's hash-linked log.
///
/// `seq` starts at 1 and increases by one per event. `hash` is a BLAKE3
/// digest over the record with `hash` zeroed, so the log can be verified
/// independently of the ledger that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub prev_hash: Option<[u8; 32]>,
    pub hash: [u8; 32],
    pub event: LedgerEvent,
}

impl EventRecord {
    /// Build the record that follows `prev` in a log.
    pub fn next(prev: Option<&EventRecord>, event: LedgerEvent) -> Result<Self, LedgerError> {
        let mut record = Self {
            seq: prev.map_or(1, |p| p.seq + 1),
            prev_hash: prev.map(|p| p.hash),
            hash: [0; 32],
            event,
        };
        record.hash = record.compute_hash()?;
        Ok(record)
    }

    /// Recompute the record hash from its content.
    pub fn compute_hash(&self) -> Result<[u8; 32], LedgerError> {
        let mut canonical = self.clone();
        canonical.hash = [0; 32];
        let encoded = serde_json::to_vec(&canonical)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mtk-event-v1:");
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }

    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(amount: Amount) -> LedgerEvent {
        LedgerEvent::Transfer {
            from: Principal::ZERO,
            to: Principal::derive("alice"),
            amount,
        }
    }

    #[test]
    fn records_chain_by_hash() {
        let first = EventRecord::next(None, transfer(1)).unwrap();
        let second = EventRecord::next(Some(&first), transfer(2)).unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(first.prev_hash, None);
        assert_eq!(second.seq, 2);
        assert_eq!(second.prev_hash, Some(first.hash));
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn tampering_changes_hash() {
        let mut record = EventRecord::next(None, transfer(100)).unwrap();
        assert_eq!(record.compute_hash().unwrap(), record.hash);

        record.event = transfer(999);
        assert_ne!(record.compute_hash().unwrap(), record.hash);
    }

    #[test]
    fn participants_and_kind() {
        let alice = Principal::derive("alice");
        let event = LedgerEvent::RoleGranted {
            role: Role::Minter,
            account: alice,
            sender: Principal::derive("owner"),
        };
        assert_eq!(event.kind(), EventKind::RoleGranted);
        assert!(event.involves(&alice));
        assert!(!event.involves(&Principal::derive("bob")));
    }

    #[test]
    fn json_is_keyed_by_event_name() {
        let json = serde_json::to_string(&transfer(5)).unwrap();
        assert!(json.starts_with("{\"Transfer\":{"));
        let parsed: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, transfer(5));
    }

    #[test]
    fn large_amounts_survive_json() {
        let event = transfer(u128::MAX);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn display_is_compact() {
        let shown = transfer(7).to_string();
        assert!(shown.starts_with("Transfer(0x00000000, 0x"));
        assert!(shown.ends_with(", 7)"));
    }
}
