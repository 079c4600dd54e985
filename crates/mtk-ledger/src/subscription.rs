use tokio::sync::broadcast;

use mtk_types::Principal;

use crate::event::{EventKind, EventRecord};

/// Filter for subscribing to a subset of ledger events.
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// If set, only events of these kinds are delivered.
    pub kinds: Option<Vec<EventKind>>,
    /// If set, only events naming at least one of these principals are delivered.
    pub principals: Option<Vec<Principal>>,
}

impl EventFilter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            principals: None,
        }
    }

    pub fn principal(principal: Principal) -> Self {
        Self {
            kinds: None,
            principals: Some(vec![principal]),
        }
    }

    /// Returns `true` if the given record matches this filter.
    pub fn matches(&self, record: &EventRecord) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&record.event.kind()) {
                return false;
            }
        }
        if let Some(ref principals) = self.principals {
            if !principals.iter().any(|p| record.event.involves(p)) {
                return false;
            }
        }
        true
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<EventRecord>;

struct Subscriber {
    filter: EventFilter,
    sender: broadcast::Sender<EventRecord>,
}

/// Fan-out router that delivers committed events to matching subscribers.
///
/// The router lives inside the ledger state and is driven while the ledger
/// write lock is held, so every subscriber sees events in log order.
#[derive(Default)]
pub(crate) struct EventRouter {
    subscribers: Vec<Subscriber>,
}

impl EventRouter {
    pub(crate) fn subscribe(&mut self, filter: EventFilter, capacity: usize) -> EventStream {
        let (sender, rx) = broadcast::channel(capacity.max(1));
        self.subscribers.push(Subscriber { filter, sender });
        rx
    }

    /// Route a record to all matching subscribers, pruning closed channels.
    pub(crate) fn route(&mut self, record: &EventRecord) {
        self.subscribers.retain(|sub| {
            if sub.filter.matches(record) {
                sub.sender.send(record.clone()).is_ok()
            } else {
                sub.sender.receiver_count() > 0
            }
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LedgerEvent;
    use mtk_types::Role;

    fn record(event: LedgerEvent) -> EventRecord {
        EventRecord::next(None, event).unwrap()
    }

    fn mint_transfer(to: Principal) -> EventRecord {
        record(LedgerEvent::Transfer {
            from: Principal::ZERO,
            to,
            amount: 10,
        })
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(EventFilter::all().matches(&mint_transfer(Principal::derive("a"))));
    }

    #[test]
    fn kind_filter() {
        let filter = EventFilter::kinds([EventKind::Approval]);
        assert!(!filter.matches(&mint_transfer(Principal::derive("a"))));
    }

    #[test]
    fn principal_filter() {
        let alice = Principal::derive("alice");
        let filter = EventFilter::principal(alice);
        assert!(filter.matches(&mint_transfer(alice)));
        assert!(!filter.matches(&mint_transfer(Principal::derive("bob"))));
        assert!(filter.matches(&record(LedgerEvent::RoleGranted {
            role: Role::Minter,
            account: alice,
            sender: Principal::derive("owner"),
        })));
    }

    #[test]
    fn router_delivers_and_prunes() {
        let mut router = EventRouter::default();
        let mut rx = router.subscribe(EventFilter::all(), 8);
        let dropped = router.subscribe(EventFilter::all(), 8);
        drop(dropped);

        let rec = mint_transfer(Principal::derive("alice"));
        router.route(&rec);

        assert_eq!(rx.try_recv().unwrap(), rec);
        assert_eq!(router.subscriber_count(), 1);
    }
}
