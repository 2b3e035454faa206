//! Single-slot mailbox with generation tickets
//!
//! Every request takes a [`Ticket`] with a strictly increasing generation.
//! Publishing only lands when the ticket is newer than what the slot already
//! holds, so late results from superseded requests never overwrite newer ones.
//! Readers only ever see the current slot contents.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

/// Generation ticket handed out per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Slot contents plus the generation that wrote them (0 = never written)
#[derive(Debug, Clone)]
pub struct Slot<T> {
    pub generation: u64,
    pub value: Option<T>,
}

/// Outcome of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Accepted,
    Stale,
}

pub struct Mailbox<T> {
    tx: watch::Sender<Slot<T>>,
    issued: AtomicU64,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Slot {
            generation: 0,
            value: None,
        });
        Self {
            tx,
            issued: AtomicU64::new(0),
        }
    }

    /// Take the next generation ticket
    pub fn ticket(&self) -> Ticket {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "Mailbox::ticket: issued");
        Ticket(generation)
    }

    /// Most recently issued generation
    pub fn latest_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// True if no newer ticket has been issued since `ticket`
    pub fn is_latest(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest_issued()
    }

    /// Generation of the value currently in the slot
    pub fn committed(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Store `value` unless a newer generation already committed
    pub fn publish(&self, ticket: Ticket, value: T) -> Publish {
        let mut value = Some(value);
        let accepted = self.tx.send_if_modified(|slot| {
            if ticket.0 > slot.generation {
                slot.generation = ticket.0;
                slot.value = value.take();
                true
            } else {
                false
            }
        });
        self.outcome(ticket, accepted)
    }

    /// Store `value` only if `ticket` is still the newest request
    ///
    /// Used where the reader is bound to the latest request rather than to
    /// the latest result.
    pub fn publish_latest(&self, ticket: Ticket, value: T) -> Publish {
        if !self.is_latest(ticket) {
            return self.outcome(ticket, false);
        }
        self.publish(ticket, value)
    }

    /// Watch the slot for commits
    pub fn subscribe(&self) -> watch::Receiver<Slot<T>> {
        self.tx.subscribe()
    }

    fn outcome(&self, ticket: Ticket, accepted: bool) -> Publish {
        if accepted {
            debug!(generation = ticket.0, "Mailbox::publish: accepted");
            Publish::Accepted
        } else {
            debug!(
                generation = ticket.0,
                committed = self.committed(),
                latest = self.latest_issued(),
                "Mailbox::publish: stale, discarded"
            );
            Publish::Stale
        }
    }
}

impl<T: Clone> Mailbox<T> {
    /// Clone of the current slot value
    pub fn current(&self) -> Option<T> {
        self.tx.borrow().value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_increase() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        let a = mailbox.ticket();
        let b = mailbox.ticket();
        assert!(b > a);
        assert_eq!(mailbox.latest_issued(), 2);
        assert!(mailbox.is_latest(b));
        assert!(!mailbox.is_latest(a));
    }

    #[test]
    fn test_newer_result_wins_regardless_of_arrival_order() {
        let mailbox = Mailbox::new();
        let first = mailbox.ticket();
        let second = mailbox.ticket();

        assert_eq!(mailbox.publish(second, "second"), Publish::Accepted);
        assert_eq!(mailbox.publish(first, "first"), Publish::Stale);
        assert_eq!(mailbox.current(), Some("second"));
        assert_eq!(mailbox.committed(), second.generation());
    }

    #[test]
    fn test_in_order_results_both_land() {
        let mailbox = Mailbox::new();
        let first = mailbox.ticket();
        let second = mailbox.ticket();

        assert_eq!(mailbox.publish(first, 1), Publish::Accepted);
        assert_eq!(mailbox.current(), Some(1));
        assert_eq!(mailbox.publish(second, 2), Publish::Accepted);
        assert_eq!(mailbox.current(), Some(2));
    }

    #[test]
    fn test_publish_latest_rejects_superseded_request() {
        let mailbox = Mailbox::new();
        let first = mailbox.ticket();
        let _second = mailbox.ticket();

        assert_eq!(mailbox.publish_latest(first, 1), Publish::Stale);
        assert_eq!(mailbox.current(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let mailbox = Mailbox::new();
        let mut rx = mailbox.subscribe();

        let ticket = mailbox.ticket();
        mailbox.publish(ticket, "cart");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, Some("cart"));
        assert_eq!(rx.borrow().generation, 1);
    }
}
