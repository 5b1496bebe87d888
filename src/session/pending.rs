//! Waiter bookkeeping for in-flight commands, expected acks and binary
//! request contexts.
//!
//! The table is the only shared state between command callers and the
//! receive loop. It lives behind a plain mutex that is never held across
//! an await; waiters resolve through oneshot channels and every
//! registration hands back a guard that removes the entry when the caller
//! gives up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::event::Event;
use crate::protocol::command::BinaryReqType;
use crate::protocol::response::ResponseCode;
use crate::types::{Acknowledgement, KeyPrefix};

/// Context of a binary request, recovered later via its response tag.
#[derive(Debug, Clone)]
pub(crate) struct BinaryRequestInfo {
    pub pubkey_prefix: KeyPrefix,
    pub request_type: BinaryReqType,
    pub neighbour_prefix_len: usize,
}

struct BinaryContext {
    info: BinaryRequestInfo,
    deadline: Instant,
}

struct CommandEntry {
    id: u64,
    expected: Vec<ResponseCode>,
    sender: oneshot::Sender<Event>,
    binary: Option<BinaryRequestInfo>,
}

struct AckEntry {
    id: u64,
    sender: Option<oneshot::Sender<Acknowledgement>>,
    /// Kept here until the caller claims it, so an ack that lands in the
    /// gap between the send confirmation and the claim is buffered inside
    /// the channel instead of lost.
    receiver: Option<oneshot::Receiver<Acknowledgement>>,
    deadline: Instant,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    command: Option<CommandEntry>,
    acks: HashMap<u32, AckEntry>,
    binary: HashMap<u32, BinaryContext>,
}

/// Shared pending-waiter table.
#[derive(Clone)]
pub(crate) struct Pending {
    table: Arc<Mutex<Table>>,
    binary_ttl: Duration,
}

impl Pending {
    pub(crate) fn new(binary_ttl: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(Table::default())),
            binary_ttl,
        }
    }

    /// Registers the single in-flight command.
    ///
    /// Callers serialize on the session's command gate, so a previous entry
    /// can only be a leftover from an abandoned caller; it is replaced.
    pub(crate) fn register_command(
        &self,
        expected: Vec<ResponseCode>,
        binary: Option<BinaryRequestInfo>,
    ) -> (CommandGuard, oneshot::Receiver<Event>) {
        let (sender, receiver) = oneshot::channel();
        let mut table = self.lock();
        table.next_id += 1;
        let id = table.next_id;
        if table.command.is_some() {
            tracing::debug!("replacing abandoned pending command entry");
        }
        table.command = Some(CommandEntry {
            id,
            expected,
            sender,
            binary,
        });
        drop(table);

        (
            CommandGuard {
                table: Arc::clone(&self.table),
                id,
            },
            receiver,
        )
    }

    /// Resolves the pending command if `code` is in its expected set.
    ///
    /// A resolved send confirmation also arms the ack slot and the binary
    /// context for its tag, under the same lock, so no later frame can win
    /// the race against the caller claiming them.
    pub(crate) fn resolve_command(&self, code: ResponseCode, event: &Event) -> bool {
        let mut table = self.lock();
        let matches = table
            .command
            .as_ref()
            .is_some_and(|entry| entry.expected.contains(&code));
        if !matches {
            return false;
        }

        let entry = table.command.take().expect("checked above");

        if let Event::MessageSent(sent) = event {
            let deadline = Instant::now()
                + Duration::from_millis(u64::from(sent.suggested_timeout_ms))
                + Duration::from_secs(1);
            let (ack_tx, ack_rx) = oneshot::channel();
            table.next_id += 1;
            let ack_id = table.next_id;
            table.acks.insert(
                sent.expected_ack,
                AckEntry {
                    id: ack_id,
                    sender: Some(ack_tx),
                    receiver: Some(ack_rx),
                    deadline,
                },
            );

            if let Some(info) = entry.binary {
                table.binary.insert(
                    sent.expected_ack,
                    BinaryContext {
                        info,
                        deadline: Instant::now() + self.binary_ttl,
                    },
                );
            }
        }
        Self::purge_expired(&mut table);
        drop(table);

        // The receiver may be gone if the caller was cancelled; the caller's
        // guard already removed nothing (the entry was just taken), and the
        // event stays observable through the subscriber copy the session
        // routes on resolution failure.
        entry.sender.send(event.clone()).is_ok()
    }

    /// Claims the ack receiver armed by a send confirmation.
    pub(crate) fn claim_ack(
        &self,
        code: u32,
    ) -> Option<(AckGuard, oneshot::Receiver<Acknowledgement>)> {
        let mut table = self.lock();
        let (receiver, id, resolved) = {
            let entry = table.acks.get_mut(&code)?;
            (entry.receiver.take()?, entry.id, entry.sender.is_none())
        };
        if resolved {
            // Already resolved; the value is buffered in the channel.
            table.acks.remove(&code);
        }
        drop(table);
        Some((
            AckGuard {
                table: Arc::clone(&self.table),
                code,
                id,
            },
            receiver,
        ))
    }

    /// Resolves an ack waiter. Returns true when a waiter existed.
    pub(crate) fn resolve_ack(&self, ack: &Acknowledgement) -> bool {
        let mut table = self.lock();
        let (sender, claimed) = {
            let Some(entry) = table.acks.get_mut(&ack.code) else {
                return false;
            };
            let Some(sender) = entry.sender.take() else {
                return false;
            };
            (sender, entry.receiver.is_none())
        };
        if claimed {
            table.acks.remove(&ack.code);
        }
        drop(table);
        let _ = sender.send(*ack);
        true
    }

    /// Looks up and removes the binary request context for a response tag.
    pub(crate) fn take_binary(&self, tag: u32) -> Option<BinaryRequestInfo> {
        let mut table = self.lock();
        Self::purge_expired(&mut table);
        table.binary.remove(&tag).map(|ctx| ctx.info)
    }

    /// Drops every waiter; their receivers observe a closed channel.
    pub(crate) fn fail_all(&self) {
        let mut table = self.lock();
        table.command = None;
        table.acks.clear();
        table.binary.clear();
    }

    fn purge_expired(table: &mut Table) {
        let now = Instant::now();
        table.acks.retain(|_, entry| entry.deadline > now);
        table.binary.retain(|_, ctx| ctx.deadline > now);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Removes the pending command entry on drop unless it was resolved.
pub(crate) struct CommandGuard {
    table: Arc<Mutex<Table>>,
    id: u64,
}

impl Drop for CommandGuard {
    fn drop(&mut self) {
        let mut table = self
            .table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if table.command.as_ref().is_some_and(|entry| entry.id == self.id) {
            table.command = None;
        }
    }
}

/// Removes an ack waiter on drop unless it was resolved.
pub(crate) struct AckGuard {
    table: Arc<Mutex<Table>>,
    code: u32,
    id: u64,
}

impl Drop for AckGuard {
    fn drop(&mut self) {
        let mut table = self
            .table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if table
            .acks
            .get(&self.code)
            .is_some_and(|entry| entry.id == self.id)
        {
            table.acks.remove(&self.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageSent;

    fn pending() -> Pending {
        Pending::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_resolve_matching_command() {
        let pending = pending();
        let (_guard, rx) = pending.register_command(vec![ResponseCode::CurrentTime], None);

        assert!(!pending.resolve_command(ResponseCode::Battery, &Event::CurrentTime(1)));
        assert!(pending.resolve_command(ResponseCode::CurrentTime, &Event::CurrentTime(7)));
        assert_eq!(rx.await.unwrap(), Event::CurrentTime(7));

        // Entry consumed; a second response no longer matches.
        assert!(!pending.resolve_command(ResponseCode::CurrentTime, &Event::CurrentTime(8)));
    }

    #[tokio::test]
    async fn test_guard_removes_entry_on_cancel() {
        let pending = pending();
        let (guard, rx) = pending.register_command(vec![ResponseCode::Ok], None);
        drop(guard);
        drop(rx);
        assert!(!pending.resolve_command(
            ResponseCode::Ok,
            &Event::Ok {
                data: bytes::Bytes::new()
            }
        ));
    }

    #[tokio::test]
    async fn test_message_sent_arms_ack_slot() {
        let pending = pending();
        let sent = MessageSent {
            is_flood: false,
            expected_ack: 0x0403_0201,
            suggested_timeout_ms: 5000,
        };
        let (_guard, _rx) = pending.register_command(vec![ResponseCode::MsgSent], None);
        assert!(pending.resolve_command(ResponseCode::MsgSent, &Event::MessageSent(sent)));

        // Ack arrives before the caller claims the receiver.
        let ack = Acknowledgement {
            code: 0x0403_0201,
            round_trip_ms: None,
        };
        assert!(pending.resolve_ack(&ack));
        assert!(!pending.resolve_ack(&ack), "second ack finds no waiter");

        let (_ack_guard, ack_rx) = pending.claim_ack(0x0403_0201).expect("slot armed");
        assert_eq!(ack_rx.await.unwrap(), ack);

        // Slot fully consumed.
        assert!(pending.claim_ack(0x0403_0201).is_none());
    }

    #[tokio::test]
    async fn test_binary_context_registered_with_send_confirmation() {
        let pending = pending();
        let info = BinaryRequestInfo {
            pubkey_prefix: KeyPrefix::from_slice(&[1, 2, 3, 4, 5, 6]),
            request_type: BinaryReqType::Status,
            neighbour_prefix_len: 4,
        };
        let (_guard, _rx) = pending.register_command(vec![ResponseCode::MsgSent], Some(info));
        let sent = MessageSent {
            is_flood: false,
            expected_ack: 42,
            suggested_timeout_ms: 1000,
        };
        assert!(pending.resolve_command(ResponseCode::MsgSent, &Event::MessageSent(sent)));

        let ctx = pending.take_binary(42).expect("context stored");
        assert_eq!(ctx.request_type, BinaryReqType::Status);
        assert_eq!(ctx.pubkey_prefix.as_bytes(), &[1, 2, 3, 4, 5, 6]);
        assert!(pending.take_binary(42).is_none(), "context is single-use");
    }

    #[tokio::test]
    async fn test_fail_all_closes_waiters() {
        let pending = pending();
        let (_guard, rx) = pending.register_command(vec![ResponseCode::Ok], None);
        pending.fail_all();
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclaimed_ack_slot_expires() {
        let pending = pending();
        let sent = MessageSent {
            is_flood: false,
            expected_ack: 9,
            suggested_timeout_ms: 100,
        };
        let (_guard, _rx) = pending.register_command(vec![ResponseCode::MsgSent], None);
        pending.resolve_command(ResponseCode::MsgSent, &Event::MessageSent(sent));

        tokio::time::advance(Duration::from_secs(5)).await;
        // Purge runs on the next table operation.
        let _ = pending.take_binary(0);
        assert!(pending.claim_ack(9).is_none());
    }
}
