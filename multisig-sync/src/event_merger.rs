// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! Pure merge rules for the event ledger of one transaction. Nothing in here performs
//! I/O; callers read the current events, compute a diff and write it back from inside a
//! queued task.

use crate::{
    models::{
        AccountId, EventFamily, MultisigEvent, MultisigEventStatus, MultisigTxStatus,
        TransactionKey,
    },
    utils::{is_same_account, standardize_account_id},
};
use itertools::Itertools;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EventDiff {
    /// Events that don't exist yet.
    pub to_create: Vec<MultisigEvent>,
    /// Existing events with their status moved to the confirmed status of the family.
    pub to_promote: Vec<MultisigEvent>,
}

impl EventDiff {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_promote.is_empty()
    }
}

/// Diffs the signing family of `existing` against the approvers recorded on chain.
pub fn diff_approvals(
    tx_key: &TransactionKey,
    existing: &[MultisigEvent],
    on_chain_approvers: &[AccountId],
) -> EventDiff {
    diff_family(EventFamily::Signing, tx_key, existing, on_chain_approvers)
}

/// Diffs the cancelling family of `existing` against a set of confirmed cancellers.
pub fn diff_cancellations(
    tx_key: &TransactionKey,
    existing: &[MultisigEvent],
    cancellers: &[AccountId],
) -> EventDiff {
    diff_family(EventFamily::Cancelling, tx_key, existing, cancellers)
}

fn diff_family(
    family: EventFamily,
    tx_key: &TransactionKey,
    existing: &[MultisigEvent],
    confirmed_accounts: &[AccountId],
) -> EventDiff {
    let mut diff = EventDiff::default();
    let accounts = confirmed_accounts
        .iter()
        .unique_by(|account_id| standardize_account_id(account_id));

    for account_id in accounts {
        let live_event = find_live_event(existing, account_id, family);
        match live_event {
            Some(event) if event.status.is_confirmed() => {},
            Some(event) => {
                let mut promoted = event.clone();
                promoted.status = family.confirmed_status();
                diff.to_promote.push(promoted);
            },
            None => diff.to_create.push(MultisigEvent::new(
                tx_key,
                account_id,
                family.confirmed_status(),
            )),
        }
    }
    diff
}

/// The pending or confirmed event of `account_id` in `family`, if any. Error events are
/// history and never count as live.
pub fn find_live_event<'a>(
    events: &'a [MultisigEvent],
    account_id: &str,
    family: EventFamily,
) -> Option<&'a MultisigEvent> {
    let mut candidates = events.iter().filter(|event| {
        event.family() == family
            && (event.status.is_pending() || event.status.is_confirmed())
            && is_same_account(&event.account_id, account_id)
    });
    // Prefer the confirmed event if both are somehow present.
    let first = candidates.next()?;
    if first.status.is_confirmed() {
        return Some(first);
    }
    Some(
        candidates
            .find(|event| event.status.is_confirmed())
            .unwrap_or(first),
    )
}

/// Applies an incoming status to an existing event of the same family. A confirmed
/// status is never downgraded.
pub fn merge_status(
    current: MultisigEventStatus,
    incoming: MultisigEventStatus,
) -> MultisigEventStatus {
    if current.is_confirmed() {
        current
    } else {
        incoming
    }
}

/// Final status of a transaction that left the pending set, inferred from the off-chain
/// intents still pending locally. Cancellation wins over signing.
pub fn resolve_final_status(events: &[MultisigEvent]) -> MultisigTxStatus {
    if events
        .iter()
        .any(|event| event.status == MultisigEventStatus::PendingCancelled)
    {
        MultisigTxStatus::Cancelled
    } else if events
        .iter()
        .any(|event| event.status == MultisigEventStatus::PendingSigned)
    {
        MultisigTxStatus::Executed
    } else {
        MultisigTxStatus::Established
    }
}
