//! Dataset-wide duplicate grouping.
//!
//! Must run once over the whole batch before any rule evaluation: a
//! transaction's duplicate status depends on siblings anywhere in the batch.

use crate::{
    model::Transaction,
    types::{GroupKey, TransactionId},
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct DuplicateGroups {
    groups: BTreeMap<GroupKey, Vec<TransactionId>>,
    by_transaction: HashMap<TransactionId, GroupKey>,
}

impl DuplicateGroups {
    /// Members of the duplicate group containing `transaction_id`, or `None`
    /// when the transaction has no sibling.
    pub fn group_of(&self, transaction_id: &str) -> Option<&[TransactionId]> {
        let key = self.by_transaction.get(transaction_id)?;
        self.groups
            .get(key)
            .filter(|ids| ids.len() > 1)
            .map(Vec::as_slice)
    }

    /// Only groups with more than one member.
    pub fn duplicate_groups(&self) -> impl Iterator<Item = (&GroupKey, &Vec<TransactionId>)> {
        self.groups.iter().filter(|(_, ids)| ids.len() > 1)
    }

    pub fn duplicate_group_count(&self) -> usize {
        self.duplicate_groups().count()
    }

    /// Every group, including singletons.
    pub fn all(&self) -> &BTreeMap<GroupKey, Vec<TransactionId>> {
        &self.groups
    }
}

/// `VENDOR|YYYY-MM-DD|cents`, or `None` for a blank vendor.
pub fn group_key(txn: &Transaction) -> Option<GroupKey> {
    let vendor = txn.normalized_vendor();
    if vendor.is_empty() {
        return None;
    }
    Some(format!("{}|{}|{}", vendor, txn.date, txn.amount_cents()))
}

pub fn group_duplicates(batch: &[Transaction]) -> DuplicateGroups {
    let mut out = DuplicateGroups::default();
    for txn in batch {
        let Some(key) = group_key(txn) else { continue };
        out.groups.entry(key.clone()).or_default().push(txn.id.clone());
        out.by_transaction.insert(txn.id.clone(), key);
    }
    log::debug!(
        "grouped {} transactions into {} keys ({} duplicate groups)",
        batch.len(),
        out.groups.len(),
        out.duplicate_group_count()
    );
    out
}
