//! Stock ledger.
//!
//! Every movement of a product's stock is an append-only
//! [`StockTransaction`]. The ledger guarantees, per product:
//!
//! - `seq` runs 1, 2, 3, … with no gaps.
//! - `new_stock = max(0, previous_stock + quantity_change)` (zero floor).
//! - Folding `quantity_change` from 0 with the same zero floor
//!   ([`replay`]) reproduces the product's current stock.
//! - Each entry carries `hash_prev` (previous entry's `hash_self`) and
//!   `hash_self` (SHA-256 of the entry's canonical JSON without
//!   `hash_self`), so an edited or deleted row is detectable.

use chrono::{DateTime, SubsecRound, Utc};
use rxd_schemas::{StockAdjustment, StockReason, StockTransaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Apply a signed change to a stock level, clipping at zero.
pub fn apply_change(current: i64, change: i64) -> i64 {
    current.saturating_add(change).max(0)
}

/// Fold requested changes from an empty shelf, in ledger order.
pub fn replay<I>(changes: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    changes.into_iter().fold(0, apply_change)
}

// ---------------------------------------------------------------------------
// Posting
// ---------------------------------------------------------------------------

/// The tail of a product's ledger: what the next entry chains onto.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerHead {
    pub seq: i64,
    pub hash: Option<String>,
}

impl LedgerHead {
    pub fn of(last: Option<&StockTransaction>) -> Self {
        match last {
            Some(tx) => Self {
                seq: tx.seq,
                hash: Some(tx.hash_self.clone()),
            },
            None => Self::default(),
        }
    }
}

/// Reject adjustments that can never be valid, independent of current stock.
pub fn validate_adjustment(adj: &StockAdjustment) -> Result<(), LedgerError> {
    if adj.quantity_change == 0 {
        return Err(LedgerError::ZeroChange);
    }
    match adj.reason {
        StockReason::Initial | StockReason::Restock if adj.quantity_change < 0 => {
            Err(LedgerError::NonPositiveChange {
                reason: adj.reason.as_str(),
                change: adj.quantity_change,
            })
        }
        r if r.is_order_driven() && adj.order_id.is_none() => Err(LedgerError::MissingOrderId {
            reason: r.as_str(),
        }),
        _ => Ok(()),
    }
}

/// Build the next ledger entry for `adj` on top of `head`.
///
/// `at` is truncated to microseconds: that is the precision Postgres keeps,
/// and the hash must survive a round trip through the store.
pub fn post_adjustment(
    current_stock: i64,
    head: &LedgerHead,
    adj: &StockAdjustment,
    id: Uuid,
    at: DateTime<Utc>,
) -> Result<StockTransaction, LedgerError> {
    validate_adjustment(adj)?;

    let mut tx = StockTransaction {
        id,
        product_id: adj.product_id,
        seq: head.seq + 1,
        quantity_change: adj.quantity_change,
        previous_stock: current_stock,
        new_stock: apply_change(current_stock, adj.quantity_change),
        reason: adj.reason,
        order_id: adj.order_id,
        actor_id: adj.actor_id,
        note: adj.note.clone(),
        created_at: at.trunc_subsecs(6),
        hash_prev: head.hash.clone(),
        hash_self: String::new(),
    };
    tx.hash_self = compute_entry_hash(&tx)?;
    Ok(tx)
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// SHA-256 over the canonical JSON of the entry with `hash_self` removed.
pub fn compute_entry_hash(tx: &StockTransaction) -> Result<String, LedgerError> {
    let mut raw = serde_json::to_value(tx).map_err(|e| LedgerError::Hash(e.to_string()))?;
    if let Value::Object(map) = &mut raw {
        map.remove("hash_self");
    }
    let canonical =
        serde_json::to_string(&sort_keys(&raw)).map_err(|e| LedgerError::Hash(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for k in keys {
                out.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(out)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainStatus {
    Valid,
    Broken { seq: i64, reason: String },
}

/// Result of checking one product's ledger against its stored stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVerification {
    pub entry_count: usize,
    pub replayed_stock: i64,
    pub current_stock: i64,
    /// Chain intact and replay equals current stock.
    pub consistent: bool,
    pub chain: ChainStatus,
}

/// Verify a single product's entries (ascending `seq`) against `current_stock`.
pub fn verify(entries: &[StockTransaction], current_stock: i64) -> LedgerVerification {
    let mut running = 0i64;
    let mut prev_hash: Option<String> = None;
    let mut chain = ChainStatus::Valid;

    for (i, tx) in entries.iter().enumerate() {
        let expected_seq = i as i64 + 1;
        if let Some(reason) = check_entry(tx, expected_seq, running, prev_hash.as_deref()) {
            chain = ChainStatus::Broken {
                seq: tx.seq,
                reason,
            };
            break;
        }
        running = apply_change(running, tx.quantity_change);
        prev_hash = Some(tx.hash_self.clone());
    }

    let replayed_stock = replay(entries.iter().map(|tx| tx.quantity_change));
    LedgerVerification {
        entry_count: entries.len(),
        replayed_stock,
        current_stock,
        consistent: chain == ChainStatus::Valid && replayed_stock == current_stock,
        chain,
    }
}

fn check_entry(
    tx: &StockTransaction,
    expected_seq: i64,
    running: i64,
    prev_hash: Option<&str>,
) -> Option<String> {
    if tx.seq != expected_seq {
        return Some(format!("seq gap: expected {expected_seq}, got {}", tx.seq));
    }
    if tx.hash_prev.as_deref() != prev_hash {
        return Some(format!(
            "hash_prev mismatch: expected {:?}, got {:?}",
            prev_hash, tx.hash_prev
        ));
    }
    match compute_entry_hash(tx) {
        Ok(h) if h == tx.hash_self => {}
        Ok(h) => {
            return Some(format!(
                "hash_self mismatch: claimed {}, recomputed {}",
                tx.hash_self, h
            ))
        }
        Err(e) => return Some(e.to_string()),
    }
    if tx.previous_stock != running {
        return Some(format!(
            "previous_stock {} does not match replayed {}",
            tx.previous_stock, running
        ));
    }
    let expected_new = apply_change(running, tx.quantity_change);
    if tx.new_stock != expected_new {
        return Some(format!(
            "new_stock {} does not match replayed {}",
            tx.new_stock, expected_new
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adj(change: i64, reason: StockReason) -> StockAdjustment {
        StockAdjustment {
            product_id: Uuid::nil(),
            quantity_change: change,
            reason,
            order_id: reason.is_order_driven().then(Uuid::new_v4),
            actor_id: Uuid::nil(),
            note: None,
        }
    }

    #[test]
    fn apply_change_clips_at_zero() {
        assert_eq!(apply_change(5, -3), 2);
        assert_eq!(apply_change(5, -9), 0);
        assert_eq!(apply_change(0, 4), 4);
        assert_eq!(apply_change(i64::MAX, 1), i64::MAX);
    }

    #[test]
    fn replay_is_order_sensitive_because_of_the_floor() {
        assert_eq!(replay([10, -15, 5]), 5);
        assert_eq!(replay([10, 5, -15]), 0);
    }

    #[test]
    fn validate_rejects_zero_and_negative_restock() {
        assert_eq!(
            validate_adjustment(&adj(0, StockReason::Adjustment)),
            Err(LedgerError::ZeroChange)
        );
        assert!(matches!(
            validate_adjustment(&adj(-1, StockReason::Restock)),
            Err(LedgerError::NonPositiveChange { .. })
        ));
        assert!(validate_adjustment(&adj(-1, StockReason::Adjustment)).is_ok());

        let mut a = adj(-1, StockReason::OrderApproved);
        a.order_id = None;
        assert!(matches!(
            validate_adjustment(&a),
            Err(LedgerError::MissingOrderId { .. })
        ));
    }

    #[test]
    fn post_chains_onto_head() {
        let at = Utc::now();
        let first = post_adjustment(
            0,
            &LedgerHead::default(),
            &adj(7, StockReason::Initial),
            Uuid::new_v4(),
            at,
        )
        .unwrap();
        assert_eq!(first.seq, 1);
        assert!(first.hash_prev.is_none());

        let head = LedgerHead::of(Some(&first));
        let second = post_adjustment(
            7,
            &head,
            &adj(-10, StockReason::Adjustment),
            Uuid::new_v4(),
            at,
        )
        .unwrap();
        assert_eq!(second.seq, 2);
        assert_eq!(second.hash_prev.as_deref(), Some(first.hash_self.as_str()));
        assert_eq!(second.new_stock, 0);
        assert_eq!(second.applied_change(), -7);
    }
}
