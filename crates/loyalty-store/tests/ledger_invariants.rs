//! Ledger invariants exercised through the public traits.

use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use loyalty_store::{
    AccrualRegistry, BalanceReader, ClaimLedger, DebitOutcome, HistoryReader, InsertOutcome,
    SqliteLedger, WithdrawalLedger,
};
use loyalty_types::{BalanceSnapshot, OperationId, OperationStatus, Resolution, UserId};

struct TempDb(PathBuf);

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("loyalty-{}.db", uuid::Uuid::now_v7()));
        Self(path)
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut p = self.0.clone().into_os_string();
            p.push(suffix);
            let _ = std::fs::remove_file(p);
        }
    }
}

fn inserted(outcome: InsertOutcome) -> OperationId {
    match outcome {
        InsertOutcome::Inserted(id) => id,
        other @ InsertOutcome::Existing { .. } => panic!("expected insert, got {other:?}"),
    }
}

/// Register an accrual and drive it to PROCESSED for `accrual` cents.
fn fund(ledger: &SqliteLedger, user: UserId, order: &str, accrual: i64) -> OperationId {
    let id = inserted(ledger.register_accrual(user, order).unwrap());
    let claimed = ledger.claim_new().unwrap();
    assert!(claimed.iter().any(|c| c.id == id));
    ledger.apply_resolutions(&[Resolution::processed(id, accrual)]).unwrap();
    id
}

#[test]
fn order_number_has_one_owner() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);
    let bob = UserId(2);

    inserted(ledger.register_accrual(alice, "12345678903").unwrap());
    for user in [alice, bob] {
        assert_eq!(
            ledger.register_accrual(user, "12345678903").unwrap(),
            InsertOutcome::Existing { owner: alice }
        );
    }
    assert_eq!(ledger.accruals(alice).unwrap().len(), 1);
    assert!(ledger.accruals(bob).unwrap().is_empty());
}

#[test]
fn balance_is_accruals_minus_withdrawals() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);

    fund(&ledger, alice, "12345678903", 72_950);
    fund(&ledger, alice, "79927398713", 10_000);
    // A pending accrual does not count.
    inserted(ledger.register_accrual(alice, "4561261212345467").unwrap());

    ledger.debit_if_covered(alice, "2377225624", 2_950).unwrap();
    ledger.debit_if_covered(alice, "2377225624", 50_000).unwrap();

    let snapshot = ledger.balance(alice).unwrap();
    assert_eq!(snapshot, BalanceSnapshot::new(30_000, 52_950));
    assert_eq!(snapshot.current + snapshot.withdrawn, 82_950);
}

#[test]
fn invalid_accrual_contributes_nothing() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);
    let id = inserted(ledger.register_accrual(alice, "12345678903").unwrap());
    ledger.claim_new().unwrap();
    ledger.apply_resolutions(&[Resolution::invalid(id)]).unwrap();

    let rows = ledger.accruals(alice).unwrap();
    assert_eq!(rows[0].status, OperationStatus::Invalid);
    assert_eq!(rows[0].sum, 0);
    assert_eq!(ledger.balance(alice).unwrap(), BalanceSnapshot::default());
}

#[test]
fn history_is_newest_first() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);
    for order in ["12345678903", "79927398713", "4561261212345467"] {
        ledger.register_accrual(alice, order).unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    let orders: Vec<_> = ledger
        .accruals(alice)
        .unwrap()
        .into_iter()
        .map(|op| op.order)
        .collect();
    assert_eq!(orders, ["4561261212345467", "79927398713", "12345678903"]);
}

#[test]
fn soft_deleted_rows_are_invisible() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);
    let id = fund(&ledger, alice, "12345678903", 5_000);
    assert!(ledger.soft_delete(id).unwrap());

    assert_eq!(ledger.balance(alice).unwrap(), BalanceSnapshot::default());
    assert!(ledger.accruals(alice).unwrap().is_empty());
    // The write-back never resurrects a deleted row.
    assert_eq!(ledger.apply_resolutions(&[Resolution::processed(id, 1)]).unwrap(), 0);
}

#[test]
fn claimed_rows_are_not_claimed_twice_across_handles() {
    let db = TempDb::new();
    let a = SqliteLedger::open(&db.0).unwrap();
    let b = SqliteLedger::open(&db.0).unwrap();
    let alice = UserId(1);
    for order in ["12345678903", "79927398713", "4561261212345467"] {
        a.register_accrual(alice, order).unwrap();
    }

    let first = a.claim_new().unwrap();
    let second = b.claim_new().unwrap();
    assert_eq!(first.len() + second.len(), 3);
    assert!(first.iter().all(|c| !second.contains(c)));
}

#[test]
fn concurrent_withdrawals_never_overdraw() {
    const WORKERS: usize = 8;
    let db = TempDb::new();

    let setup = SqliteLedger::open(&db.0).unwrap();
    let alice = UserId(1);
    fund(&setup, alice, "12345678903", 10_000);
    drop(setup);

    // Each handle is its own connection, so serialization comes from the
    // database, not from a shared mutex.
    let handles: Vec<_> = (0..WORKERS)
        .map(|_| Arc::new(SqliteLedger::open(&db.0).unwrap()))
        .collect();
    let threads: Vec<_> = handles
        .iter()
        .cloned()
        .map(|ledger| thread::spawn(move || ledger.debit_if_covered(alice, "2377225624", 3_000).unwrap()))
        .collect();
    let outcomes: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    let debited = outcomes
        .iter()
        .filter(|o| matches!(o, DebitOutcome::Debited(_)))
        .count();
    assert_eq!(debited, 3, "10000 covers exactly three debits of 3000");

    let snapshot = handles[0].balance(alice).unwrap();
    assert_eq!(snapshot, BalanceSnapshot::new(1_000, 9_000));
    assert!(snapshot.current >= 0);
}

#[test]
fn stale_claims_are_swept_back() {
    let ledger = SqliteLedger::in_memory().unwrap();
    let alice = UserId(1);
    let id = inserted(ledger.register_accrual(alice, "12345678903").unwrap());
    ledger.claim_new().unwrap();

    thread::sleep(Duration::from_millis(20));
    assert_eq!(ledger.requeue_stale(Duration::from_millis(10)).unwrap(), 1);

    let again = ledger.claim_new().unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, id);
}
