use crate::testutils::{RecordingOracle, TransparentEngine};
use crate::{ActorId, Error, ErrorCategory, Ledger, ProjectId, SubmitterPolicy};

type TestLedger = Ledger<TransparentEngine, RecordingOracle>;

fn setup_project() -> (TestLedger, ProjectId) {
    let mut ledger = Ledger::new(TransparentEngine::new(), RecordingOracle::new(), SubmitterPolicy);
    let e = ledger.engine();
    let fields = (
        e.encrypt_text("Library roof"),
        e.encrypt_text("Replace the leaking roof"),
        e.encrypt_text("Main St"),
        e.encrypt_uint(20_000),
    );
    let project = ledger
        .submit_project(ActorId::new("alice"), fields.0, fields.1, fields.2, fields.3)
        .unwrap();
    (ledger, project.id)
}

fn fund_and_close(amounts: &[u128]) -> (TestLedger, ProjectId) {
    let (mut ledger, id) = setup_project();
    for (i, amount) in amounts.iter().enumerate() {
        let c = ledger.engine().encrypt_uint(*amount);
        ledger.contribute(ActorId::new(format!("donor{i}")), id, c).unwrap();
    }
    ledger.close_project(&ActorId::new("alice"), id).unwrap();
    (ledger, id)
}

fn matching(ledger: &TestLedger, id: ProjectId) -> u128 {
    let c = ledger.get_matching(id).unwrap();
    ledger.engine().decrypt_uint(&c).unwrap()
}

#[test]
fn test_matching_is_square_of_sqrt_sum() {
    let (ledger, id) = fund_and_close(&[1, 4, 9]);
    assert_eq!(matching(&ledger, id), 36);
}

#[test]
fn test_matching_independent_of_order() {
    let orders: [[u128; 3]; 6] = [
        [1, 4, 9],
        [1, 9, 4],
        [4, 1, 9],
        [4, 9, 1],
        [9, 1, 4],
        [9, 4, 1],
    ];
    for order in orders {
        let (ledger, id) = fund_and_close(&order);
        assert_eq!(matching(&ledger, id), 36, "order {order:?}");
    }
}

#[test]
fn test_matching_rewards_breadth() {
    // Same total, different spread.
    let (broad, broad_id) = fund_and_close(&[25, 25, 25, 25]);
    let (narrow, narrow_id) = fund_and_close(&[100]);
    assert_eq!(matching(&broad, broad_id), 400);
    assert_eq!(matching(&narrow, narrow_id), 100);
}

#[test]
fn test_matching_on_open_project_fails() {
    let (mut ledger, id) = setup_project();
    let c = ledger.engine().encrypt_uint(4);
    ledger.contribute(ActorId::new("bob"), id, c).unwrap();

    let err = ledger.get_matching(id).unwrap_err();
    assert_eq!(err, Error::FundingStillActive);
    assert_eq!(err.category(), ErrorCategory::Lifecycle);
}

#[test]
fn test_matching_without_contributions_is_zero() {
    let (ledger, id) = fund_and_close(&[]);
    assert_eq!(matching(&ledger, id), 0);
}

#[test]
fn test_matching_is_stable_after_close() {
    let (mut ledger, id) = fund_and_close(&[16, 9]);
    let first = matching(&ledger, id);

    let late = ledger.engine().encrypt_uint(10_000);
    assert_eq!(
        ledger.contribute(ActorId::new("late"), id, late),
        Err(Error::InactiveProject)
    );
    assert_eq!(matching(&ledger, id), first);
    assert_eq!(first, 49);
}
