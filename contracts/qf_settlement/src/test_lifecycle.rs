use crate::invariants::{
    assert_active_only_closes, assert_monotonic, assert_project_immutable_fields,
    assert_sequential_ids,
};
use crate::testutils::{RecordingOracle, TransparentEngine};
use crate::{ActorId, Error, ErrorCategory, Ledger, Project, ProjectId, RevealState, SubmitterPolicy};

type TestLedger = Ledger<TransparentEngine, RecordingOracle>;

fn setup() -> TestLedger {
    let mut ledger = Ledger::new(TransparentEngine::new(), RecordingOracle::new(), SubmitterPolicy);
    ledger.set_timestamp(1_700_000_000);
    ledger
}

fn submit(ledger: &mut TestLedger, submitter: &str) -> Project {
    let e = ledger.engine();
    let (title, description, location, budget) = (
        e.encrypt_text("Community garden"),
        e.encrypt_text("Raised beds and a tool shed"),
        e.encrypt_text("Lot 12"),
        e.encrypt_uint(5_000),
    );
    ledger
        .submit_project(ActorId::new(submitter), title, description, location, budget)
        .unwrap()
}

fn contribute(ledger: &mut TestLedger, who: &str, id: ProjectId, amount: u128) -> Result<u32, Error> {
    let amount = ledger.engine().encrypt_uint(amount);
    ledger.contribute(ActorId::new(who), id, amount)
}

fn total(ledger: &TestLedger, id: ProjectId) -> u128 {
    let project = ledger.get_project(id).unwrap();
    ledger.engine().decrypt_uint(&project.total_contributed).unwrap()
}

fn sqrt_sum(ledger: &TestLedger, id: ProjectId) -> u128 {
    let c = ledger.project_sqrt_sum(id).unwrap();
    ledger.engine().decrypt_uint(&c).unwrap()
}

#[test]
fn test_submit_assigns_sequential_ids() {
    let mut ledger = setup();
    let projects: Vec<Project> = (0..4).map(|_| submit(&mut ledger, "alice")).collect();

    assert_sequential_ids(&projects);
    assert_eq!(ledger.project_count().unwrap(), 4);
    for p in &projects {
        assert!(p.active);
        assert_eq!(p.created_at, 1_700_000_000);
        assert_eq!(total(&ledger, p.id), 0);
        assert_eq!(ledger.reveal_state(p.id).unwrap(), RevealState::Hidden);
        assert!(!ledger.get_revealed(p.id).unwrap().revealed);
    }
}

#[test]
fn test_total_equals_sum_of_contributions() {
    let sequences: [&[u128]; 4] = [&[], &[7], &[1, 4, 9], &[100, 0, 3, 3, 250, 1]];

    for amounts in sequences {
        let mut ledger = setup();
        let p = submit(&mut ledger, "alice");
        let mut previous = 0;
        for (i, amount) in amounts.iter().enumerate() {
            let index = contribute(&mut ledger, &format!("donor{i}"), p.id, *amount).unwrap();
            assert_eq!(index, i as u32);

            let now = total(&ledger, p.id);
            assert_monotonic("total", previous, now);
            previous = now;
        }
        assert_eq!(total(&ledger, p.id), amounts.iter().sum::<u128>());
    }
}

#[test]
fn test_contribute_after_close_fails_and_leaves_accumulators() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");
    contribute(&mut ledger, "bob", p.id, 16).unwrap();
    ledger.close_project(&ActorId::new("alice"), p.id).unwrap();

    let total_before = total(&ledger, p.id);
    let sqrt_before = sqrt_sum(&ledger, p.id);
    let bob_before = ledger.contributor_sqrt_sum(&ActorId::new("bob")).unwrap();
    let events_before = ledger.events().len();

    assert_eq!(contribute(&mut ledger, "bob", p.id, 25), Err(Error::InactiveProject));
    assert_eq!(contribute(&mut ledger, "carol", p.id, 1), Err(Error::InactiveProject));

    assert_eq!(total(&ledger, p.id), total_before);
    assert_eq!(sqrt_sum(&ledger, p.id), sqrt_before);
    assert_eq!(ledger.contributor_sqrt_sum(&ActorId::new("bob")).unwrap(), bob_before);
    assert_eq!(ledger.contributor_sqrt_sum(&ActorId::new("carol")).unwrap(), None);
    assert_eq!(ledger.contributions(p.id, 0, 10).unwrap().total, 1);
    assert_eq!(ledger.events().len(), events_before);
}

#[test]
fn test_close_requires_submitter() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");

    let err = ledger.close_project(&ActorId::new("mallory"), p.id).unwrap_err();
    assert_eq!(err, Error::NotAuthorized);
    assert_eq!(err.category(), ErrorCategory::Authorization);
    assert!(ledger.get_project(p.id).unwrap().active);

    ledger.close_project(&ActorId::new("alice"), p.id).unwrap();
    let closed = ledger.get_project(p.id).unwrap();
    assert!(!closed.active);
    assert_active_only_closes(&p, &closed);
    assert_project_immutable_fields(&p, &closed);
}

#[test]
fn test_close_twice_is_already_inactive() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");
    let alice = ActorId::new("alice");

    ledger.close_project(&alice, p.id).unwrap();
    assert_eq!(ledger.close_project(&alice, p.id), Err(Error::AlreadyInactive));
    // Authorization is checked first.
    assert_eq!(
        ledger.close_project(&ActorId::new("bob"), p.id),
        Err(Error::NotAuthorized)
    );
}

#[test]
fn test_unknown_project_is_not_found() {
    let mut ledger = setup();
    let ghost = ProjectId(42);

    assert_eq!(contribute(&mut ledger, "bob", ghost, 1), Err(Error::ProjectNotFound));
    assert_eq!(
        ledger.close_project(&ActorId::new("bob"), ghost),
        Err(Error::ProjectNotFound)
    );
    assert_eq!(ledger.get_matching(ghost), Err(Error::ProjectNotFound));
    assert_eq!(ledger.reveal_state(ghost), Err(Error::ProjectNotFound));
    assert_eq!(ledger.contributions(ghost, 0, 1).unwrap_err().category(), ErrorCategory::NotFound);
}

#[test]
fn test_engine_failure_leaves_accumulators_untouched() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");
    contribute(&mut ledger, "bob", p.id, 9).unwrap();

    ledger.engine().set_fail_sqrt(true);
    let err = contribute(&mut ledger, "bob", p.id, 16).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert_eq!(err.category(), ErrorCategory::Backend);

    assert_eq!(total(&ledger, p.id), 9);
    assert_eq!(sqrt_sum(&ledger, p.id), 3);
    assert_eq!(ledger.contributions(p.id, 0, 10).unwrap().total, 1);

    ledger.engine().set_fail_sqrt(false);
    contribute(&mut ledger, "bob", p.id, 16).unwrap();
    assert_eq!(total(&ledger, p.id), 25);
    assert_eq!(sqrt_sum(&ledger, p.id), 7);
}

#[test]
fn test_engine_failure_on_first_contribution_leaves_no_slot() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");
    let carol = ActorId::new("carol");

    ledger.engine().set_fail_sqrt(true);
    let err = contribute(&mut ledger, "carol", p.id, 16).unwrap_err();
    assert!(matches!(err, Error::Engine(_)));
    assert_eq!(ledger.contributor_sqrt_sum(&carol).unwrap(), None);
    assert_eq!(total(&ledger, p.id), 0);
    assert_eq!(ledger.contributions(p.id, 0, 10).unwrap().total, 0);

    ledger.engine().set_fail_sqrt(false);
    contribute(&mut ledger, "carol", p.id, 16).unwrap();
    let sum = ledger.contributor_sqrt_sum(&carol).unwrap().unwrap();
    assert_eq!(ledger.engine().decrypt_uint(&sum).unwrap(), 4);
}

#[test]
fn test_contributor_accumulator_spans_projects() {
    let mut ledger = setup();
    let p1 = submit(&mut ledger, "alice");
    let p2 = submit(&mut ledger, "carol");
    let bob = ActorId::new("bob");

    assert_eq!(ledger.contributor_sqrt_sum(&bob).unwrap(), None);

    contribute(&mut ledger, "bob", p1.id, 4).unwrap();
    let after_first = ledger.contributor_sqrt_sum(&bob).unwrap().unwrap();
    assert_eq!(ledger.engine().decrypt_uint(&after_first).unwrap(), 2);

    contribute(&mut ledger, "bob", p2.id, 9).unwrap();
    let after_second = ledger.contributor_sqrt_sum(&bob).unwrap().unwrap();
    assert_eq!(ledger.engine().decrypt_uint(&after_second).unwrap(), 5);
}

#[test]
fn test_contribution_history_pages() {
    let mut ledger = setup();
    let p = submit(&mut ledger, "alice");
    for i in 0..5u128 {
        ledger.set_timestamp(1_700_000_000 + i as u64);
        contribute(&mut ledger, &format!("d{i}"), p.id, i + 1).unwrap();
    }

    let first = ledger.contributions(p.id, 0, 2).unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[1].contributor, ActorId::new("d1"));

    let last = ledger.contributions(p.id, 4, 2).unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].index, 4);
    assert_eq!(last.items[0].timestamp, 1_700_000_004);
    assert_eq!(ledger.engine().decrypt_uint(&last.items[0].amount).unwrap(), 5);
}
