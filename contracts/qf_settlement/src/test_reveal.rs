use crate::invariants::{assert_reveal_irreversible, assert_valid_reveal_transition};
use crate::testutils::{RecordingOracle, TransparentEngine};
use crate::{
    ActorId, Ciphertext, DecryptionOracle, Error, ErrorCategory, Ledger, OracleError, Plaintext,
    ProjectId, RequestId, RevealState, RevealedFields, SubmitterPolicy,
};

type TestLedger = Ledger<TransparentEngine, RecordingOracle>;

fn alice() -> ActorId {
    ActorId::new("alice")
}

fn setup() -> (TestLedger, ProjectId) {
    let mut ledger = Ledger::new(TransparentEngine::new(), RecordingOracle::new(), SubmitterPolicy);
    ledger.set_timestamp(1_000);
    let e = ledger.engine();
    let fields = (
        e.encrypt_text("Plaza"),
        e.encrypt_text(""),
        e.encrypt_text(""),
        e.encrypt_uint(1000),
    );
    let project = ledger
        .submit_project(alice(), fields.0, fields.1, fields.2, fields.3)
        .unwrap();
    (ledger, project.id)
}

fn valid_callback(ledger: &TestLedger, request_id: &RequestId) -> (Vec<Plaintext>, Vec<u8>) {
    ledger.oracle().fulfil(ledger.engine(), request_id).unwrap()
}

fn plaza() -> RevealedFields {
    RevealedFields {
        title: "Plaza".into(),
        description: String::new(),
        location: String::new(),
        budget: 1000,
    }
}

#[test]
fn test_full_settlement_scenario() {
    let (mut ledger, id) = setup();
    for (who, amount) in [("d1", 1u128), ("d2", 4), ("d3", 9)] {
        let c = ledger.engine().encrypt_uint(amount);
        ledger.contribute(ActorId::new(who), id, c).unwrap();
    }
    ledger.close_project(&alice(), id).unwrap();

    let request_id = ledger.request_reveal(&alice(), id).unwrap();
    assert!(matches!(
        ledger.reveal_state(id).unwrap(),
        RevealState::RequestPending { request_id: r, requested_at: 1_000 } if r == request_id
    ));

    ledger.set_timestamp(1_060);
    let (payload, proof) = valid_callback(&ledger, &request_id);
    let revealed = ledger.on_decryption_callback(&request_id, &payload, &proof).unwrap();

    assert!(revealed.revealed);
    assert_eq!(revealed.fields, Some(plaza()));
    assert_eq!(revealed.revealed_at, Some(1_060));
    assert_eq!(ledger.reveal_state(id).unwrap(), RevealState::Revealed);
    assert!(ledger.pending_requests().is_empty());

    let matching = ledger.get_matching(id).unwrap();
    assert_eq!(ledger.engine().decrypt_uint(&matching).unwrap(), 36);
}

#[test]
fn test_request_batches_all_four_fields() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();

    let (recorded_id, handles) = &ledger.oracle().requests()[0];
    assert_eq!(*recorded_id, request_id);
    assert_eq!(handles, &ledger.get_project(id).unwrap().reveal_batch());
}

#[test]
fn test_duplicate_callback_is_unknown_request() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();
    let (payload, proof) = valid_callback(&ledger, &request_id);

    ledger.on_decryption_callback(&request_id, &payload, &proof).unwrap();
    let before = ledger.get_revealed(id).unwrap();
    let events_before = ledger.events().len();

    ledger.set_timestamp(9_999);
    let err = ledger
        .on_decryption_callback(&request_id, &payload, &proof)
        .unwrap_err();
    assert_eq!(err, Error::UnknownRequest);
    assert_eq!(err.category(), ErrorCategory::Correlation);

    let after = ledger.get_revealed(id).unwrap();
    assert_reveal_irreversible(&before, &after);
    assert_eq!(before, after);
    assert_eq!(ledger.events().len(), events_before);
}

#[test]
fn test_second_request_while_pending_is_rejected() {
    let (mut ledger, id) = setup();
    ledger.request_reveal(&alice(), id).unwrap();
    assert_eq!(
        ledger.request_reveal(&alice(), id),
        Err(Error::RequestAlreadyPending)
    );
    assert_eq!(ledger.oracle().requests().len(), 1);
}

#[test]
fn test_request_after_reveal_is_already_revealed() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();
    let (payload, proof) = valid_callback(&ledger, &request_id);
    ledger.on_decryption_callback(&request_id, &payload, &proof).unwrap();

    assert_eq!(ledger.request_reveal(&alice(), id), Err(Error::AlreadyRevealed));
}

#[test]
fn test_request_requires_submitter() {
    let (mut ledger, id) = setup();
    assert_eq!(
        ledger.request_reveal(&ActorId::new("mallory"), id),
        Err(Error::NotAuthorized)
    );
    assert!(ledger.oracle().requests().is_empty());
    assert_eq!(ledger.reveal_state(id).unwrap(), RevealState::Hidden);
}

#[test]
fn test_bad_proof_keeps_request_pending() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();
    let pending = ledger.reveal_state(id).unwrap();
    let (payload, proof) = valid_callback(&ledger, &request_id);

    let err = ledger
        .on_decryption_callback(&request_id, &payload, b"forged")
        .unwrap_err();
    assert_eq!(err, Error::ProofVerificationFailed);
    assert_eq!(err.category(), ErrorCategory::Integrity);

    // Tampered payload under an honest proof is rejected too.
    let mut tampered = payload.clone();
    tampered[3] = Plaintext::Uint(1);
    assert_eq!(
        ledger.on_decryption_callback(&request_id, &tampered, &proof),
        Err(Error::ProofVerificationFailed)
    );

    let still = ledger.reveal_state(id).unwrap();
    assert_valid_reveal_transition(&pending, &still);
    assert_eq!(still, pending);
    assert!(!ledger.get_revealed(id).unwrap().revealed);

    let revealed = ledger.on_decryption_callback(&request_id, &payload, &proof).unwrap();
    assert_eq!(revealed.fields, Some(plaza()));
}

#[test]
fn test_malformed_payload_keeps_request_pending() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();

    let short = vec![Plaintext::Text("Plaza".into()), Plaintext::Uint(1000)];
    let proof = RecordingOracle::proof_for(&request_id, &short);
    assert_eq!(
        ledger.on_decryption_callback(&request_id, &short, &proof),
        Err(Error::MalformedPayload)
    );
    assert!(matches!(
        ledger.reveal_state(id).unwrap(),
        RevealState::RequestPending { .. }
    ));

    let mut oversized = valid_callback(&ledger, &request_id).0;
    oversized[3] = Plaintext::Uint(u128::from(u64::MAX) + 1);
    let proof = RecordingOracle::proof_for(&request_id, &oversized);
    assert_eq!(
        ledger.on_decryption_callback(&request_id, &oversized, &proof),
        Err(Error::MalformedPayload)
    );

    let (payload, proof) = valid_callback(&ledger, &request_id);
    assert!(ledger.on_decryption_callback(&request_id, &payload, &proof).is_ok());
}

#[test]
fn test_callback_for_unissued_request() {
    let (mut ledger, _) = setup();
    let bogus = RequestId([7; 32]);
    let payload = vec![Plaintext::Uint(1)];
    let proof = RecordingOracle::proof_for(&bogus, &payload);
    assert_eq!(
        ledger.on_decryption_callback(&bogus, &payload, &proof),
        Err(Error::UnknownRequest)
    );
}

#[test]
fn test_expired_request_reopens_and_rejects_late_callback() {
    let (mut ledger, id) = setup();
    let stale = ledger.request_reveal(&alice(), id).unwrap();
    let (payload, proof) = valid_callback(&ledger, &stale);

    ledger.set_timestamp(1_000 + 299);
    assert!(ledger.expire_stale_requests(300).is_empty());

    ledger.set_timestamp(1_000 + 300);
    let expired = ledger.expire_stale_requests(300);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].request_id, stale);
    assert_eq!(ledger.reveal_state(id).unwrap(), RevealState::Hidden);

    assert_eq!(
        ledger.on_decryption_callback(&stale, &payload, &proof),
        Err(Error::UnknownRequest)
    );

    let fresh = ledger.request_reveal(&alice(), id).unwrap();
    assert_ne!(fresh, stale);
    let (payload, proof) = valid_callback(&ledger, &fresh);
    assert!(ledger.on_decryption_callback(&fresh, &payload, &proof).unwrap().revealed);
}

#[test]
fn test_reveal_while_funding_open() {
    let (mut ledger, id) = setup();
    let request_id = ledger.request_reveal(&alice(), id).unwrap();
    let (payload, proof) = valid_callback(&ledger, &request_id);
    ledger.on_decryption_callback(&request_id, &payload, &proof).unwrap();

    // Revealing the description does not close funding.
    let c = ledger.engine().encrypt_uint(4);
    assert!(ledger.contribute(ActorId::new("bob"), id, c).is_ok());
    assert_eq!(ledger.get_matching(id), Err(Error::FundingStillActive));
}

/// Oracle that hands out the same id every time.
#[derive(Default)]
struct FixedIdOracle {
    forwarded: Vec<RequestId>,
}

impl DecryptionOracle for FixedIdOracle {
    fn issue_request_id(&mut self) -> RequestId {
        RequestId([0x42; 32])
    }

    fn request_decryption(&mut self, request_id: &RequestId, _handles: &[Ciphertext]) -> Result<(), OracleError> {
        self.forwarded.push(*request_id);
        Ok(())
    }

    fn verify_proof(&self, _: &RequestId, _: &[Plaintext], _: &[u8]) -> bool {
        true
    }
}

#[test]
fn test_reused_request_id_is_never_forwarded() {
    let mut ledger = Ledger::new(TransparentEngine::new(), FixedIdOracle::default(), SubmitterPolicy);
    let mut ids = Vec::new();
    for title in ["Plaza", "Bridge"] {
        let e = ledger.engine();
        let fields = (
            e.encrypt_text(title),
            e.encrypt_text(""),
            e.encrypt_text(""),
            e.encrypt_uint(10),
        );
        let project = ledger
            .submit_project(alice(), fields.0, fields.1, fields.2, fields.3)
            .unwrap();
        ids.push(project.id);
    }

    let first = ledger.request_reveal(&alice(), ids[0]).unwrap();
    let err = ledger.request_reveal(&alice(), ids[1]).unwrap_err();
    assert!(matches!(err, Error::Oracle(_)));

    assert_eq!(ledger.oracle().forwarded, vec![first]);
    assert_eq!(ledger.reveal_state(ids[1]).unwrap(), RevealState::Hidden);
    assert!(matches!(
        ledger.reveal_state(ids[0]).unwrap(),
        RevealState::RequestPending { request_id, .. } if request_id == first
    ));
}
