#![allow(dead_code)]

use crate::types::{Project, RevealState, RevealedProject};

/// INV-1: Encrypted totals and sqrt-sums never decrease.
pub fn assert_monotonic(label: &str, before: u128, after: u128) {
    assert!(
        after >= before,
        "INV-1 violated: {label} decreased from {before} to {after}"
    );
}

/// INV-2: The revealed flag never goes back to false, and revealed fields
/// never change once written.
pub fn assert_reveal_irreversible(before: &RevealedProject, after: &RevealedProject) {
    if before.revealed {
        assert!(after.revealed, "INV-2 violated: project {} un-revealed", before.project_id);
        assert_eq!(
            before.fields, after.fields,
            "INV-2 violated: revealed fields of project {} changed",
            before.project_id
        );
        assert_eq!(before.revealed_at, after.revealed_at);
    }
}

/// INV-3: Reveal state only moves forward, except expiry back to Hidden.
pub fn assert_valid_reveal_transition(from: &RevealState, to: &RevealState) {
    let valid = matches!(
        (from, to),
        (RevealState::Hidden, RevealState::Hidden)
            | (RevealState::Hidden, RevealState::RequestPending { .. })
            | (RevealState::RequestPending { .. }, RevealState::RequestPending { .. })
            | (RevealState::RequestPending { .. }, RevealState::Revealed)
            | (RevealState::RequestPending { .. }, RevealState::Hidden)
            | (RevealState::Revealed, RevealState::Revealed)
    );
    assert!(
        valid,
        "INV-3 violated: invalid reveal transition from {:?} to {:?}",
        from, to
    );
}

/// INV-4: Project IDs are sequential starting from 0.
pub fn assert_sequential_ids(projects: &[Project]) {
    for (i, project) in projects.iter().enumerate() {
        assert_eq!(
            project.id.0, i as u64,
            "INV-4 violated: expected id {}, got {}",
            i, project.id
        );
    }
}

/// INV-5: Fields fixed at submission never change.
pub fn assert_project_immutable_fields(original: &Project, current: &Project) {
    assert_eq!(original.id, current.id, "INV-5 violated: project id changed");
    assert_eq!(
        original.submitter, current.submitter,
        "INV-5 violated: project submitter changed"
    );
    assert_eq!(original.title, current.title, "INV-5 violated: title changed");
    assert_eq!(
        original.description, current.description,
        "INV-5 violated: description changed"
    );
    assert_eq!(original.location, current.location, "INV-5 violated: location changed");
    assert_eq!(original.budget, current.budget, "INV-5 violated: budget changed");
    assert_eq!(
        original.created_at, current.created_at,
        "INV-5 violated: created_at changed"
    );
}

/// INV-6: A closed project never reopens.
pub fn assert_active_only_closes(before: &Project, after: &Project) {
    assert!(
        before.active || !after.active,
        "INV-6 violated: project {} reopened",
        before.id
    );
}
