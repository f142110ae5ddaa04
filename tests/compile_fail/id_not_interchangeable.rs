// ABOUTME: Compile-fail test verifying InstanceId and RevisionId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.
use rollwatch::types::{InstanceId, RevisionId};

fn takes_revision_id(_id: RevisionId) {}

fn main() {
    takes_revision_id(InstanceId::new("sim-1"));
}
