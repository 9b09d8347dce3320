//! Integration tests for reading and writing UMB archives.
//!
//! These tests cover the full path from an in-memory model to an archive on
//! disk and back, including the failure modes of malformed archives.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use umb::archive::{self, Members};
use umb::codec::{
    BRANCH_TO_TARGET_MEMBER, BRANCH_TO_VALUE_MEMBER, CHOICE_TO_BRANCH_MEMBER, INDEX_MEMBER,
    INITIAL_STATES_MEMBER, STATE_TO_CHOICE_MEMBER,
};
use umb::vector::encode_slice;
use umb::{
    AtsBuilder, AtsModel, ByteOrder, ChoiceIndex, Compression, IndexMetadata, StateIndex,
    UmbCodec, UmbConfig, UmbError, ValidationConfig,
};

fn s(n: usize) -> StateIndex {
    StateIndex::new(n)
}

/// State 0 branches to state 1 with weights 0.25 and 0.75; state 1 loops.
fn two_state_model() -> AtsModel {
    let mut builder = AtsBuilder::new(2);
    builder.add_initial_state(s(0)).unwrap();
    builder.begin_state(s(0)).unwrap();
    builder.add_choice(&[(s(1), 0.25), (s(1), 0.75)]).unwrap();
    builder.begin_state(s(1)).unwrap();
    builder.add_choice(&[(s(1), 1.0)]).unwrap();
    builder.finish().unwrap()
}

/// A small die-like model with several choices per state.
fn dice_model() -> AtsModel {
    let mut builder = AtsBuilder::new(7).with_players(2);
    builder.index_mut().model_data.name = Some("dice".to_string());
    builder.index_mut().model_data.authors = Some(vec!["knuth".to_string(), "yao".to_string()]);
    builder.index_mut().file_data.stamp("umb", env!("CARGO_PKG_VERSION"));
    builder.add_initial_state(s(0)).unwrap();

    builder.begin_state(s(0)).unwrap();
    builder.add_choice(&[(s(1), 0.5), (s(2), 0.5)]).unwrap();
    builder.add_choice(&[(s(3), 1.0)]).unwrap();
    for state in 1..7 {
        builder.begin_state(s(state)).unwrap();
        builder
            .add_choice(&[(s((state + 1) % 7), 0.5), (s((state + 3) % 7), 0.5)])
            .unwrap();
    }
    builder.finish().unwrap()
}

fn raw_members(model: &mut AtsModel) -> Members {
    UmbCodec::default().encode_members(model).unwrap()
}

fn u64s(values: &[u64]) -> Vec<u8> {
    encode_slice(values, ByteOrder::Big).unwrap()
}

// ============================================================================
// Round Trips
// ============================================================================

#[test]
fn test_roundtrip_tar() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dice.umb");

    let mut model = dice_model();
    umb::write(&mut model, &path).unwrap();
    let loaded = umb::read(&path).unwrap();

    assert_eq!(loaded, model);
    assert_eq!(loaded.index.model_data.name.as_deref(), Some("dice"));
    assert_eq!(loaded.num_players, 2);
}

#[test]
fn test_roundtrip_tar_gz() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dice.umb.gz");

    let mut model = dice_model();
    umb::write(&mut model, &path).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    assert_eq!(umb::read(&path).unwrap(), model);
}

#[test]
fn test_roundtrip_both_byte_orders() {
    let temp_dir = TempDir::new().unwrap();

    for order in [ByteOrder::Big, ByteOrder::Little] {
        let path = temp_dir.path().join(format!("{order:?}.umb"));
        let codec = UmbCodec::new(UmbConfig::default().with_byte_order(order));

        let mut model = dice_model();
        codec.write(&mut model, &path).unwrap();
        assert_eq!(codec.read(&path).unwrap(), model);
    }
}

#[test]
fn test_roundtrip_unweighted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("unweighted.umb");

    let mut builder = AtsBuilder::new(3);
    builder.add_initial_state(s(0)).unwrap();
    builder.add_initial_state(s(2)).unwrap();
    builder.begin_state(s(0)).unwrap();
    builder.add_unweighted_choice(&[s(1), s(2)]).unwrap();
    builder.begin_state(s(2)).unwrap();
    builder.add_unweighted_choice(&[s(0)]).unwrap();
    let mut model = builder.finish().unwrap();

    umb::write(&mut model, &path).unwrap();
    let members = archive::read(&path).unwrap();
    assert!(!members.contains_key(BRANCH_TO_VALUE_MEMBER));

    let loaded = umb::read(&path).unwrap();
    assert_eq!(loaded, model);
    assert!(matches!(
        loaded.choice_distribution(ChoiceIndex::new(0)),
        Err(UmbError::NoWeights)
    ));
}

#[test]
fn test_forced_compression_ignores_suffix() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("model.umb");
    let codec = UmbCodec::new(UmbConfig::default().with_compression(Compression::Gzip));

    let mut model = two_state_model();
    codec.write(&mut model, &path).unwrap();

    assert!(umb::read(&path).is_err());
    assert_eq!(codec.read(&path).unwrap(), model);
}

/// Read a model, replace its initial states and write it again.
#[test]
fn test_edit_initial_states_and_rewrite() {
    let temp_dir = TempDir::new().unwrap();
    let original = temp_dir.path().join("original.umb");
    let edited = temp_dir.path().join("edited.umb.gz");

    umb::write(&mut dice_model(), &original).unwrap();

    let mut model = umb::read(&original).unwrap();
    model.initial_states = vec![s(3), s(5)];
    umb::write(&mut model, &edited).unwrap();

    let reloaded = umb::read(&edited).unwrap();
    assert_eq!(reloaded.initial_states, vec![s(3), s(5)]);
    assert_eq!(reloaded.num_initial_states(), 2);
    assert_eq!(reloaded.state_choices, model.state_choices);
}

#[test]
fn test_two_state_scenario_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("two.umb");

    umb::write(&mut two_state_model(), &path).unwrap();
    let model = umb::read(&path).unwrap();

    let distribution = model.choice_distribution(ChoiceIndex::new(0)).unwrap();
    assert_eq!(distribution.len(), 1);
    assert_eq!(distribution[&s(1)], 1.0);
    assert_eq!(
        model.state_successors(s(0)).unwrap().into_iter().collect::<Vec<_>>(),
        vec![s(1)]
    );
}

#[test]
fn test_index_json_mirrors_counts() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("counts.umb");

    let mut model = two_state_model();
    model.index = IndexMetadata::new();
    umb::write(&mut model, &path).unwrap();

    let members = archive::read(&path).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&members[INDEX_MEMBER]).unwrap();
    assert_eq!(json["#states"], 2);
    assert_eq!(json["#choice"], 2);
    assert_eq!(json["#branches"], 3);
    assert_eq!(json["#players"], 1);
    assert!(json.get("model-data").is_none());
}

// ============================================================================
// Write Failures
// ============================================================================

#[test]
fn test_invalid_model_leaves_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("model.umb");

    umb::write(&mut two_state_model(), &path).unwrap();
    let before = fs::read(&path).unwrap();

    let mut broken = two_state_model();
    broken.branch_to_target[0] = s(9);
    let result = umb::write(&mut broken, &path);

    match result {
        Err(UmbError::Validation { field, .. }) => assert_eq!(field, "branch_to_target[0]"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_model_without_initial_states_cannot_be_encoded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("model.umb");

    let mut model = two_state_model();
    model.initial_states.clear();
    assert!(matches!(umb::write(&mut model, &path), Err(UmbError::Encode(_))));
    assert!(!path.exists());
}

#[test]
fn test_strict_policy_rejects_deadlock_states() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("deadlock.umb");

    let mut builder = AtsBuilder::new(2);
    builder.add_initial_state(s(0)).unwrap();
    builder.begin_state(s(0)).unwrap();
    builder.add_choice(&[(s(1), 1.0)]).unwrap();
    let mut model = builder.finish().unwrap();

    umb::write(&mut model, &path).unwrap();

    let strict = UmbCodec::new(UmbConfig::default().with_validation(ValidationConfig::strict()));
    match strict.read(&path) {
        Err(UmbError::Validation { field, .. }) => assert_eq!(field, "state_choices[1]"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(strict.write(&mut model, &path).is_err());
}

// ============================================================================
// Malformed Archives
// ============================================================================

fn write_members(path: &Path, members: &Members) {
    archive::write(path, members).unwrap();
}

#[test]
fn test_decreasing_row_start_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("decreasing.umb");

    let mut index = IndexMetadata::new();
    index.set_counts(1, 1, 3, 4);

    let mut members = Members::new();
    members.insert(INDEX_MEMBER.to_string(), index.to_json().unwrap());
    members.insert(INITIAL_STATES_MEMBER.to_string(), u64s(&[0]));
    members.insert(STATE_TO_CHOICE_MEMBER.to_string(), u64s(&[0, 3]));
    members.insert(CHOICE_TO_BRANCH_MEMBER.to_string(), u64s(&[0, 3, 2, 4]));
    members.insert(BRANCH_TO_TARGET_MEMBER.to_string(), u64s(&[0, 0, 0, 0]));
    write_members(&path, &members);

    assert!(matches!(
        umb::read(&path),
        Err(UmbError::Validation { .. })
    ));
}

#[test]
fn test_count_mismatch_fails_validation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mismatch.umb");

    let mut members = raw_members(&mut two_state_model());
    members.insert(BRANCH_TO_TARGET_MEMBER.to_string(), u64s(&[1, 1]));
    write_members(&path, &members);

    match umb::read(&path) {
        Err(UmbError::Validation { field, .. }) => assert_eq!(field, "branch_to_target"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_missing_required_member() {
    let temp_dir = TempDir::new().unwrap();

    for name in [
        INDEX_MEMBER,
        INITIAL_STATES_MEMBER,
        STATE_TO_CHOICE_MEMBER,
        CHOICE_TO_BRANCH_MEMBER,
        BRANCH_TO_TARGET_MEMBER,
    ] {
        let path = temp_dir.path().join(format!("without-{name}.umb"));
        let mut members = raw_members(&mut two_state_model());
        members.remove(name);
        write_members(&path, &members);

        match umb::read(&path) {
            Err(UmbError::MissingMember(missing)) => assert_eq!(missing, name),
            other => panic!("expected missing {name}, got {other:?}"),
        }
    }
}

#[test]
fn test_schema_errors() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("schema.umb");

    let mut members = raw_members(&mut two_state_model());
    members.insert(
        INDEX_MEMBER.to_string(),
        br##"{"format-version": 1, "format-revision": 0, "#players": 1, "#states": 2, "#choice": 2}"##
            .to_vec(),
    );
    write_members(&path, &members);

    match umb::read(&path) {
        Err(UmbError::Schema { field, .. }) => assert_eq!(field, "#branches"),
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn test_truncated_vector_fails_decode() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("truncated.umb");

    let mut members = raw_members(&mut two_state_model());
    let values = members.get_mut(BRANCH_TO_VALUE_MEMBER).unwrap();
    values.truncate(values.len() - 3);
    write_members(&path, &members);

    assert!(matches!(umb::read(&path), Err(UmbError::Decode(_))));
}

#[test]
fn test_corrupt_archive() {
    let temp_dir = TempDir::new().unwrap();

    let gz = temp_dir.path().join("corrupt.umb.gz");
    fs::write(&gz, b"definitely not gzip").unwrap();
    assert!(matches!(umb::read(&gz), Err(UmbError::ArchiveRead { .. })));

    let missing = temp_dir.path().join("missing.umb");
    match umb::read(&missing) {
        Err(UmbError::ArchiveRead { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected archive read error, got {other:?}"),
    }
}
