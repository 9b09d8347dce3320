//! Reading and writing complete models as UMB archives.
//!
//! ## Archive Layout
//!
//! ```text
//! Member                 Content                                   Required
//! ------                 -------                                   --------
//! index.json             IndexMetadata, absent fields omitted      yes
//! initial-states.bin     u64 state indices                         yes
//! state-to-choice.bin    u64 row-start offsets, #states + 1        yes
//! choice-to-branch.bin   u64 row-start offsets, #choice + 1        yes
//! branch-to-target.bin   u64 state indices, #branches              yes
//! branch-to-value.bin    f64 weights, #branches                    no
//! ```
//!
//! Binary members use the byte order of [`UmbConfig::byte_order`].

use crate::archive::{self, Members};
use crate::config::UmbConfig;
use crate::error::{Result, UmbError};
use crate::index::{BranchTag, ChoiceTag, StateIndex};
use crate::metadata::{IndexMetadata, KEY_BRANCHES, KEY_CHOICES, KEY_PLAYERS, KEY_STATES};
use crate::model::AtsModel;
use crate::range::{ranges_to_row_start, row_start_to_ranges};
use crate::vector::{decode_slice, encode_slice};
use std::path::Path;
use tracing::{debug, info};

/// Member holding the JSON index.
pub const INDEX_MEMBER: &str = "index.json";
/// Member holding the initial states.
pub const INITIAL_STATES_MEMBER: &str = "initial-states.bin";
/// Member holding the state-to-choice row starts.
pub const STATE_TO_CHOICE_MEMBER: &str = "state-to-choice.bin";
/// Member holding the choice-to-branch row starts.
pub const CHOICE_TO_BRANCH_MEMBER: &str = "choice-to-branch.bin";
/// Member holding the branch targets.
pub const BRANCH_TO_TARGET_MEMBER: &str = "branch-to-target.bin";
/// Member holding the optional branch values.
pub const BRANCH_TO_VALUE_MEMBER: &str = "branch-to-value.bin";

/// Reads the model stored at `path` with the default configuration.
pub fn read(path: impl AsRef<Path>) -> Result<AtsModel> {
    UmbCodec::default().read(path)
}

/// Writes `model` to `path` with the default configuration.
pub fn write(model: &mut AtsModel, path: impl AsRef<Path>) -> Result<()> {
    UmbCodec::default().write(model, path)
}

/// Converts between [`AtsModel`] and UMB archives.
#[derive(Debug, Clone, Default)]
pub struct UmbCodec {
    config: UmbConfig,
}

impl UmbCodec {
    /// Creates a codec with the given configuration.
    pub fn new(config: UmbConfig) -> Self {
        Self { config }
    }

    /// Returns the codec configuration.
    pub fn config(&self) -> &UmbConfig {
        &self.config
    }

    /// Reads and validates the model stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::ArchiveRead` if the archive cannot be read,
    /// `UmbError::MissingMember` if a required member is absent,
    /// `UmbError::Schema` for an invalid index, `UmbError::Decode` for
    /// malformed vectors and `UmbError::Validation` if the decoded graph is
    /// not well-formed.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<AtsModel> {
        let path = path.as_ref();
        let members = match self.config.compression {
            Some(compression) => archive::read_with(path, compression)?,
            None => archive::read(path)?,
        };

        let model = self.decode_members(&members)?;
        info!(
            "Read UMB model {}: {} states, {} choices, {} branches",
            path.display(),
            model.num_states,
            model.num_choices,
            model.num_branches
        );
        Ok(model)
    }

    /// Validates `model`, mirrors its counts into the index and writes it to
    /// `path`.
    ///
    /// On failure the file at `path` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::Validation` if the model is not well-formed,
    /// `UmbError::Encode` if a required vector is empty and
    /// `UmbError::ArchiveWrite` if the archive cannot be written.
    pub fn write(&self, model: &mut AtsModel, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let members = self.encode_members(model)?;

        match self.config.compression {
            Some(compression) => archive::write_with(path, &members, compression)?,
            None => archive::write(path, &members)?,
        }

        info!(
            "Wrote UMB model {}: {} states, {} choices, {} branches",
            path.display(),
            model.num_states,
            model.num_choices,
            model.num_branches
        );
        Ok(())
    }

    /// Assembles a model from archive members.
    pub fn decode_members(&self, members: &Members) -> Result<AtsModel> {
        let order = self.config.byte_order;

        let index = IndexMetadata::from_json(required(members, INDEX_MEMBER)?)?;
        let num_players = count(index.num_players, KEY_PLAYERS)?;
        let num_states = to_usize(count(index.num_states, KEY_STATES)?)?;
        let num_choices = to_usize(count(index.num_choices, KEY_CHOICES)?)?;
        let num_branches = to_usize(count(index.num_branches, KEY_BRANCHES)?)?;

        let initial_states =
            to_states(&decode_slice(required(members, INITIAL_STATES_MEMBER)?, order)?)?;
        let state_choices = row_start_to_ranges::<ChoiceTag>(&decode_slice(
            required(members, STATE_TO_CHOICE_MEMBER)?,
            order,
        )?)?;
        let choice_branches = row_start_to_ranges::<BranchTag>(&decode_slice(
            required(members, CHOICE_TO_BRANCH_MEMBER)?,
            order,
        )?)?;
        let branch_to_target =
            to_states(&decode_slice(required(members, BRANCH_TO_TARGET_MEMBER)?, order)?)?;
        let branch_to_value = members
            .get(BRANCH_TO_VALUE_MEMBER)
            .map(|bytes| decode_slice::<f64>(bytes, order))
            .transpose()?;

        for (name, bytes) in members {
            debug!("Decoded member {} ({} bytes)", name, bytes.len());
        }

        let model = AtsModel {
            index,
            num_players,
            num_states,
            num_choices,
            num_branches,
            initial_states,
            state_choices,
            choice_branches,
            branch_to_target,
            branch_to_value,
        };
        model.validate_with(&self.config.validation)?;
        Ok(model)
    }

    /// Validates `model`, mirrors its counts into the index and encodes it
    /// as archive members.
    pub fn encode_members(&self, model: &mut AtsModel) -> Result<Members> {
        model.validate_with(&self.config.validation)?;
        model.sync_index();

        let order = self.config.byte_order;
        let mut members = Members::new();

        members.insert(INDEX_MEMBER.to_string(), model.index.to_json()?);
        members.insert(
            INITIAL_STATES_MEMBER.to_string(),
            encode_slice(&from_states(&model.initial_states), order)?,
        );
        members.insert(
            STATE_TO_CHOICE_MEMBER.to_string(),
            encode_slice(&ranges_to_row_start(&model.state_choices)?, order)?,
        );
        members.insert(
            CHOICE_TO_BRANCH_MEMBER.to_string(),
            encode_slice(&ranges_to_row_start(&model.choice_branches)?, order)?,
        );
        members.insert(
            BRANCH_TO_TARGET_MEMBER.to_string(),
            encode_slice(&from_states(&model.branch_to_target), order)?,
        );
        if let Some(values) = &model.branch_to_value {
            members.insert(
                BRANCH_TO_VALUE_MEMBER.to_string(),
                encode_slice(values, order)?,
            );
        }

        Ok(members)
    }
}

fn required<'a>(members: &'a Members, name: &str) -> Result<&'a [u8]> {
    members
        .get(name)
        .map(Vec::as_slice)
        .ok_or_else(|| UmbError::MissingMember(name.to_string()))
}

fn count(value: Option<u64>, field: &str) -> Result<u64> {
    value.ok_or_else(|| UmbError::Schema {
        field: field.to_string(),
        reason: "missing required field".to_string(),
    })
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| UmbError::Decode(format!("{value} overflows usize")))
}

fn to_states(raw: &[u64]) -> Result<Vec<StateIndex>> {
    raw.iter()
        .map(|&state| to_usize(state).map(StateIndex::new))
        .collect()
}

fn from_states(states: &[StateIndex]) -> Vec<u64> {
    states.iter().map(|state| state.get() as u64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexRange;
    use crate::vector::ByteOrder;

    fn s(n: usize) -> StateIndex {
        StateIndex::new(n)
    }

    fn two_state_model() -> AtsModel {
        AtsModel {
            num_players: 1,
            num_states: 2,
            num_choices: 2,
            num_branches: 3,
            initial_states: vec![s(0)],
            state_choices: vec![IndexRange::new(0, 1), IndexRange::new(1, 2)],
            choice_branches: vec![IndexRange::new(0, 2), IndexRange::new(2, 3)],
            branch_to_target: vec![s(1), s(1), s(1)],
            branch_to_value: Some(vec![0.25, 0.75, 1.0]),
            ..AtsModel::new()
        }
    }

    #[test]
    fn test_member_layout() {
        let mut model = two_state_model();
        let members = UmbCodec::default().encode_members(&mut model).unwrap();

        let names: Vec<&str> = members.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                BRANCH_TO_TARGET_MEMBER,
                BRANCH_TO_VALUE_MEMBER,
                CHOICE_TO_BRANCH_MEMBER,
                INDEX_MEMBER,
                INITIAL_STATES_MEMBER,
                STATE_TO_CHOICE_MEMBER,
            ]
        );
        assert_eq!(
            decode_slice::<u64>(&members[STATE_TO_CHOICE_MEMBER], ByteOrder::Big).unwrap(),
            vec![0, 1, 2]
        );
        assert_eq!(
            decode_slice::<u64>(&members[CHOICE_TO_BRANCH_MEMBER], ByteOrder::Big).unwrap(),
            vec![0, 2, 3]
        );
    }

    #[test]
    fn test_members_roundtrip() {
        let codec = UmbCodec::default();
        let mut model = two_state_model();
        let members = codec.encode_members(&mut model).unwrap();
        assert_eq!(codec.decode_members(&members).unwrap(), model);
    }

    #[test]
    fn test_unweighted_model_has_no_value_member() {
        let mut model = two_state_model();
        model.branch_to_value = None;
        let members = UmbCodec::default().encode_members(&mut model).unwrap();
        assert!(!members.contains_key(BRANCH_TO_VALUE_MEMBER));

        let decoded = UmbCodec::default().decode_members(&members).unwrap();
        assert!(!decoded.is_weighted());
    }

    #[test]
    fn test_encode_mirrors_counts() {
        let mut model = two_state_model();
        assert!(model.index.num_states.is_none());
        UmbCodec::default().encode_members(&mut model).unwrap();
        assert_eq!(model.index.num_states, Some(2));
        assert_eq!(model.index.num_branches, Some(3));
    }

    #[test]
    fn test_missing_member() {
        let codec = UmbCodec::default();
        let mut model = two_state_model();
        let mut members = codec.encode_members(&mut model).unwrap();
        members.remove(CHOICE_TO_BRANCH_MEMBER);

        match codec.decode_members(&members) {
            Err(UmbError::MissingMember(name)) => assert_eq!(name, CHOICE_TO_BRANCH_MEMBER),
            other => panic!("expected missing member, got {other:?}"),
        }
    }

    #[test]
    fn test_byte_order_mismatch_is_detected() {
        let mut model = two_state_model();
        let members = UmbCodec::default().encode_members(&mut model).unwrap();

        let little = UmbCodec::new(UmbConfig::default().with_byte_order(ByteOrder::Little));
        assert!(little.decode_members(&members).is_err());
    }

    #[test]
    fn test_invalid_model_is_not_encoded() {
        let mut model = two_state_model();
        model.branch_to_target[2] = s(5);
        assert!(matches!(
            UmbCodec::default().encode_members(&mut model),
            Err(UmbError::Validation { .. })
        ));
    }
}
