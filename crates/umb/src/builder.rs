//! Incremental construction of an [`AtsModel`].
//!
//! Model checkers export their transition matrices state by state, each
//! state listing its choices and each choice its branches. [`AtsBuilder`]
//! accepts data in exactly that order and lays the ranges out contiguously,
//! so the resulting model satisfies the partition invariants by
//! construction.
//!
//! ```rust
//! use umb::builder::AtsBuilder;
//! use umb::index::StateIndex;
//!
//! let mut builder = AtsBuilder::new(2);
//! builder.add_initial_state(StateIndex::new(0))?;
//! builder.begin_state(StateIndex::new(0))?;
//! builder.add_choice(&[(StateIndex::new(1), 0.25), (StateIndex::new(1), 0.75)])?;
//! builder.begin_state(StateIndex::new(1))?;
//! builder.add_choice(&[(StateIndex::new(1), 1.0)])?;
//! let model = builder.finish()?;
//!
//! assert_eq!(model.num_choices, 2);
//! assert_eq!(model.num_branches, 3);
//! # Ok::<(), umb::UmbError>(())
//! ```

use crate::error::{Result, UmbError};
use crate::index::{BranchRange, ChoiceIndex, ChoiceRange, IndexRange, StateIndex};
use crate::metadata::IndexMetadata;
use crate::model::AtsModel;

/// Builder assembling a model state by state.
#[derive(Debug)]
pub struct AtsBuilder {
    num_states: usize,
    num_players: u64,
    index: IndexMetadata,
    initial_states: Vec<StateIndex>,
    state_choices: Vec<ChoiceRange>,
    choice_branches: Vec<BranchRange>,
    branch_to_target: Vec<StateIndex>,
    branch_to_value: Vec<f64>,
    /// Set by the first choice; all later choices must agree.
    weighted: Option<bool>,
    /// State whose choices are currently being added.
    current: Option<StateIndex>,
    /// First choice of the current state.
    choice_start: usize,
}

impl AtsBuilder {
    /// Creates a builder for a model with `num_states` states and one player.
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            num_players: 1,
            index: IndexMetadata::new(),
            initial_states: Vec::new(),
            state_choices: Vec::with_capacity(num_states),
            choice_branches: Vec::new(),
            branch_to_target: Vec::new(),
            branch_to_value: Vec::new(),
            weighted: None,
            current: None,
            choice_start: 0,
        }
    }

    /// Sets the number of players.
    pub fn with_players(mut self, num_players: u64) -> Self {
        self.num_players = num_players;
        self
    }

    /// Replaces the index written with the model.
    pub fn with_index(mut self, index: IndexMetadata) -> Self {
        self.index = index;
        self
    }

    /// Mutable access to the index, e.g. to fill in model data.
    pub fn index_mut(&mut self) -> &mut IndexMetadata {
        &mut self.index
    }

    /// Marks `state` as an initial state.
    pub fn add_initial_state(&mut self, state: StateIndex) -> Result<()> {
        self.check_state(state)?;
        self.initial_states.push(state);
        Ok(())
    }

    /// Starts adding the choices of `state`.
    ///
    /// States must be begun in increasing order. States that are skipped own
    /// no choice.
    pub fn begin_state(&mut self, state: StateIndex) -> Result<()> {
        self.check_state(state)?;
        self.close_state();
        if state.get() < self.state_choices.len() {
            return Err(UmbError::Validation {
                field: "state_choices".to_string(),
                reason: format!(
                    "{state} begun after {}",
                    StateIndex::new(self.state_choices.len() - 1)
                ),
            });
        }
        self.pad_states(state.get());
        self.current = Some(state);
        self.choice_start = self.choice_branches.len();
        Ok(())
    }

    /// Adds a weighted choice to the current state.
    ///
    /// # Errors
    ///
    /// Fails if no state has been begun, `branches` is empty, a target is out
    /// of range, or earlier choices were unweighted.
    pub fn add_choice(&mut self, branches: &[(StateIndex, f64)]) -> Result<ChoiceIndex> {
        for &(target, _) in branches {
            self.check_state(target)?;
        }
        self.check_choice(branches.len(), true)?;
        for &(target, value) in branches {
            self.branch_to_target.push(target);
            self.branch_to_value.push(value);
        }
        Ok(self.push_choice(branches.len()))
    }

    /// Adds an unweighted choice to the current state.
    ///
    /// # Errors
    ///
    /// Fails if no state has been begun, `targets` is empty, a target is out
    /// of range, or earlier choices were weighted.
    pub fn add_unweighted_choice(&mut self, targets: &[StateIndex]) -> Result<ChoiceIndex> {
        for &target in targets {
            self.check_state(target)?;
        }
        self.check_choice(targets.len(), false)?;
        self.branch_to_target.extend_from_slice(targets);
        Ok(self.push_choice(targets.len()))
    }

    /// Closes the remaining states and returns the validated model.
    pub fn finish(mut self) -> Result<AtsModel> {
        self.close_state();
        self.pad_states(self.num_states);

        let mut model = AtsModel {
            index: self.index,
            num_players: self.num_players,
            num_states: self.num_states,
            num_choices: self.choice_branches.len(),
            num_branches: self.branch_to_target.len(),
            initial_states: self.initial_states,
            state_choices: self.state_choices,
            choice_branches: self.choice_branches,
            branch_to_target: self.branch_to_target,
            branch_to_value: (self.weighted == Some(true)).then_some(self.branch_to_value),
        };
        model.sync_index();
        model.validate()?;
        Ok(model)
    }

    fn check_state(&self, state: StateIndex) -> Result<()> {
        if state.get() >= self.num_states {
            return Err(UmbError::IndexOutOfBounds {
                kind: "State",
                index: state.get(),
                len: self.num_states,
            });
        }
        Ok(())
    }

    fn check_choice(&mut self, num_branches: usize, weighted: bool) -> Result<()> {
        let Some(state) = self.current else {
            return Err(UmbError::Validation {
                field: "state_choices".to_string(),
                reason: "choice added before any state was begun".to_string(),
            });
        };
        if num_branches == 0 {
            return Err(UmbError::Validation {
                field: format!("choice_branches[{}]", self.choice_branches.len()),
                reason: format!("choice of {state} must have at least one branch"),
            });
        }
        match self.weighted {
            Some(previous) if previous != weighted => Err(UmbError::Validation {
                field: "branch_to_value".to_string(),
                reason: "weighted and unweighted choices cannot be mixed".to_string(),
            }),
            _ => {
                self.weighted = Some(weighted);
                Ok(())
            }
        }
    }

    fn push_choice(&mut self, num_branches: usize) -> ChoiceIndex {
        let end = self.branch_to_target.len();
        self.choice_branches
            .push(IndexRange::new(end - num_branches, end));
        ChoiceIndex::new(self.choice_branches.len() - 1)
    }

    fn close_state(&mut self) {
        if self.current.take().is_some() {
            self.state_choices
                .push(IndexRange::new(self.choice_start, self.choice_branches.len()));
        }
    }

    /// Gives every state below `until` that has not been begun an empty range.
    fn pad_states(&mut self, until: usize) {
        let at = self.choice_branches.len();
        while self.state_choices.len() < until {
            self.state_choices.push(IndexRange::new(at, at));
        }
    }
}
