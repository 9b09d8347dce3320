//! In-memory annotated transition system.
//!
//! The graph is kept in its compressed form: every state owns a contiguous
//! range of choices, every choice a contiguous, non-empty range of branches,
//! and every branch points at a target state with an optional weight.
//!
//! ```text
//! state_choices    State(0) -> Choice[0..1)   State(1) -> Choice[1..2)
//! choice_branches  Choice(0) -> Branch[0..2)  Choice(1) -> Branch[2..3)
//! branch_to_target Branch(0) -> State(1)      Branch(1) -> State(1)   Branch(2) -> State(1)
//! branch_to_value  0.25                       0.75                    1.0
//! ```
//!
//! Queries and sampling work directly on these arrays. Sampling never uses
//! global randomness: the caller passes the random source, so a seeded
//! generator gives reproducible paths.

use crate::config::ValidationConfig;
use crate::error::{Result, UmbError};
use crate::index::{
    BranchIndex, BranchRange, ChoiceIndex, ChoiceRange, IndexRange, IndexTag, StateIndex,
};
use crate::metadata::IndexMetadata;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// An annotated transition system.
///
/// Fields are public so that producers can populate the arrays directly;
/// [`AtsModel::validate`] checks that they describe a well-formed graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtsModel {
    /// The JSON index; counts are mirrored into it on write.
    pub index: IndexMetadata,
    /// Number of players.
    pub num_players: u64,
    /// Number of states.
    pub num_states: usize,
    /// Number of choices.
    pub num_choices: usize,
    /// Number of branches.
    pub num_branches: usize,
    /// Entry points of the system.
    pub initial_states: Vec<StateIndex>,
    /// Choice range owned by each state.
    pub state_choices: Vec<ChoiceRange>,
    /// Branch range owned by each choice.
    pub choice_branches: Vec<BranchRange>,
    /// Target state of each branch.
    pub branch_to_target: Vec<StateIndex>,
    /// Weight of each branch, if the model is weighted.
    pub branch_to_value: Option<Vec<f64>>,
}

impl AtsModel {
    /// Creates an empty model whose index carries the current format version.
    pub fn new() -> Self {
        Self {
            index: IndexMetadata::new(),
            ..Default::default()
        }
    }

    /// Returns the number of initial states.
    pub fn num_initial_states(&self) -> usize {
        self.initial_states.len()
    }

    /// Returns true if the branches carry values.
    pub fn is_weighted(&self) -> bool {
        self.branch_to_value.is_some()
    }

    /// Copies the live element counts into the index.
    pub fn sync_index(&mut self) {
        self.index.set_counts(
            self.num_players,
            self.num_states as u64,
            self.num_choices as u64,
            self.num_branches as u64,
        );
    }

    /// Returns the choices owned by `state`.
    pub fn choices_of(&self, state: StateIndex) -> Result<ChoiceRange> {
        lookup(&self.state_choices, state.get(), "State").copied()
    }

    /// Returns the branches owned by `choice`.
    pub fn branches_of(&self, choice: ChoiceIndex) -> Result<BranchRange> {
        lookup(&self.choice_branches, choice.get(), "Choice").copied()
    }

    /// Returns the target state of `branch`.
    pub fn target_of(&self, branch: BranchIndex) -> Result<StateIndex> {
        lookup(&self.branch_to_target, branch.get(), "Branch").copied()
    }

    /// Returns the set of states reachable through one branch of `choice`.
    pub fn choice_successors(&self, choice: ChoiceIndex) -> Result<BTreeSet<StateIndex>> {
        self.branches_of(choice)?
            .iter()
            .map(|branch| self.target_of(branch))
            .collect()
    }

    /// Returns the set of states reachable through any choice of `state`.
    pub fn state_successors(&self, state: StateIndex) -> Result<BTreeSet<StateIndex>> {
        let mut successors = BTreeSet::new();
        for choice in self.choices_of(state)?.iter() {
            successors.extend(self.choice_successors(choice)?);
        }
        Ok(successors)
    }

    /// Returns the weight mass `choice` assigns to each target state.
    ///
    /// Branches leading to the same target contribute the sum of their
    /// weights.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::NoWeights` if the model carries no branch values.
    pub fn choice_distribution(&self, choice: ChoiceIndex) -> Result<BTreeMap<StateIndex, f64>> {
        let values = self.branch_to_value.as_deref().ok_or(UmbError::NoWeights)?;

        let mut distribution = BTreeMap::new();
        for branch in self.branches_of(choice)?.iter() {
            let target = self.target_of(branch)?;
            let value = *lookup(values, branch.get(), "Branch")?;
            *distribution.entry(target).or_insert(0.0) += value;
        }
        Ok(distribution)
    }

    /// Picks one of the choices of `state` uniformly at random.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::EmptyChoiceSet` if the state owns no choice.
    pub fn sample_choice<R: Rng + ?Sized>(
        &self,
        state: StateIndex,
        rng: &mut R,
    ) -> Result<ChoiceIndex> {
        let choices = self.choices_of(state)?;
        if choices.is_empty() {
            return Err(UmbError::EmptyChoiceSet(state));
        }
        let offset = rng.random_range(0..choices.len());
        Ok(ChoiceIndex::new(choices.start() + offset))
    }

    /// Draws a target of `choice` with probability proportional to its weight.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::NoWeights` if the model carries no branch values and
    /// `UmbError::InvalidWeights` if the weights are negative, non-finite or
    /// all zero.
    pub fn sample_choice_target<R: Rng + ?Sized>(
        &self,
        choice: ChoiceIndex,
        rng: &mut R,
    ) -> Result<StateIndex> {
        let (targets, weights): (Vec<StateIndex>, Vec<f64>) =
            self.choice_distribution(choice)?.into_iter().unzip();

        if let Some(weight) = weights.iter().find(|weight| !weight.is_finite()) {
            return Err(UmbError::InvalidWeights {
                choice: choice.get(),
                reason: format!("weight {weight} is not finite"),
            });
        }
        // WeightedIndex panics when the running total overflows.
        if !weights.iter().sum::<f64>().is_finite() {
            return Err(UmbError::InvalidWeights {
                choice: choice.get(),
                reason: "total weight overflows f64".to_string(),
            });
        }

        let distribution = WeightedIndex::new(&weights).map_err(|e| UmbError::InvalidWeights {
            choice: choice.get(),
            reason: e.to_string(),
        })?;
        Ok(targets[distribution.sample(rng)])
    }

    /// Samples a path of `length` steps.
    ///
    /// The path starts at `start`, or at an initial state drawn uniformly
    /// when `start` is `None`. Each step picks a choice uniformly and then a
    /// target by weight. The result holds `length + 1` states.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::NoInitialStates` if no start is given and the model
    /// has no initial state, and any error of [`Self::sample_choice`] or
    /// [`Self::sample_choice_target`] met along the way.
    pub fn sample_path<R: Rng + ?Sized>(
        &self,
        start: Option<StateIndex>,
        length: usize,
        rng: &mut R,
    ) -> Result<Vec<StateIndex>> {
        let mut state = match start {
            Some(state) => {
                lookup(&self.state_choices, state.get(), "State")?;
                state
            }
            None => {
                if self.initial_states.is_empty() {
                    return Err(UmbError::NoInitialStates);
                }
                self.initial_states[rng.random_range(0..self.initial_states.len())]
            }
        };

        let mut path = Vec::with_capacity(length + 1);
        path.push(state);
        for _ in 0..length {
            let choice = self.sample_choice(state, rng)?;
            state = self.sample_choice_target(choice, rng)?;
            path.push(state);
        }
        Ok(path)
    }

    /// Checks the structural invariants with the default policy.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::Validation` naming the first violated field.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&ValidationConfig::default())
    }

    /// Checks the structural invariants.
    ///
    /// Checks run in a fixed order and stop at the first violation; nothing
    /// is repaired.
    ///
    /// # Errors
    ///
    /// Returns `UmbError::Validation` naming the first violated field.
    pub fn validate_with(&self, config: &ValidationConfig) -> Result<()> {
        check_len("choice_branches", self.choice_branches.len(), self.num_choices)?;
        for (choice, branches) in self.choice_branches.iter().enumerate() {
            if branches.is_empty() {
                return Err(invalid(
                    format!("choice_branches[{choice}]"),
                    format!("{branches:?} must be non-empty"),
                ));
            }
        }

        check_len("state_choices", self.state_choices.len(), self.num_states)?;
        check_partition("state_choices", &self.state_choices, self.num_choices)?;
        check_partition("choice_branches", &self.choice_branches, self.num_branches)?;

        check_len("branch_to_target", self.branch_to_target.len(), self.num_branches)?;
        check_targets("branch_to_target", &self.branch_to_target, self.num_states)?;

        if let Some(values) = &self.branch_to_value {
            check_len("branch_to_value", values.len(), self.num_branches)?;
        }

        check_targets("initial_states", &self.initial_states, self.num_states)?;

        if config.require_state_choices {
            if let Some(state) = self.state_choices.iter().position(IndexRange::is_empty) {
                return Err(invalid(
                    format!("state_choices[{state}]"),
                    "state owns no choice",
                ));
            }
        }

        Ok(())
    }
}

fn lookup<'a, V>(items: &'a [V], index: usize, kind: &'static str) -> Result<&'a V> {
    items.get(index).ok_or(UmbError::IndexOutOfBounds {
        kind,
        index,
        len: items.len(),
    })
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> UmbError {
    UmbError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_len(field: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(invalid(
            field,
            format!("has {actual} entries, expected {expected}"),
        ));
    }
    Ok(())
}

/// Ranges must tile `[0, total)` in order.
fn check_partition<T: IndexTag>(
    field: &str,
    ranges: &[IndexRange<T>],
    total: usize,
) -> Result<()> {
    let mut expected_start = 0;
    for (i, range) in ranges.iter().enumerate() {
        if range.is_inverted() {
            return Err(invalid(format!("{field}[{i}]"), format!("{range:?} is inverted")));
        }
        if range.start() != expected_start {
            return Err(invalid(
                format!("{field}[{i}]"),
                format!("{range:?} does not start at {expected_start}"),
            ));
        }
        expected_start = range.end();
    }
    if expected_start != total {
        return Err(invalid(
            field,
            format!("ranges cover [0, {expected_start}) instead of [0, {total})"),
        ));
    }
    Ok(())
}

fn check_targets(field: &str, states: &[StateIndex], num_states: usize) -> Result<()> {
    if let Some(i) = states.iter().position(|state| state.get() >= num_states) {
        return Err(invalid(
            format!("{field}[{i}]"),
            format!("{} is not below #states = {num_states}", states[i]),
        ));
    }
    Ok(())
}
