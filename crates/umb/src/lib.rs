//! UMB - Archive Codec for Annotated Transition Systems
//!
//! This crate reads and writes annotated transition systems (ATS) stored in
//! the UMB archive format: a tar (optionally gzip-compressed) archive holding
//! a JSON index and a set of fixed-width binary vectors.
//!
//! # Components
//!
//! - [`AtsModel`]: In-memory transition system with successor queries and sampling
//! - [`AtsBuilder`]: State-by-state construction of well-formed models
//! - [`UmbCodec`]: Archive read/write with validation on both paths
//! - [`IndexMetadata`]: The `index.json` document
//!
//! # Example
//!
//! ```rust,no_run
//! use umb::{read, write, StateIndex};
//!
//! let mut model = read("consensus.umb")?;
//! model.initial_states = vec![StateIndex::new(0)];
//! write(&mut model, "consensus-initial.umb.gz")?;
//! # Ok::<(), umb::UmbError>(())
//! ```

#![deny(missing_docs)]

pub mod archive;
pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod metadata;
pub mod model;
pub mod range;
pub mod vector;

pub use archive::Compression;
pub use builder::AtsBuilder;
pub use codec::{read, write, UmbCodec};
pub use config::{UmbConfig, ValidationConfig};
pub use error::{Result, UmbError};
pub use index::{
    BranchIndex, BranchRange, ChoiceIndex, ChoiceRange, IndexRange, StateIndex, TypedIndex,
};
pub use metadata::{FileData, IndexMetadata, ModelData};
pub use model::AtsModel;
pub use vector::{ByteOrder, ElementType, Number};
