//! # quint-core
//!
//! Domain model for the quint knowledge-assurance engine.
//!
//! This crate defines the typed vocabulary the engine reasons with:
//!
//! - [`Holon`]: a versioned unit of knowledge, classified by [`Layer`]
//!   (epistemic status), [`HolonKind`] and [`HolonType`]
//! - [`Evidence`]: a time-bounded observation attached to a holon, with a
//!   [`Verdict`] and optional validity horizon
//! - [`Relation`]: a typed directed edge between holons, carrying a
//!   [`CongruenceLevel`] that penalises cross-context dependencies
//! - [`Contract`]: the implementation contract a finalized decision carries
//! - [`ReliabilityReport`]: the breakdown produced by the assurance
//!   calculator
//! - [`Phase`]: the workflow phase of the knowledge cycle
//!
//! The crate is intentionally free of I/O. Persistence, the calculator, and
//! the protocol surface live in `quint-server`; everything here is plain data
//! plus the parsing and classification rules that give it meaning.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod contract;
pub mod error;
pub mod evidence;
pub mod holon;
pub mod phase;
pub mod relation;
pub mod report;
pub mod slug;

pub use contract::{parse_characteristics, Characteristic, Contract, ContractError, Scale};
pub use error::ParseError;
pub use evidence::{Evidence, EvidenceType, Resolution, Verdict};
pub use holon::{Holon, HolonKind, HolonType, Layer};
pub use phase::Phase;
pub use relation::{congruence_penalty, CongruenceLevel, Relation, RelationType};
pub use report::{clamp_score, DependencyReport, ReliabilityReport};
pub use slug::slugify;
