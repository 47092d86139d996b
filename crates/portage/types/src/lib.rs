//! Portage Domain Types
//!
//! Portage moves a body of change from a source-of-truth repository (the
//! **origin**) into a target repository (the **destination**), running a
//! transformation in between and remembering, in the destination itself,
//! how far the previous run got.
//!
//! This crate holds everything the engine and its collaborators share:
//!
//! - **Revision / Change**: origin-side pointers and the history units
//!   read between two of them.
//! - **Origin / Reader**: the contract a source repository implements.
//! - **Destination / Writer**: the contract a target repository implements,
//!   including the status query that records the last migrated revision.
//! - **Transformation / TransformWork**: the pipeline applied to a checkout
//!   before it is written.
//! - **WorkflowMode**: how pending changes are grouped and replayed.
//! - **IdentityTemplate**: tokens for custom migration identities.
//! - **PortageError**: the error taxonomy shared by every layer.
//!
//! Concrete version-control protocols live outside this workspace; they
//! plug in by implementing [`Origin`] and [`Destination`].

#![deny(unsafe_code)]

mod authoring;
mod config;
mod destination;
mod errors;
mod glob;
mod identity_template;
mod info;
mod mode;
mod origin;
mod revision;
mod transform;

pub use authoring::*;
pub use config::*;
pub use destination::*;
pub use errors::*;
pub use self::glob::*;
pub use identity_template::*;
pub use info::*;
pub use mode::*;
pub use origin::*;
pub use revision::*;
pub use transform::*;
