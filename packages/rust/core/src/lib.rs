//! Core workflows for docsetter.
//!
//! This crate ties together the markup passes, navigation flattening and the
//! search index into end-to-end workflows (e.g., [`assemble`]).

pub mod assembler;
pub mod index;

pub use assembler::{AssembleConfig, AssembleResult, assemble, info_plist, validate_docset};
pub use index::{IndexReport, build_index, build_index_from_nodes};
