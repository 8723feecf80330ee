//! Testing utilities, fixtures, and mocks for cadtrail.
//!
//! - **Mocks**: [`MockDocument`], an in-memory [`DocumentHost`] with fault
//!   injection
//! - **Builders**: [`MockFeature`] constructors for common feature families
//! - **Fixtures**: ready-made documents and temporary history roots
//!
//! # Example Usage
//!
//! ```rust
//! use cadtrail_test_utils::{fixtures, MockFeature};
//!
//! let doc = fixtures::bracket_document("/parts/bracket.sldprt");
//! doc.add_feature(MockFeature::fillet("Fillet1", 2.0));
//! assert!(doc.has_feature("Fillet1"));
//! ```
//!
//! [`DocumentHost`]: cadtrail_host::DocumentHost

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::MockFeature;
pub use fixtures::TestHistory;
pub use mocks::MockDocument;
