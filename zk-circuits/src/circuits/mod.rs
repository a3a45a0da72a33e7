//! The four compliance predicates as R1CS circuits.
//!
//! Each circuit exposes `predicate`, which allocates its public inputs (in the documented
//! order) and witnesses and returns the satisfaction signal, and `evaluate`, the native
//! twin. `generate_constraints` enforces the signal, so no proof exists for a witness that
//! fails the predicate.

pub mod accreditation;
pub mod aggregation;
pub mod jurisdiction;
pub mod whitelist;

pub use accreditation::{AccreditationCircuit, AccreditationPublic, AccreditationWitness};
pub use aggregation::{AggregationCircuit, AggregationOutcome, AggregationPublic, AggregationWitness};
pub use jurisdiction::{JurisdictionCircuit, JurisdictionPublic, JurisdictionWitness};
pub use whitelist::{WhitelistCircuit, WhitelistPublic, WhitelistWitness};
