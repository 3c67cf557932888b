//! karte-core - FHIR Patient/Observation domain model and resource parser.
//!
//! Converts loosely structured FHIR JSON documents into strongly typed,
//! read-only records. Parsing is pure and synchronous; the HTTP transport
//! lives in the `karte-client` crate and only hands raw document bodies to
//! the functions in [`parser`].

pub mod error;
pub mod observation;
pub mod parser;
pub mod patient;

pub use error::{KarteError, Result};
pub use observation::{Observation, ObservationComponent};
pub use parser::{
    parse_error, parse_observation, parse_observations, parse_patient, parse_patients,
};
pub use patient::{
    Address, Communication, Communications, Extension, ExtensionValue, Identifier, MaritalStatus,
    Name, Patient, Telecom,
};
