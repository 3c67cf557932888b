//! Observation domain model.
//!
//! An observation references its patient and encounter by UUID only; it never
//! owns the referenced records.

use chrono::{DateTime, FixedOffset};
use std::fmt;

use crate::patient::join;

/// One measured part of an observation, e.g. a diastolic blood pressure
/// reading within a blood-pressure panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationComponent {
    pub system: String,
    pub code: String,
    pub display: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

impl ObservationComponent {
    /// Value and unit as one string, e.g. `76.0mm[Hg]`. Renders `N/A` when no
    /// value is present.
    pub fn quantity(&self) -> String {
        let value = match self.value {
            // Debug keeps the decimal point on whole numbers (76.0, not 76)
            Some(v) => format!("{:?}", v),
            None => "N/A".to_string(),
        };
        format!("{}{}", value, self.unit.as_deref().unwrap_or(""))
    }
}

impl fmt::Display for ObservationComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display, self.quantity())
    }
}

/// A clinical observation holding one or more components.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub uuid: String,
    /// Category code, e.g. `vital-signs`.
    pub kind: String,
    pub status: String,
    pub patient_uuid: String,
    pub encounter_uuid: String,
    pub effective_datetime: DateTime<FixedOffset>,
    pub issued_datetime: DateTime<FixedOffset>,
    pub components: Vec<ObservationComponent>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {} | {}",
            self.uuid,
            self.kind,
            self.status,
            self.effective_datetime,
            self.issued_datetime,
            join(self.components.iter()),
        )
    }
}
