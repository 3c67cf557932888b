//! Patient-side domain model: the Patient record and the value types that
//! hang off it (names, telecoms, addresses, extensions, identifiers).
//!
//! All types are plain value records produced once by the parser and never
//! mutated afterwards. They hold no reference back to the source document.

use chrono::{NaiveDate, Utc};
use std::fmt;

/// The value carried by an extension: either text or a decimal number.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    Str(String),
    Decimal(f64),
}

impl ExtensionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtensionValue::Str(s) => Some(s),
            ExtensionValue::Decimal(_) => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            ExtensionValue::Str(_) => None,
            ExtensionValue::Decimal(d) => Some(*d),
        }
    }
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionValue::Str(s) => write!(f, "{}", s),
            // Debug keeps the decimal point on whole numbers (76.0, not 76)
            ExtensionValue::Decimal(d) => write!(f, "{:?}", d),
        }
    }
}

/// A URL-identified extension point attached to a resource or address.
/// The url is the final path segment of the source identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub url: String,
    pub value: ExtensionValue,
}

impl Extension {
    pub fn new(url: impl Into<String>, value: ExtensionValue) -> Self {
        Self {
            url: url.into(),
            value,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.value)
    }
}

/// A cross-system record identifier (SSN, driver's license, passport, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub system: String,
    pub code: String,
    pub display: String,
    pub value: String,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.display, self.value)
    }
}

/// A patient name: one family name, any number of given names and prefixes.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub family: String,
    pub given: Vec<String>,
    pub prefix: Vec<String>,
}

impl Name {
    /// Full name, single-space separated. Empty parts are skipped, so a
    /// missing prefix never produces a leading space.
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        parts.extend(self.prefix.iter().map(String::as_str));
        parts.extend(self.given.iter().map(String::as_str));
        parts.push(&self.family);
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }

    /// All given names joined with a space.
    pub fn given_joined(&self) -> String {
        self.given.join(" ")
    }

    /// All prefixes joined with a space.
    pub fn prefix_joined(&self) -> String {
        self.prefix.join(" ")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// A telecommunication contact point (system, number, use).
#[derive(Debug, Clone, PartialEq)]
pub struct Telecom {
    pub system: String,
    pub number: String,
    pub use_: String,
}

impl fmt::Display for Telecom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.use_, self.system, self.number)
    }
}

/// A postal address, with geocoordinates carried as extensions when the
/// source document provides them.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub lines: Vec<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub extensions: Vec<Extension>,
}

impl Address {
    /// The full postal address over multiple lines.
    pub fn full_address(&self) -> String {
        format!(
            "{}\n{}, {}\n{}, {}",
            self.lines.join("\n"),
            self.city,
            self.state,
            self.postal_code,
            self.country
        )
    }

    pub fn latitude(&self) -> Option<f64> {
        self.geo_coordinate("latitude")
    }

    pub fn longitude(&self) -> Option<f64> {
        self.geo_coordinate("longitude")
    }

    fn geo_coordinate(&self, url: &str) -> Option<f64> {
        self.extensions
            .iter()
            .find(|e| e.url == url)
            .and_then(|e| e.value.as_decimal())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_address())
    }
}

/// Marital status as a one-character code; `display()` gives the full
/// definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaritalStatus {
    pub code: char,
}

impl MaritalStatus {
    pub fn new(code: char) -> Self {
        Self { code }
    }

    /// Human-readable definition of the code. Unknown codes render as
    /// "Unknown", never an error.
    pub fn display(&self) -> &'static str {
        match self.code {
            'A' => "Annulled",
            'D' => "Divorced",
            'I' => "Interlocutory",
            'L' => "Legally Separated",
            'M' => "Married",
            'P' => "Polygamous",
            'S' => "Never Married",
            'T' => "Domestic Partner",
            'U' => "Unmarried",
            'W' => "Widowed",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// One language a patient communicates in.
#[derive(Debug, Clone, PartialEq)]
pub struct Communication {
    pub code: String,
    pub language: String,
}

/// The languages a patient communicates in, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Communications {
    pub entries: Vec<Communication>,
}

impl Communications {
    pub fn new(entries: Vec<Communication>) -> Self {
        Self { entries }
    }

    /// All language codes, e.g. `["en-US"]`.
    pub fn codes(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.code.as_str()).collect()
    }

    /// All display languages, e.g. `["English"]`.
    pub fn languages(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.language.as_str()).collect()
    }
}

impl fmt::Display for Communications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.languages().join(", "))
    }
}

/// A patient record assembled from a single Patient resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub uuid: String,
    pub name: Name,
    pub telecoms: Vec<Telecom>,
    pub gender: String,
    pub birth_date: NaiveDate,
    pub addresses: Vec<Address>,
    pub marital_status: MaritalStatus,
    pub multiple_birth: bool,
    pub communications: Communications,
    pub extensions: Vec<Extension>,
    pub identifiers: Vec<Identifier>,
}

impl Patient {
    /// The patient's full name.
    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    /// Age in fractional years as of today.
    pub fn age(&self) -> f64 {
        let days = (Utc::now().date_naive() - self.birth_date).num_days();
        days as f64 / 365.25
    }

    /// Value of the extension with the given url, if present.
    pub fn extension(&self, url: &str) -> Option<&ExtensionValue> {
        self.extensions.iter().find(|e| e.url == url).map(|e| &e.value)
    }

    /// Value of the identifier with the given type code, if present.
    pub fn identifier(&self, code: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|i| i.code == code)
            .map(|i| i.value.as_str())
    }
}

impl fmt::Display for Patient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses = join(self.addresses.iter().map(|a| a.to_string().replace('\n', ";")));
        write!(
            f,
            "{} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {}",
            self.uuid,
            self.name,
            self.gender,
            self.birth_date,
            addresses,
            join(self.telecoms.iter()),
            self.marital_status,
            self.multiple_birth,
            self.communications,
            join(self.extensions.iter()),
            join(self.identifiers.iter()),
        )
    }
}

/// Renders a sequence as `[a, b, c]` for the canonical record rendering.
pub(crate) fn join<T: fmt::Display>(items: impl Iterator<Item = T>) -> String {
    let rendered: Vec<String> = items.map(|i| i.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
