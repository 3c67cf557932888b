//! Resource parser: pure functions mapping raw FHIR JSON documents to the
//! domain model.
//!
//! Parsing is all-or-nothing. A missing required field or a wrong
//! `resourceType` fails the whole document with a [`KarteError`]; no partial
//! records are produced. Optional fields follow the tolerances spelled out
//! per extraction rule below.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

use crate::error::{KarteError, Result};
use crate::observation::{Observation, ObservationComponent};
use crate::patient::{
    Address, Communication, Communications, Extension, ExtensionValue, Identifier, MaritalStatus,
    Name, Patient, Telecom,
};

/// Field order for joining a `valueAddress` extension into one string.
/// The source map is unordered, so the join order is pinned here.
const VALUE_ADDRESS_FIELDS: [&str; 5] = ["line", "city", "state", "postalCode", "country"];

/// Parse a single Patient resource document.
pub fn parse_patient(input: &str) -> Result<Patient> {
    let doc: Value = serde_json::from_str(input)?;
    patient_from_value(&doc)
}

/// Parse an array of bundle documents into the patients they contain.
/// Bundles without an `entry` array contribute zero patients.
pub fn parse_patients(input: &str) -> Result<Vec<Patient>> {
    let doc: Value = serde_json::from_str(input)?;
    let bundles = doc
        .as_array()
        .ok_or_else(|| KarteError::MalformedDocument("expected an array of bundles".to_string()))?;

    let mut patients = Vec::new();
    for bundle in bundles {
        let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            patients.push(patient_from_value(field(entry, "resource")?)?);
        }
    }
    tracing::debug!(count = patients.len(), "parsed patient bundles");
    Ok(patients)
}

/// Parse a single Observation resource document.
pub fn parse_observation(input: &str) -> Result<Observation> {
    let doc: Value = serde_json::from_str(input)?;
    observation_from_value(&doc)
}

/// Parse an array of bundle documents into the observations they contain.
/// Bundles without an `entry` array contribute zero observations.
pub fn parse_observations(input: &str) -> Result<Vec<Observation>> {
    let doc: Value = serde_json::from_str(input)?;
    let bundles = doc
        .as_array()
        .ok_or_else(|| KarteError::MalformedDocument("expected an array of bundles".to_string()))?;

    let mut observations = Vec::new();
    for bundle in bundles {
        let Some(entries) = bundle.get("entry").and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            observations.push(observation_from_value(field(entry, "resource")?)?);
        }
    }
    tracing::debug!(count = observations.len(), "parsed observation bundles");
    Ok(observations)
}

/// Extract the diagnostic text of an embedded OperationOutcome, if the
/// document is one. Any other document yields `None`; only undecodable JSON
/// is an error.
pub fn parse_error(input: &str) -> Result<Option<String>> {
    let doc: Value = serde_json::from_str(input)?;
    if doc.get("resourceType").and_then(Value::as_str) != Some("OperationOutcome") {
        return Ok(None);
    }
    let Some(issues) = doc.get("issue").and_then(Value::as_array) else {
        return Ok(None);
    };
    Ok(issues
        .first()
        .and_then(|issue| issue.get("diagnostics"))
        .and_then(Value::as_str)
        .map(String::from))
}

fn patient_from_value(doc: &Value) -> Result<Patient> {
    check_resource_type(doc, "Patient")?;

    let uuid = str_field(doc, "id")?.to_string();

    // Only the first (active) name is kept; further entries are ignored.
    let names = array_field(doc, "name")?;
    let first_name = names
        .first()
        .ok_or_else(|| KarteError::MalformedDocument("'name' array is empty".to_string()))?;
    let name = Name {
        family: str_field(first_name, "family")?.to_string(),
        given: string_list(first_name, "given")?,
        prefix: optional_string_list(first_name, "prefix")?,
    };

    let telecoms = array_field(doc, "telecom")?
        .iter()
        .map(|entry| {
            Ok(Telecom {
                system: str_field(entry, "system")?.to_string(),
                number: str_field(entry, "value")?.to_string(),
                use_: str_field(entry, "use")?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let gender = str_field(doc, "gender")?.to_string();
    let birth_date = date_field(doc, "birthDate")?;

    let addresses = array_field(doc, "address")?
        .iter()
        .map(address_from_value)
        .collect::<Result<Vec<_>>>()?;

    let marital_code = coding_field(field(doc, "maritalStatus")?, "code")?;
    let marital_status = MaritalStatus::new(marital_code.chars().next().ok_or_else(|| {
        KarteError::MalformedDocument("maritalStatus code is empty".to_string())
    })?);

    let multiple_birth = doc
        .get("multipleBirthBoolean")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let communications = Communications::new(
        array_field(doc, "communication")?
            .iter()
            .map(|entry| {
                let language = field(entry, "language")?;
                Ok(Communication {
                    code: coding_field(language, "code")?.to_string(),
                    language: coding_field(language, "display")?.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
    );

    let extensions = array_field(doc, "extension")?
        .iter()
        .map(extension_from_value)
        .collect::<Result<Vec<_>>>()?;

    let identifiers = array_field(doc, "identifier")?
        .iter()
        .map(identifier_from_value)
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(uuid = %uuid, "parsed Patient resource");

    Ok(Patient {
        uuid,
        name,
        telecoms,
        gender,
        birth_date,
        addresses,
        marital_status,
        multiple_birth,
        communications,
        extensions,
        identifiers,
    })
}

fn address_from_value(addr: &Value) -> Result<Address> {
    // Geocoordinates live one level deeper than other extensions. The nested
    // array must be present; its absence marks a malformed address.
    let outer = array_field(addr, "extension")?;
    let geolocation = outer.first().ok_or_else(|| {
        KarteError::MalformedDocument("address 'extension' array is empty".to_string())
    })?;
    let extensions = array_field(geolocation, "extension")?
        .iter()
        .map(|ext| {
            Ok(Extension::new(
                str_field(ext, "url")?,
                ExtensionValue::Decimal(number_field(ext, "valueDecimal")?),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Address {
        lines: string_list(addr, "line")?,
        city: str_field(addr, "city")?.to_string(),
        state: str_field(addr, "state")?.to_string(),
        postal_code: optional_str(addr, "postalCode").to_string(),
        country: str_field(addr, "country")?.to_string(),
        extensions,
    })
}

/// Resolve one top-level extension entry. The url keeps only its final path
/// segment; the value is tried as valueString, valueCode, valueDecimal,
/// valueAddress, then a nested extension array. An entry matching none of
/// these degrades to an empty string rather than failing.
fn extension_from_value(ext: &Value) -> Result<Extension> {
    let full_url = str_field(ext, "url")?;
    let url = full_url.rsplit('/').next().unwrap_or(full_url);

    let value = if let Some(s) = ext.get("valueString").and_then(Value::as_str) {
        ExtensionValue::Str(s.to_string())
    } else if let Some(s) = ext.get("valueCode").and_then(Value::as_str) {
        ExtensionValue::Str(s.to_string())
    } else if let Some(d) = ext.get("valueDecimal").and_then(Value::as_f64) {
        ExtensionValue::Decimal(d)
    } else if let Some(addr) = ext.get("valueAddress").and_then(Value::as_object) {
        ExtensionValue::Str(joined_value_address(addr))
    } else if let Some(nested) = ext.get("extension").and_then(Value::as_array) {
        let first_string = nested
            .iter()
            .find_map(|e| e.get("valueString").and_then(Value::as_str));
        ExtensionValue::Str(first_string.unwrap_or("").to_string())
    } else {
        ExtensionValue::Str(String::new())
    };

    Ok(Extension::new(url, value))
}

/// Join a valueAddress object into one comma-separated string, in the fixed
/// field order of [`VALUE_ADDRESS_FIELDS`].
fn joined_value_address(addr: &Map<String, Value>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for key in VALUE_ADDRESS_FIELDS {
        match addr.get(key) {
            Some(Value::String(s)) => parts.push(s),
            Some(Value::Array(lines)) => {
                parts.extend(lines.iter().filter_map(Value::as_str));
            }
            _ => {}
        }
    }
    parts.join(", ")
}

fn identifier_from_value(ident: &Value) -> Result<Identifier> {
    // `type` is optional; code and display degrade to empty strings.
    let (code, display) = match ident.get("type") {
        Some(kind) => (
            kind.pointer("/coding/0/code")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            kind.get("text").and_then(Value::as_str).unwrap_or("").to_string(),
        ),
        None => (String::new(), String::new()),
    };

    Ok(Identifier {
        system: str_field(ident, "system")?.to_string(),
        code,
        display,
        value: str_field(ident, "value")?.to_string(),
    })
}

fn observation_from_value(doc: &Value) -> Result<Observation> {
    check_resource_type(doc, "Observation")?;

    let uuid = str_field(doc, "id")?.to_string();
    let status = str_field(doc, "status")?.to_string();

    let categories = array_field(doc, "category")?;
    let first_category = categories
        .first()
        .ok_or_else(|| KarteError::MalformedDocument("'category' array is empty".to_string()))?;
    let kind = coding_field(first_category, "code")?.to_string();

    let patient_uuid = reference_uuid(doc, "subject")?;
    let encounter_uuid = reference_uuid(doc, "encounter")?;

    let effective_datetime = datetime_field(doc, "effectiveDateTime")?;
    let issued_datetime = datetime_field(doc, "issued")?;

    // The document's own `code` makes a component, followed by every entry of
    // the `component` array. Neither is required on its own.
    let mut components = Vec::new();
    if doc.get("code").is_some() {
        components.push(component_from_value(doc)?);
    }
    if let Some(entries) = doc.get("component").and_then(Value::as_array) {
        for entry in entries {
            components.push(component_from_value(entry)?);
        }
    }

    tracing::debug!(uuid = %uuid, components = components.len(), "parsed Observation resource");

    Ok(Observation {
        uuid,
        kind,
        status,
        patient_uuid,
        encounter_uuid,
        effective_datetime,
        issued_datetime,
        components,
    })
}

fn component_from_value(value: &Value) -> Result<ObservationComponent> {
    let code = field(value, "code")?;
    let (quantity_value, unit) = match value.get("valueQuantity") {
        Some(quantity) => (
            Some(number_field(quantity, "value")?),
            Some(str_field(quantity, "unit")?.to_string()),
        ),
        None => (None, None),
    };

    Ok(ObservationComponent {
        system: coding_field(code, "system")?.to_string(),
        code: coding_field(code, "code")?.to_string(),
        display: coding_field(code, "display")?.to_string(),
        value: quantity_value,
        unit,
    })
}

/// Split a `"ResourceType/<uuid>"` reference under `key` and return the uuid.
fn reference_uuid(doc: &Value, key: &str) -> Result<String> {
    let reference = str_field(field(doc, key)?, "reference")?;
    reference
        .split('/')
        .nth(1)
        .map(String::from)
        .ok_or_else(|| {
            KarteError::MalformedDocument(format!(
                "reference '{}' is not of the form Type/<id>",
                reference
            ))
        })
}

fn check_resource_type(doc: &Value, expected: &'static str) -> Result<()> {
    let found = doc
        .get("resourceType")
        .and_then(Value::as_str)
        .unwrap_or("(absent)");
    if found == expected {
        Ok(())
    } else {
        Err(KarteError::SchemaMismatch {
            expected,
            found: found.to_string(),
        })
    }
}

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value.get(key).ok_or_else(|| {
        KarteError::MalformedDocument(format!("missing required field '{}'", key))
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Result<&'a str> {
    field(value, key)?.as_str().ok_or_else(|| {
        KarteError::MalformedDocument(format!("field '{}' is not a string", key))
    })
}

fn optional_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn array_field<'a>(value: &'a Value, key: &str) -> Result<&'a [Value]> {
    field(value, key)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| KarteError::MalformedDocument(format!("field '{}' is not an array", key)))
}

fn number_field(value: &Value, key: &str) -> Result<f64> {
    field(value, key)?.as_f64().ok_or_else(|| {
        KarteError::MalformedDocument(format!("field '{}' is not a number", key))
    })
}

fn string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    array_field(value, key)?
        .iter()
        .map(|item| {
            item.as_str().map(String::from).ok_or_else(|| {
                KarteError::MalformedDocument(format!("'{}' contains a non-string entry", key))
            })
        })
        .collect()
}

fn optional_string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    if value.get(key).is_none() {
        return Ok(Vec::new());
    }
    string_list(value, key)
}

/// `coding[0].<key>` from a codeable concept.
fn coding_field<'a>(concept: &'a Value, key: &str) -> Result<&'a str> {
    let codings = array_field(concept, "coding")?;
    let first = codings
        .first()
        .ok_or_else(|| KarteError::MalformedDocument("'coding' array is empty".to_string()))?;
    str_field(first, key)
}

fn date_field(value: &Value, key: &str) -> Result<NaiveDate> {
    let raw = str_field(value, key)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        KarteError::MalformedDocument(format!("invalid date '{}' in '{}': {}", raw, key, e))
    })
}

fn datetime_field(value: &Value, key: &str) -> Result<DateTime<chrono::FixedOffset>> {
    let raw = str_field(value, key)?;
    DateTime::parse_from_rfc3339(raw).map_err(|e| {
        KarteError::MalformedDocument(format!("invalid datetime '{}' in '{}': {}", raw, key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_patient() -> Value {
        json!({
            "resourceType": "Patient",
            "id": "abc-123",
            "name": [{"family": "Smith", "given": ["Jane"], "prefix": ["Dr."]}],
            "telecom": [{"system": "phone", "value": "555-0000", "use": "home"}],
            "gender": "female",
            "birthDate": "1990-01-15",
            "address": [{
                "line": ["1 Main St"],
                "city": "Barre",
                "state": "Massachusetts",
                "postalCode": "01005",
                "country": "US",
                "extension": [{
                    "url": "http://hl7.org/fhir/StructureDefinition/geolocation",
                    "extension": [
                        {"url": "latitude", "valueDecimal": 42.4},
                        {"url": "longitude", "valueDecimal": -72.1}
                    ]
                }]
            }],
            "maritalStatus": {"coding": [{"code": "M"}]},
            "communication": [{"language": {"coding": [{"code": "en-US", "display": "English"}]}}],
            "extension": [],
            "identifier": [{"system": "urn:test", "value": "abc-123"}]
        })
    }

    #[test]
    fn test_parse_minimal_patient() {
        let patient = parse_patient(&minimal_patient().to_string()).unwrap();
        assert_eq!(patient.uuid, "abc-123");
        assert_eq!(patient.full_name(), "Dr. Jane Smith");
        assert_eq!(patient.gender, "female");
        assert_eq!(patient.birth_date, NaiveDate::from_ymd_opt(1990, 1, 15).unwrap());
        assert_eq!(patient.marital_status.code, 'M');
        assert!(!patient.multiple_birth);
        assert_eq!(patient.addresses[0].latitude(), Some(42.4));
        assert_eq!(patient.identifiers[0].code, "");
        assert_eq!(patient.identifiers[0].display, "");
    }

    #[test]
    fn test_parse_patient_wrong_resource_type() {
        let doc = json!({"resourceType": "Observation", "id": "x"});
        let err = parse_patient(&doc.to_string()).unwrap_err();
        assert!(matches!(err, KarteError::SchemaMismatch { expected: "Patient", .. }));
    }

    #[test]
    fn test_parse_patient_missing_telecom_is_fatal() {
        let mut doc = minimal_patient();
        doc.as_object_mut().unwrap().remove("telecom");
        let err = parse_patient(&doc.to_string()).unwrap_err();
        assert!(matches!(err, KarteError::MalformedDocument(_)));
    }

    #[test]
    fn test_parse_patient_missing_geolocation_is_fatal() {
        let mut doc = minimal_patient();
        doc["address"][0]["extension"] = json!([]);
        let err = parse_patient(&doc.to_string()).unwrap_err();
        assert!(matches!(err, KarteError::MalformedDocument(_)));
    }

    #[test]
    fn test_parse_patient_prefix_defaults_empty() {
        let mut doc = minimal_patient();
        doc["name"][0].as_object_mut().unwrap().remove("prefix");
        let patient = parse_patient(&doc.to_string()).unwrap();
        assert!(patient.name.prefix.is_empty());
        assert_eq!(patient.full_name(), "Jane Smith");
    }

    #[test]
    fn test_parse_patient_multiple_birth() {
        let mut doc = minimal_patient();
        doc["multipleBirthBoolean"] = json!(true);
        let patient = parse_patient(&doc.to_string()).unwrap();
        assert!(patient.multiple_birth);
    }

    #[test]
    fn test_parse_patient_invalid_json() {
        assert!(matches!(
            parse_patient("{not json").unwrap_err(),
            KarteError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_extension_value_ladder() {
        let mut doc = minimal_patient();
        doc["extension"] = json!([
            {"url": "http://example.org/a/string", "valueString": "text"},
            {"url": "http://example.org/a/code", "valueCode": "F"},
            {"url": "http://example.org/a/decimal", "valueDecimal": 1.5},
            {"url": "http://example.org/a/birthPlace",
             "valueAddress": {"country": "US", "city": "Braintree", "state": "Massachusetts"}},
            {"url": "http://example.org/a/nested", "extension": [
                {"url": "ombCategory", "valueCoding": {"code": "2106-3"}},
                {"url": "text", "valueString": "White"}
            ]},
            {"url": "http://example.org/a/unresolvable"}
        ]);
        let patient = parse_patient(&doc.to_string()).unwrap();
        assert_eq!(
            patient.extensions,
            vec![
                Extension::new("string", ExtensionValue::Str("text".to_string())),
                Extension::new("code", ExtensionValue::Str("F".to_string())),
                Extension::new("decimal", ExtensionValue::Decimal(1.5)),
                Extension::new(
                    "birthPlace",
                    ExtensionValue::Str("Braintree, Massachusetts, US".to_string())
                ),
                Extension::new("nested", ExtensionValue::Str("White".to_string())),
                Extension::new("unresolvable", ExtensionValue::Str(String::new())),
            ]
        );
    }

    #[test]
    fn test_value_address_join_is_deterministic() {
        // Key order in the object must not affect the join order.
        let shuffled = json!({"country": "US", "line": ["1 Elm St"], "city": "Barre"});
        assert_eq!(
            joined_value_address(shuffled.as_object().unwrap()),
            "1 Elm St, Barre, US"
        );
    }

    #[test]
    fn test_parse_patients_skips_bundle_without_entry() {
        let bundles = json!([
            {"entry": [{"resource": minimal_patient()}]},
            {"link": []}
        ]);
        let patients = parse_patients(&bundles.to_string()).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].uuid, "abc-123");
    }

    #[test]
    fn test_parse_patients_all_empty_bundles() {
        let patients = parse_patients(r#"[{"link": []}, {}]"#).unwrap();
        assert!(patients.is_empty());
    }

    #[test]
    fn test_parse_patients_not_an_array() {
        assert!(matches!(
            parse_patients("{}").unwrap_err(),
            KarteError::MalformedDocument(_)
        ));
    }

    fn minimal_observation() -> Value {
        json!({
            "resourceType": "Observation",
            "id": "obs-1",
            "status": "final",
            "category": [{"coding": [{"code": "vital-signs"}]}],
            "subject": {"reference": "Patient/abc-123"},
            "encounter": {"reference": "Encounter/enc-456"},
            "effectiveDateTime": "2011-09-20T21:27:12+01:00",
            "issued": "2011-09-20T21:27:12.215+01:00",
            "code": {"coding": [{
                "system": "http://loinc.org",
                "code": "85354-9",
                "display": "Blood Pressure"
            }]},
            "component": [{
                "code": {"coding": [{
                    "system": "http://loinc.org",
                    "code": "8462-4",
                    "display": "Diastolic Blood Pressure"
                }]},
                "valueQuantity": {"value": 76.0, "unit": "mm[Hg]"}
            }]
        })
    }

    #[test]
    fn test_parse_observation() {
        let observation = parse_observation(&minimal_observation().to_string()).unwrap();
        assert_eq!(observation.uuid, "obs-1");
        assert_eq!(observation.kind, "vital-signs");
        assert_eq!(observation.status, "final");
        assert_eq!(observation.patient_uuid, "abc-123");
        assert_eq!(observation.encounter_uuid, "enc-456");
        assert_eq!(observation.components.len(), 2);
        assert_eq!(observation.components[0].value, None);
        assert_eq!(observation.components[0].unit, None);
        assert_eq!(observation.components[1].quantity(), "76.0mm[Hg]");
    }

    #[test]
    fn test_parse_observation_without_components() {
        let mut doc = minimal_observation();
        let obj = doc.as_object_mut().unwrap();
        obj.remove("code");
        obj.remove("component");
        let observation = parse_observation(&doc.to_string()).unwrap();
        assert!(observation.components.is_empty());
    }

    #[test]
    fn test_parse_observation_wrong_resource_type() {
        let err = parse_observation(&minimal_patient().to_string()).unwrap_err();
        assert!(matches!(
            err,
            KarteError::SchemaMismatch { expected: "Observation", .. }
        ));
    }

    #[test]
    fn test_parse_observation_timezone_preserved() {
        let observation = parse_observation(&minimal_observation().to_string()).unwrap();
        assert_eq!(observation.effective_datetime.offset().local_minus_utc(), 3600);
        assert_eq!(
            observation.issued_datetime.timestamp_subsec_millis(),
            215
        );
    }

    #[test]
    fn test_parse_observations_skips_bundle_without_entry() {
        let bundles = json!([
            {"link": []},
            {"entry": [{"resource": minimal_observation()}]}
        ]);
        let observations = parse_observations(&bundles.to_string()).unwrap();
        assert_eq!(observations.len(), 1);
    }

    #[test]
    fn test_parse_observations_all_empty_bundles() {
        let observations = parse_observations(r#"[{"link": []}]"#).unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn test_parse_error_on_operation_outcome() {
        let doc = json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "error", "diagnostics": "Patient not found"}]
        });
        assert_eq!(
            parse_error(&doc.to_string()).unwrap(),
            Some("Patient not found".to_string())
        );
    }

    #[test]
    fn test_parse_error_on_other_resource() {
        assert_eq!(parse_error(&minimal_patient().to_string()).unwrap(), None);
    }

    #[test]
    fn test_parse_error_without_issue_array() {
        let doc = json!({"resourceType": "OperationOutcome"});
        assert_eq!(parse_error(&doc.to_string()).unwrap(), None);
    }
}
