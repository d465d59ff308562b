//! Resource definitions
//!
//! Each resource names its collection, its required fields and typed
//! create/update payloads carrying the field validators. Payloads are
//! validated here and handed to the document store as plain JSON objects.

use crate::error::AppError;
use crate::store::{Collection, Document};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use validator::{Validate, ValidationError, ValidationErrors};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));

/// How a collection is ordered when listed
#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    NewestFirst,
    FieldAsc(&'static str),
    FieldDesc(&'static str),
}

impl SortOrder {
    pub fn apply(self, docs: &mut [Document]) {
        let text = |doc: &Document, field: &str| {
            doc.field(field).and_then(Value::as_str).map(str::to_owned)
        };
        match self {
            SortOrder::NewestFirst => docs.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::FieldAsc(field) => docs.sort_by(|a, b| text(a, field).cmp(&text(b, field))),
            SortOrder::FieldDesc(field) => docs.sort_by(|a, b| match text(b, field).cmp(&text(a, field)) {
                Ordering::Equal => b.created_at.cmp(&a.created_at),
                other => other,
            }),
        }
    }
}

/// A resource type served over the generic record handlers
pub trait Resource: Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Singular label for messages, e.g. "Property"
    const LABEL: &'static str;
    /// Prefix of the "<x> ID is required" message
    const ID_LABEL: &'static str;
    /// Plural noun for messages, e.g. "properties"
    const PLURAL: &'static str;
    const REQUIRED: &'static [&'static str];
    const ORDER: SortOrder;

    type Create: DeserializeOwned + Serialize + Validate;
    type Update: DeserializeOwned + Serialize + Validate;
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages
}

fn typed<T: DeserializeOwned + Validate>(body: Map<String, Value>) -> Result<T, AppError> {
    let payload: T = serde_json::from_value(Value::Object(body))
        .map_err(|e| AppError::InvalidFields(vec![e.to_string()]))?;
    payload
        .validate()
        .map_err(|e| AppError::InvalidFields(validation_messages(&e)))?;
    Ok(payload)
}

fn into_object<T: Serialize>(payload: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Internal("Payload did not serialize to an object".to_string())),
        Err(e) => Err(AppError::Internal(format!("Failed to serialize payload: {}", e))),
    }
}

fn expect_object(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest("Request body must be a JSON object".to_string())),
    }
}

/// Check required fields and validators for a new record; returns the
/// normalized body to store.
pub fn prepare_create<R: Resource>(body: Value) -> Result<Map<String, Value>, AppError> {
    let body = expect_object(body)?;

    let missing: Vec<String> = R::REQUIRED
        .iter()
        .filter(|field| is_blank(body.get(**field)))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::MissingFields(missing));
    }

    into_object(&typed::<R::Create>(body)?)
}

/// Validate the fields present in an update. Returns the record ID and the
/// changes to merge.
pub fn prepare_update<R: Resource>(body: Value) -> Result<(String, Map<String, Value>), AppError> {
    let mut body = expect_object(body)?;

    let id = match body.remove("_id") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return Err(AppError::BadRequest(format!("{} ID is required", R::ID_LABEL))),
    };

    let mut changes = into_object(&typed::<R::Update>(body)?)?;
    changes.retain(|_, value| !value.is_null());
    Ok((id, changes))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn status_error(message: &'static str) -> ValidationError {
    let mut err = ValidationError::new("status");
    err.message = Some(message.into());
    err
}

fn check_period(start: Option<&str>, end: Option<&str>) -> Result<(), ValidationError> {
    let parse = |s: Option<&str>| s.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    if let (Some(start), Some(end)) = (parse(start), parse(end)) {
        if start >= end {
            let mut err = ValidationError::new("period");
            err.message = Some("End date must be after start date".into());
            return Err(err);
        }
    }
    Ok(())
}

// ----- properties -----

pub struct Property;

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    #[validate(length(min = 1, max = 64, message = "Property reference must be between 1 and 64 characters"))]
    pub property_ref: String,
    #[validate(length(min = 1, message = "Property name is required"))]
    pub property_name: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChanges {
    #[validate(length(min = 1, max = 64, message = "Property reference must be between 1 and 64 characters"))]
    pub property_ref: Option<String>,
    #[validate(length(min = 1, message = "Property name is required"))]
    pub property_name: Option<String>,
}

impl Resource for Property {
    const COLLECTION: Collection = Collection::Properties;
    const LABEL: &'static str = "Property";
    const ID_LABEL: &'static str = "Property";
    const PLURAL: &'static str = "properties";
    const REQUIRED: &'static [&'static str] = &["propertyRef", "propertyName"];
    const ORDER: SortOrder = SortOrder::NewestFirst;

    type Create = NewProperty;
    type Update = PropertyChanges;
}

// ----- car insurance -----

pub struct CarInsurance;

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewCarInsurance {
    pub car_ref: String,
    pub car_details: String,
    pub responsible_person: String,
    pub insurance: String,
    #[validate(custom(function = "validate_amount_insured"))]
    pub amount_insured: f64,
    #[validate(custom(function = "validate_monthly_payment"))]
    pub monthly_payment: f64,
    #[validate(regex(path = *DATE_RE, message = "Next payment date must be in YYYY-MM-DD format"))]
    pub next_payment_date: String,
    #[validate(custom(function = "validate_termly_premium"))]
    pub termly_premium: f64,
    #[validate(custom(function = "validate_yearly_premium"))]
    pub yearly_premium: f64,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CarInsuranceChanges {
    pub car_ref: Option<String>,
    pub car_details: Option<String>,
    pub responsible_person: Option<String>,
    pub insurance: Option<String>,
    #[validate(custom(function = "validate_amount_insured"))]
    pub amount_insured: Option<f64>,
    #[validate(custom(function = "validate_monthly_payment"))]
    pub monthly_payment: Option<f64>,
    #[validate(regex(path = *DATE_RE, message = "Next payment date must be in YYYY-MM-DD format"))]
    pub next_payment_date: Option<String>,
    #[validate(custom(function = "validate_termly_premium"))]
    pub termly_premium: Option<f64>,
    #[validate(custom(function = "validate_yearly_premium"))]
    pub yearly_premium: Option<f64>,
}

macro_rules! positive_validator {
    ($name:ident, $message:literal) => {
        fn $name(value: f64) -> Result<(), ValidationError> {
            if positive(value) {
                Ok(())
            } else {
                let mut err = ValidationError::new("positive");
                err.message = Some($message.into());
                Err(err)
            }
        }
    };
}

positive_validator!(validate_amount_insured, "Amount insured must be a positive number");
positive_validator!(validate_monthly_payment, "Monthly payment must be a positive number");
positive_validator!(validate_termly_premium, "Termly premium must be a positive number");
positive_validator!(validate_yearly_premium, "Yearly premium must be a positive number");
positive_validator!(validate_coverage, "Coverage must be a positive number");
positive_validator!(validate_coverage_amount, "Coverage amount must be a positive number");
positive_validator!(validate_premium, "Premium must be a positive number");

impl Resource for CarInsurance {
    const COLLECTION: Collection = Collection::InsuredCars;
    const LABEL: &'static str = "Car insurance";
    const ID_LABEL: &'static str = "Insurance";
    const PLURAL: &'static str = "car insurance records";
    const REQUIRED: &'static [&'static str] = &[
        "carRef",
        "carDetails",
        "responsiblePerson",
        "insurance",
        "amountInsured",
        "monthlyPayment",
        "nextPaymentDate",
        "termlyPremium",
        "yearlyPremium",
    ];
    const ORDER: SortOrder = SortOrder::NewestFirst;

    type Create = NewCarInsurance;
    type Update = CarInsuranceChanges;
}

// ----- property insurance -----

pub struct PropertyInsurance;

fn validate_policy_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "active" | "expired" | "cancelled" => Ok(()),
        _ => Err(status_error("Status must be one of: active, expired, cancelled")),
    }
}

fn validate_new_policy_period(policy: &NewPropertyInsurance) -> Result<(), ValidationError> {
    check_period(Some(&policy.start_date), Some(&policy.end_date))
}

fn validate_policy_period_changes(changes: &PropertyInsuranceChanges) -> Result<(), ValidationError> {
    check_period(changes.start_date.as_deref(), changes.end_date.as_deref())
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_new_policy_period", skip_on_field_errors = false))]
pub struct NewPropertyInsurance {
    pub property_id: String,
    pub insurance_type: String,
    #[validate(custom(function = "validate_coverage"))]
    pub coverage: f64,
    #[validate(regex(path = *DATE_RE, message = "Start date must be in YYYY-MM-DD format"))]
    pub start_date: String,
    #[validate(regex(path = *DATE_RE, message = "End date must be in YYYY-MM-DD format"))]
    pub end_date: String,
    #[validate(custom(function = "validate_premium"))]
    pub premium: f64,
    #[validate(custom(function = "validate_policy_status"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_policy_period_changes", skip_on_field_errors = false))]
pub struct PropertyInsuranceChanges {
    pub property_id: Option<String>,
    pub insurance_type: Option<String>,
    #[validate(custom(function = "validate_coverage"))]
    pub coverage: Option<f64>,
    #[validate(regex(path = *DATE_RE, message = "Start date must be in YYYY-MM-DD format"))]
    pub start_date: Option<String>,
    #[validate(regex(path = *DATE_RE, message = "End date must be in YYYY-MM-DD format"))]
    pub end_date: Option<String>,
    #[validate(custom(function = "validate_premium"))]
    pub premium: Option<f64>,
    #[validate(custom(function = "validate_policy_status"))]
    pub status: Option<String>,
}

impl Resource for PropertyInsurance {
    const COLLECTION: Collection = Collection::PropertyInsured;
    const LABEL: &'static str = "Property insurance";
    const ID_LABEL: &'static str = "Insurance";
    const PLURAL: &'static str = "property insurance records";
    const REQUIRED: &'static [&'static str] = &[
        "propertyId",
        "insuranceType",
        "coverage",
        "startDate",
        "endDate",
        "premium",
        "status",
    ];
    const ORDER: SortOrder = SortOrder::FieldDesc("startDate");

    type Create = NewPropertyInsurance;
    type Update = PropertyInsuranceChanges;
}

// ----- insurance cover -----

pub struct InsuranceCover;

fn validate_cover_status(status: &str) -> Result<(), ValidationError> {
    match status {
        "active" | "inactive" => Ok(()),
        _ => Err(status_error("Status must be either active or inactive")),
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewInsuranceCover {
    pub cover_id: String,
    pub cover_type: String,
    #[validate(length(min = 10, message = "Description must be at least 10 characters long"))]
    pub description: String,
    #[validate(custom(function = "validate_coverage_amount"))]
    pub coverage_amount: f64,
    #[validate(custom(function = "validate_premium"))]
    pub premium: f64,
    #[validate(custom(function = "validate_cover_status"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceCoverChanges {
    pub cover_id: Option<String>,
    pub cover_type: Option<String>,
    #[validate(length(min = 10, message = "Description must be at least 10 characters long"))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_coverage_amount"))]
    pub coverage_amount: Option<f64>,
    #[validate(custom(function = "validate_premium"))]
    pub premium: Option<f64>,
    #[validate(custom(function = "validate_cover_status"))]
    pub status: Option<String>,
}

impl Resource for InsuranceCover {
    const COLLECTION: Collection = Collection::InsuredCover;
    const LABEL: &'static str = "Insurance cover";
    const ID_LABEL: &'static str = "Cover";
    const PLURAL: &'static str = "insurance covers";
    const REQUIRED: &'static [&'static str] = &[
        "coverId",
        "coverType",
        "description",
        "coverageAmount",
        "premium",
        "status",
    ];
    const ORDER: SortOrder = SortOrder::FieldAsc("coverType");

    type Create = NewInsuranceCover;
    type Update = InsuranceCoverChanges;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn car() -> Value {
        json!({
            "carRef": "CAR-7",
            "carDetails": "2019 Transit van",
            "responsiblePerson": "M. Okafor",
            "insurance": "Fleetwise",
            "amountInsured": 18000.0,
            "monthlyPayment": 95.5,
            "nextPaymentDate": "2026-11-01",
            "termlyPremium": 286.5,
            "yearlyPremium": 1146.0
        })
    }

    #[test]
    fn test_create_lists_all_missing_fields() {
        let err = prepare_create::<Property>(json!({"propertyName": ""})).unwrap_err();
        match err {
            AppError::MissingFields(fields) => assert_eq!(fields, vec!["propertyRef", "propertyName"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_create_strips_unknown_fields() {
        let body = prepare_create::<Property>(json!({
            "propertyRef": "P-1",
            "propertyName": "Elm Court",
            "isAdmin": true
        }))
        .unwrap();

        assert_eq!(Value::Object(body), json!({"propertyRef": "P-1", "propertyName": "Elm Court"}));
    }

    #[test]
    fn test_car_insurance_validators_are_itemized() {
        let mut body = car();
        body["monthlyPayment"] = json!(-4);
        body["nextPaymentDate"] = json!("01/11/2026");

        match prepare_create::<CarInsurance>(body).unwrap_err() {
            AppError::InvalidFields(reasons) => assert_eq!(
                reasons,
                vec![
                    "Monthly payment must be a positive number",
                    "Next payment date must be in YYYY-MM-DD format",
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_is_a_validation_failure() {
        let mut body = car();
        body["amountInsured"] = json!("a lot");
        assert!(matches!(prepare_create::<CarInsurance>(body), Err(AppError::InvalidFields(_))));
    }

    #[test]
    fn test_property_insurance_period_and_status() {
        let body = json!({
            "propertyId": "P-1",
            "insuranceType": "Buildings",
            "coverage": 250000,
            "startDate": "2026-06-01",
            "endDate": "2026-01-01",
            "premium": 820,
            "status": "pending"
        });

        match prepare_create::<PropertyInsurance>(body).unwrap_err() {
            AppError::InvalidFields(reasons) => assert_eq!(
                reasons,
                vec![
                    "End date must be after start date",
                    "Status must be one of: active, expired, cancelled",
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_insurance_cover_description_length() {
        let body = json!({
            "coverId": "C-1",
            "coverType": "Liability",
            "description": "short",
            "coverageAmount": 1000,
            "premium": 10,
            "status": "active"
        });
        match prepare_create::<InsuranceCover>(body).unwrap_err() {
            AppError::InvalidFields(reasons) => {
                assert_eq!(reasons, vec!["Description must be at least 10 characters long"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_update_requires_id_and_keeps_present_fields() {
        let err = prepare_update::<CarInsurance>(json!({"insurance": "Other"})).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Insurance ID is required");

        let (id, changes) = prepare_update::<CarInsurance>(json!({
            "_id": "5b1c",
            "insurance": "Other",
            "createdAt": "2020-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(id, "5b1c");
        assert_eq!(Value::Object(changes), json!({"insurance": "Other"}));
    }

    #[test]
    fn test_id_required_messages_per_resource() {
        let missing = |err: AppError| err.to_string();
        assert_eq!(
            missing(prepare_update::<InsuranceCover>(json!({"status": "active"})).unwrap_err()),
            "Bad request: Cover ID is required"
        );
        assert_eq!(
            missing(prepare_update::<PropertyInsurance>(json!({"_id": ""})).unwrap_err()),
            "Bad request: Insurance ID is required"
        );
        assert_eq!(PropertyInsurance::LABEL, "Property insurance");
    }

    #[test]
    fn test_update_reports_period_alongside_field_errors() {
        let err = prepare_update::<PropertyInsurance>(json!({
            "_id": "x",
            "startDate": "2027-01-01",
            "endDate": "2026-01-01",
            "premium": -1
        }))
        .unwrap_err();

        match err {
            AppError::InvalidFields(reasons) => assert_eq!(
                reasons,
                vec!["End date must be after start date", "Premium must be a positive number"]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_update_validates_present_fields_only() {
        let err = prepare_update::<PropertyInsurance>(json!({"_id": "x", "premium": 0})).unwrap_err();
        assert!(matches!(err, AppError::InvalidFields(_)));

        let ok = prepare_update::<PropertyInsurance>(json!({"_id": "x", "endDate": "2027-01-01"}));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_sort_orders() {
        let mut docs: Vec<Document> = ["Theft", "Fire", "Liability"]
            .into_iter()
            .map(|t| Document::new(json!({"coverType": t}).as_object().cloned().unwrap()))
            .collect();

        SortOrder::FieldAsc("coverType").apply(&mut docs);
        let order: Vec<_> = docs.iter().map(|d| d.field("coverType").cloned().unwrap()).collect();
        assert_eq!(order, vec![json!("Fire"), json!("Liability"), json!("Theft")]);

        SortOrder::FieldDesc("coverType").apply(&mut docs);
        assert_eq!(docs[0].field("coverType"), Some(&json!("Theft")));
    }
}
