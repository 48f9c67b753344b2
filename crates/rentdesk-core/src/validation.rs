//! Client-side property validation. Problems are returned as data, never
//! raised: `validate_*` always yields a [`ValidationResult`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Serialize;

use crate::models::{PropertyDraft, PropertyUpdate};

pub const PROPERTY_TYPES: &[&str] = &[
    "apartment",
    "house",
    "townhouse",
    "condo",
    "villa",
    "studio",
    "commercial",
    "office",
    "retail",
    "land",
    "warehouse",
    "industrial",
];

pub const PROPERTY_STATUSES: &[&str] = &[
    "active",
    "inactive",
    "maintenance",
    "rented",
    "available",
    "pending",
    "sold",
    "archived",
];

static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{5}(-[0-9]{4})?$").expect("valid zip code pattern"));

/// Field path (`location.zipCode`) to message. Only the first problem per
/// field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn first_message(&self) -> Option<&str> {
        self.errors.values().next().map(String::as_str)
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }
}

fn check_title(result: &mut ValidationResult, title: &str) {
    let len = title.chars().count();
    result.check(len >= 3, "title", "Title must be at least 3 characters");
    result.check(len <= 255, "title", "Title must not exceed 255 characters");
}

fn check_description(result: &mut ValidationResult, description: Option<&str>) {
    if let Some(description) = description {
        result.check(
            description.chars().count() <= 5000,
            "description",
            "Description must not exceed 5000 characters",
        );
    }
}

fn check_status(result: &mut ValidationResult, status: Option<&str>) {
    if let Some(status) = status {
        result.check(
            PROPERTY_STATUSES.contains(&status),
            "status",
            "Invalid property status",
        );
    }
}

fn check_positive(result: &mut ValidationResult, value: Option<f64>, field: &str, message: &str) {
    if let Some(value) = value {
        result.check(value > 0.0, field, message);
    }
}

fn check_coordinates(result: &mut ValidationResult, latitude: Option<f64>, longitude: Option<f64>) {
    if let Some(lat) = latitude {
        result.check(
            (-90.0..=90.0).contains(&lat),
            "location.latitude",
            "Latitude must be between -90 and 90",
        );
    }
    if let Some(lng) = longitude {
        result.check(
            (-180.0..=180.0).contains(&lng),
            "location.longitude",
            "Longitude must be between -180 and 180",
        );
    }
}

pub fn validate_property_create(draft: &PropertyDraft) -> ValidationResult {
    let mut result = ValidationResult::default();

    if draft.title.is_empty() {
        result.push("title", "Title is required");
    } else {
        check_title(&mut result, &draft.title);
    }
    check_description(&mut result, draft.description.as_deref());

    if draft.kind.is_empty() {
        result.push("type", "Property type is required");
    } else {
        result.check(
            PROPERTY_TYPES.contains(&draft.kind.as_str()),
            "type",
            "Invalid property type",
        );
    }
    check_status(&mut result, draft.status.as_deref());

    let location = &draft.location;
    result.check(!location.street.trim().is_empty(), "location.street", "Street address is required");
    result.check(!location.city.trim().is_empty(), "location.city", "City is required");
    result.check(!location.state.trim().is_empty(), "location.state", "State is required");
    if location.zip_code.is_empty() {
        result.push("location.zipCode", "Zip code is required");
    } else {
        result.check(
            ZIP_CODE.is_match(&location.zip_code),
            "location.zipCode",
            "Invalid zip code format",
        );
    }
    check_coordinates(&mut result, location.latitude, location.longitude);

    let dims = &draft.dimensions;
    result.check(
        dims.total_area > 0.0,
        "dimensions.totalArea",
        "Total area must be a positive number",
    );
    if let Some(bedrooms) = dims.bedrooms {
        result.check(bedrooms >= 0, "dimensions.bedrooms", "Bedrooms cannot be negative");
    }
    if let Some(bathrooms) = dims.bathrooms {
        result.check(bathrooms >= 0, "dimensions.bathrooms", "Bathrooms cannot be negative");
    }
    if let Some(floors) = dims.floors {
        result.check(floors >= 1, "dimensions.floors", "Floors must be at least 1");
    }
    if let Some(year) = dims.year_built {
        let max_year = Utc::now().year() + 1;
        result.check(
            (1800..=max_year).contains(&year),
            "dimensions.yearBuilt",
            &format!("Year built must be between 1800 and {}", max_year),
        );
    }
    check_positive(&mut result, dims.lot_size, "dimensions.lotSize", "Lot size must be positive");
    if let Some(unit) = dims.area_unit.as_deref() {
        result.check(
            unit == "sqft" || unit == "sqm",
            "dimensions.areaUnit",
            "Area unit must be sqft or sqm",
        );
    }

    result.check(
        draft.monthly_rent > 0.0,
        "monthlyRent",
        "Monthly rent must be greater than 0",
    );
    check_positive(
        &mut result,
        draft.security_deposit,
        "securityDeposit",
        "Security deposit must be greater than 0",
    );
    check_positive(
        &mut result,
        draft.pet_deposit,
        "petDeposit",
        "Pet deposit must be greater than 0",
    );

    result
}

pub fn validate_property_update(update: &PropertyUpdate) -> ValidationResult {
    let mut result = ValidationResult::default();

    if update.is_empty() {
        result.push("_", "At least one field must be updated");
        return result;
    }

    if let Some(title) = update.title.as_deref() {
        check_title(&mut result, title);
    }
    check_description(&mut result, update.description.as_deref());
    check_status(&mut result, update.status.as_deref());
    check_positive(
        &mut result,
        update.monthly_rent,
        "monthlyRent",
        "Monthly rent must be greater than 0",
    );
    check_positive(
        &mut result,
        update.security_deposit,
        "securityDeposit",
        "Security deposit must be greater than 0",
    );
    check_positive(
        &mut result,
        update.pet_deposit,
        "petDeposit",
        "Pet deposit must be greater than 0",
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationDetails, PropertyDimensions};

    fn valid_draft() -> PropertyDraft {
        PropertyDraft {
            title: "Maple Court".to_string(),
            kind: "apartment".to_string(),
            location: LocationDetails {
                street: "12 Maple St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                zip_code: "62704".to_string(),
                ..Default::default()
            },
            dimensions: PropertyDimensions {
                total_area: 850.0,
                ..Default::default()
            },
            monthly_rent: 1450.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let result = validate_property_create(&valid_draft());
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_create_collects_field_errors() {
        let mut draft = valid_draft();
        draft.title = "ab".to_string();
        draft.kind = "castle".to_string();
        draft.location.zip_code = "1234".to_string();
        draft.location.latitude = Some(91.0);
        draft.dimensions.floors = Some(0);
        draft.dimensions.year_built = Some(1799);
        draft.monthly_rent = 0.0;

        let result = validate_property_create(&draft);
        assert!(!result.is_valid());
        assert_eq!(result.errors["title"], "Title must be at least 3 characters");
        assert_eq!(result.errors["type"], "Invalid property type");
        assert_eq!(result.errors["location.zipCode"], "Invalid zip code format");
        assert!(result.errors.contains_key("location.latitude"));
        assert!(result.errors.contains_key("dimensions.floors"));
        assert!(result.errors.contains_key("dimensions.yearBuilt"));
        assert_eq!(result.errors["monthlyRent"], "Monthly rent must be greater than 0");
    }

    #[test]
    fn test_zip_plus_four_and_missing_required() {
        let mut draft = valid_draft();
        draft.location.zip_code = "62704-1234".to_string();
        assert!(validate_property_create(&draft).is_valid());

        let result = validate_property_create(&PropertyDraft::default());
        assert_eq!(result.errors["title"], "Title is required");
        assert_eq!(result.errors["type"], "Property type is required");
        assert_eq!(result.errors["location.street"], "Street address is required");
        assert_eq!(result.errors["location.zipCode"], "Zip code is required");
    }

    #[test]
    fn test_update_requires_a_field() {
        let result = validate_property_update(&PropertyUpdate::default());
        assert!(!result.is_valid());
        assert_eq!(result.first_message(), Some("At least one field must be updated"));

        let update = PropertyUpdate {
            status: Some("rented".to_string()),
            ..Default::default()
        };
        assert!(validate_property_update(&update).is_valid());

        let update = PropertyUpdate {
            monthly_rent: Some(-5.0),
            ..Default::default()
        };
        assert!(validate_property_update(&update).errors.contains_key("monthlyRent"));
    }
}
