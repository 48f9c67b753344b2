use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{is_wildcard, Entity};
use crate::api::QueryFilters;
use crate::search::{matches_search, text_contains_term};
use crate::views::EntityFilter;

fn default_status() -> String {
    "available".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationDetails {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(
        deserialize_with = "super::deserialize_opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub latitude: Option<f64>,
    #[serde(
        deserialize_with = "super::deserialize_opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
}

/// Servers send the location either as a display string or as a structured address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyLocation {
    Text(String),
    Details(LocationDetails),
}

impl PropertyLocation {
    pub fn label(&self) -> String {
        match self {
            PropertyLocation::Text(text) => text.clone(),
            PropertyLocation::Details(details) => {
                [&details.street, &details.city, &details.state]
                    .iter()
                    .filter(|part| !part.is_empty())
                    .map(|part| part.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<PropertyLocation>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "super::deserialize_number")]
    pub rent: f64,
    #[serde(
        default,
        deserialize_with = "super::deserialize_opt_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub bedrooms: Option<u32>,
    /// Half baths are common, so this stays fractional
    #[serde(
        default,
        deserialize_with = "super::deserialize_opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default, deserialize_with = "super::deserialize_count")]
    pub unit_count: u32,
    #[serde(default, deserialize_with = "super::deserialize_number")]
    pub monthly_revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Property {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            location: None,
            status: default_status(),
            kind: String::new(),
            rent: 0.0,
            bedrooms: None,
            bathrooms: None,
            amenities: Vec::new(),
            unit_count: 0,
            monthly_revenue: 0.0,
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn location_label(&self) -> Option<String> {
        self.location.as_ref().map(PropertyLocation::label)
    }
}

impl Entity for Property {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self { min: 0.0, max: 10_000.0 }
    }
}

impl PriceRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Name,
    Rent,
    Status,
    CreatedAt,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Rent => "rent",
            SortKey::Status => "status",
            SortKey::CreatedAt => "createdAt",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyFilters {
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub price_range: PriceRange,
    /// `None` matches any bedroom count
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    /// Every listed amenity must be present
    pub amenities: Vec<String>,
    pub search: String,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for PropertyFilters {
    fn default() -> Self {
        Self {
            status: "all".to_string(),
            kind: "all".to_string(),
            location: "all".to_string(),
            price_range: PriceRange::default(),
            bedrooms: None,
            bathrooms: None,
            amenities: Vec::new(),
            search: String::new(),
            sort_by: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyFiltersPatch {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub location: Option<String>,
    pub price_range: Option<PriceRange>,
    pub bedrooms: Option<Option<u32>>,
    pub bathrooms: Option<Option<u32>>,
    pub amenities: Option<Vec<String>>,
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
}

fn count_param(value: Option<u32>) -> String {
    value.map_or_else(|| "all".to_string(), |n| n.to_string())
}

impl QueryFilters for PropertyFilters {
    type Patch = PropertyFiltersPatch;

    fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("status".to_string(), self.status.clone()),
            ("type".to_string(), self.kind.clone()),
            ("location".to_string(), self.location.clone()),
            ("minPrice".to_string(), self.price_range.min.to_string()),
            ("maxPrice".to_string(), self.price_range.max.to_string()),
            ("bedrooms".to_string(), count_param(self.bedrooms)),
            ("bathrooms".to_string(), count_param(self.bathrooms)),
            ("amenities".to_string(), self.amenities.join(",")),
            ("search".to_string(), self.search.clone()),
            ("sortBy".to_string(), self.sort_by.as_str().to_string()),
            ("sortOrder".to_string(), self.sort_order.as_str().to_string()),
        ]
    }

    fn merge(&mut self, patch: PropertyFiltersPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(price_range) = patch.price_range {
            self.price_range = price_range;
        }
        if let Some(bedrooms) = patch.bedrooms {
            self.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = patch.bathrooms {
            self.bathrooms = bathrooms;
        }
        if let Some(amenities) = patch.amenities {
            self.amenities = amenities;
        }
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(sort_by) = patch.sort_by {
            self.sort_by = sort_by;
        }
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
    }
}

impl EntityFilter<Property> for PropertyFilters {
    fn matches(&self, p: &Property) -> bool {
        let matches_status = is_wildcard(&self.status) || p.status == self.status;
        let matches_type = is_wildcard(&self.kind) || p.kind == self.kind;
        let matches_location = is_wildcard(&self.location)
            || p.location_label()
                .is_some_and(|label| text_contains_term(&label, &self.location));
        let matches_price = self.price_range.contains(p.rent);
        let matches_bedrooms = self.bedrooms.is_none() || p.bedrooms == self.bedrooms;
        let matches_bathrooms = self.bathrooms.is_none() || p.bathrooms == self.bathrooms.map(f64::from);
        let matches_amenities = self
            .amenities
            .iter()
            .all(|amenity| p.amenities.contains(amenity));
        let address = p.address.as_deref().unwrap_or_default();
        let matches_text = matches_search(&[p.name.as_str(), address], &self.search);

        matches_status
            && matches_type
            && matches_location
            && matches_price
            && matches_bedrooms
            && matches_bathrooms
            && matches_amenities
            && matches_text
    }
}

impl PropertyFilters {
    /// Ordering for client-side sorting, honouring `sort_by` and `sort_order`
    pub fn compare(&self, a: &Property, b: &Property) -> Ordering {
        let ordering = match self.sort_by {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Rent => a.rent.partial_cmp(&b.rent).unwrap_or(Ordering::Equal),
            SortKey::Status => a.status.cmp(&b.status),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyDimensions {
    pub total_area: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floors: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_unit: Option<String>,
}

/// Payload for `POST /properties`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub location: LocationDetails,
    pub dimensions: PropertyDimensions,
    pub monthly_rent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_deposit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_deposit: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
}

/// Payload for `PUT /properties/:id`; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_deposit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_deposit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_ids: Option<Vec<String>>,
}

impl PropertyUpdate {
    pub fn is_empty(&self) -> bool {
        self == &PropertyUpdate::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCenter {
    pub lat: f64,
    pub lng: f64,
}

impl Default for MapCenter {
    fn default() -> Self {
        // New York City
        Self {
            lat: 40.7128,
            lng: -74.0060,
        }
    }
}

/// Edit form state for the create/edit property screen
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyForm {
    pub data: Map<String, Value>,
    pub errors: BTreeMap<String, String>,
    pub touched: BTreeSet<String>,
    pub is_submitting: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyStats {
    pub total: usize,
    pub occupied: usize,
    pub vacant: usize,
    pub maintenance: usize,
    pub total_units: u64,
    pub total_revenue: f64,
    pub average_rent: f64,
    /// Percentage of occupied properties (0-100)
    pub occupancy_rate: f64,
}

/// Opaque analytics payload from `/properties/:id/analytics`
pub type PropertyAnalytics = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub unit_number: String,
    #[serde(default = "default_unit_status")]
    pub status: String,
    #[serde(default, deserialize_with = "super::deserialize_number")]
    pub rent: f64,
    #[serde(
        default,
        deserialize_with = "super::deserialize_opt_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub bedrooms: Option<u32>,
    #[serde(
        default,
        deserialize_with = "super::deserialize_opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub bathrooms: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_unit_status() -> String {
    "vacant".to_string()
}

impl Entity for Unit {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Tenant {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property(id: &str, name: &str, rent: f64, status: &str) -> Property {
        Property {
            rent,
            status: status.to_string(),
            ..Property::new(id, name)
        }
    }

    #[test]
    fn test_numbers_accept_numeric_strings() {
        let p: Property = serde_json::from_value(json!({
            "id": "p1",
            "rent": "1500.00",
            "bedrooms": "3",
            "bathrooms": "2.50",
            "unitCount": "4",
            "monthlyRevenue": null
        }))
        .unwrap();
        assert_eq!(p.rent, 1500.0);
        assert_eq!(p.bedrooms, Some(3));
        assert_eq!(p.bathrooms, Some(2.5));
        assert_eq!(p.unit_count, 4);
        assert_eq!(p.monthly_revenue, 0.0);

        let blank: Property = serde_json::from_value(json!({"id": "p2", "bedrooms": ""})).unwrap();
        assert_eq!(blank.bedrooms, None);

        assert!(serde_json::from_value::<Property>(json!({"id": "p3", "rent": "abc"})).is_err());
    }

    #[test]
    fn test_location_accepts_text_or_address() {
        let text: Property =
            serde_json::from_value(json!({"id": "1", "location": "Brooklyn, NY"})).unwrap();
        assert_eq!(text.location_label().as_deref(), Some("Brooklyn, NY"));

        let details: Property = serde_json::from_value(json!({
            "id": 2,
            "location": {"street": "1 Main St", "city": "Austin", "state": "TX", "zipCode": "78701"}
        }))
        .unwrap();
        assert_eq!(details.id, "2");
        assert_eq!(details.location_label().as_deref(), Some("1 Main St, Austin, TX"));
    }

    #[test]
    fn test_default_price_range_excludes_expensive_listings() {
        let filters = PropertyFilters::default();
        assert!(filters.matches(&property("1", "Loft", 2500.0, "vacant")));
        assert!(!filters.matches(&property("2", "Penthouse", 15_000.0, "vacant")));
    }

    #[test]
    fn test_filters_require_all_amenities_and_exact_counts() {
        let mut filters = PropertyFilters::default();
        filters.merge(PropertyFiltersPatch {
            amenities: Some(vec!["parking".to_string(), "gym".to_string()]),
            bedrooms: Some(Some(2)),
            ..Default::default()
        });

        let mut full = property("1", "Loft", 2000.0, "vacant");
        full.amenities = vec!["gym".to_string(), "parking".to_string(), "pool".to_string()];
        full.bedrooms = Some(2);

        let mut partial = full.clone();
        partial.amenities = vec!["gym".to_string()];

        let mut bigger = full.clone();
        bigger.bedrooms = Some(3);

        assert!(filters.matches(&full));
        assert!(!filters.matches(&partial));
        assert!(!filters.matches(&bigger));
    }

    #[test]
    fn test_location_filter_is_case_insensitive_substring() {
        let mut filters = PropertyFilters::default();
        filters.location = "austin".to_string();

        let mut p = property("1", "Loft", 2000.0, "vacant");
        p.location = Some(PropertyLocation::Text("Downtown Austin".to_string()));
        assert!(filters.matches(&p));

        p.location = None;
        assert!(!filters.matches(&p));
    }

    #[test]
    fn test_compare_respects_order() {
        let mut filters = PropertyFilters::default();
        let cheap = property("1", "b", 1000.0, "vacant");
        let pricey = property("2", "a", 3000.0, "vacant");

        assert_eq!(filters.compare(&cheap, &pricey), Ordering::Greater);

        filters.sort_by = SortKey::Rent;
        filters.sort_order = SortOrder::Desc;
        assert_eq!(filters.compare(&cheap, &pricey), Ordering::Greater);
        assert_eq!(filters.compare(&pricey, &cheap), Ordering::Less);
    }

    #[test]
    fn test_query_pairs_are_stable() {
        let filters = PropertyFilters::default();
        let pairs = filters.query_pairs();
        assert_eq!(pairs[0], ("status".to_string(), "all".to_string()));
        assert!(pairs.contains(&("bedrooms".to_string(), "all".to_string())));
        assert_eq!(pairs, filters.clone().query_pairs());
    }

    #[test]
    fn test_update_payload_skips_unset_fields() {
        let update = PropertyUpdate {
            status: Some("rented".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"status": "rented"}));
        assert!(PropertyUpdate::default().is_empty());
    }
}
