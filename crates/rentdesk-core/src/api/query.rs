use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Filter set of a store. Serialized into list queries and into the
/// persisted snapshot.
pub trait QueryFilters:
    Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Partial update accepted by `set_filters`
    type Patch: Send;

    /// Parameters in a fixed order so equal filters give equal cache keys.
    fn query_pairs(&self) -> Vec<(String, String)>;

    fn merge(&mut self, patch: Self::Patch);
}

/// Apply `overrides` on top of `base`; a repeated key replaces the earlier
/// value in place, new keys are appended.
pub fn overlay_params(
    mut base: Vec<(String, String)>,
    overrides: &[(String, String)],
) -> Vec<(String, String)> {
    for (key, value) in overrides {
        match base.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.clone(),
            None => base.push((key.clone(), value.clone())),
        }
    }
    base
}

pub fn encode_query(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `<prefix>_<urlencoded query>`
pub fn cache_key(prefix: &str, pairs: &[(String, String)]) -> String {
    format!("{}_{}", prefix, encode_query(pairs))
}
