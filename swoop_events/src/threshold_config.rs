//! Category -> key -> threshold configuration.
//!
//! The configuration arrives as an already parsed JSON document. Each entry is
//! either a single [`Threshold`] or a group of thresholds keyed by sub-metric
//! (for example `vert` / `horz` speed variants). The required categories and
//! keys are checked when the configuration is built, so a lookup of a required
//! key can never fail later.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::threshold::Threshold;
use crate::SwoopError;

const LEAF_FIELDS: [&str; 4] = ["thres_peaks", "min_dist_peaks", "thres_lows", "min_dist_lows"];

/// Categories and keys every configuration must provide.
pub const REQUIRED_THRESHOLDS: &[(&str, &[&str])] = &[
    (
        "landing",
        &["init_turn", "toggle_search", "front_riser", "rollout", "stop"],
    ),
    ("exit", &["elevation", "horz_speed", "vert_speed"]),
    ("pond", &["horz_speed"]),
];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ThresholdEntry {
    Leaf(Threshold),
    Group(BTreeMap<String, Threshold>),
}

impl ThresholdEntry {
    pub fn as_leaf(&self) -> Option<&Threshold> {
        match self {
            ThresholdEntry::Leaf(t) => Some(t),
            ThresholdEntry::Group(_) => None,
        }
    }

    pub fn sub(&self, name: &str) -> Option<&Threshold> {
        match self {
            ThresholdEntry::Leaf(_) => None,
            ThresholdEntry::Group(group) => group.get(name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ThresholdConfig {
    categories: BTreeMap<String, BTreeMap<String, ThresholdEntry>>,
}

impl ThresholdConfig {
    /// Build and validate a configuration from a parsed document.
    pub fn from_value(value: &JsonValue) -> Result<Self, SwoopError> {
        let root = value.as_object().ok_or_else(|| SwoopError::MalformedThreshold {
            path: "<root>".into(),
            reason: "expected an object of categories".into(),
        })?;

        let mut categories = BTreeMap::new();
        for (category, items) in root {
            let items = items.as_object().ok_or_else(|| SwoopError::MalformedThreshold {
                path: category.clone(),
                reason: "expected an object of thresholds".into(),
            })?;
            let mut entries = BTreeMap::new();
            for (key, raw) in items {
                let path = format!("{category}.{key}");
                entries.insert(key.clone(), parse_entry(raw, &path)?);
            }
            categories.insert(category.clone(), entries);
        }

        let config = Self { categories };
        config.check_required()?;
        debug!(
            categories = config.categories.len(),
            "threshold configuration loaded"
        );
        Ok(config)
    }

    fn check_required(&self) -> Result<(), SwoopError> {
        for (category, keys) in REQUIRED_THRESHOLDS {
            let entries = self
                .categories
                .get(*category)
                .ok_or_else(|| SwoopError::MissingCategory(category.to_string()))?;
            let mut missing: Vec<String> = keys
                .iter()
                .filter(|k| !entries.contains_key(**k))
                .map(|k| k.to_string())
                .collect();
            if !missing.is_empty() {
                missing.sort();
                return Err(SwoopError::MissingThresholdKeys {
                    category: category.to_string(),
                    keys: missing,
                });
            }
        }
        Ok(())
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn keys(&self, category: &str) -> Result<impl Iterator<Item = &str>, SwoopError> {
        self.categories
            .get(category)
            .map(|entries| entries.keys().map(String::as_str))
            .ok_or_else(|| SwoopError::MissingCategory(category.to_string()))
    }

    pub fn get(&self, category: &str, key: &str) -> Result<&ThresholdEntry, SwoopError> {
        let entries = self
            .categories
            .get(category)
            .ok_or_else(|| SwoopError::MissingCategory(category.to_string()))?;
        entries
            .get(key)
            .ok_or_else(|| SwoopError::ThresholdNotFound {
                category: category.to_string(),
                key: key.to_string(),
            })
    }

    /// Threshold stored directly under `category.key`.
    pub fn threshold(&self, category: &str, key: &str) -> Result<&Threshold, SwoopError> {
        match self.get(category, key)? {
            ThresholdEntry::Leaf(t) => Ok(t),
            ThresholdEntry::Group(group) => Err(SwoopError::InvalidParameter(format!(
                "threshold '{key}' in '{category}' has sub-thresholds ({}); select one",
                group.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Threshold stored under `category.key.sub`.
    pub fn sub_threshold(
        &self,
        category: &str,
        key: &str,
        sub: &str,
    ) -> Result<&Threshold, SwoopError> {
        self.get(category, key)?
            .sub(sub)
            .ok_or_else(|| SwoopError::ThresholdNotFound {
                category: category.to_string(),
                key: format!("{key}.{sub}"),
            })
    }

    /// SHA-256 of the canonical JSON form; identical configurations hash alike.
    pub fn fingerprint(&self) -> Result<String, SwoopError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| SwoopError::InvalidParameter(e.to_string()))?;
        Ok(sha256_hex(&bytes))
    }
}

fn parse_entry(raw: &JsonValue, path: &str) -> Result<ThresholdEntry, SwoopError> {
    let object = raw.as_object().ok_or_else(|| SwoopError::MalformedThreshold {
        path: path.to_string(),
        reason: "expected a threshold object".into(),
    })?;
    if LEAF_FIELDS.iter().any(|f| object.contains_key(*f)) {
        return parse_leaf(raw, path).map(ThresholdEntry::Leaf);
    }
    if object.is_empty() {
        return Err(SwoopError::MalformedThreshold {
            path: path.to_string(),
            reason: format!("expected fields {}", LEAF_FIELDS.join(", ")),
        });
    }
    let mut group = BTreeMap::new();
    for (sub, value) in object {
        let sub_path = format!("{path}.{sub}");
        if !value.is_object() {
            return Err(SwoopError::MalformedThreshold {
                path: sub_path,
                reason: "expected a threshold object".into(),
            });
        }
        group.insert(sub.clone(), parse_leaf(value, &sub_path)?);
    }
    Ok(ThresholdEntry::Group(group))
}

fn parse_leaf(raw: &JsonValue, path: &str) -> Result<Threshold, SwoopError> {
    let threshold: Threshold =
        serde_json::from_value(raw.clone()).map_err(|e| SwoopError::MalformedThreshold {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    if let Some(reason) = threshold.range_problem() {
        return Err(SwoopError::MalformedThreshold {
            path: path.to_string(),
            reason,
        });
    }
    Ok(threshold)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf() -> JsonValue {
        json!({"thres_peaks": 0.3, "min_dist_peaks": 10, "thres_lows": 0.2, "min_dist_lows": 5})
    }

    fn full_config() -> JsonValue {
        json!({
            "landing": {
                "init_turn": leaf(),
                "toggle_search": leaf(),
                "front_riser": leaf(),
                "rollout": leaf(),
                "stop": leaf(),
            },
            "exit": {
                "elevation": leaf(),
                "horz_speed": leaf(),
                "vert_speed": {"vert": leaf(), "horz": leaf()},
            },
            "pond": {"horz_speed": leaf()},
        })
    }

    #[test]
    fn loads_leaves_and_groups() {
        let config = ThresholdConfig::from_value(&full_config()).unwrap();
        let t = config.threshold("landing", "rollout").unwrap();
        assert_eq!(t.min_dist_peaks(), 10);
        assert!(matches!(
            config.get("exit", "vert_speed").unwrap(),
            ThresholdEntry::Group(_)
        ));
        assert_eq!(
            config.sub_threshold("exit", "vert_speed", "horz").unwrap().thres_lows(),
            0.2
        );
        assert_eq!(
            config.categories().collect::<Vec<_>>(),
            vec!["exit", "landing", "pond"]
        );
    }

    #[test]
    fn missing_pond_key_names_pond() {
        let mut value = full_config();
        value["pond"].as_object_mut().unwrap().remove("horz_speed");
        let err = ThresholdConfig::from_value(&value).unwrap_err();
        assert!(err.to_string().contains("pond"));
        assert!(err.to_string().contains("horz_speed"));
    }

    #[test]
    fn missing_category_is_fatal() {
        let mut value = full_config();
        value.as_object_mut().unwrap().remove("pond");
        let err = ThresholdConfig::from_value(&value).unwrap_err();
        assert_eq!(err, SwoopError::MissingCategory("pond".into()));
    }

    #[test]
    fn missing_key_names_category_and_key() {
        let mut value = full_config();
        let landing = value["landing"].as_object_mut().unwrap();
        landing.remove("stop");
        landing.remove("front_riser");
        let err = ThresholdConfig::from_value(&value).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing keys in 'landing' thresholds: front_riser, stop"
        );
    }

    #[test]
    fn malformed_leaf_reports_path() {
        let mut value = full_config();
        value["landing"]["rollout"] = json!({"thres_peaks": 0.3, "min_dist_peaks": 10});
        match ThresholdConfig::from_value(&value).unwrap_err() {
            SwoopError::MalformedThreshold { path, reason } => {
                assert_eq!(path, "landing.rollout");
                assert!(reason.contains("thres_lows"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut value = full_config();
        value["exit"]["vert_speed"]["vert"] = json!(3);
        match ThresholdConfig::from_value(&value).unwrap_err() {
            SwoopError::MalformedThreshold { path, .. } => {
                assert_eq!(path, "exit.vert_speed.vert")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_fraction_and_negative_distance() {
        let mut value = full_config();
        value["pond"]["horz_speed"]["thres_peaks"] = json!(2.5);
        assert!(matches!(
            ThresholdConfig::from_value(&value),
            Err(SwoopError::MalformedThreshold { .. })
        ));
        let mut value = full_config();
        value["pond"]["horz_speed"]["min_dist_lows"] = json!(-1);
        assert!(ThresholdConfig::from_value(&value).is_err());
    }

    #[test]
    fn lookup_never_defaults() {
        let config = ThresholdConfig::from_value(&full_config()).unwrap();
        assert!(matches!(
            config.get("landing", "flare"),
            Err(SwoopError::ThresholdNotFound { .. })
        ));
        assert!(matches!(
            config.get("canopy", "flare"),
            Err(SwoopError::MissingCategory(_))
        ));
        assert!(matches!(
            config.threshold("exit", "vert_speed"),
            Err(SwoopError::InvalidParameter(_))
        ));
        assert!(config.sub_threshold("landing", "rollout", "vert").is_err());
    }

    #[test]
    fn extra_categories_are_kept() {
        let mut value = full_config();
        value["canopy"] = json!({"flare": leaf()});
        let config = ThresholdConfig::from_value(&value).unwrap();
        assert!(config.threshold("canopy", "flare").is_ok());
        assert_eq!(config.keys("canopy").unwrap().count(), 1);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = ThresholdConfig::from_value(&full_config()).unwrap();
        let b = ThresholdConfig::from_value(&full_config()).unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);

        let mut value = full_config();
        value["pond"]["horz_speed"]["min_dist_peaks"] = json!(11);
        let c = ThresholdConfig::from_value(&value).unwrap();
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }
}
