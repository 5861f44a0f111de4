//! Field-level merge of overwrite documents into page models.
//!
//! Each mergeable type declares a [`MergeDescriptor`]: a table of field names and
//! the [`MergePolicy`] applied to them. Models are merged through their serde
//! representation, so the descriptor is the only per-type knowledge needed.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// How an overwrite value combines with the existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The overwrite value replaces the existing value.
    Replace,
    /// Objects merge key by key; null or empty overwrite values keep the existing value.
    MergeIfPresent,
    /// The field is never touched by an overwrite.
    Ignore,
    /// Identity field: the overwrite value must equal the existing value.
    MergeKey,
}

/// Per-type table of merge policies.
#[derive(Debug, Clone, Copy)]
pub struct MergeDescriptor {
    rules: &'static [(&'static str, MergePolicy)],
    fallback: MergePolicy,
}

/// Merge rules for API reference items.
pub const API_ITEM: MergeDescriptor = MergeDescriptor::new(
    &[
        ("uid", MergePolicy::MergeKey),
        ("commentId", MergePolicy::Ignore),
        ("id", MergePolicy::Ignore),
        ("parent", MergePolicy::Ignore),
        ("children", MergePolicy::Ignore),
        ("href", MergePolicy::Ignore),
        ("monikers", MergePolicy::Ignore),
        ("source", MergePolicy::Ignore),
        ("documentation", MergePolicy::Ignore),
        ("syntax", MergePolicy::MergeIfPresent),
        ("summary", MergePolicy::MergeIfPresent),
        ("remarks", MergePolicy::MergeIfPresent),
    ],
    MergePolicy::Replace,
);

impl MergeDescriptor {
    pub const fn new(
        rules: &'static [(&'static str, MergePolicy)],
        fallback: MergePolicy,
    ) -> Self {
        Self { rules, fallback }
    }

    /// Policy for `field`, falling back to the descriptor default.
    pub fn policy_for(&self, field: &str) -> MergePolicy {
        self.rules
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, policy)| *policy)
            .unwrap_or(self.fallback)
    }

    /// Merge `overwrite` into an object map.
    pub fn merge_map(&self, target: &mut Map<String, Value>, overwrite: &Map<String, Value>) -> Result<()> {
        for (field, value) in overwrite {
            match self.policy_for(field) {
                MergePolicy::Ignore => {}
                MergePolicy::MergeKey => {
                    if target.get(field).is_some_and(|existing| existing != value) {
                        return Err(CoreError::merge(
                            field,
                            format!("key mismatch: {value} does not match {}", target[field]),
                        ));
                    }
                }
                MergePolicy::Replace => {
                    if value.is_null() {
                        continue;
                    }
                    target.insert(field.clone(), value.clone());
                }
                MergePolicy::MergeIfPresent => merge_if_present(target, field, value),
            }
        }
        Ok(())
    }

    /// Merge `overwrite` into a model through its serde representation.
    pub fn merge<T>(&self, target: &T, overwrite: &Map<String, Value>) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let Value::Object(mut fields) = serde_json::to_value(target)? else {
            return Err(CoreError::merge("", "merge target is not an object"));
        };
        self.merge_map(&mut fields, overwrite)?;
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

fn merge_if_present(target: &mut Map<String, Value>, field: &str, value: &Value) {
    let empty = match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    };
    if empty {
        return;
    }

    match (target.get_mut(field), value) {
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (key, nested) in incoming {
                merge_if_present(existing, key, nested);
            }
        }
        _ => {
            target.insert(field.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::ApiItem;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_policy_lookup() {
        assert_eq!(API_ITEM.policy_for("uid"), MergePolicy::MergeKey);
        assert_eq!(API_ITEM.policy_for("children"), MergePolicy::Ignore);
        assert_eq!(API_ITEM.policy_for("syntax"), MergePolicy::MergeIfPresent);
        assert_eq!(API_ITEM.policy_for("anything-else"), MergePolicy::Replace);
    }

    #[test]
    fn test_merge_api_item() {
        let item: ApiItem = serde_json::from_value(json!({
            "uid": "Contoso.Widget",
            "summary": "Old summary.",
            "children": ["Contoso.Widget.Spin"],
            "syntax": { "content": "public class Widget" },
            "platform": ["net8.0"]
        }))
        .unwrap();

        let overwrite = object(json!({
            "uid": "Contoso.Widget",
            "summary": "New summary.",
            "children": [],
            "syntax": { "return": { "type": "void" } },
            "platform": ["net9.0"],
            "example": ["Widget::new()"]
        }));

        let merged = API_ITEM.merge(&item, &overwrite).unwrap();

        assert_eq!(merged.summary.as_deref(), Some("New summary."));
        assert_eq!(merged.children, vec!["Contoso.Widget.Spin"]);
        let syntax = merged.syntax.unwrap();
        assert_eq!(syntax.content.as_deref(), Some("public class Widget"));
        assert_eq!(syntax.return_value.unwrap().kind.as_deref(), Some("void"));
        assert_eq!(merged.platform, vec!["net9.0"]);
        assert_eq!(merged.example, vec!["Widget::new()"]);
    }

    #[test]
    fn test_merge_if_present_keeps_existing_on_empty() {
        let mut target = object(json!({ "summary": "Keep me." }));
        API_ITEM
            .merge_map(&mut target, &object(json!({ "summary": "  ", "remarks": null })))
            .unwrap();

        assert_eq!(target["summary"], json!("Keep me."));
        assert!(!target.contains_key("remarks"));
    }

    #[test]
    fn test_merge_key_mismatch_is_error() {
        let mut target = object(json!({ "uid": "A" }));
        let err = API_ITEM
            .merge_map(&mut target, &object(json!({ "uid": "B" })))
            .unwrap_err();
        assert!(err.to_string().contains("Merge error on 'uid'"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let item = ApiItem {
            uid: "A".to_string(),
            summary: Some("s".to_string()),
            ..Default::default()
        };
        let overwrite = object(json!({ "summary": "t", "syntax": { "content": "fn a()" } }));

        let once = API_ITEM.merge(&item, &overwrite).unwrap();
        let twice = API_ITEM.merge(&once, &overwrite).unwrap();
        assert_eq!(once, twice);
    }
}
