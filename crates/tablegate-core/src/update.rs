//! Update expression synthesis.
//!
//! Turns an entity (an ordered property bag) into the store's partial-update
//! syntax. Every non-key property gets a generated name placeholder `#pN` and
//! value placeholder `:vN`, with `N` counted across the eligible properties in
//! iteration order, so reserved words used as attribute names never reach the
//! expression text. A property holding `NULL` is removed instead of assigned.

use std::collections::BTreeMap;

use tablegate_model::input::UpdateItemInput;
use tablegate_model::{AttributeValue, Item};

use crate::schema::TableSchema;

/// Placeholders and value generated for one entity property.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEntry {
    /// Attribute name placeholder, `#pN`.
    pub name_placeholder: String,
    /// Attribute value placeholder, `:vN`.
    pub value_placeholder: String,
    /// New value; `None` removes the attribute.
    pub value: Option<AttributeValue>,
}

/// Ordered mapping from property name to its [`UpdateEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    entries: Vec<(String, UpdateEntry)>,
}

impl UpdatePlan {
    /// Entry for `name`, if the property is part of the plan.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UpdateEntry> {
        self.entries
            .iter()
            .find_map(|(prop, entry)| (prop == name).then_some(entry))
    }

    /// Iterate entries in placeholder order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UpdateEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of planned properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing would be updated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the update plan for `entity`, skipping every name in `key_names`.
#[must_use]
pub fn build_update_plan(entity: &Item, key_names: &[&str]) -> UpdatePlan {
    let entries = entity
        .iter()
        .filter(|(name, _)| !key_names.contains(&name.as_str()))
        .enumerate()
        .map(|(n, (name, value))| {
            let entry = UpdateEntry {
                name_placeholder: format!("#p{n}"),
                value_placeholder: format!(":v{n}"),
                value: match value {
                    AttributeValue::Null(_) => None,
                    other => Some(other.clone()),
                },
            };
            (name.clone(), entry)
        })
        .collect();

    UpdatePlan { entries }
}

/// Render the `set`/`remove` expression for a plan.
///
/// Returns an empty string when the plan is empty.
#[must_use]
pub fn build_update_expression(plan: &UpdatePlan) -> String {
    let mut assignments = Vec::new();
    let mut removals = Vec::new();

    for (_, entry) in plan.iter() {
        if entry.value.is_some() {
            assignments.push(format!(
                "{} = {}",
                entry.name_placeholder, entry.value_placeholder
            ));
        } else {
            removals.push(entry.name_placeholder.clone());
        }
    }

    let mut clauses = Vec::with_capacity(2);
    if !assignments.is_empty() {
        clauses.push(format!("set {}", assignments.join(", ")));
    }
    if !removals.is_empty() {
        clauses.push(format!("remove {}", removals.join(", ")));
    }
    clauses.join(" ")
}

/// Build the full `UpdateItem` request for `entity`.
///
/// Returns `None` when there is nothing to update, so the caller can skip the
/// store round trip. Removed attributes contribute a name placeholder only;
/// the store rejects value placeholders the expression never references.
#[must_use]
pub fn build_update_item_input(
    schema: &TableSchema,
    entity: &Item,
    partition: AttributeValue,
    sort: Option<AttributeValue>,
) -> Option<UpdateItemInput> {
    let plan = build_update_plan(entity, &schema.key_names());
    let expression = build_update_expression(&plan);
    if expression.is_empty() {
        return None;
    }

    let mut names = BTreeMap::new();
    let mut values = BTreeMap::new();
    for (prop, entry) in plan.iter() {
        names.insert(entry.name_placeholder.clone(), prop.to_owned());
        if let Some(value) = &entry.value {
            values.insert(entry.value_placeholder.clone(), value.clone());
        }
    }

    Some(UpdateItemInput {
        table_name: schema.table_name.clone(),
        key: schema.key_for(partition, sort),
        update_expression: Some(expression),
        expression_attribute_names: names,
        expression_attribute_values: values,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tablegate_model::item;

    use super::*;
    use crate::schema::KeyAttribute;

    fn composite_schema() -> TableSchema {
        TableSchema::new("events", KeyAttribute::string("pk"))
            .with_range_key(KeyAttribute::number("sk"))
    }

    #[test]
    fn test_should_exclude_key_attributes_from_plan() {
        let entity = item! { "pk" => "a", "sk" => 1, "name" => "x", "size" => 3 };
        let plan = build_update_plan(&entity, &["pk", "sk"]);

        assert_eq!(plan.len(), 2);
        assert!(plan.get("pk").is_none());
        assert!(plan.get("sk").is_none());
        assert!(plan.get("name").is_some());
    }

    #[test]
    fn test_should_number_placeholders_in_iteration_order() {
        let entity = item! { "b" => 2, "id" => 9, "a" => 1, "c" => 3 };
        let plan = build_update_plan(&entity, &["id"]);

        let names: Vec<(&str, &str, &str)> = plan
            .iter()
            .map(|(n, e)| (n, e.name_placeholder.as_str(), e.value_placeholder.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("a", "#p0", ":v0"), ("b", "#p1", ":v1"), ("c", "#p2", ":v2")]
        );
    }

    #[test]
    fn test_should_keep_placeholders_unique() {
        let entity: Item = (0..40).map(|i| (format!("attr{i}"), AttributeValue::from(i))).collect();
        let plan = build_update_plan(&entity, &[]);

        let names: HashSet<&str> = plan.iter().map(|(_, e)| e.name_placeholder.as_str()).collect();
        let values: HashSet<&str> = plan.iter().map(|(_, e)| e.value_placeholder.as_str()).collect();
        assert_eq!(names.len(), 40);
        assert_eq!(values.len(), 40);
    }

    #[test]
    fn test_should_render_set_and_remove_clauses() {
        let entity = item! { "id" => 1, "alias" => AttributeValue::Null(true), "name" => "n" };
        let plan = build_update_plan(&entity, &["id"]);

        assert_eq!(plan.get("alias").and_then(|e| e.value.clone()), None);
        assert_eq!(build_update_expression(&plan), "set #p1 = :v1 remove #p0");
    }

    #[test]
    fn test_should_render_remove_only() {
        let entity = item! { "id" => 1, "gone" => AttributeValue::Null(true) };
        let plan = build_update_plan(&entity, &["id"]);
        assert_eq!(build_update_expression(&plan), "remove #p0");
    }

    #[test]
    fn test_should_render_empty_expression_for_empty_plan() {
        assert_eq!(build_update_expression(&UpdatePlan::default()), "");
    }

    #[test]
    fn test_should_return_none_when_only_keys_present() {
        let schema = composite_schema();
        let entity = item! { "pk" => "a", "sk" => 1 };
        let input = build_update_item_input(
            &schema,
            &entity,
            AttributeValue::from("a"),
            Some(AttributeValue::from(1)),
        );
        assert!(input.is_none());
    }

    #[test]
    fn test_should_build_update_item_input() {
        let schema = composite_schema();
        let entity = item! {
            "pk" => "a",
            "count" => 5,
            "note" => AttributeValue::Null(true),
            "title" => "hello",
        };
        let input = build_update_item_input(
            &schema,
            &entity,
            AttributeValue::from("a"),
            Some(AttributeValue::from(7)),
        )
        .expect("non-empty update");

        assert_eq!(input.table_name, "events");
        assert_eq!(input.key, item! { "pk" => "a", "sk" => 7 });
        assert_eq!(
            input.update_expression.as_deref(),
            Some("set #p0 = :v0, #p2 = :v2 remove #p1")
        );
        assert_eq!(input.expression_attribute_names["#p0"], "count");
        assert_eq!(input.expression_attribute_names["#p1"], "note");
        assert_eq!(input.expression_attribute_names["#p2"], "title");
        assert_eq!(input.expression_attribute_values.len(), 2);
        assert!(!input.expression_attribute_values.contains_key(":v1"));
        assert_eq!(
            input.expression_attribute_values[":v2"],
            AttributeValue::from("hello")
        );
    }

    #[test]
    fn test_should_omit_sort_value_when_not_supplied() {
        let schema = composite_schema();
        let input = build_update_item_input(
            &schema,
            &item! { "title" => "t" },
            AttributeValue::from("a"),
            None,
        )
        .expect("non-empty update");
        assert_eq!(input.key, item! { "pk" => "a" });
    }
}
