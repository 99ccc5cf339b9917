//! Pantry tools served by the `larder` binary.

use larder_mcp::{
    ArgKind, ArgumentSchema, Dependency, Result, ToolCall, ToolDeclaration, ToolError, ToolSet,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

const ITEMS: &str = "items";

/// Tool name for adding an item.
pub const ADD_ITEM: &str = "pantry.items.add";
/// Tool name for listing items.
pub const LIST_ITEMS: &str = "pantry.items.list";
/// Tool name for fetching a JSON document.
pub const FETCH_JSON: &str = "net.http.fetch_json";

/// A stored pantry item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PantryItem {
    /// Display name.
    pub name: String,
    /// Amount on hand.
    pub quantity: i64,
    /// Unit of `quantity`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Caller that last wrote the item.
    pub updated_by: String,
}

/// Pantry inventory and outbound fetch tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct PantryTools;

impl PantryTools {
    fn add_item(&self) -> Result<ToolDeclaration> {
        ToolDeclaration::builder(ADD_ITEM)
            .description("Add an item to the pantry or replace its quantity")
            .schema(
                ArgumentSchema::new()
                    .required("name", ArgKind::String, "Item name")
                    .required("quantity", ArgKind::Integer, "Amount on hand")
                    .optional("unit", ArgKind::String, "Unit such as 'g' or 'cans'"),
            )
            .write()
            .depends_on(Dependency::Store)
            .handler(|call: ToolCall| async move {
                let name: String = call.required_arg("name")?;
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(ToolError::invalid_arguments(
                        vec!["name".to_string()],
                        "name must not be blank",
                    ));
                }
                let quantity: i64 = call.required_arg("quantity")?;
                if quantity < 0 {
                    return Err(ToolError::invalid_arguments(
                        vec!["quantity".to_string()],
                        "quantity must not be negative",
                    ));
                }
                let item = PantryItem {
                    name: name.clone(),
                    quantity,
                    unit: call.arg("unit")?,
                    updated_by: call.caller.id.clone(),
                };
                let value = serde_json::to_value(&item)?;
                call.deps
                    .store()?
                    .put(ITEMS, &name.to_lowercase(), value.clone())
                    .await?;
                Ok(value)
            })
            .build()
    }

    fn list_items(&self) -> Result<ToolDeclaration> {
        ToolDeclaration::builder(LIST_ITEMS)
            .description("List pantry items, optionally only those in one unit")
            .schema(ArgumentSchema::new().optional("unit", ArgKind::String, "Only this unit"))
            .depends_on(Dependency::Store)
            .handler(|call: ToolCall| async move {
                let filter = match call.arg::<String>("unit")? {
                    Some(unit) => json!({ "unit": unit }),
                    None => Value::Null,
                };
                let items = call.deps.store()?.query(ITEMS, &filter).await?;
                Ok(json!({ "count": items.len(), "items": items }))
            })
            .build()
    }

    fn fetch_json(&self) -> Result<ToolDeclaration> {
        ToolDeclaration::builder(FETCH_JSON)
            .description("Fetch a JSON document over HTTP")
            .schema(ArgumentSchema::new().required("url", ArgKind::String, "http(s) URL"))
            .depends_on(Dependency::HttpClient)
            .timeout(Duration::from_secs(15))
            .handler(|call: ToolCall| async move {
                let url: String = call.required_arg("url")?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ToolError::invalid_arguments(
                        vec!["url".to_string()],
                        "url must use http or https",
                    ));
                }
                call.deps.http_client()?.get_json(&url).await
            })
            .build()
    }
}

impl ToolSet for PantryTools {
    fn declarations(&self) -> Result<Vec<ToolDeclaration>> {
        Ok(vec![self.add_item()?, self.list_items()?, self.fetch_json()?])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use larder_core::{CallerIdentity, Permission};
    use larder_mcp::{Dispatcher, ErrorKind, InMemoryStore, ProviderSet, RegistryBuilder};
    use std::sync::Arc;

    fn dispatcher(store: Arc<InMemoryStore>) -> Dispatcher {
        let mut builder = RegistryBuilder::new();
        builder.add_set(&PantryTools).unwrap();
        Dispatcher::new(builder.build(), ProviderSet::new().with_store_instance(store))
    }

    #[test]
    fn test_declarations() {
        let decls = PantryTools.declarations().unwrap();
        let names: Vec<_> = decls.iter().map(|d| d.name()).collect();
        assert_eq!(names, [ADD_ITEM, LIST_ITEMS, FETCH_JSON]);
        assert_eq!(decls[0].permission(), Permission::Write);
        assert_eq!(decls[1].permission(), Permission::Read);
        assert_eq!(decls[2].dependencies(), [Dependency::HttpClient]);
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let store = Arc::new(InMemoryStore::new());
        let d = dispatcher(Arc::clone(&store));
        let alice = CallerIdentity::authenticated("alice");

        let added = d
            .dispatch(ADD_ITEM, json!({"name": " Lentils ", "quantity": 3, "unit": "cans"}), &alice)
            .await;
        assert_eq!(added.data().unwrap()["name"], "Lentils");
        assert_eq!(added.data().unwrap()["updated_by"], "alice");
        d.dispatch(ADD_ITEM, json!({"name": "Rice", "quantity": 500, "unit": "g"}), &alice)
            .await;
        assert_eq!(store.len(ITEMS), 2);

        let listed = d.dispatch(LIST_ITEMS, json!({"unit": "g"}), &alice).await;
        assert_eq!(listed.data().unwrap()["count"], 1);
        assert_eq!(listed.data().unwrap()["items"][0]["name"], "Rice");
    }

    #[tokio::test]
    async fn test_demo_caller_cannot_add() {
        let store = Arc::new(InMemoryStore::new());
        let d = dispatcher(Arc::clone(&store));
        let result = d
            .dispatch(ADD_ITEM, json!({"name": "Oats", "quantity": 1}), &CallerIdentity::demo("demo"))
            .await;
        assert_eq!(result.error_kind(), Some(&ErrorKind::PermissionDenied));
        assert_eq!(store.len(ITEMS), 0);
    }

    #[tokio::test]
    async fn test_rejects_negative_quantity() {
        let d = dispatcher(Arc::new(InMemoryStore::new()));
        let result = d
            .dispatch(
                ADD_ITEM,
                json!({"name": "Oats", "quantity": -1}),
                &CallerIdentity::authenticated("alice"),
            )
            .await;
        assert_eq!(result.error().unwrap().fields, ["quantity"]);
    }

    #[tokio::test]
    async fn test_fetch_without_http_client_is_internal() {
        let d = dispatcher(Arc::new(InMemoryStore::new()));
        let result = d
            .dispatch(FETCH_JSON, json!({"url": "file:///etc/passwd"}), &CallerIdentity::demo("demo"))
            .await;
        // No http-client provider: resolution fails before the handler runs.
        assert_eq!(result.error_kind(), Some(&ErrorKind::Internal));
    }
}
