use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Types usable as an OpenAI `json_schema` response format.
///
/// Blanket-implemented for anything `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Strict-mode schema: every object closed with `additionalProperties:
    /// false`, every property listed in `required` (nullable ones included),
    /// and no `$ref`s.
    fn openai_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value
            .as_object_mut()
            .and_then(|root| root.remove("definitions"));
        if let Some(definitions) = definitions {
            inline_refs(&mut value, &definitions);
        }
        close_objects(&mut value);

        if let Value::Object(root) = &mut value {
            root.remove("$schema");
        }
        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn close_objects(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".into(), Value::Bool(false));
                let required = property_names(map);
                if let Some(required) = required {
                    map.insert("required".into(), Value::Array(required));
                }
            }
            map.values_mut().for_each(close_objects);
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn property_names(map: &Map<String, Value>) -> Option<Vec<Value>> {
    let props = map.get("properties")?.as_object()?;
    Some(props.keys().cloned().map(Value::String).collect())
}

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name));
            if let Some(def) = target {
                *value = def.clone();
                inline_refs(value, definitions);
                return;
            }

            // schemars wraps some references in a single-element allOf.
            let single = match map.get("allOf").and_then(Value::as_array) {
                Some(all_of) if all_of.len() == 1 => all_of.first().cloned(),
                _ => None,
            };
            if let Some(inner) = single {
                *value = inner;
                inline_refs(value, definitions);
                return;
            }

            map.values_mut().for_each(|v| inline_refs(v, definitions));
        }
        Value::Array(items) => items.iter_mut().for_each(|v| inline_refs(v, definitions)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "snake_case")]
    #[allow(dead_code)]
    enum Hint {
        Low,
        High,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Label {
        category: String,
        confidence: f32,
        severity_hint: Option<Hint>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Wrapped {
        label: Label,
        notes: Option<String>,
    }

    fn required(schema: &Value) -> Vec<&str> {
        schema["required"]
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[test]
    fn nullable_properties_are_required() {
        let schema = Label::openai_schema();
        let required = required(&schema);
        assert!(required.contains(&"category"));
        assert!(required.contains(&"confidence"));
        assert!(required.contains(&"severity_hint"));
        assert_eq!(schema["additionalProperties"], Value::Bool(false));
    }

    #[test]
    fn nested_structs_are_inlined_and_closed() {
        let schema = Wrapped::openai_schema();
        let text = serde_json::to_string(&schema).unwrap();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("definitions"));
        assert!(schema.get("$schema").is_none());

        let label = &schema["properties"]["label"];
        assert_eq!(label["type"], "object");
        assert_eq!(label["additionalProperties"], Value::Bool(false));
        assert!(required(label).contains(&"severity_hint"));
    }
}
