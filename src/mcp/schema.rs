use crate::model::{ParamType, ToolDescriptor};
use serde_json::{json, Map, Value};

fn json_type(kind: ParamType) -> &'static str {
    match kind {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
        ParamType::Object => "object",
    }
}

/// JSON Schema describing a tool's parameters, in the shape protocol
/// clients expect from `tools/list`.
pub fn input_schema(tool: &ToolDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in &tool.parameters {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(json_type(spec.kind)));
        if !spec.description.is_empty() {
            property.insert("description".to_string(), json!(spec.description));
        }
        if let Some(default) = &spec.default {
            property.insert("default".to_string(), default.clone());
        }
        properties.insert(spec.name.clone(), Value::Object(property));
        if spec.required {
            required.push(json!(spec.name));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AuthSpec, ExecutorConfig, HttpConfig, HttpMethod, ParamLocation, ParameterSpec,
    };
    use chrono::Utc;

    #[test]
    fn schema_lists_required_parameters() {
        let tool = ToolDescriptor {
            id: "t1".to_string(),
            name: "weather".to_string(),
            description: "Current weather".to_string(),
            enabled: true,
            config: ExecutorConfig::Http(HttpConfig {
                method: HttpMethod::Get,
                url: "https://api.example.com/weather".to_string(),
                headers: Default::default(),
                body_template: None,
                response_path: None,
                timeout_ms: None,
            }),
            parameters: vec![
                ParameterSpec {
                    name: "city".to_string(),
                    kind: ParamType::String,
                    description: "City name".to_string(),
                    required: true,
                    default: None,
                    location: ParamLocation::Query,
                },
                ParameterSpec {
                    name: "days".to_string(),
                    kind: ParamType::Integer,
                    description: String::new(),
                    required: false,
                    default: Some(json!(1)),
                    location: ParamLocation::Query,
                },
            ],
            auth: AuthSpec::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let schema = input_schema(&tool);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["city"]["type"], "string");
        assert_eq!(schema["properties"]["city"]["description"], "City name");
        assert_eq!(schema["properties"]["days"]["type"], "integer");
        assert_eq!(schema["properties"]["days"]["default"], 1);
        assert_eq!(schema["required"], json!(["city"]));
    }
}
