use serde::{Deserialize, Serialize};

/// Response body of `GET /api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Locally available models.
    pub models: Vec<ModelTag>,
}

/// One entry of a [`ModelList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTag {
    /// Model identifier, e.g. `llama3.2:latest`.
    pub name: String,

    /// Size on disk in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ModelList {
    /// The model identifiers, in server order.
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_list_deserialization() {
        let json = serde_json::json!({
            "models": [
                {"name": "llama3.2:latest", "model": "llama3.2:latest", "size": 2019393189u64,
                 "digest": "a80c4f17acd5", "details": {"family": "llama"}},
                {"name": "mistral:7b"}
            ]
        });
        let list: ModelList = serde_json::from_value(json).unwrap();
        assert_eq!(list.names(), vec!["llama3.2:latest", "mistral:7b"]);
        assert_eq!(list.models[0].size, Some(2019393189));
        assert_eq!(list.models[1].size, None);
    }

    #[test]
    fn other_shapes_are_rejected() {
        assert!(serde_json::from_value::<ModelList>(serde_json::json!({"data": []})).is_err());
        assert!(
            serde_json::from_value::<ModelList>(serde_json::json!({"models": [{"id": "x"}]}))
                .is_err()
        );
    }
}
