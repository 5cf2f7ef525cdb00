//! GraphQL schema introspection

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use crate::executor::{GraphqlRequest, QueryExecutor};

pub const SCHEMA_FILE: &str = "mc_graphql_schema.json";
pub const MUTATIONS_FILE: &str = "mc_mutations.json";

const TYPE_REF: &str = "type { name kind ofType { name kind } }";

/// Terms that mark a mutation or input type as monitor related
const MONITOR_TERMS: [&str; 3] = ["monitor", "alert", "rule"];

fn introspection_query() -> String {
    format!(
        "query IntrospectionQuery {{
  __schema {{
    queryType {{ name fields {{ name description args {{ name description {t} }} }} }}
    mutationType {{ name fields {{ name description args {{ name description {t} }} }} }}
    types {{
      name
      kind
      description
      fields {{ name description {t} }}
      inputFields {{ name description {t} }}
    }}
  }}
}}",
        t = TYPE_REF
    )
}

/// A mutation name with its argument names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationSummary {
    pub name: String,
    pub args: Vec<String>,
}

/// An input object type with its field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputTypeSummary {
    pub name: String,
    pub fields: Vec<String>,
}

/// The introspected schema as returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    data: Value,
}

impl SchemaDocument {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn to_pretty_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.data)?)
    }

    fn mutation_fields(&self) -> &[Value] {
        self.data["__schema"]["mutationType"]["fields"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn mutation_names(&self) -> Vec<&str> {
        self.mutation_fields()
            .iter()
            .filter_map(|f| f["name"].as_str())
            .collect()
    }

    pub fn monitor_mutations(&self) -> Vec<MutationSummary> {
        self.mutation_fields()
            .iter()
            .filter_map(|f| {
                let name = f["name"].as_str()?;
                is_monitor_related(name).then(|| MutationSummary {
                    name: name.to_string(),
                    args: names_of(&f["args"]),
                })
            })
            .collect()
    }

    pub fn monitor_input_types(&self) -> Vec<InputTypeSummary> {
        self.data["__schema"]["types"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|t| t["kind"] == "INPUT_OBJECT")
            .filter_map(|t| {
                let name = t["name"].as_str()?;
                if !is_monitor_related(name) {
                    return None;
                }
                let mut fields = names_of(&t["inputFields"]);
                if fields.is_empty() {
                    fields = names_of(&t["fields"]);
                }
                Some(InputTypeSummary {
                    name: name.to_string(),
                    fields,
                })
            })
            .collect()
    }

    /// Write the full schema and the mutation list into `dir`
    pub fn write_files(&self, dir: &Path) -> crate::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let schema_path = dir.join(SCHEMA_FILE);
        std::fs::write(&schema_path, self.to_pretty_json()?)?;
        tracing::info!("Schema saved to {}", schema_path.display());

        let mutations_path = dir.join(MUTATIONS_FILE);
        std::fs::write(
            &mutations_path,
            serde_json::to_string_pretty(&json!(self.mutation_fields()))?,
        )?;
        tracing::info!("Mutations saved to {}", mutations_path.display());

        Ok(vec![schema_path, mutations_path])
    }
}

fn is_monitor_related(name: &str) -> bool {
    let lower = name.to_lowercase();
    MONITOR_TERMS.iter().any(|term| lower.contains(term))
}

fn names_of(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Fetch the schema using the executor's default request policy
pub async fn fetch_schema(executor: &dyn QueryExecutor) -> crate::Result<SchemaDocument> {
    let data = executor
        .execute(&GraphqlRequest::new(introspection_query(), json!({})))
        .await?;
    tracing::debug!("Fetched GraphQL schema");
    Ok(SchemaDocument::new(data))
}
