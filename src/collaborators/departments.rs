//! Department directory and the LLM department matcher.
//!
//! The registry is loaded once at startup and shared read-only by every run.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::retrieval::{HttpRetriever, StaticRetriever};
use super::{DepartmentMatcher, Retriever};
use crate::config::EndpointConfig;
use crate::error::{CollaboratorError, ConfigError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, parse_json};
use crate::pipeline::types::DepartmentDecision;

/// Persona used when a department id has no registered persona.
pub const DEFAULT_PERSONA: &str = "You are a university administrative staff member.";

/// On-disk description of a department.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentSpec {
    pub id: String,
    /// Capability description used in routing prompts.
    pub description: String,
    /// Reply-style persona for drafting.
    pub persona: String,
    /// Search service endpoint. Without one, lookups report "not found".
    #[serde(default)]
    pub search_url: Option<String>,
}

/// A registered department.
pub struct Department {
    pub id: String,
    pub description: String,
    pub persona: String,
    pub retriever: Arc<dyn Retriever>,
}

impl Department {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        persona: impl Into<String>,
        retriever: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            persona: persona.into(),
            retriever,
        }
    }
}

/// Maps department ids to their description, persona and retriever.
#[derive(Default)]
pub struct DepartmentRegistry {
    departments: BTreeMap<String, Department>,
}

impl DepartmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, department: Department) -> Self {
        self.register(department);
        self
    }

    pub fn register(&mut self, department: Department) {
        self.departments.insert(department.id.clone(), department);
    }

    pub fn get(&self, id: &str) -> Option<&Department> {
        self.departments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.departments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }

    /// Persona for `id`, or the generic administrative persona.
    pub fn persona(&self, id: &str) -> &str {
        self.departments
            .get(id)
            .map(|d| d.persona.as_str())
            .unwrap_or(DEFAULT_PERSONA)
    }

    /// One `- ID: description` line per department, for prompts.
    pub fn descriptions(&self) -> String {
        self.departments
            .values()
            .map(|d| format!("- {}: {}", d.id, d.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build a registry from specs, wiring an `HttpRetriever` where a
    /// search URL is given.
    pub fn from_specs(specs: Vec<DepartmentSpec>, client: &reqwest::Client) -> Self {
        let mut registry = Self::new();
        for spec in specs {
            let retriever: Arc<dyn Retriever> = match spec.search_url {
                Some(url) if !url.trim().is_empty() => {
                    Arc::new(HttpRetriever::new(client.clone(), url, spec.id.clone()))
                }
                _ => {
                    warn!(dept = %spec.id, "No search URL configured; lookups will report not found");
                    Arc::new(StaticRetriever::not_found())
                }
            };
            registry.register(Department::new(
                spec.id,
                spec.description,
                spec.persona,
                retriever,
            ));
        }
        registry
    }

    /// Load from a JSON array of `DepartmentSpec`, or fall back to the
    /// built-in departments when no path is given.
    pub fn load(
        path: Option<&Path>,
        endpoints: &EndpointConfig,
        client: &reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let specs = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let specs: Vec<DepartmentSpec> =
                    serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                info!(path = %path.display(), count = specs.len(), "Loaded department registry");
                specs
            }
            None => builtin_specs(endpoints),
        };
        Ok(Self::from_specs(specs, client))
    }
}

/// Departments available without a registry file.
pub fn builtin_specs(endpoints: &EndpointConfig) -> Vec<DepartmentSpec> {
    vec![
        DepartmentSpec {
            id: "SOFTWARE_COLLEGE".into(),
            description: "Academic affairs for the College of Software Convergence \
                          (software, cybersecurity and related majors): courses, graduation, \
                          course registration, leave-of-absence approval."
                .into(),
            persona: "You are the Academic Affairs Team of the College of Software Convergence. \
                      You support students' academic success and explain the regulations \
                      clearly and kindly."
                .into(),
            search_url: endpoints.software_college_search_url.clone(),
        },
        DepartmentSpec {
            id: "SCHOLARSHIP_TEAM".into(),
            description: "National and university scholarships, tuition loans and other \
                          financial support."
                .into(),
            persona: "You are the Scholarship and Welfare Team. Money matters demand precise, \
                      conservative answers grounded in the rules, delivered with empathy for \
                      the student's situation."
                .into(),
            search_url: endpoints.scholarship_team_search_url.clone(),
        },
    ]
}

// ── Matcher ─────────────────────────────────────────────────────────

const MATCH_MAX_TOKENS: u32 = 256;
const MATCH_TEMPERATURE: f32 = 0.0;

/// Resolves department ids with an LLM, constrained to the registry.
pub struct LlmDepartmentMatcher {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<DepartmentRegistry>,
}

impl LlmDepartmentMatcher {
    pub fn new(llm: Arc<dyn LlmProvider>, registry: Arc<DepartmentRegistry>) -> Self {
        Self { llm, registry }
    }

    async fn ask(&self, system: String, user: String) -> Result<String, CollaboratorError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(MATCH_TEMPERATURE)
        .with_max_tokens(MATCH_MAX_TOKENS);
        Ok(self.llm.complete(request).await?.content)
    }
}

#[derive(Debug, Deserialize)]
struct SupportingResponse {
    #[serde(default)]
    dept_id: Option<String>,
}

#[async_trait]
impl DepartmentMatcher for LlmDepartmentMatcher {
    async fn primary_department(
        &self,
        body: &str,
    ) -> Result<DepartmentDecision, CollaboratorError> {
        let system = format!(
            "You route university administration emails.\n\
             Select ONE primary department id from the list below. \
             If the email is irrelevant to every department, set is_spam to true.\n\n\
             [Departments]\n{}\n\n\
             Respond with ONLY a JSON object: {{\"primary_dept_id\": \"...\", \"is_spam\": false}}",
            self.registry.descriptions()
        );
        let raw = self.ask(system, body.to_string()).await?;
        parse_json::<DepartmentDecision>(&raw).map_err(|e| CollaboratorError::Malformed {
            collaborator: "department matcher",
            reason: e.to_string(),
        })
    }

    async fn supporting_department(
        &self,
        query: &str,
        hint: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        let system = format!(
            "Find the department id able to answer the query, based on capabilities.\n\
             List:\n{}\n\n\
             Respond with ONLY a JSON object: {{\"dept_id\": \"...\"}}, \
             or {{\"dept_id\": null}} if no department fits.",
            self.registry.descriptions()
        );
        let raw = self.ask(system, format!("Query: {query}\nHint: {hint}")).await?;
        let parsed: SupportingResponse =
            parse_json(&raw).map_err(|e| CollaboratorError::Malformed {
                collaborator: "department matcher",
                reason: e.to_string(),
            })?;
        Ok(parsed
            .dept_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmProvider for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
            })
        }
    }

    fn registry() -> Arc<DepartmentRegistry> {
        Arc::new(DepartmentRegistry::from_specs(
            builtin_specs(&EndpointConfig::default()),
            &reqwest::Client::new(),
        ))
    }

    #[test]
    fn builtin_registry_has_descriptions_and_personas() {
        let registry = registry();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("SOFTWARE_COLLEGE"));
        let desc = registry.descriptions();
        assert!(desc.contains("- SCHOLARSHIP_TEAM:"));
        assert!(registry.persona("SCHOLARSHIP_TEAM").contains("Scholarship"));
    }

    #[test]
    fn unknown_department_gets_default_persona() {
        assert_eq!(registry().persona("OTHER"), DEFAULT_PERSONA);
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "LIBRARY", "description": "Loans and reading rooms", "persona": "You are the library desk."}}]"#
        )
        .unwrap();

        let registry = DepartmentRegistry::load(
            Some(file.path()),
            &EndpointConfig::default(),
            &reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.persona("LIBRARY"), "You are the library desk.");
    }

    #[test]
    fn load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = DepartmentRegistry::load(
            Some(file.path()),
            &EndpointConfig::default(),
            &reqwest::Client::new(),
        );
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[tokio::test]
    async fn matcher_parses_primary_decision() {
        let matcher = LlmDepartmentMatcher::new(
            Arc::new(FixedLlm(r#"{"primary_dept_id": "SOFTWARE_COLLEGE", "is_spam": false}"#)),
            registry(),
        );
        let decision = matcher.primary_department("leave of absence").await.unwrap();
        assert_eq!(decision.primary_dept_id, "SOFTWARE_COLLEGE");
        assert!(!decision.is_spam);
    }

    #[tokio::test]
    async fn matcher_null_supporting_department() {
        let matcher = LlmDepartmentMatcher::new(Arc::new(FixedLlm(r#"{"dept_id": null}"#)), registry());
        let dept = matcher
            .supporting_department("parking permits", "facilities")
            .await
            .unwrap();
        assert!(dept.is_none());
    }

    #[tokio::test]
    async fn matcher_rejects_garbage() {
        let matcher = LlmDepartmentMatcher::new(Arc::new(FixedLlm("no idea")), registry());
        assert!(matcher.primary_department("hi").await.is_err());
    }
}
