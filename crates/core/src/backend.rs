//! The remote response-generation service, behind a pluggable trait.
//!
//! The orchestrator never talks to a concrete transport; it is handed a
//! `PracticeBackend` at construction time so tests and development builds can
//! substitute an in-memory implementation without touching global state.

use crate::catalog::{self, CategorizedCatalog, DifficultyLevel, ScenarioRecord};
use crate::session::scenario_welcome;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a successful session start returns.
#[derive(Debug, Clone)]
pub struct SessionGreeting {
    pub session_id: String,
    /// Opening line from the simulated counterpart, when the service
    /// provides one.
    pub welcome: Option<String>,
}

/// One assistant utterance, optionally annotated with coaching feedback and
/// numeric metrics.
#[derive(Debug, Clone)]
pub struct CounterpartReply {
    pub message: String,
    pub feedback: Option<String>,
    pub metrics: Option<BTreeMap<String, f64>>,
}

/// Remote capability contract for the practice service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PracticeBackend: Send + Sync {
    /// Fetches the categorized scenario directory.
    async fn fetch_scenarios(&self) -> Result<CategorizedCatalog>;

    /// Opens a roleplay session for a scenario/difficulty pair.
    async fn start_session(
        &self,
        scenario_id: &str,
        difficulty: &DifficultyLevel,
    ) -> Result<SessionGreeting>;

    /// Sends one user utterance and returns the counterpart's reply.
    async fn send_message(&self, session_id: &str, text: &str) -> Result<CounterpartReply>;

    /// Ends a session. Best-effort; callers clean up locally regardless.
    async fn end_session(&self, session_id: &str) -> Result<()>;
}

// --- HTTP implementation ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRoleplayRequest<'a> {
    scenario_id: &'a str,
    difficulty: &'a str,
}

/// Start replies come in two shapes depending on the deployment: a flat
/// `{sessionId, initialResponse}` payload or a session record `{id, ...}`.
/// Aliases fold both into the canonical form here at the boundary.
#[derive(Deserialize)]
struct StartRoleplayResponse {
    #[serde(alias = "sessionId")]
    id: String,
    #[serde(default, alias = "initialResponse", alias = "welcomeText")]
    welcome: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    session_id: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(alias = "response")]
    message: String,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    metrics: Option<BTreeMap<String, f64>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndRoleplayRequest<'a> {
    session_id: &'a str,
}

/// `PracticeBackend` over the practice service's HTTP API.
pub struct HttpPracticeBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPracticeBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PracticeBackend for HttpPracticeBackend {
    async fn fetch_scenarios(&self) -> Result<CategorizedCatalog> {
        let raw: CategorizedCatalog = self
            .client
            .get(self.url("/api/scenarios"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed scenario catalog payload")?;
        Ok(catalog::normalize_catalog(raw))
    }

    async fn start_session(
        &self,
        scenario_id: &str,
        difficulty: &DifficultyLevel,
    ) -> Result<SessionGreeting> {
        let response: StartRoleplayResponse = self
            .client
            .post(self.url("/api/start-roleplay"))
            .json(&StartRoleplayRequest {
                scenario_id,
                difficulty: &difficulty.id,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed start-roleplay payload")?;

        Ok(SessionGreeting {
            session_id: response.id,
            welcome: response.welcome.filter(|w| !w.trim().is_empty()),
        })
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<CounterpartReply> {
        let response: ChatResponse = self
            .client
            .post(self.url("/api/chat"))
            .json(&ChatRequest {
                session_id,
                message: text,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Malformed chat payload")?;

        Ok(CounterpartReply {
            message: response.message,
            feedback: response.feedback,
            metrics: response.metrics,
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        self.client
            .post(self.url("/api/end-roleplay"))
            .json(&EndRoleplayRequest { session_id })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// --- In-memory implementation ---

const CANNED_REPLY: &str =
    "I understand your point. Let's discuss this further. What specific concerns do you have?";

fn reference_catalog() -> CategorizedCatalog {
    fn record(id: &str, title: &str, description: &str, category: &str) -> ScenarioRecord {
        ScenarioRecord {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        }
    }

    let mut catalog = CategorizedCatalog::new();
    catalog.insert(
        "Cold Calling".to_string(),
        vec![
            record(
                "cold-1",
                "First Time Contact",
                "Practice initial contact with potential sellers who have never been contacted before.",
                "Cold Calling",
            ),
            record(
                "cold-2",
                "Follow-up Call",
                "Practice following up with leads who showed initial interest.",
                "Cold Calling",
            ),
        ],
    );
    catalog.insert(
        "Objection Handling".to_string(),
        vec![
            record(
                "obj-1",
                "Price Objections",
                "Handle common price-related objections from potential sellers.",
                "Objection Handling",
            ),
            record(
                "obj-2",
                "Market Concerns",
                "Address concerns about current market conditions.",
                "Objection Handling",
            ),
        ],
    );
    catalog.insert(
        "Closing Techniques".to_string(),
        vec![
            record(
                "close-1",
                "Listing Agreement",
                "Practice closing techniques for securing listing agreements.",
                "Closing Techniques",
            ),
            record(
                "close-2",
                "Price Negotiation",
                "Handle final price negotiations with sellers.",
                "Closing Techniques",
            ),
        ],
    );
    catalog
}

/// A deterministic `PracticeBackend` for development and tests.
///
/// Serves the reference catalog and canned replies without any network
/// dependency, which keeps the interactive experience usable offline.
pub struct StubPracticeBackend {
    catalog: CategorizedCatalog,
    next_id: AtomicU64,
}

impl StubPracticeBackend {
    pub fn new() -> Self {
        Self {
            catalog: reference_catalog(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for StubPracticeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PracticeBackend for StubPracticeBackend {
    async fn fetch_scenarios(&self) -> Result<CategorizedCatalog> {
        Ok(self.catalog.clone())
    }

    async fn start_session(
        &self,
        scenario_id: &str,
        _difficulty: &DifficultyLevel,
    ) -> Result<SessionGreeting> {
        let Some(scenario) = catalog::find_scenario(&self.catalog, scenario_id) else {
            bail!("Unknown scenario '{}'", scenario_id);
        };
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(SessionGreeting {
            session_id: format!("stub-{}", n),
            welcome: Some(scenario_welcome(&scenario.title)),
        })
    }

    async fn send_message(&self, _session_id: &str, _text: &str) -> Result<CounterpartReply> {
        Ok(CounterpartReply {
            message: CANNED_REPLY.to_string(),
            feedback: None,
            metrics: None,
        })
    }

    async fn end_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}
