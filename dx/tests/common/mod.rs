//! Scripted in-memory gate shared by the round tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use discovery::config::DiscoveryConfig;
use discovery::gate::{AnalysisGate, GateChunk, GateError, GateRequest};
use discovery::{DiscoveryEngine, MemoryProfileStore, ProfileStore, PromptLoader};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// Which call a request is, judged by the output shape it asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Plan,
    Analysis(String),
    Merge,
}

fn classify(request: &GateRequest) -> Call {
    let props = &request.output_shape["properties"];
    if props.get("jobs").is_some() {
        return Call::Plan;
    }
    if props.get("directionSummary").is_some() {
        return Call::Merge;
    }
    // Analysis prompts open with: You are the "<title>" specialist
    let title = request
        .prompt
        .split('"')
        .nth(1)
        .unwrap_or_default()
        .to_string();
    Call::Analysis(title)
}

pub struct ScriptedGate {
    plan: Result<Value, String>,
    merge: Value,
    failing: HashSet<String>,
    calls: Mutex<Vec<Call>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGate {
    pub fn new(plan: Result<Value, String>, merge: Value) -> Self {
        Self {
            plan,
            merge,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Analysis jobs with this title fail on every attempt
    pub fn failing(mut self, titles: &[&str]) -> Self {
        self.failing.extend(titles.iter().map(|t| t.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn analysis_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Analysis(_))).count()
    }

    pub fn last_merge_prompt(&self) -> Option<String> {
        let calls = self.calls();
        let prompts = self.prompts.lock().unwrap();
        calls
            .iter()
            .zip(prompts.iter())
            .rev()
            .find(|(c, _)| **c == Call::Merge)
            .map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl AnalysisGate for ScriptedGate {
    async fn submit(&self, request: GateRequest, chunk_tx: mpsc::Sender<GateChunk>) -> Result<Value, GateError> {
        let call = classify(&request);
        self.calls.lock().unwrap().push(call.clone());
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let _ = chunk_tx.send(GateChunk::PartialText("thinking\n".to_string())).await;

        match call {
            Call::Plan => self.plan.clone().map_err(GateError::InvalidOutput),
            Call::Merge => Ok(self.merge.clone()),
            Call::Analysis(title) if self.failing.contains(&title) => {
                Err(GateError::InvalidOutput(format!("{} refused", title)))
            }
            Call::Analysis(title) => Ok(json!({
                "summary": format!("{} summary", title),
                "findings": [format!("{} finding", title)],
                "stackHints": ["rust", "postgres"],
                "signals": ["greenfield"],
                "confidence": 0.8
            })),
        }
    }
}

/// A planning reply with one job per title
pub fn plan_of(titles: &[&str]) -> Value {
    let jobs: Vec<Value> = titles
        .iter()
        .map(|t| json!({"id": t.to_lowercase().replace(' ', "-"), "title": t, "objective": format!("Look into {}", t)}))
        .collect();
    json!({ "jobs": jobs })
}

pub fn question(id: &str) -> Value {
    json!({
        "id": id,
        "prompt": format!("Question {}?", id),
        "rationale": "because",
        "selection": "single",
        "options": ["one", "two", "three", "four"],
        "recommendedOption": "two"
    })
}

/// A merge reply with the given question ids
pub fn merge_with(question_ids: &[&str], readiness: u8) -> Value {
    let questions: Vec<Value> = question_ids.iter().map(|id| question(id)).collect();
    json!({
        "directionSummary": "A scheduling tool for dental clinics",
        "inferredContext": {
            "stack": ["merged-stack"],
            "scope": ["appointments"],
            "painPoints": ["double booking"]
        },
        "questions": questions,
        "draftSpecification": "# Draft\n\nBook appointments.",
        "readinessScore": readiness,
        "missingCriticalInfo": []
    })
}

pub fn settings() -> DiscoveryConfig {
    DiscoveryConfig {
        job_timeout_secs: 5,
        retry_delay_ms: 1,
        ..Default::default()
    }
}

pub fn engine(gate: Arc<ScriptedGate>, profiles: Arc<dyn ProfileStore>) -> DiscoveryEngine {
    DiscoveryEngine::new(gate, profiles, PromptLoader::embedded_only(), settings()).unwrap()
}

/// A profile store that already holds a profile for `project`
pub fn warm_profiles(project: &str) -> Arc<MemoryProfileStore> {
    let store = Arc::new(MemoryProfileStore::new());
    let report = discovery::AnalysisReport::from_value(json!({
        "summary": "Rails monolith",
        "stackHints": ["ruby", "rails"],
        "signals": ["legacy"],
        "confidence": 70
    }))
    .unwrap();
    store.write(project, &discovery::ProfileArtifact::from_report(&report));
    store
}
