use askgate_core::{ChunkId, RiskProfile};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategistDecision {
    Approve,
    Rewrite,
    Refuse,
}

impl fmt::Display for StrategistDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategistDecision::Approve => write!(f, "approve"),
            StrategistDecision::Rewrite => write!(f, "rewrite"),
            StrategistDecision::Refuse => write!(f, "refuse"),
        }
    }
}

/// States the validation pipeline passes through, recorded in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    Drafted,
    GatekeptOk,
    GatekeptFail,
    Regenerated,
    Audited,
    Strategized,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPath {
    Semantic,
    Lexical,
}

/// One retrieval path was lost and the request continued on the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRetrieval {
    pub missing: RetrievalPath,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperReport {
    pub passed: bool,
    pub reason: String,
    /// Gatekeeper judgments made, 2 when a regeneration happened.
    pub attempts: u32,
    pub regenerated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub text: String,
    pub supported: bool,
    /// Context chunks the claim is grounded in; empty when unsupported.
    pub evidence: Vec<ChunkId>,
}

/// Outcome of validation, attached to every answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub risk_profile: RiskProfile,
    /// Absent when there was no draft to judge.
    pub gatekeeper: Option<GatekeeperReport>,
    pub claims: Vec<ClaimReport>,
    pub unsupported_count: usize,
    pub decision: StrategistDecision,
    pub decision_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_retrieval: Option<PartialRetrieval>,
    pub insufficient_context: bool,
    pub stages: Vec<ValidationStage>,
}

impl ValidationReport {
    /// Report for a request whose fused context came back empty.
    pub fn insufficient_context(
        risk_profile: RiskProfile,
        partial_retrieval: Option<PartialRetrieval>,
    ) -> Self {
        Self {
            risk_profile,
            gatekeeper: None,
            claims: Vec::new(),
            unsupported_count: 0,
            decision: StrategistDecision::Refuse,
            decision_reason: "no context retrieved for the question".to_string(),
            partial_retrieval,
            insufficient_context: true,
            stages: vec![ValidationStage::Final],
        }
    }

    pub fn supported_claims(&self) -> impl Iterator<Item = &ClaimReport> {
        self.claims.iter().filter(|c| c.supported)
    }

    pub fn unsupported_claims(&self) -> impl Iterator<Item = &ClaimReport> {
        self.claims.iter().filter(|c| !c.supported)
    }
}
