use super::report::StrategistDecision;
use askgate_core::{RiskProfile, RiskThresholds, ValidationSettings};

/// Everything the Strategist looks at.
#[derive(Debug, Clone, Copy)]
pub struct StrategistInput {
    pub gatekeeper_passed: bool,
    pub supported: usize,
    pub unsupported: usize,
    pub context_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ruling {
    pub decision: StrategistDecision,
    pub reason: String,
}

impl Ruling {
    fn new(decision: StrategistDecision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

/// Risk-conditioned release policy. Pure; thresholds come from settings.
#[derive(Debug, Clone)]
pub struct Strategist {
    settings: ValidationSettings,
}

impl Strategist {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    pub fn thresholds(&self, profile: RiskProfile) -> RiskThresholds {
        self.settings.thresholds(profile)
    }

    pub fn decide(&self, profile: RiskProfile, input: StrategistInput) -> Ruling {
        use StrategistDecision::*;
        let t = self.thresholds(profile);

        if !input.gatekeeper_passed {
            if t.refuse_on_gatekeeper_failure {
                return Ruling::new(Refuse, format!("gatekeeper failed under {profile} profile"));
            }
            if input.context_len == 0 {
                return Ruling::new(Refuse, "gatekeeper failed with no retrieved context");
            }
            if input.supported == 0 {
                return Ruling::new(Refuse, "gatekeeper failed and no claim is supported");
            }
            return Ruling::new(
                Rewrite,
                "gatekeeper failed; answer limited to supported claims",
            );
        }

        if input.unsupported == 0 {
            return Ruling::new(Approve, "all claims supported by the retrieved context");
        }
        if input.supported == 0 {
            return Ruling::new(Refuse, "no claim in the draft is supported");
        }
        if input.unsupported <= t.max_unsupported_claims {
            return Ruling::new(
                Approve,
                format!(
                    "{} unsupported claim(s) within {profile} tolerance of {}",
                    input.unsupported, t.max_unsupported_claims
                ),
            );
        }
        Ruling::new(
            Rewrite,
            format!(
                "{} unsupported claim(s) exceed {profile} tolerance of {}",
                input.unsupported, t.max_unsupported_claims
            ),
        )
    }
}
