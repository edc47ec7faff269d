//! Specialised assistant variants.
//!
//! Each variant carries model preferences used when choosing between a fast
//! model and a reasoning-capable one. Prompt text lives with the deployment,
//! not here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "analyze",
    "compare",
    "investigate",
    "study",
    "examine",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    ResearchSpecialist,
    DevOpsSpecialist,
    ScoutCommander,
    ModelCoordinator,
    ToolCurator,
    IntegrationArchitect,
    LiveApiSpecialist,
}

/// How a variant wants its model configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPreferences {
    pub prefers_pro_model: bool,
    pub temperature: f64,
    pub requires_reasoning: bool,
}

impl Variant {
    pub const ALL: [Variant; 7] = [
        Variant::ResearchSpecialist,
        Variant::DevOpsSpecialist,
        Variant::ScoutCommander,
        Variant::ModelCoordinator,
        Variant::ToolCurator,
        Variant::IntegrationArchitect,
        Variant::LiveApiSpecialist,
    ];

    pub fn model_preferences(self) -> ModelPreferences {
        let (prefers_pro_model, temperature, requires_reasoning) = match self {
            Variant::ResearchSpecialist => (true, 0.3, true),
            Variant::DevOpsSpecialist => (false, 0.2, false),
            Variant::ScoutCommander => (true, 0.5, true),
            Variant::ModelCoordinator => (true, 0.4, true),
            Variant::ToolCurator => (false, 0.6, false),
            Variant::IntegrationArchitect => (true, 0.3, true),
            Variant::LiveApiSpecialist => (false, 0.5, false),
        };
        ModelPreferences {
            prefers_pro_model,
            temperature,
            requires_reasoning,
        }
    }

    /// Whether `message` should be routed to a reasoning-capable model.
    pub fn should_use_reasoning_model(self, message: &str) -> bool {
        match self {
            Variant::ResearchSpecialist => {
                let lowered = message.to_lowercase();
                RESEARCH_KEYWORDS.iter().any(|k| lowered.contains(k))
            }
            Variant::ScoutCommander => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::ResearchSpecialist => "research_specialist",
            Variant::DevOpsSpecialist => "dev_ops_specialist",
            Variant::ScoutCommander => "scout_commander",
            Variant::ModelCoordinator => "model_coordinator",
            Variant::ToolCurator => "tool_curator",
            Variant::IntegrationArchitect => "integration_architect",
            Variant::LiveApiSpecialist => "live_api_specialist",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Variant::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn research_keywords_trigger_reasoning() {
        let v = Variant::ResearchSpecialist;
        assert!(v.should_use_reasoning_model("Please ANALYZE these logs"));
        assert!(v.should_use_reasoning_model("can you study this paper"));
        assert!(!v.should_use_reasoning_model("hello there"));
    }

    #[test]
    fn scout_always_reasons_and_devops_never_does() {
        assert!(Variant::ScoutCommander.should_use_reasoning_model(""));
        assert!(!Variant::DevOpsSpecialist.should_use_reasoning_model("research"));
    }

    #[test]
    fn preferences_match_variant_profile() {
        let p = Variant::ToolCurator.model_preferences();
        assert!(!p.prefers_pro_model);
        assert_eq!(p.temperature, 0.6);
        assert!(!p.requires_reasoning);

        let p = Variant::IntegrationArchitect.model_preferences();
        assert!(p.prefers_pro_model && p.requires_reasoning);
        assert_eq!(p.temperature, 0.3);
    }

    #[test]
    fn parse_roundtrip_and_serde_names_agree() {
        for v in Variant::ALL {
            assert_eq!(v.as_str().parse::<Variant>().unwrap(), v);
            let json = serde_json::to_string(&v).unwrap();
            assert_eq!(json, format!("\"{}\"", v.as_str()));
        }
        assert!("wizard".parse::<Variant>().is_err());
    }
}
