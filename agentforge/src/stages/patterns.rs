//! Deterministic design helpers for the architecture stage.
//!
//! These functions turn a requirements specification into a complexity
//! score, a ranked list of agent types, implementation guidance and a rough
//! token estimate. They never call the model and never fail: unknown or
//! malformed fields count as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Orchestration pattern of a generated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    /// Single agent talking to the model directly.
    LlmAgent,
    /// Sub-agents run one after another.
    SequentialAgent,
    /// Sub-agents run concurrently.
    ParallelAgent,
    /// Sub-agents repeat until a condition holds.
    LoopAgent,
    /// Hand-written orchestration on the base agent.
    CustomBaseAgent,
}

impl AgentType {
    /// Every agent type, simplest first.
    pub const ALL: [Self; 5] = [
        Self::LlmAgent,
        Self::SequentialAgent,
        Self::ParallelAgent,
        Self::LoopAgent,
        Self::CustomBaseAgent,
    ];

    /// Returns the type name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LlmAgent => "LlmAgent",
            Self::SequentialAgent => "SequentialAgent",
            Self::ParallelAgent => "ParallelAgent",
            Self::LoopAgent => "LoopAgent",
            Self::CustomBaseAgent => "CustomBaseAgent",
        }
    }

    /// Model calls per conversation turn, relative to a single agent.
    #[must_use]
    pub const fn call_multiplier(self) -> u64 {
        match self {
            Self::LlmAgent => 1,
            Self::SequentialAgent | Self::ParallelAgent => 3,
            Self::LoopAgent => 5,
            Self::CustomBaseAgent => 4,
        }
    }

    /// Returns the catalog entry for this type.
    #[must_use]
    pub fn pattern(self) -> &'static PatternInfo {
        let idx = Self::ALL.iter().position(|t| *t == self).unwrap_or(0);
        &AGENT_PATTERNS[idx]
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown agent type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent type '{0}'")]
pub struct UnknownAgentType(pub String);

impl FromStr for AgentType {
    type Err = UnknownAgentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownAgentType(s.to_string()))
    }
}

/// Coarse complexity of a requested agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// One agent, few tools.
    Simple,
    /// Some orchestration.
    Moderate,
    /// Iteration or custom orchestration.
    Complex,
}

/// Catalog entry describing one agent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternInfo {
    /// The type described.
    pub agent_type: AgentType,
    /// One-line description.
    pub description: &'static str,
    /// Situations the type suits.
    pub best_for: &'static [&'static str],
    /// Typical complexity.
    pub complexity: ComplexityLevel,
    /// Example applications.
    pub example_use_cases: &'static [&'static str],
}

/// Model guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelRecommendation {
    /// Model name.
    pub model: &'static str,
    /// What the model is good at.
    pub best_for: &'static str,
    /// When to pick it.
    pub use_when: &'static str,
}

/// Session storage option for a generated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionBackend {
    /// Backend name.
    pub name: &'static str,
    /// Description.
    pub description: &'static str,
    /// When to use it.
    pub best_for: &'static str,
    /// Setup the backend needs, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<&'static str>,
}

/// The full pattern catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdkPatterns {
    /// One entry per [`AgentType`], in [`AgentType::ALL`] order.
    pub agent_types: &'static [PatternInfo],
    /// Model guidance.
    pub model_recommendations: &'static [ModelRecommendation],
    /// Session storage options.
    pub session_management: &'static [SessionBackend],
}

/// Fast model for simple agents.
pub const FLASH_MODEL: &str = "gemini-2.5-flash";
/// Reasoning model, the default recommendation.
pub const PRO_MODEL: &str = "gemini-2.5-pro";

static AGENT_PATTERNS: [PatternInfo; 5] = [
    PatternInfo {
        agent_type: AgentType::LlmAgent,
        description: "Single-agent with direct LLM interaction",
        best_for: &[
            "Simple conversational agents",
            "Single-purpose tools",
            "Direct question answering",
            "When no orchestration needed",
        ],
        complexity: ComplexityLevel::Simple,
        example_use_cases: &[
            "Customer service chatbot",
            "Code explainer",
            "Translation service",
        ],
    },
    PatternInfo {
        agent_type: AgentType::SequentialAgent,
        description: "Orchestrates multiple sub-agents in sequence",
        best_for: &[
            "Multi-step workflows with dependencies",
            "Data processing pipelines",
            "Complex tasks requiring multiple stages",
            "When output of one step feeds the next",
        ],
        complexity: ComplexityLevel::Moderate,
        example_use_cases: &[
            "Research and report generation",
            "Multi-stage data analysis",
            "Code review then testing",
        ],
    },
    PatternInfo {
        agent_type: AgentType::ParallelAgent,
        description: "Executes multiple sub-agents concurrently",
        best_for: &[
            "Independent tasks that can run simultaneously",
            "Gathering diverse information",
            "Performance optimization",
            "When sub-tasks don't depend on each other",
        ],
        complexity: ComplexityLevel::Moderate,
        example_use_cases: &[
            "Multi-source research",
            "Parallel data validation",
            "Simultaneous code analysis",
        ],
    },
    PatternInfo {
        agent_type: AgentType::LoopAgent,
        description: "Iterates sub-agents until condition met",
        best_for: &[
            "Refinement workflows",
            "Optimization tasks",
            "Quality improvement loops",
            "When iterations needed to reach goal",
        ],
        complexity: ComplexityLevel::Complex,
        example_use_cases: &[
            "Iterative code improvement",
            "Progressive image enhancement",
            "Optimization algorithms",
        ],
    },
    PatternInfo {
        agent_type: AgentType::CustomBaseAgent,
        description: "Custom logic extending BaseAgent",
        best_for: &[
            "Unique orchestration patterns",
            "Complex decision trees",
            "Dynamic agent selection",
            "When built-in patterns don't fit",
        ],
        complexity: ComplexityLevel::Complex,
        example_use_cases: &[
            "Adaptive workflow routing",
            "Conditional agent execution",
            "Custom state management",
        ],
    },
];

static MODEL_RECOMMENDATIONS: [ModelRecommendation; 2] = [
    ModelRecommendation {
        model: FLASH_MODEL,
        best_for: "Simple tasks, high speed, cost optimization",
        use_when: "straightforward queries, basic conversions, simple tool use",
    },
    ModelRecommendation {
        model: PRO_MODEL,
        best_for: "Complex reasoning, multi-step planning, detailed analysis",
        use_when: "complex orchestration, deep analysis, sophisticated reasoning",
    },
];

static SESSION_BACKENDS: [SessionBackend; 2] = [
    SessionBackend {
        name: "in_memory",
        description: "Transient session state (default)",
        best_for: "Stateless agents, single conversations",
        requires: None,
    },
    SessionBackend {
        name: "firestore",
        description: "Persistent session state in Firestore",
        best_for: "Multi-turn conversations, state persistence",
        requires: Some("Firestore setup"),
    },
];

/// Returns the pattern catalog.
#[must_use]
pub fn adk_patterns() -> AdkPatterns {
    AdkPatterns {
        agent_types: &AGENT_PATTERNS,
        model_recommendations: &MODEL_RECOMMENDATIONS,
        session_management: &SESSION_BACKENDS,
    }
}

/// A built-in tool usable without extra configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoogleTool {
    /// Tool name as referenced in a tool specification.
    pub name: &'static str,
    /// What the tool does.
    pub description: &'static str,
    /// Typical uses.
    pub use_case: &'static str,
    /// Whether the tool needs project setup first.
    pub requires_setup: bool,
}

static GOOGLE_TOOLS: [GoogleTool; 3] = [
    GoogleTool {
        name: "google_search",
        description: "Search the web using Google Search",
        use_case: "Finding current information, research, fact-checking",
        requires_setup: false,
    },
    GoogleTool {
        name: "code_execution",
        description: "Execute Python code in a sandboxed environment",
        use_case: "Data analysis, calculations, code generation and testing",
        requires_setup: false,
    },
    GoogleTool {
        name: "vertex_ai_search",
        description: "Search enterprise data using Vertex AI Search",
        use_case: "Enterprise RAG, document search, knowledge retrieval",
        requires_setup: true,
    },
];

/// Lists the built-in Google tools.
#[must_use]
pub fn google_tools() -> &'static [GoogleTool] {
    &GOOGLE_TOOLS
}

/// Looks up a built-in tool by name.
#[must_use]
pub fn google_tool(name: &str) -> Option<&'static GoogleTool> {
    GOOGLE_TOOLS.iter().find(|t| t.name == name)
}

/// Result of [`analyze_complexity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    /// Score from 0 to 10.
    pub complexity_score: u8,
    /// Coarse level.
    pub complexity_level: ComplexityLevel,
    /// Candidate types, best first. Never empty.
    pub suggested_agent_types: Vec<AgentType>,
    /// Factors that raised the score.
    pub reasoning: Vec<String>,
    /// First entry of `suggested_agent_types`.
    pub primary_recommendation: AgentType,
}

struct Needs {
    sub_agents: bool,
    parallel: bool,
    iteration: bool,
    custom_logic: bool,
}

impl Needs {
    fn of(requirements: &Value) -> Self {
        let flag = |name: &str| requirements.get(name).and_then(Value::as_bool).unwrap_or(false);
        Self {
            sub_agents: flag("needs_sub_agents"),
            parallel: flag("needs_parallel_execution"),
            iteration: flag("needs_iteration"),
            custom_logic: flag("needs_custom_logic"),
        }
    }
}

fn tool_count(requirements: &Value) -> usize {
    ["suggested_mcps", "custom_tool_requirements"]
        .iter()
        .filter_map(|field| requirements.get(*field).and_then(Value::as_array))
        .map(Vec::len)
        .sum()
}

/// Scores a requirements specification and ranks agent types for it.
#[must_use]
pub fn analyze_complexity(requirements: &Value) -> ComplexityAnalysis {
    use AgentType::{CustomBaseAgent, LlmAgent, LoopAgent, ParallelAgent, SequentialAgent};

    let needs = Needs::of(requirements);
    let mut score: u8 = 0;
    let mut reasoning = Vec::new();

    let factors = [
        (needs.sub_agents, 3, "Multiple sub-agents required"),
        (needs.parallel, 2, "Parallel execution needed"),
        (needs.iteration, 3, "Iterative processing required"),
        (needs.custom_logic, 2, "Custom orchestration logic needed"),
    ];
    for (present, weight, reason) in factors {
        if present {
            score += weight;
            reasoning.push(reason.to_string());
        }
    }

    let tools = tool_count(requirements);
    if tools > 5 {
        score += 2;
        reasoning.push(format!("Many tools required ({tools})"));
    } else if tools > 0 {
        score += 1;
    }

    let (suggested, level) = if score <= 3 {
        (vec![LlmAgent], ComplexityLevel::Simple)
    } else if needs.parallel {
        (vec![ParallelAgent, SequentialAgent], ComplexityLevel::Moderate)
    } else if needs.iteration {
        (vec![LoopAgent], ComplexityLevel::Complex)
    } else if needs.custom_logic {
        (vec![CustomBaseAgent, SequentialAgent], ComplexityLevel::Complex)
    } else if needs.sub_agents {
        (vec![SequentialAgent, ParallelAgent], ComplexityLevel::Moderate)
    } else {
        (vec![LlmAgent, SequentialAgent], ComplexityLevel::Moderate)
    };

    ComplexityAnalysis {
        complexity_score: score.min(10),
        complexity_level: level,
        primary_recommendation: suggested[0],
        suggested_agent_types: suggested,
        reasoning,
    }
}

/// Implementation guidance for a chosen agent type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSuggestion {
    /// The chosen type.
    pub agent_type: AgentType,
    /// Catalog description.
    pub description: String,
    /// Things to get right.
    pub implementation_tips: Vec<String>,
    /// Things likely to go wrong.
    pub potential_challenges: Vec<String>,
    /// Suggested model.
    pub recommended_model: String,
}

/// Suggests how to implement `agent_type` for `requirements`.
///
/// Simple single-agent designs get the fast model; everything else gets
/// the reasoning model.
#[must_use]
pub fn suggest_pattern(agent_type: AgentType, requirements: &Value) -> PatternSuggestion {
    let (tips, challenges): (&[&str], &[&str]) = match agent_type {
        AgentType::LlmAgent => (
            &[
                "Keep prompt instructions clear and concise",
                "Use structured outputs for consistent responses",
                "Test tool integration thoroughly",
            ],
            &[
                "May need refinement if task is too complex",
                "Limited to single-turn reasoning",
            ],
        ),
        AgentType::SequentialAgent => (
            &[
                "Design clear output_key for each sub-agent",
                "Use session.state to pass data between agents",
                "Keep sub-agent responsibilities well-defined",
                "Consider error handling at each stage",
            ],
            &[
                "Debugging can be complex with multiple stages",
                "One failing stage blocks subsequent stages",
            ],
        ),
        AgentType::ParallelAgent => (
            &[
                "Ensure sub-agents are truly independent",
                "Design result aggregation strategy",
                "Handle partial failures gracefully",
            ],
            &[
                "Higher token cost (multiple parallel calls)",
                "Need to aggregate diverse outputs",
            ],
        ),
        AgentType::LoopAgent => (
            &[
                "Define clear termination conditions",
                "Set maximum iteration limit",
                "Track improvement metrics",
                "Log each iteration for debugging",
            ],
            &[
                "Risk of infinite loops",
                "Higher cost due to iterations",
                "Complex termination logic",
            ],
        ),
        AgentType::CustomBaseAgent => (
            &[
                "Extend BaseAgent class properly",
                "Implement run() method with your logic",
                "Handle state management carefully",
                "Document custom behavior thoroughly",
            ],
            &[
                "Most complex to implement",
                "Requires deep ADK understanding",
                "More maintenance burden",
            ],
        ),
    };

    let simple = requirements.get("complexity").and_then(Value::as_str) == Some("simple");
    let model = if agent_type == AgentType::LlmAgent && simple {
        FLASH_MODEL
    } else {
        PRO_MODEL
    };

    PatternSuggestion {
        agent_type,
        description: agent_type.pattern().description.to_string(),
        implementation_tips: tips.iter().map(ToString::to_string).collect(),
        potential_challenges: challenges.iter().map(ToString::to_string).collect(),
        recommended_model: model.to_string(),
    }
}

/// Bucketed cost of a design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostLevel {
    /// Under 5 000 tokens per turn.
    Low,
    /// Under 15 000 tokens per turn.
    Medium,
    /// Everything else.
    High,
}

/// Per-turn token estimate for a design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Prompt tokens.
    pub estimated_input_tokens: u64,
    /// Completion tokens.
    pub estimated_output_tokens: u64,
    /// Sum of the two.
    pub estimated_total_tokens: u64,
    /// Bucket of the total.
    pub cost_level: CostLevel,
    /// Caveat for display.
    pub note: String,
}

const TOKENS_PER_TOOL_CALL: u64 = 200;

/// Estimates tokens per conversation turn.
///
/// Unknown models are priced like [`PRO_MODEL`].
#[must_use]
pub fn estimate_cost(agent_type: AgentType, model: &str, requirements: &Value) -> CostEstimate {
    let (base_input, base_output) = if model == FLASH_MODEL {
        (1000, 500)
    } else {
        (2000, 1000)
    };
    let multiplier = agent_type.call_multiplier();
    let tool_overhead = tool_count(requirements) as u64 * TOKENS_PER_TOOL_CALL;

    let input = base_input * multiplier + tool_overhead;
    let output = base_output * multiplier;
    let total = input + output;
    let cost_level = match total {
        t if t < 5_000 => CostLevel::Low,
        t if t < 15_000 => CostLevel::Medium,
        _ => CostLevel::High,
    };

    CostEstimate {
        estimated_input_tokens: input,
        estimated_output_tokens: output,
        estimated_total_tokens: total,
        cost_level,
        note: "Estimates are per conversation turn and may vary significantly".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_simple_requirements_suggest_single_agent() {
        let analysis = analyze_complexity(&json!({
            "purpose": "Translate text",
            "suggested_mcps": ["filesystem"],
        }));

        assert_eq!(analysis.complexity_score, 1);
        assert_eq!(analysis.complexity_level, ComplexityLevel::Simple);
        assert_eq!(analysis.suggested_agent_types, vec![AgentType::LlmAgent]);
        assert!(analysis.reasoning.is_empty());
    }

    #[test]
    fn test_parallel_needs_rank_parallel_first() {
        let analysis = analyze_complexity(&json!({
            "needs_sub_agents": true,
            "needs_parallel_execution": true,
        }));

        assert_eq!(analysis.complexity_score, 5);
        assert_eq!(analysis.primary_recommendation, AgentType::ParallelAgent);
        assert_eq!(
            analysis.reasoning,
            vec!["Multiple sub-agents required", "Parallel execution needed"]
        );
    }

    #[test]
    fn test_iteration_outranks_custom_logic() {
        let analysis = analyze_complexity(&json!({
            "needs_iteration": true,
            "needs_custom_logic": true,
            "custom_tool_requirements": ["a", "b", "c", "d", "e", "f"],
        }));

        assert_eq!(analysis.complexity_score, 7);
        assert_eq!(analysis.complexity_level, ComplexityLevel::Complex);
        assert_eq!(analysis.suggested_agent_types, vec![AgentType::LoopAgent]);
        assert_eq!(analysis.reasoning.last().unwrap(), "Many tools required (6)");
    }

    #[test]
    fn test_score_is_capped_at_ten() {
        let analysis = analyze_complexity(&json!({
            "needs_sub_agents": true,
            "needs_parallel_execution": true,
            "needs_iteration": true,
            "needs_custom_logic": true,
            "suggested_mcps": ["a", "b", "c", "d", "e", "f"],
        }));
        assert_eq!(analysis.complexity_score, 10);
    }

    #[test]
    fn test_malformed_flags_count_as_absent() {
        let analysis = analyze_complexity(&json!({
            "needs_sub_agents": "yes",
            "suggested_mcps": "filesystem",
        }));
        assert_eq!(analysis.complexity_score, 0);
    }

    #[test]
    fn test_suggestion_picks_flash_for_simple_single_agent() {
        let simple = suggest_pattern(AgentType::LlmAgent, &json!({"complexity": "simple"}));
        assert_eq!(simple.recommended_model, FLASH_MODEL);
        assert_eq!(simple.description, "Single-agent with direct LLM interaction");

        let looped = suggest_pattern(AgentType::LoopAgent, &json!({"complexity": "simple"}));
        assert_eq!(looped.recommended_model, PRO_MODEL);
        assert!(looped.potential_challenges.contains(&"Risk of infinite loops".to_string()));
    }

    #[test]
    fn test_cost_estimate_levels() {
        let low = estimate_cost(AgentType::LlmAgent, FLASH_MODEL, &json!({}));
        assert_eq!(low.estimated_total_tokens, 1500);
        assert_eq!(low.cost_level, CostLevel::Low);

        let medium = estimate_cost(
            AgentType::SequentialAgent,
            PRO_MODEL,
            &json!({"suggested_mcps": ["a"], "custom_tool_requirements": ["b"]}),
        );
        assert_eq!(medium.estimated_input_tokens, 6400);
        assert_eq!(medium.estimated_output_tokens, 3000);
        assert_eq!(medium.cost_level, CostLevel::Medium);

        let high = estimate_cost(AgentType::LoopAgent, "unknown-model", &json!({}));
        assert_eq!(high.estimated_total_tokens, 15_000);
        assert_eq!(high.cost_level, CostLevel::High);
    }

    #[test]
    fn test_catalog_covers_every_type() {
        let patterns = adk_patterns();
        let types: Vec<AgentType> = patterns.agent_types.iter().map(|p| p.agent_type).collect();
        assert_eq!(types, AgentType::ALL.to_vec());
        for agent_type in AgentType::ALL {
            assert_eq!(agent_type.pattern().agent_type, agent_type);
            assert_eq!(agent_type.as_str().parse::<AgentType>(), Ok(agent_type));
        }
        assert!("SwarmAgent".parse::<AgentType>().is_err());
        assert_eq!(patterns.model_recommendations[0].model, FLASH_MODEL);
    }

    #[test]
    fn test_google_tool_lookup() {
        assert_eq!(google_tools().len(), 3);
        assert!(google_tool("vertex_ai_search").unwrap().requires_setup);
        assert!(!google_tool("google_search").unwrap().requires_setup);
        assert!(google_tool("web_browser").is_none());
    }
}
