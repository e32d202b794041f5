//! Provider Models
//!
//! Closed enumeration of the supported chat providers, each carrying its
//! own timeout table and diagnostic-pattern set. Completion detection is
//! polymorphic over these profiles instead of branching on strings.

use std::collections::HashMap;

use regex::RegexSet;
use serde::{Deserialize, Serialize};

use crate::utils::error::{EngineError, EngineResult};

/// Diagnostic patterns shared by every provider: network failures,
/// rate limits, capacity problems, outages, timeouts.
const COMMON_DIAGNOSTIC_PATTERNS: &[&str] = &[
    r"(?i)network\s+(error|failure)",
    r"(?i)connection\s+(lost|refused|reset)",
    r"(?i)rate\s*limit",
    r"(?i)too\s+many\s+requests",
    r"(?i)\b429\b",
    r"(?i)at\s+capacity",
    r"(?i)service\s+unavailable",
    r"(?i)temporarily\s+unavailable",
    r"(?i)timed?\s*out",
    r"(?i)something\s+went\s+wrong",
    r"(?i)internal\s+server\s+error",
];

/// A chat provider the engine can dispatch jobs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    ChatGpt,
    Claude,
    Gemini,
    Grok,
    Perplexity,
}

impl ProviderKind {
    /// All providers, in default fan-out order
    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::ChatGpt,
            ProviderKind::Claude,
            ProviderKind::Gemini,
            ProviderKind::Grok,
            ProviderKind::Perplexity,
        ]
    }

    /// Display name used as the log-block header identity
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::ChatGpt => "ChatGPT",
            ProviderKind::Claude => "Claude",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Grok => "Grok",
            ProviderKind::Perplexity => "Perplexity",
        }
    }

    /// Parse from a configuration string value
    pub fn parse(s: &str) -> EngineResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chatgpt" | "openai" => Ok(ProviderKind::ChatGpt),
            "claude" => Ok(ProviderKind::Claude),
            "gemini" => Ok(ProviderKind::Gemini),
            "grok" => Ok(ProviderKind::Grok),
            "perplexity" => Ok(ProviderKind::Perplexity),
            other => Err(EngineError::configuration(format!(
                "unknown provider: {}",
                other
            ))),
        }
    }

    /// Default timeout table for this provider
    pub fn default_timeouts(&self) -> ProviderTimeouts {
        match self {
            // Deep-research style runs on ChatGPT and Gemini routinely take
            // well over an hour.
            ProviderKind::ChatGpt => ProviderTimeouts::new(600, 7200),
            ProviderKind::Claude => ProviderTimeouts::new(600, 3600),
            ProviderKind::Gemini => ProviderTimeouts::new(600, 7200),
            ProviderKind::Grok => ProviderTimeouts::new(480, 3600),
            ProviderKind::Perplexity => ProviderTimeouts::new(480, 3600),
        }
    }

    /// Provider-specific diagnostic patterns, matched in addition to the
    /// common set
    fn diagnostic_patterns(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::ChatGpt => &[
                r"(?i)you've\s+reached\s+(your|the)\s+.*limit",
                r"(?i)conversation\s+not\s+found",
            ],
            ProviderKind::Claude => &[
                r"(?i)message\s+limit",
                r"(?i)unable\s+to\s+respond",
                r"(?i)overloaded",
            ],
            ProviderKind::Gemini => &[
                r"(?i)can't\s+help\s+with\s+that\s+right\s+now",
                r"(?i)quota\s+exceeded",
            ],
            ProviderKind::Grok => &[r"(?i)grok\s+is\s+unavailable"],
            ProviderKind::Perplexity => &[r"(?i)search\s+failed"],
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::ChatGpt => write!(f, "chatgpt"),
            ProviderKind::Claude => write!(f, "claude"),
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Grok => write!(f, "grok"),
            ProviderKind::Perplexity => write!(f, "perplexity"),
        }
    }
}

/// Per-provider response-wait budget in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTimeouts {
    /// Base wait for an ordinary prompt
    pub response_wait_secs: u64,
    /// Wait for deep-research / agent-mode runs
    pub deep_wait_secs: u64,
}

impl ProviderTimeouts {
    /// Create a timeout table
    pub fn new(response_wait_secs: u64, deep_wait_secs: u64) -> Self {
        Self {
            response_wait_secs,
            deep_wait_secs,
        }
    }

    /// Pick the budget for a task given its optional model selector.
    ///
    /// Deep-research and agent-mode selectors get the extended budget;
    /// everything else gets the base wait.
    pub fn wait_for_model(&self, model: Option<&str>) -> std::time::Duration {
        let deep = model
            .map(|m| {
                let lower = m.to_ascii_lowercase();
                lower.contains("deep") || lower.contains("agent") || lower.contains("research")
            })
            .unwrap_or(false);

        let secs = if deep {
            self.deep_wait_secs
        } else {
            self.response_wait_secs
        };
        std::time::Duration::from_secs(secs)
    }
}

/// Compiled detection profile for one provider
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Which provider this profile covers
    pub kind: ProviderKind,
    /// Response-wait budget
    pub timeouts: ProviderTimeouts,
    /// Compiled diagnostic pattern set (common + provider-specific)
    pub diagnostics: RegexSet,
}

impl ProviderProfile {
    /// Build a profile from the provider defaults plus an optional
    /// timeout override
    pub fn build(kind: ProviderKind, timeouts: Option<ProviderTimeouts>) -> EngineResult<Self> {
        let mut patterns: Vec<&str> = COMMON_DIAGNOSTIC_PATTERNS.to_vec();
        patterns.extend_from_slice(kind.diagnostic_patterns());

        let diagnostics = RegexSet::new(&patterns).map_err(|e| {
            EngineError::configuration(format!("invalid diagnostic pattern for {}: {}", kind, e))
        })?;

        Ok(Self {
            kind,
            timeouts: timeouts.unwrap_or_else(|| kind.default_timeouts()),
            diagnostics,
        })
    }

    /// Check a diagnostic text against the pattern set
    pub fn matches_diagnostic(&self, text: &str) -> bool {
        self.diagnostics.is_match(text)
    }
}

/// Registry resolving a provider kind to its compiled profile.
///
/// Built once from configuration and passed by reference into the
/// components that need it; there is no process-global registry.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    profiles: HashMap<ProviderKind, ProviderProfile>,
}

impl ProviderRegistry {
    /// Build profiles for every provider, applying timeout overrides
    pub fn new(overrides: &HashMap<ProviderKind, ProviderTimeouts>) -> EngineResult<Self> {
        let mut profiles = HashMap::new();
        for kind in ProviderKind::all() {
            let profile = ProviderProfile::build(*kind, overrides.get(kind).copied())?;
            profiles.insert(*kind, profile);
        }
        Ok(Self { profiles })
    }

    /// Build with provider-default timeouts only
    pub fn with_defaults() -> EngineResult<Self> {
        Self::new(&HashMap::new())
    }

    /// Look up the profile for a provider
    pub fn profile(&self, kind: ProviderKind) -> &ProviderProfile {
        // new() populates every variant of the closed enum
        &self.profiles[&kind]
    }
}
