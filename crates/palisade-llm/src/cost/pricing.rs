//! Model pricing
//!
//! Pricing entries are matched by case-insensitive prefix against the
//! model name reported by the caller, in table order. Order is
//! significant: more specific prefixes must precede the families they
//! belong to (`gpt-4o-mini` before `gpt-4o` before `gpt-4`), and the
//! first match wins. Models that match nothing fall back to the default
//! tier.

use serde::{Deserialize, Serialize};

/// Default cost per 1K prompt tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_1K: f64 = 0.0025;

/// Default cost per 1K completion tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_1K: f64 = 0.01;

/// Pricing for one model family (per 1K tokens, USD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Prefix matched against the caller-supplied model name
    pub model_prefix: String,
    /// Provider name
    pub provider: String,
    /// Cost per 1K prompt tokens (USD)
    pub input_cost_per_1k: f64,
    /// Cost per 1K completion tokens (USD)
    pub output_cost_per_1k: f64,
}

impl ModelPricing {
    fn new(model_prefix: &str, provider: &str, input: f64, output: f64) -> Self {
        Self {
            model_prefix: model_prefix.to_string(),
            provider: provider.to_string(),
            input_cost_per_1k: input,
            output_cost_per_1k: output,
        }
    }

    /// Cost in USD for the given token counts at this entry's rates.
    #[must_use]
    pub fn calculate_cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let input_cost = (prompt_tokens as f64 / 1000.0) * self.input_cost_per_1k;
        let output_cost = (completion_tokens as f64 / 1000.0) * self.output_cost_per_1k;
        input_cost + output_cost
    }
}

/// Default pricing table for common models.
///
/// Specific variants precede their families; the closing entries are the
/// broad fallbacks per provider.
#[must_use]
pub fn default_pricing() -> Vec<ModelPricing> {
    vec![
        // OpenAI
        ModelPricing::new("gpt-4o-mini", "openai", 0.00015, 0.0006),
        ModelPricing::new("gpt-4o", "openai", 0.0025, 0.01),
        ModelPricing::new("gpt-4-turbo", "openai", 0.01, 0.03),
        ModelPricing::new("gpt-4", "openai", 0.03, 0.06),
        ModelPricing::new("gpt-3.5-turbo", "openai", 0.0005, 0.0015),
        ModelPricing::new("o1-mini", "openai", 0.003, 0.012),
        ModelPricing::new("o1", "openai", 0.015, 0.06),
        // Anthropic
        ModelPricing::new("claude-3-5-haiku", "anthropic", 0.0008, 0.004),
        ModelPricing::new("claude-3-5-sonnet", "anthropic", 0.003, 0.015),
        ModelPricing::new("claude-3-opus", "anthropic", 0.015, 0.075),
        ModelPricing::new("claude-3-haiku", "anthropic", 0.00025, 0.00125),
        ModelPricing::new("claude-3-sonnet", "anthropic", 0.003, 0.015),
        ModelPricing::new("claude", "anthropic", 0.003, 0.015),
        // Google
        ModelPricing::new("gemini-1.5-flash", "google", 0.000075, 0.0003),
        ModelPricing::new("gemini-1.5-pro", "google", 0.00125, 0.005),
        ModelPricing::new("gemini", "google", 0.00125, 0.005),
        // DeepSeek
        ModelPricing::new("deepseek-reasoner", "deepseek", 0.00055, 0.00219),
        ModelPricing::new("deepseek", "deepseek", 0.00014, 0.00028),
    ]
}

/// Ordered pricing table with first-match-wins prefix lookup.
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: Vec<ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new(default_pricing())
    }
}

impl PricingTable {
    /// Create a table from an ordered list of entries.
    #[must_use]
    pub fn new(entries: Vec<ModelPricing>) -> Self {
        Self { entries }
    }

    /// First entry whose prefix matches the model name, case-insensitively.
    #[must_use]
    pub fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        let lower = model.to_lowercase();
        self.entries
            .iter()
            .find(|e| lower.starts_with(&e.model_prefix.to_lowercase()))
    }

    /// Cost in USD for a call against `model`.
    ///
    /// Unknown models are billed at the default tier rather than rejected,
    /// so accounting never fails a call that already succeeded.
    #[must_use]
    pub fn cost(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        match self.lookup(model) {
            Some(pricing) => pricing.calculate_cost(prompt_tokens, completion_tokens),
            None => {
                (prompt_tokens as f64 / 1000.0) * DEFAULT_INPUT_COST_PER_1K
                    + (completion_tokens as f64 / 1000.0) * DEFAULT_OUTPUT_COST_PER_1K
            }
        }
    }
}
