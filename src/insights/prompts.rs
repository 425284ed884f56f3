//! Prompt construction for the three insight stages.

use super::client::ChatMessage;
use crate::analysis::CORRELATION_VIEW;
use crate::pipeline::AnalysisBundle;

/// Views sent with the initial insight request.
pub const ESSENTIAL_VIEWS: [&str; 3] = [
    "approval_rates_per_lender",
    CORRELATION_VIEW,
    "revenue_per_approved_app",
];

/// Views sent with the deep-dive request.
pub const OPTIONAL_VIEWS: [&str; 4] = [
    "approval_rates_by_fico",
    "approval_rates_by_dti",
    "high_value_segments",
    "revenue_by_income_to_loan_fico",
];

const ANALYST_SYSTEM_PROMPT: &str = "You are a data analyst specialized in business insights.";

const EXECUTIVE_SYSTEM_PROMPT: &str =
    "You are an expert data analyst summarizing findings for business leaders.";

/// Material shared by the first two stages.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub text_summary: String,
    /// JSON of the essential views that were produced.
    pub essential_views: String,
    /// JSON of the optional views that were produced.
    pub optional_views: String,
    /// Leading slice of the processed CSV.
    pub data_sample: String,
}

impl PromptContext {
    pub fn new(
        bundle: &AnalysisBundle,
        text_summary: String,
        processed_csv: &str,
        sample_chars: usize,
    ) -> Self {
        Self {
            text_summary,
            essential_views: views_json(bundle, &ESSENTIAL_VIEWS),
            optional_views: views_json(bundle, &OPTIONAL_VIEWS),
            data_sample: processed_csv.chars().take(sample_chars).collect(),
        }
    }
}

/// Serialize the named views that exist in the bundle; omitted ones are skipped.
fn views_json(bundle: &AnalysisBundle, names: &[&str]) -> String {
    let mut selected = serde_json::Map::new();
    for name in names {
        let value = if *name == CORRELATION_VIEW {
            bundle
                .correlation
                .as_ref()
                .and_then(|m| serde_json::to_value(m).ok())
        } else {
            bundle.view(name).and_then(|v| serde_json::to_value(v).ok())
        };
        if let Some(value) = value {
            selected.insert(name.to_string(), value);
        }
    }
    serde_json::Value::Object(selected).to_string()
}

pub fn initial_messages(context: &PromptContext) -> Vec<ChatMessage> {
    let prompt = format!(
        "You are assisting with business insights from a dataset on loan approvals, focusing on \
approval rates, revenue potential, and key factors influencing approval.

Here's the data and summary of initial analysis, including key aggregate views and statistical summaries:
- Text Summary: {}
- Essential Views: {}
- Processed Data Sample: {}

Please analyze this data and provide high-level insights. Specifically:
1. Summarize the most critical insights related to approval rates and revenue potential.
2. Identify any patterns valuable for business strategy, focusing on factors like FICO scores and debt-to-income ratios.
3. Offer any preliminary recommendations based on these observations.",
        context.text_summary, context.essential_views, context.data_sample
    );

    vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

pub fn deep_dive_messages(context: &PromptContext) -> Vec<ChatMessage> {
    let prompt = format!(
        "Based on the initial insights, we are now looking for a deeper analysis. Here is additional \
data, including segmentation by FICO score, debt-to-income ratios, and revenue potential across customer segments.

- Text Summary: {}
- Optional Views: {}
- Processed Data Sample: {}

Please conduct a more detailed analysis. Focus on:
1. Identifying customer segments that may benefit from specific lender matching for improved approval rates or higher revenue per application.
2. Exploring revenue optimization opportunities by matching lenders to high-potential customer groups.
3. Any nuanced insights related to debt-to-income ratios, FICO scores, and income-to-loan ratios that may affect approval likelihood and revenue.
4. Highlight any strategic recommendations based on this deeper analysis that would help refine the business strategy.",
        context.text_summary, context.optional_views, context.data_sample
    );

    vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

pub fn executive_messages(initial: &str, deep_dive: &str) -> Vec<ChatMessage> {
    let prompt = format!(
        "Using the previous insights and analyses, create a cohesive report that combines both \
high-level and detailed findings into a single, structured analysis.

- Initial Summary: {}
- Deeper Analysis: {}

Structure the report with:
1. An **Executive Summary**: Briefly summarize the key findings, insights, and business implications.
2. **Detailed Analysis**: Break down findings from both the initial and deeper analyses, organized by approval rates, revenue insights, and customer segmentation.
3. **Strategic Recommendations**: Provide actionable recommendations based on the findings, especially focusing on optimized lender matching, potential revenue gains, and strategic areas for improvement.

Ensure the language is accessible to business analysts and non-technical stakeholders, emphasizing the business value of each recommendation.",
        initial, deep_dive
    );

    vec![
        ChatMessage::system(EXECUTIVE_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}
