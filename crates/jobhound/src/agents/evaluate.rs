//! Stage 2: rate a vacancy against the candidate profile.

use serde::Deserialize;
use tracing::warn;

use crate::llm::{complete_json, ChatApi, LlmError};
use crate::sanitize::{sanitize_for_prompt, truncate_chars};

const MAX_PROFILE_CHARS: usize = 4000;
const MAX_DESCRIPTION_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You are a pragmatic career advisor. You judge how well a \
candidate fits a vacancy based only on the provided profile and posting. Respond ONLY \
with valid JSON matching the requested schema. Do not include any other text.";

/// Fit verdict for one vacancy.
#[derive(Debug, Clone, Deserialize)]
pub struct VacancyEvaluation {
    /// 0 (no fit) to 100 (ideal fit).
    pub rating: u8,
    /// Short explanation of the rating.
    pub summary: String,
}

/// Rates the vacancy. Ratings above the scale are clamped to 100 so one
/// over-enthusiastic reply does not fail the stage.
pub async fn evaluate_vacancy(
    api: &dyn ChatApi,
    profile: &str,
    title: &str,
    description: &str,
) -> Result<VacancyEvaluation, LlmError> {
    let user = build_prompt(profile, title, description);
    let mut evaluation: VacancyEvaluation = complete_json(api, SYSTEM_PROMPT, &user).await?;

    if evaluation.rating > 100 {
        warn!(rating = evaluation.rating, "Rating above scale, clamping to 100");
        evaluation.rating = 100;
    }

    Ok(evaluation)
}

fn build_prompt(profile: &str, title: &str, description: &str) -> String {
    let profile_s = sanitize_for_prompt(profile);
    let profile = truncate_chars(&profile_s, MAX_PROFILE_CHARS);
    let title = sanitize_for_prompt(title);
    let description_s = sanitize_for_prompt(description);
    let description = truncate_chars(&description_s, MAX_DESCRIPTION_CHARS);

    format!(
        r#"Rate how well the candidate fits this vacancy on a 0-100 scale. Consider required skills, seniority, domain, and location/visa constraints. Be honest: a mismatch in must-have skills caps the rating below 50.

Candidate profile:
{profile}

Vacancy: {title}
{description}

Return JSON:
{{
  "rating": 0-100,
  "summary": "two or three sentences explaining the rating"
}}"#
    )
}
