//! Stage 3: tailored resume content and the outreach email.
//!
//! Both calls only happen for vacancies above the rating gate. The
//! list-valued resume sections are serialized to JSON for the TEXT
//! columns, so the structs derive `Serialize` too.

use serde::{Deserialize, Serialize};

use crate::llm::{complete_json, ChatApi, LlmError};
use crate::sanitize::{sanitize_for_prompt, truncate_chars};

const MAX_PROFILE_CHARS: usize = 6000;
const MAX_DESCRIPTION_CHARS: usize = 6000;

const RESUME_SYSTEM_PROMPT: &str = "You are a resume writer. You rework a candidate \
profile into resume sections tailored to one vacancy, using only facts present in the \
profile. Never invent employers, dates, or credentials. Respond ONLY with valid JSON \
matching the requested schema. Do not include any other text.";

const EMAIL_SYSTEM_PROMPT: &str = "You write short, direct job-application emails on \
behalf of a candidate. No flattery, no buzzwords, no invented facts. Respond ONLY with \
valid JSON matching the requested schema. Do not include any other text.";

/// Resume sections produced by the generation stage. Contact fields come
/// from the candidate config, not from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeContent {
    pub summary: String,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub certifications: Vec<CertificationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    /// Bullet points.
    #[serde(default)]
    pub description: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub course: String,
    pub institution: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGroup {
    pub title: String,
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificationEntry {
    pub title: String,
}

/// Outreach email draft.
#[derive(Debug, Clone, Deserialize)]
pub struct OutreachEmail {
    pub subject: String,
    pub body: String,
}

/// Tailors the candidate profile into resume sections for one vacancy.
pub async fn generate_resume(
    api: &dyn ChatApi,
    profile: &str,
    title: &str,
    description: &str,
) -> Result<ResumeContent, LlmError> {
    let user = build_resume_prompt(profile, title, description);
    complete_json(api, RESUME_SYSTEM_PROMPT, &user).await
}

/// Drafts the outreach email. The configured signature is appended when
/// the model did not already include it.
pub async fn generate_email(
    api: &dyn ChatApi,
    profile: &str,
    title: &str,
    company: Option<&str>,
    description: &str,
    signature: &str,
) -> Result<OutreachEmail, LlmError> {
    let user = build_email_prompt(profile, title, company, description, signature);
    let mut email: OutreachEmail = complete_json(api, EMAIL_SYSTEM_PROMPT, &user).await?;

    let signature = signature.trim();
    if !signature.is_empty() && !email.body.contains(signature) {
        email.body = format!("{}\n\n{}", email.body.trim_end(), signature);
    }

    Ok(email)
}

fn build_resume_prompt(profile: &str, title: &str, description: &str) -> String {
    let profile_s = sanitize_for_prompt(profile);
    let profile = truncate_chars(&profile_s, MAX_PROFILE_CHARS);
    let title = sanitize_for_prompt(title);
    let description_s = sanitize_for_prompt(description);
    let description = truncate_chars(&description_s, MAX_DESCRIPTION_CHARS);

    format!(
        r#"Write resume sections tailored to this vacancy. Reorder and rephrase the candidate's experience to front-load what the vacancy asks for. Use only facts from the profile.

Candidate profile:
{profile}

Vacancy: {title}
{description}

Return JSON:
{{
  "summary": "3-4 sentence professional summary aimed at this vacancy",
  "experience": [
    {{"title": "...", "company": "...", "location": "...", "startDate": "...", "endDate": "...", "description": ["achievement bullet", "..."]}}
  ],
  "education": [
    {{"course": "...", "institution": "...", "location": "...", "startDate": "...", "endDate": "..."}}
  ],
  "skills": [
    {{"title": "group name", "elements": ["skill", "..."]}}
  ],
  "projects": [
    {{"title": "...", "description": "..."}}
  ],
  "certifications": [
    {{"title": "..."}}
  ]
}}

"projects" and "certifications" may be empty arrays when the profile lists none."#
    )
}

fn build_email_prompt(
    profile: &str,
    title: &str,
    company: Option<&str>,
    description: &str,
    signature: &str,
) -> String {
    let profile_s = sanitize_for_prompt(profile);
    let profile = truncate_chars(&profile_s, MAX_PROFILE_CHARS);
    let title = sanitize_for_prompt(title);
    let company = company.map(sanitize_for_prompt).unwrap_or_default();
    let description_s = sanitize_for_prompt(description);
    let description = truncate_chars(&description_s, MAX_DESCRIPTION_CHARS);
    let signature = sanitize_for_prompt(signature);

    format!(
        r#"Write a short application email for this vacancy: 3-5 sentences naming the role, the two or three strongest matching points from the candidate profile, and that a tailored resume is attached. End the body with the signature exactly as given.

Candidate profile:
{profile}

Vacancy: {title}
Company: {company}
{description}

Signature:
{signature}

Return JSON:
{{
  "subject": "application subject line naming the role",
  "body": "the email body, plain text"
}}"#
    )
}
