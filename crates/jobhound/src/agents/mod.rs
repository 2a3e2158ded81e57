//! The three LLM stages.
//!
//! Each stage is a typed prompt + response schema over the shared
//! [`crate::llm::ChatApi`] seam: triage classifies posts, evaluation rates
//! a vacancy against the candidate profile, generation tailors the resume
//! and the outreach email. Ordering, rate limiting, and retries belong to
//! the pipeline, not to the stages.

pub mod evaluate;
pub mod generate;
pub mod triage;

pub use evaluate::{evaluate_vacancy, VacancyEvaluation};
pub use generate::{
    generate_email, generate_resume, CertificationEntry, EducationEntry, ExperienceEntry,
    OutreachEmail, ProjectEntry, ResumeContent, SkillGroup,
};
pub use triage::{triage_post, TriageVerdict, VacancyDraft};
