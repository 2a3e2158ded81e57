//! Rendered resume artifacts on disk.
//!
//! Each generated resume is rendered to Markdown and written under the
//! configured artifacts directory; the row in `resumes` keeps the path.

use std::path::{Path, PathBuf};

use crate::agents::ResumeContent;
use crate::config::CandidateConfig;
use crate::error::ArtifactError;

/// Writes resume Markdown files into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the rendered resume and returns its path. The directory is
    /// created on first use.
    pub fn store_resume(&self, resume_id: &str, markdown: &str) -> Result<PathBuf, ArtifactError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::CreateDirectory {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(format!("resume_{resume_id}.md"));
        std::fs::write(&path, markdown).map_err(|source| ArtifactError::WriteFile {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

/// Renders resume sections to Markdown. Contact details come from the
/// candidate config; empty optional sections are omitted entirely.
pub fn render_markdown(candidate: &CandidateConfig, content: &ResumeContent) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", candidate.full_name));

    let mut contact: Vec<&str> = vec![&candidate.email];
    if !candidate.phone.is_empty() {
        contact.push(&candidate.phone);
    }
    if !candidate.address.is_empty() {
        contact.push(&candidate.address);
    }
    out.push_str(&contact.join(" | "));
    out.push_str("\n\n");

    out.push_str("## Summary\n\n");
    out.push_str(content.summary.trim());
    out.push_str("\n\n");

    if !content.experience.is_empty() {
        out.push_str("## Experience\n\n");
        for entry in &content.experience {
            out.push_str(&format!("### {} — {}\n\n", entry.title, entry.company));
            let mut meta: Vec<String> = Vec::new();
            let dates = render_dates(&entry.start_date, &entry.end_date);
            if !dates.is_empty() {
                meta.push(dates);
            }
            if !entry.location.is_empty() {
                meta.push(entry.location.clone());
            }
            if !meta.is_empty() {
                out.push_str(&format!("*{}*\n\n", meta.join(", ")));
            }
            for bullet in &entry.description {
                out.push_str(&format!("- {}\n", bullet));
            }
            if !entry.description.is_empty() {
                out.push('\n');
            }
        }
    }

    if !content.education.is_empty() {
        out.push_str("## Education\n\n");
        for entry in &content.education {
            out.push_str(&format!("### {} — {}\n\n", entry.course, entry.institution));
            let mut meta: Vec<String> = Vec::new();
            let dates = render_dates(&entry.start_date, &entry.end_date);
            if !dates.is_empty() {
                meta.push(dates);
            }
            if !entry.location.is_empty() {
                meta.push(entry.location.clone());
            }
            if !meta.is_empty() {
                out.push_str(&format!("*{}*\n\n", meta.join(", ")));
            }
        }
    }

    if !content.skills.is_empty() {
        out.push_str("## Skills\n\n");
        for group in &content.skills {
            out.push_str(&format!("- **{}**: {}\n", group.title, group.elements.join(", ")));
        }
        out.push('\n');
    }

    if !content.projects.is_empty() {
        out.push_str("## Projects\n\n");
        for project in &content.projects {
            out.push_str(&format!("### {}\n\n{}\n\n", project.title, project.description));
        }
    }

    if !content.certifications.is_empty() {
        out.push_str("## Certifications\n\n");
        for cert in &content.certifications {
            out.push_str(&format!("- {}\n", cert.title));
        }
        out.push('\n');
    }

    out
}

fn render_dates(start: &str, end: &str) -> String {
    match (start.is_empty(), end.is_empty()) {
        (false, false) => format!("{} – {}", start, end),
        (false, true) => start.to_string(),
        (true, false) => end.to_string(),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{EducationEntry, ExperienceEntry, SkillGroup};

    fn candidate() -> CandidateConfig {
        CandidateConfig {
            profile: "profile".to_string(),
            full_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            phone: "+49 151 0000000".to_string(),
            address: "Berlin, Germany".to_string(),
            signature: String::new(),
        }
    }

    fn content() -> ResumeContent {
        ResumeContent {
            summary: "Backend engineer.".to_string(),
            experience: vec![ExperienceEntry {
                title: "Senior Engineer".to_string(),
                company: "Initech".to_string(),
                location: "Berlin".to_string(),
                start_date: "2021".to_string(),
                end_date: "present".to_string(),
                description: vec!["Built payment pipeline".to_string()],
            }],
            education: vec![EducationEntry {
                course: "BSc Computer Science".to_string(),
                institution: "TU Berlin".to_string(),
                location: String::new(),
                start_date: "2014".to_string(),
                end_date: "2017".to_string(),
            }],
            skills: vec![SkillGroup {
                title: "Languages".to_string(),
                elements: vec!["Rust".to_string(), "SQL".to_string()],
            }],
            projects: vec![],
            certifications: vec![],
        }
    }

    #[test]
    fn test_render_includes_contact_line_and_sections() {
        let md = render_markdown(&candidate(), &content());
        assert!(md.starts_with("# Jane Doe\n"));
        assert!(md.contains("jane@example.com | +49 151 0000000 | Berlin, Germany"));
        assert!(md.contains("## Summary"));
        assert!(md.contains("### Senior Engineer — Initech"));
        assert!(md.contains("*2021 – present, Berlin*"));
        assert!(md.contains("- Built payment pipeline"));
        assert!(md.contains("### BSc Computer Science — TU Berlin"));
        assert!(md.contains("- **Languages**: Rust, SQL"));
    }

    #[test]
    fn test_render_omits_empty_optional_sections() {
        let md = render_markdown(&candidate(), &content());
        assert!(!md.contains("## Projects"));
        assert!(!md.contains("## Certifications"));
    }

    #[test]
    fn test_render_skips_blank_contact_parts() {
        let mut c = candidate();
        c.phone = String::new();
        c.address = String::new();
        let md = render_markdown(&c, &content());
        assert!(md.contains("jane@example.com\n\n"));
        assert!(!md.contains(" | \n"));
    }

    #[test]
    fn test_store_resume_creates_directory_and_file() {
        use assert_fs::prelude::*;

        let tmp = assert_fs::TempDir::new().unwrap();
        let store = ArtifactStore::new(&tmp.path().join("artifacts"));

        let path = store.store_resume("abc123", "# Resume\n").unwrap();

        assert!(path.ends_with("resume_abc123.md"));
        tmp.child("artifacts/resume_abc123.md").assert("# Resume\n");
    }

    #[test]
    fn test_store_resume_overwrites_existing_file() {
        use assert_fs::prelude::*;

        let tmp = assert_fs::TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        store.store_resume("id", "first").unwrap();
        store.store_resume("id", "second").unwrap();

        tmp.child("resume_id.md").assert("second");
    }
}
