use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::{self, VacancyEvaluation};
use crate::artifacts::{self, ArtifactStore};
use crate::config::{CandidateConfig, Config, DispatchConfig};
use crate::db::post_repo::PostRow;
use crate::db::vacancy_repo::{Source, VacancyRow};
use crate::db::{email_repo, evaluation_repo, post_repo, resume_repo, telegram_repo, vacancy_repo, Database};
use crate::dispatch::{SmtpMailer, TelegramNotifier};
use crate::ingest::{self, IngestOutcome, Ingestor};
use crate::limiter::RateLimiter;
use crate::llm::{ChatApi, LlmClient};
use crate::retry::retry_fixed;
use crate::sanitize::truncate_chars;
use crate::scrape::{PostSource, ScrapedPost};

use super::error::PipelineError;
use super::report::RunReport;

const TELEGRAM_CAPTION_MAX: usize = 4000;

/// One full run over a post source.
///
/// Phases run in order: collect, ingest, triage, then evaluation and
/// outreach per eligible vacancy. A collection failure aborts the run;
/// everything downstream degrades to per-item warnings in the report.
/// The stop flag is honored between posts and between vacancies, never
/// mid-item, so every touched row is left in a consistent state.
pub struct Pipeline {
    db: Database,
    ingestor: Ingestor,
    chat: Arc<dyn ChatApi>,
    limiter: RateLimiter,
    retry_attempts: u32,
    retry_delay: Duration,
    candidate: CandidateConfig,
    dispatch: DispatchConfig,
    artifacts: ArtifactStore,
    mailer: Option<SmtpMailer>,
    telegram: Option<TelegramNotifier>,
    stop: Arc<AtomicBool>,
}

impl Pipeline {
    /// Production constructor — builds all sub-components from config.
    pub fn from_config(
        config: &Config,
        db: Database,
        stop: Arc<AtomicBool>,
    ) -> crate::error::Result<Self> {
        let chat: Arc<dyn ChatApi> = Arc::new(LlmClient::new(
            config.llm.provider,
            config.llm.base_url.as_deref(),
            config.llm.model.as_deref(),
            config.llm.resolve_api_key()?,
        )?);

        let limiter = RateLimiter::new(
            config.llm.max_requests_per_window,
            Duration::from_secs(config.llm.window_secs),
        );

        let screenshots_dir = crate::secrets::expand_home(&config.screenshots_dir);
        let ingestor = Ingestor::new(
            db.clone(),
            Path::new(&screenshots_dir),
            config.dedup.similarity_threshold,
        );

        let artifacts_dir = crate::secrets::expand_home(&config.artifacts_dir);
        let artifacts = ArtifactStore::new(Path::new(&artifacts_dir));

        let mailer = match &config.smtp {
            Some(smtp) => Some(SmtpMailer::from_config(smtp)?),
            None => None,
        };
        let telegram = match &config.telegram {
            Some(telegram) => Some(TelegramNotifier::from_config(telegram)?),
            None => None,
        };

        Ok(Self {
            db,
            ingestor,
            chat,
            limiter,
            retry_attempts: config.llm.retry_attempts,
            retry_delay: Duration::from_secs(config.llm.retry_delay_secs),
            candidate: config.candidate.clone(),
            dispatch: config.dispatch.clone(),
            artifacts,
            mailer,
            telegram,
            stop,
        })
    }

    /// Test constructor — inject specific sub-components.
    #[cfg(test)]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn with_components(
        db: Database,
        ingestor: Ingestor,
        chat: Arc<dyn ChatApi>,
        candidate: CandidateConfig,
        dispatch: DispatchConfig,
        artifacts: ArtifactStore,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            db,
            ingestor,
            chat,
            limiter: RateLimiter::new(1000, Duration::from_secs(60)),
            retry_attempts: 1,
            retry_delay: Duration::from_secs(0),
            candidate,
            dispatch,
            artifacts,
            mailer: None,
            telegram: None,
            stop,
        }
    }

    /// Runs the full pipeline once and returns the counters.
    pub async fn run(&self, source: &dyn PostSource) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();

        let posts = source.collect().instrument(info_span!("collect")).await?;
        report.scraped = posts.len() as u64;
        info!(posts = posts.len(), "collection finished");

        {
            let _span = info_span!("ingest").entered();
            self.ingest_posts(&posts, &mut report);
        }

        if self.halted(&mut report) {
            return Ok(report);
        }

        self.triage_pending(&mut report)
            .instrument(info_span!("triage"))
            .await?;

        if self.halted(&mut report) {
            return Ok(report);
        }

        self.process_vacancies(&mut report)
            .instrument(info_span!("outreach"))
            .await?;

        info!(
            scraped = report.scraped,
            ingested = report.ingested,
            vacancies = report.vacancies_found,
            resumes = report.resumes_generated,
            emails = report.emails_sent,
            telegram = report.telegram_sent,
            failures = report.failures.len(),
            stopped = report.stopped,
            "run finished"
        );
        Ok(report)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn halted(&self, report: &mut RunReport) -> bool {
        if report.stopped || self.stop_requested() {
            report.stopped = true;
            warn!("stop requested, ending run early");
            return true;
        }
        false
    }

    fn ingest_posts(&self, posts: &[ScrapedPost], report: &mut RunReport) {
        for post in posts {
            match self.ingestor.ingest(post) {
                Ok(IngestOutcome::Inserted(id)) => {
                    debug!(post_id = %id, "post stored");
                    report.ingested += 1;
                }
                Ok(IngestOutcome::DuplicateOfProcessed(id)) => {
                    debug!(post_id = %id, "duplicate of an already-triaged post");
                    report.duplicates += 1;
                }
                Ok(IngestOutcome::DuplicateQueued(id)) => {
                    debug!(post_id = %id, "duplicate of a queued post");
                    report.duplicates += 1;
                }
                Err(err) => {
                    warn!(error = %err, "failed to ingest post");
                    report.note_failure(format!("ingest: {err}"));
                }
            }
        }
        info!(
            ingested = report.ingested,
            duplicates = report.duplicates,
            "ingestion finished"
        );
    }

    async fn triage_pending(&self, report: &mut RunReport) -> Result<(), PipelineError> {
        let pending = post_repo::find_unprocessed(&self.db)?;
        info!(posts = pending.len(), "triage starting");

        for post in &pending {
            if self.stop_requested() {
                report.stopped = true;
                break;
            }
            if let Err(err) = self
                .triage_post(post, report)
                .instrument(info_span!("triage_post", post_id = %post.id))
                .await
            {
                warn!(post_id = %post.id, error = %err, "triage failed");
                report.note_failure(format!("triage {}: {err}", post.id));
            }
        }
        Ok(())
    }

    async fn triage_post(&self, post: &PostRow, report: &mut RunReport) -> Result<(), PipelineError> {
        // Marked up front so a post that keeps breaking the stage is not
        // retried on every subsequent run.
        post_repo::mark_processed(&self.db, &post.id)?;

        let verdict = retry_fixed(self.retry_attempts, self.retry_delay, || {
            agents::triage_post(self.chat.as_ref(), &post.post_text)
        })
        .await;
        self.limiter.record(1).await;
        let verdict = verdict?;
        report.triaged += 1;

        if !verdict.is_vacancy {
            debug!(post_id = %post.id, "post is not a vacancy");
            return Ok(());
        }
        let Some(draft) = verdict.vacancy else {
            debug!(post_id = %post.id, "verdict carried no vacancy fields");
            return Ok(());
        };

        let vacancy = VacancyRow {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            company: draft.company,
            description: draft.description,
            credentials: draft.credentials,
            visa_status: draft.visa_status,
            source: Source::Linkedin,
            post_id: Some(post.id.clone()),
            processed: false,
            deleted: false,
            created_at: Utc::now().to_rfc3339(),
        };
        vacancy_repo::insert(&self.db, &vacancy)?;
        report.vacancies_found += 1;
        info!(
            post_id = %post.id,
            vacancy_id = %vacancy.id,
            title = %vacancy.title,
            visa = vacancy.visa_status.as_str(),
            "vacancy extracted"
        );
        Ok(())
    }

    async fn process_vacancies(&self, report: &mut RunReport) -> Result<(), PipelineError> {
        let eligible = vacancy_repo::find_eligible(&self.db)?;
        info!(vacancies = eligible.len(), "evaluation starting");

        for vacancy in &eligible {
            if self.stop_requested() {
                report.stopped = true;
                break;
            }
            if let Err(err) = self
                .process_vacancy(vacancy, report)
                .instrument(info_span!("vacancy", vacancy_id = %vacancy.id))
                .await
            {
                warn!(vacancy_id = %vacancy.id, error = %err, "vacancy processing failed");
                report.note_failure(format!("vacancy {}: {err}", vacancy.id));
            }
        }
        Ok(())
    }

    async fn process_vacancy(
        &self,
        vacancy: &VacancyRow,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let recipient = vacancy.credentials.as_deref().and_then(ingest::extract_email);

        let evaluation = retry_fixed(self.retry_attempts, self.retry_delay, || {
            agents::evaluate_vacancy(
                self.chat.as_ref(),
                &self.candidate.profile,
                &vacancy.title,
                &vacancy.description,
            )
        })
        .await;
        self.limiter.record(1).await;
        let evaluation = evaluation?;

        evaluation_repo::insert(
            &self.db,
            &evaluation_repo::EvaluationRow {
                id: Uuid::new_v4().to_string(),
                vacancy_id: vacancy.id.clone(),
                rating: evaluation.rating,
                summary: evaluation.summary.clone(),
                created_at: Utc::now().to_rfc3339(),
            },
        )?;
        report.evaluated += 1;
        vacancy_repo::mark_processed(&self.db, &vacancy.id)?;
        info!(vacancy_id = %vacancy.id, rating = evaluation.rating, "vacancy evaluated");

        if evaluation.rating <= self.dispatch.min_rating {
            info!(
                vacancy_id = %vacancy.id,
                rating = evaluation.rating,
                min_rating = self.dispatch.min_rating,
                "rating at or below the gate, no outreach"
            );
            return Ok(());
        }

        let resume = retry_fixed(self.retry_attempts, self.retry_delay, || {
            agents::generate_resume(
                self.chat.as_ref(),
                &self.candidate.profile,
                &vacancy.title,
                &vacancy.description,
            )
        })
        .await;
        self.limiter.record(1).await;
        let resume = resume?;

        let resume_id = Uuid::new_v4().to_string();
        resume_repo::insert(
            &self.db,
            &resume_repo::ResumeRow {
                id: resume_id.clone(),
                vacancy_id: vacancy.id.clone(),
                full_name: self.candidate.full_name.clone(),
                email: self.candidate.email.clone(),
                phone: self.candidate.phone.clone(),
                address: self.candidate.address.clone(),
                summary: resume.summary.clone(),
                experience: serde_json::to_string(&resume.experience)?,
                education: serde_json::to_string(&resume.education)?,
                skills: serde_json::to_string(&resume.skills)?,
                projects: encode_optional(&resume.projects)?,
                certifications: encode_optional(&resume.certifications)?,
                file_path: None,
                created_at: Utc::now().to_rfc3339(),
            },
        )?;

        let markdown = artifacts::render_markdown(&self.candidate, &resume);
        let path = self.artifacts.store_resume(&resume_id, &markdown)?;
        resume_repo::set_file_path(&self.db, &resume_id, &path.display().to_string())?;
        report.resumes_generated += 1;
        debug!(vacancy_id = %vacancy.id, path = %path.display(), "resume rendered");

        match recipient {
            Some(recipient) => {
                self.send_application(vacancy, &recipient, &path, report)
                    .await
            }
            None => self.notify_telegram(vacancy, &evaluation, report).await,
        }
    }

    async fn send_application(
        &self,
        vacancy: &VacancyRow,
        recipient: &str,
        resume_path: &Path,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let cutoff =
            (Utc::now() - chrono::Duration::days(self.dispatch.antispam_days)).to_rfc3339();
        if email_repo::recipient_emailed_since(&self.db, recipient, &cutoff)? {
            info!(
                vacancy_id = %vacancy.id,
                recipient = %recipient,
                days = self.dispatch.antispam_days,
                "recipient already contacted inside the anti-spam window"
            );
            report.skipped_antispam += 1;
            return Ok(());
        }

        let email = retry_fixed(self.retry_attempts, self.retry_delay, || {
            agents::generate_email(
                self.chat.as_ref(),
                &self.candidate.profile,
                &vacancy.title,
                vacancy.company.as_deref(),
                &vacancy.description,
                &self.candidate.signature,
            )
        })
        .await;
        self.limiter.record(1).await;
        let email = email?;

        let email_id = Uuid::new_v4().to_string();
        email_repo::insert(
            &self.db,
            &email_repo::EmailRow {
                id: email_id.clone(),
                vacancy_id: vacancy.id.clone(),
                recipient: recipient.to_string(),
                subject: email.subject.clone(),
                body: email.body.clone(),
                sent: false,
                sent_at: None,
                created_at: Utc::now().to_rfc3339(),
            },
        )?;

        let Some(mailer) = &self.mailer else {
            warn!(vacancy_id = %vacancy.id, "no SMTP configured, email drafted but not sent");
            return Ok(());
        };

        mailer
            .send(recipient, &email.subject, &email.body, Some(resume_path))
            .await?;
        email_repo::mark_sent(&self.db, &email_id, &Utc::now().to_rfc3339())?;
        report.emails_sent += 1;
        debug!(vacancy_id = %vacancy.id, recipient = %recipient, "application dispatched by email");
        Ok(())
    }

    async fn notify_telegram(
        &self,
        vacancy: &VacancyRow,
        evaluation: &VacancyEvaluation,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let Some(telegram) = &self.telegram else {
            warn!(
                vacancy_id = %vacancy.id,
                "vacancy has no recipient address and no Telegram is configured"
            );
            return Ok(());
        };

        let post = match &vacancy.post_id {
            Some(post_id) => post_repo::find_by_id(&self.db, post_id)?,
            None => None,
        };

        if let Some(post_id) = &vacancy.post_id {
            telegram_repo::upsert(
                &self.db,
                &Uuid::new_v4().to_string(),
                post_id,
                telegram_repo::STATUS_PENDING,
                &Utc::now().to_rfc3339(),
            )?;
        }

        let url = post
            .as_ref()
            .and_then(|p| p.post_url.clone())
            .unwrap_or_default();
        let caption = build_caption(
            &vacancy.title,
            &url,
            vacancy.credentials.as_deref(),
            evaluation.rating,
            &vacancy.description,
        );

        let screenshot = post
            .as_ref()
            .and_then(|p| p.screenshot_path.as_deref())
            .and_then(|path| match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    warn!(path = %path, error = %err, "could not read screenshot, sending text only");
                    None
                }
            });

        match screenshot {
            Some(png) => telegram.send_photo(&caption, &png).await?,
            None => telegram.send_message(&caption).await?,
        }

        if let Some(post_id) = &vacancy.post_id {
            telegram_repo::upsert(
                &self.db,
                &Uuid::new_v4().to_string(),
                post_id,
                telegram_repo::STATUS_SENT,
                &Utc::now().to_rfc3339(),
            )?;
        }
        report.telegram_sent += 1;
        info!(vacancy_id = %vacancy.id, "vacancy forwarded to Telegram");
        Ok(())
    }
}

fn encode_optional<T: serde::Serialize>(items: &[T]) -> Result<Option<String>, serde_json::Error> {
    if items.is_empty() {
        return Ok(None);
    }
    Some(serde_json::to_string(items)).transpose()
}

fn build_caption(
    title: &str,
    url: &str,
    credentials: Option<&str>,
    rating: u8,
    description: &str,
) -> String {
    let caption = format!(
        "Title: {title}\n\nURL: {url}\n\nTO: {to}\n\nRating: {rating}\n\n{description}",
        to = credentials.unwrap_or_default(),
    );
    truncate_chars(&caption, TELEGRAM_CAPTION_MAX).to_string()
}
