use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use proofloops_agent::Generator;
use proofloops_fragments::{extract_fragments, fill_template};
use proofloops_logging::{
    GeneratorRole, LogEvent, Logger, SessionRound, SessionStart, SessionWriter,
};
use proofloops_verifier::Verifier;

use crate::context::RoundRecord;
use crate::error::LoopError;
use crate::outcome::{LoopOutcome, ProofResult};
use crate::{LoopContext, RetryPolicy};

/// Orchestrates the generate, extract, fill, verify loop
pub struct LoopRunner<'a> {
    primary: &'a dyn Generator,
    refiner: &'a dyn Generator,
    verifier: &'a dyn Verifier,
    logger: Arc<Logger>,
    retry_policy: RetryPolicy,
    session: Option<Arc<SessionWriter>>,
}

impl<'a> LoopRunner<'a> {
    pub fn new(
        primary: &'a dyn Generator,
        refiner: &'a dyn Generator,
        verifier: &'a dyn Verifier,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            primary,
            refiner,
            verifier,
            logger,
            retry_policy: RetryPolicy::default(),
            session: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Record every round to a session file
    pub fn with_session(mut self, session: Arc<SessionWriter>) -> Self {
        self.session = Some(session);
        self
    }

    fn generator_for(&self, role: GeneratorRole) -> &'a dyn Generator {
        match role {
            GeneratorRole::Primary => self.primary,
            GeneratorRole::Refiner => self.refiner,
        }
    }

    /// Run rounds until the verifier accepts a result or the rounds run out.
    ///
    /// Verification failures never surface as errors; only a generator that
    /// keeps failing after its retries aborts the loop.
    pub async fn run(&self, mut context: LoopContext) -> Result<LoopOutcome, LoopError> {
        self.logger.log(&LogEvent::LoopStarted {
            description_preview: context.task.description.chars().take(100).collect(),
            template_lines: context.task.template.lines().count(),
            max_rounds: context.max_rounds,
        });

        if let Some(ref session) = self.session {
            session.write_start(&SessionStart {
                task_dir: context.task_dir.as_deref(),
                description: &context.task.description,
                template: &context.task.template,
                primary_generator: self.primary.name(),
                refiner_generator: self.refiner.name(),
                primary_model: self.primary.model(),
                refiner_model: self.refiner.model(),
                max_rounds: context.max_rounds,
            });
        }

        while context.should_continue() {
            match self.run_round(&mut context).await {
                Ok(Some(outcome)) => {
                    self.finish_session(&outcome);
                    return Ok(outcome);
                }
                Ok(None) => context.increment_round(),
                Err(e) => {
                    warn!(error = %e, "Aborting loop");
                    self.logger.log(&LogEvent::GenerationFailed {
                        round: context.round,
                        error: e.to_string(),
                    });
                    if let Some(ref session) = self.session {
                        session.write_end(
                            "error",
                            context.round + 1,
                            Some(&e.to_string()),
                            context.total_duration().as_secs_f64(),
                        );
                    }
                    return Err(e);
                }
            }
        }

        let duration = context.total_duration();
        self.logger.log(&LogEvent::RoundsExhausted {
            rounds: context.round,
            duration_secs: duration.as_secs_f64(),
        });

        let outcome = LoopOutcome::exhausted(
            context.round,
            ProofResult::with_placeholders(&context.state.fragments),
            context.state.last_error,
            context.history,
            duration,
        );
        self.finish_session(&outcome);
        Ok(outcome)
    }

    /// Run a single round.
    /// Returns Some(outcome) if the loop should terminate, None to continue
    async fn run_round(&self, context: &mut LoopContext) -> Result<Option<LoopOutcome>, LoopError> {
        let round = context.round;
        let role = context.current_role();
        let generator = self.generator_for(role);
        let messages = context.current_messages();
        let round_start = Instant::now();

        self.logger.log(&LogEvent::RoundStarted {
            round,
            role,
            generator: generator.name().to_string(),
        });

        debug!(round, %role, "Requesting generation");
        let (response, attempts) = self
            .retry_policy
            .run(
                || generator.get_response(&messages),
                |attempt, error| {
                    self.logger.log(&LogEvent::GenerationRetry {
                        round,
                        attempt,
                        error: error.to_string(),
                        delay_secs: self.retry_policy.delay.as_secs_f64(),
                    });
                },
            )
            .await
            .map_err(|source| LoopError::Generation {
                round,
                attempts: self.retry_policy.max_attempts.max(1),
                source,
            })?;

        self.logger.log(&LogEvent::GenerationCompleted {
            round,
            attempts,
            response_chars: response.chars().count(),
            duration_secs: round_start.elapsed().as_secs_f64(),
        });

        let extraction = extract_fragments(&response, &context.state.fragments);
        self.logger.log(&LogEvent::FragmentsExtracted {
            round,
            method: extraction.method.to_string(),
            code_lines: extraction.fragments.code.lines().count(),
            proof_lines: extraction.fragments.proof.lines().count(),
        });

        let filled = fill_template(&context.task.template, &extraction.fragments);

        let verify_start = Instant::now();
        let verification = self.verifier.execute(&filled).await;
        self.logger.log(&LogEvent::VerificationCompleted {
            round,
            success: verification.success,
            duration_secs: verify_start.elapsed().as_secs_f64(),
            diagnostic_lines: verification.diagnostic.lines().count(),
        });

        let record = RoundRecord {
            round,
            role,
            generation_attempts: attempts,
            response,
            fragments: extraction.fragments.clone(),
            extraction: extraction.method,
            verified: verification.success,
            diagnostic: verification.diagnostic.clone(),
            duration_secs: round_start.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };
        self.record_session_round(&record);
        context.push_record(record);

        context.state.fragments = extraction.fragments;

        if verification.success {
            let duration = context.total_duration();
            self.logger.log(&LogEvent::LoopVerified {
                rounds: round + 1,
                duration_secs: duration.as_secs_f64(),
            });

            return Ok(Some(LoopOutcome::verified(
                round + 1,
                ProofResult::from(context.state.fragments.clone()),
                std::mem::take(&mut context.history),
                duration,
            )));
        }

        info!(round = round + 1, "Verification failed, refining");
        context.state.last_error = verification.diagnostic;
        Ok(None)
    }

    fn record_session_round(&self, record: &RoundRecord) {
        if let Some(ref session) = self.session {
            let extraction = record.extraction.to_string();
            session.write_round(&SessionRound {
                round: record.round,
                role: record.role,
                generation_attempts: record.generation_attempts,
                response: &record.response,
                code: &record.fragments.code,
                proof: &record.fragments.proof,
                extraction: &extraction,
                verified: record.verified,
                diagnostic: &record.diagnostic,
                duration_secs: record.duration_secs,
            });
        }
    }

    fn finish_session(&self, outcome: &LoopOutcome) {
        if let Some(ref session) = self.session {
            let duration_secs = match outcome {
                LoopOutcome::Verified {
                    total_duration_secs,
                    ..
                }
                | LoopOutcome::Exhausted {
                    total_duration_secs,
                    ..
                } => *total_duration_secs,
            };
            session.write_end(outcome.status(), outcome.rounds(), None, duration_secs);
        }
    }
}
