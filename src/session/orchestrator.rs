//! The per-connection refinement pipeline.
//!
//! A [`Session`] waits for a request, then runs every stage to completion
//! before reading the next one:
//!
//! 1. compile the query text with the requested dialect
//! 2. generate variations with the fixed operator list
//! 3. predict the best variation with the selector
//! 4. evaluate every variation
//! 5. evaluate the predicted variation
//! 6. evaluate the original query
//! 7. report all of them sorted by ascending F1
//!
//! Any error ends the session. Messages already sent stay sent; nothing else
//! is written.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::dialect::DialectRegistry;
use crate::error::Result;
use crate::eval::Evaluator;
use crate::select::{CandidateSelector, SUPPORTED_DEPTH};
use crate::session::channel::MessageChannel;
use crate::session::protocol::{LensRequest, LensResponse, QueryVariation, Shape};
use crate::transform::{Candidate, TransformationKind, VariationGenerator};

/// Interval at which an idle session polls for the next request.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

pub const MSG_GENERATING: &str = "Generating variations.";
pub const MSG_PREDICTING: &str = "Predicting most effective variation.";
pub const MSG_EVALUATING: &str = "Evaluating queries.";
pub const MSG_PREDICTIONS: &str = "Evaluating predictions.";
pub const MSG_ORIGINAL: &str = "Evaluating original query.";

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingRequest,
    Compiling,
    GeneratingVariations,
    SelectingBest,
    EvaluatingVariations,
    EvaluatingSelection,
    EvaluatingOriginal,
    ReportingResults,
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingRequest => "awaiting_request",
            Stage::Compiling => "compiling",
            Stage::GeneratingVariations => "generating_variations",
            Stage::SelectingBest => "selecting_best",
            Stage::EvaluatingVariations => "evaluating_variations",
            Stage::EvaluatingSelection => "evaluating_selection",
            Stage::EvaluatingOriginal => "evaluating_original",
            Stage::ReportingResults => "reporting_results",
            Stage::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State of one client connection.
pub struct Session {
    id: Uuid,
    stage: Stage,
    dialects: Arc<DialectRegistry>,
    generator: Arc<VariationGenerator>,
    evaluator: Evaluator,
    selector: Box<dyn CandidateSelector>,
    operators: Vec<TransformationKind>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("operators", &self.operators)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        dialects: Arc<DialectRegistry>,
        generator: Arc<VariationGenerator>,
        evaluator: Evaluator,
        selector: Box<dyn CandidateSelector>,
    ) -> Self {
        Session {
            id: Uuid::new_v4(),
            stage: Stage::AwaitingRequest,
            dialects,
            generator,
            evaluator,
            selector,
            operators: TransformationKind::ALL.to_vec(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "stage transition");
        self.stage = stage;
    }

    /// Serve requests until the client goes away or an error occurs.
    pub async fn run<C: MessageChannel + ?Sized>(mut self, channel: &mut C) -> Result<()> {
        let span = info_span!("session", id = %self.id);
        async move {
            info!(
                relevant = self.evaluator.judgments().relevant_count(),
                "session opened"
            );
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                let request = match channel.recv().await {
                    Ok(Some(request)) => request,
                    Ok(None) => {
                        self.enter(Stage::Closed);
                        info!(cache = ?self.evaluator.retriever().cache_stats(), "session closed");
                        return Ok(());
                    }
                    Err(e) => {
                        error!(stage = %self.stage, error = %e, "read failed, closing session");
                        self.enter(Stage::Closed);
                        return Err(e);
                    }
                };
                if let Err(e) = self.handle_request(&request, channel).await {
                    error!(stage = %self.stage, error = %e, "request failed, closing session");
                    self.enter(Stage::Closed);
                    return Err(e);
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the whole pipeline for one request.
    pub async fn handle_request<C: MessageChannel + ?Sized>(
        &mut self,
        request: &LensRequest,
        channel: &mut C,
    ) -> Result<()> {
        let dialect = self.dialects.resolve(request.language.as_deref());
        info!(dialect = dialect.name(), query = %request.query, "received query");

        self.enter(Stage::Compiling);
        let seed = Candidate::original(dialect.compile(&request.query)?);

        self.enter(Stage::GeneratingVariations);
        channel.send(&LensResponse::message(MSG_GENERATING)).await?;
        let variations = self.generator.generate(&seed, &self.operators)?;
        for (i, variation) in variations.iter().enumerate() {
            let name = variation.lineage().display_name();
            channel
                .send(&LensResponse::executing_with(name, progress(i, variations.len())))
                .await?;
        }
        info!(count = variations.len(), "generated variations");

        self.enter(Stage::SelectingBest);
        channel.send(&LensResponse::message(MSG_PREDICTING)).await?;
        let selected = self
            .selector
            .select_best(&seed, &variations, SUPPORTED_DEPTH)?;
        debug!(transformation = selected.lineage().display_name(), "selected candidate");

        self.enter(Stage::EvaluatingVariations);
        channel.send(&LensResponse::message(MSG_EVALUATING)).await?;
        let mut queries = Vec::with_capacity(variations.len() + 2);
        for (i, variation) in variations.iter().enumerate() {
            let text = dialect.render(variation.query())?;
            queries.push(self.evaluate(variation, text, Shape::Circle)?);
            channel
                .send(&LensResponse::executing(progress(i, variations.len())))
                .await?;
        }

        self.enter(Stage::EvaluatingSelection);
        channel.send(&LensResponse::message(MSG_PREDICTIONS)).await?;
        let text = dialect.render(selected.query())?;
        queries.push(self.evaluate(&selected, text, Shape::Triangle)?);

        self.enter(Stage::EvaluatingOriginal);
        channel.send(&LensResponse::message(MSG_ORIGINAL)).await?;
        queries.push(self.evaluate(&seed, request.query.clone(), Shape::Cross)?);

        self.enter(Stage::ReportingResults);
        sort_by_f1(&mut queries);
        channel.send(&LensResponse::Queries { queries }).await?;

        self.enter(Stage::AwaitingRequest);
        Ok(())
    }

    fn evaluate(&self, candidate: &Candidate, text: String, shape: Shape) -> Result<QueryVariation> {
        let report = self.evaluator.evaluate(candidate.query())?;
        Ok(QueryVariation {
            query: text,
            shape,
            transformation: candidate.lineage().display_name().to_string(),
            num_transformations: candidate.num_transformations(),
            precision: report.precision,
            recall: report.recall,
            f1: report.f1,
            num_ret: report.num_ret,
        })
    }
}

/// Completion percentage before item `i` of `n`.
pub fn progress(i: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    i as f64 / n as f64 * 100.0
}

/// Stable ascending sort by F1.
pub fn sort_by_f1(queries: &mut [QueryVariation]) {
    queries.sort_by(|a, b| a.f1.total_cmp(&b.f1));
}
