//! Run Council use case
//!
//! Orchestrates the full three-stage deliberation: parallel first
//! opinions, anonymized peer review, chairman synthesis. Emits every
//! partial result on the bounded output stream and persists the turn at
//! its boundary.

use crate::config::CouncilConfig;
use crate::multiplexer::{CouncilRun, EventMux};
use crate::ports::conversation_store::{ConversationStore, StoreError};
use crate::ports::model_client::{CompletionRequest, ModelClient, ModelClientError, StreamEvent};
use crate::registry::ModelRegistry;
use council_domain::{
    ChatMessage, Conversation, CouncilEvent, CouncilTurn, LabelMap, ModelDescriptor, ModelOpinion,
    PromptTemplate, ReviewData, ReviewResult, Stage, aggregate_rankings, parse_review,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors surfaced before the event stream starts
#[derive(Error, Debug)]
pub enum RunCouncilError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// One parsed caller request.
#[derive(Debug, Clone)]
pub struct CouncilRequest {
    /// The user's question. Must be non-empty.
    pub message: String,
    /// Continue an existing conversation, or mint a new one when absent.
    pub conversation_id: Option<String>,
    /// Councilor override; empty or absent falls back to configuration.
    pub selected_models: Option<Vec<String>>,
}

impl CouncilRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            selected_models: None,
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_selected_models(mut self, models: Vec<String>) -> Self {
        self.selected_models = Some(models);
        self
    }
}

/// Outcome of the synthesis stage.
enum SynthesisOutcome {
    /// Stream ended normally, or the stage deadline truncated it after
    /// at least some output.
    Finished(String),
    /// Stream failed, or the deadline fired before any output.
    Failed { text: String, reason: String },
    /// The overall turn deadline fired mid-synthesis.
    TurnTimeout { text: String },
    /// The caller went away; no terminal event, nothing persisted.
    Cancelled,
}

/// Use case driving one council turn per invocation.
#[derive(Clone)]
pub struct RunCouncilUseCase {
    registry: Arc<ModelRegistry>,
    store: Arc<dyn ConversationStore>,
    config: CouncilConfig,
}

impl RunCouncilUseCase {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<dyn ConversationStore>,
        config: CouncilConfig,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Begin a turn: resolve the conversation, then spawn the
    /// orchestration and hand back the event stream.
    ///
    /// The conversation id is resolved before any event is produced so
    /// the transport layer can surface it to the caller up front.
    pub async fn start(&self, request: CouncilRequest) -> Result<CouncilRun, RunCouncilError> {
        if request.message.trim().is_empty() {
            return Err(RunCouncilError::EmptyMessage);
        }

        let conversation = match &request.conversation_id {
            Some(id) => match self.store.load(id).await {
                Ok(conversation) => conversation,
                Err(StoreError::NotFound(_)) => {
                    return Err(RunCouncilError::ConversationNotFound(id.clone()));
                }
                Err(e) => return Err(e.into()),
            },
            None => self.store.create().await?,
        };

        // Councilor selection: request override, else configured
        // defaults, else every registry model.
        let selection = request
            .selected_models
            .filter(|ids| !ids.is_empty())
            .or_else(|| {
                (!self.config.default_models.is_empty()).then(|| self.config.default_models.clone())
            });
        let (councilors, unknown) = self.registry.resolve(selection.as_deref());

        let cancel = CancellationToken::new();
        let (mux, receiver) = EventMux::channel(self.config.output_buffer_size, cancel.clone());
        mux.watch_consumer();

        info!(
            conversation_id = %conversation.id,
            councilors = councilors.len(),
            "starting council turn"
        );

        let conversation_id = conversation.id.clone();
        let this = self.clone();
        let message = request.message;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            this.orchestrate(conversation, message, councilors, unknown, mux, task_cancel)
                .await
        });

        Ok(CouncilRun::new(conversation_id, receiver, cancel, handle))
    }

    /// The INIT → STAGE1 → STAGE2 → STAGE3 → DONE state machine.
    ///
    /// Returns the turn when it was persisted, `None` otherwise.
    async fn orchestrate(
        self,
        conversation: Conversation,
        message: String,
        councilors: Vec<ModelDescriptor>,
        unknown: Vec<String>,
        mux: EventMux,
        cancel: CancellationToken,
    ) -> Option<CouncilTurn> {
        let turn_deadline = Instant::now() + self.config.turn_deadline;
        let mut turn = CouncilTurn::new(Uuid::new_v4().to_string(), &message);

        for id in &unknown {
            warn!(model_id = %id, "ignoring unknown model id in selection");
            mux.send(CouncilEvent::model_error(
                id.clone(),
                format!("unknown model id: {}", id),
            ))
            .await;
        }

        if councilors.is_empty() {
            mux.send(CouncilEvent::error("no councilors selected")).await;
            return None;
        }

        // Stage 1: first opinions
        if !mux
            .send(CouncilEvent::stage_update(
                Stage::FirstOpinions,
                "Gathering initial responses from council members...",
            ))
            .await
        {
            return None;
        }
        let stage1_deadline = (Instant::now() + self.config.stage1_deadline).min(turn_deadline);
        turn.opinions = self
            .stage_first_opinions(
                &councilors,
                conversation.history(),
                &message,
                &mux,
                &cancel,
                stage1_deadline,
            )
            .await;

        if cancel.is_cancelled() {
            return None;
        }
        if Instant::now() >= turn_deadline {
            return self
                .fail_turn(&conversation.id, turn, "turn_timeout", &mux, &cancel)
                .await;
        }
        if turn.successful_opinions().count() == 0 {
            mux.send(CouncilEvent::error("no_opinions")).await;
            return None;
        }

        // Stage 2: peer review
        if !mux
            .send(CouncilEvent::stage_update(
                Stage::Review,
                "Council members reviewing each other's responses...",
            ))
            .await
        {
            return None;
        }
        let stage2_deadline = (Instant::now() + self.config.stage2_deadline).min(turn_deadline);
        turn.reviews = self
            .stage_review(&turn.opinions, &message, &mux, &cancel, stage2_deadline)
            .await;

        if cancel.is_cancelled() {
            return None;
        }
        if Instant::now() >= turn_deadline {
            return self
                .fail_turn(&conversation.id, turn, "turn_timeout", &mux, &cancel)
                .await;
        }

        // Stage 3: synthesis
        let chairman = self.registry.chairman().clone();
        if !mux
            .send(CouncilEvent::stage_update(
                Stage::FinalResponse,
                format!("Chairman ({}) compiling final response...", chairman.id),
            ))
            .await
        {
            return None;
        }
        let stage3_deadline = Instant::now() + self.config.stage3_deadline;
        let synthesis = self
            .stage_synthesis(
                &chairman,
                conversation.history(),
                &message,
                &turn.opinions,
                &turn.reviews,
                &mux,
                &cancel,
                stage3_deadline,
                turn_deadline,
            )
            .await;

        match synthesis {
            SynthesisOutcome::Cancelled => None,
            SynthesisOutcome::Finished(text) => {
                turn.final_text = text;
                turn.finish();
                if self.persist_turn(&conversation.id, &turn, &mux).await {
                    mux.send(CouncilEvent::Complete).await;
                    info!(turn_id = %turn.turn_id, "council turn complete");
                    Some(turn)
                } else {
                    None
                }
            }
            SynthesisOutcome::Failed { text, reason } => {
                turn.final_text = text;
                self.fail_turn(&conversation.id, turn, &reason, &mux, &cancel)
                    .await
            }
            SynthesisOutcome::TurnTimeout { text } => {
                turn.final_text = text;
                self.fail_turn(&conversation.id, turn, "turn_timeout", &mux, &cancel)
                    .await
            }
        }
    }

    /// Terminal failure: cancel stragglers, emit the error, and persist
    /// the partial turn when stage 1 produced at least one opinion.
    async fn fail_turn(
        &self,
        conversation_id: &str,
        mut turn: CouncilTurn,
        reason: &str,
        mux: &EventMux,
        cancel: &CancellationToken,
    ) -> Option<CouncilTurn> {
        cancel.cancel();
        warn!(reason = %reason, "council turn failed");
        mux.send(CouncilEvent::error(reason)).await;

        if turn.successful_opinions().count() == 0 {
            return None;
        }
        turn.finish();
        if self.persist_turn(conversation_id, &turn, mux).await {
            Some(turn)
        } else {
            None
        }
    }

    /// Append the turn to its conversation. Emits a store error event on
    /// failure; events already delivered remain valid.
    async fn persist_turn(&self, conversation_id: &str, turn: &CouncilTurn, mux: &EventMux) -> bool {
        let user_message = ChatMessage::user(&turn.user_message);
        let assistant_message = ChatMessage::assistant(&turn.final_text);
        match self
            .store
            .append_turn(conversation_id, user_message, turn.clone(), assistant_message)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to persist turn");
                mux.send(CouncilEvent::error(format!("failed to persist turn: {}", e)))
                    .await;
                false
            }
        }
    }

    /// Stage 1: query all councilors in parallel, forwarding chunks as
    /// they arrive. Per-model failures are soft; the stage runs until
    /// every stream terminated or the deadline fires.
    async fn stage_first_opinions(
        &self,
        councilors: &[ModelDescriptor],
        history: &[ChatMessage],
        message: &str,
        mux: &EventMux,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Vec<ModelOpinion> {
        debug!(models = councilors.len(), "stage 1: first opinions");
        let messages = PromptTemplate::first_opinion_messages(history, message);

        let mut opinions = Vec::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut join_set: JoinSet<(String, Result<String, ModelClientError>)> = JoinSet::new();
        for descriptor in councilors {
            let client = match self.registry.client_for(descriptor) {
                Ok(client) => client,
                Err(e) => {
                    warn!(model_id = %descriptor.id, error = %e, "no client for councilor");
                    mux.send(CouncilEvent::model_error(descriptor.id.clone(), e.to_string()))
                        .await;
                    opinions.push(ModelOpinion::failure(descriptor.id.clone(), e.to_string()));
                    continue;
                }
            };
            let request = CompletionRequest {
                model_id: descriptor.id.clone(),
                messages: messages.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            };
            let mux = mux.clone();
            let cancel = cancel.clone();
            let model_id = descriptor.id.clone();
            pending.insert(model_id.clone());
            join_set.spawn(async move {
                let result =
                    stream_opinion(client.as_ref(), request, &model_id, &mux, &cancel).await;
                (model_id, result)
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    for model_id in std::mem::take(&mut pending) {
                        opinions.push(ModelOpinion::failure(model_id, "cancelled"));
                    }
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    join_set.abort_all();
                    for model_id in std::mem::take(&mut pending) {
                        mux.send(CouncilEvent::model_error(model_id.clone(), "timeout")).await;
                        opinions.push(ModelOpinion::failure(model_id, "timeout"));
                    }
                    break;
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((model_id, Ok(text))) => {
                            debug!(model_id = %model_id, "opinion complete");
                            pending.remove(&model_id);
                            opinions.push(ModelOpinion::success(model_id, text));
                        }
                        Ok((model_id, Err(e))) => {
                            warn!(model_id = %model_id, error = %e, "opinion failed");
                            pending.remove(&model_id);
                            mux.send(CouncilEvent::model_error(model_id.clone(), e.to_string()))
                                .await;
                            opinions.push(ModelOpinion::failure(model_id, e.to_string()));
                        }
                        Err(e) => {
                            warn!(error = %e, "opinion task join error");
                        }
                    }
                }
            }
        }

        // Tasks that died without reporting (panics) still get a record.
        for model_id in pending {
            opinions.push(ModelOpinion::failure(model_id, "task failed"));
        }
        opinions
    }

    /// Stage 2: every councilor with a non-error opinion reviews the
    /// anonymized set. One review event per reviewer, parseable or not.
    async fn stage_review(
        &self,
        opinions: &[ModelOpinion],
        message: &str,
        mux: &EventMux,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Vec<ReviewResult> {
        let labels = LabelMap::from_opinions(opinions);
        debug!(reviewers = labels.len(), "stage 2: peer review");

        // The same anonymized block for every reviewer, in label order.
        let anonymized: Vec<(char, String)> = labels
            .entries()
            .map(|(label, model_id)| {
                let text = opinions
                    .iter()
                    .find(|o| o.model_id == model_id)
                    .map(|o| o.text.clone())
                    .unwrap_or_default();
                (label, text)
            })
            .collect();

        let mut reviews = Vec::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();
        let mut join_set: JoinSet<(String, Result<String, ModelClientError>)> = JoinSet::new();
        for opinion in opinions.iter().filter(|o| o.is_success()) {
            let Some(descriptor) = self.registry.find(&opinion.model_id) else {
                continue;
            };
            let client = match self.registry.client_for(descriptor) {
                Ok(client) => client,
                Err(e) => {
                    warn!(model_id = %opinion.model_id, error = %e, "no client for reviewer");
                    mux.send(CouncilEvent::model_error(opinion.model_id.clone(), e.to_string()))
                        .await;
                    reviews.push(ReviewResult::failed(opinion.model_id.clone(), ""));
                    continue;
                }
            };
            let pairs: Vec<(char, &str)> = anonymized
                .iter()
                .map(|(label, text)| (*label, text.as_str()))
                .collect();
            let request = CompletionRequest {
                model_id: opinion.model_id.clone(),
                messages: PromptTemplate::review_messages(
                    message,
                    &pairs,
                    labels.label_of(&opinion.model_id),
                ),
                temperature: self.config.review_temperature,
                max_tokens: self.config.max_tokens,
            };
            let model_id = opinion.model_id.clone();
            pending.insert(model_id.clone());
            join_set.spawn(async move {
                let result = client.complete(request).await;
                (model_id, result)
            });
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    for model_id in std::mem::take(&mut pending) {
                        reviews.push(ReviewResult::failed(model_id, ""));
                    }
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    join_set.abort_all();
                    for model_id in std::mem::take(&mut pending) {
                        mux.send(CouncilEvent::model_error(model_id.clone(), "timeout")).await;
                        reviews.push(ReviewResult::failed(model_id, ""));
                    }
                    break;
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((model_id, Ok(text))) => {
                            pending.remove(&model_id);
                            let review = parse_review(&model_id, &labels, &text);
                            if !review.parse_ok {
                                debug!(model_id = %model_id, "review reply not parseable");
                            }
                            mux.send(CouncilEvent::Review {
                                model_id: model_id.clone(),
                                data: ReviewData {
                                    rankings: review.rankings.clone(),
                                    parse_ok: review.parse_ok,
                                },
                            })
                            .await;
                            reviews.push(review);
                        }
                        Ok((model_id, Err(e))) => {
                            warn!(model_id = %model_id, error = %e, "review failed");
                            pending.remove(&model_id);
                            mux.send(CouncilEvent::model_error(model_id.clone(), e.to_string()))
                                .await;
                            reviews.push(ReviewResult::failed(model_id, ""));
                        }
                        Err(e) => {
                            warn!(error = %e, "review task join error");
                        }
                    }
                }
            }
        }

        for model_id in pending {
            reviews.push(ReviewResult::failed(model_id, ""));
        }
        reviews
    }

    /// Stage 3: stream the chairman's synthesis, forwarding each chunk.
    #[allow(clippy::too_many_arguments)]
    async fn stage_synthesis(
        &self,
        chairman: &ModelDescriptor,
        history: &[ChatMessage],
        message: &str,
        opinions: &[ModelOpinion],
        reviews: &[ReviewResult],
        mux: &EventMux,
        cancel: &CancellationToken,
        stage_deadline: Instant,
        turn_deadline: Instant,
    ) -> SynthesisOutcome {
        debug!(chairman = %chairman.id, "stage 3: synthesis");
        let aggregated = aggregate_rankings(reviews);
        let request = CompletionRequest {
            model_id: chairman.id.clone(),
            messages: PromptTemplate::synthesis_messages(history, message, opinions, &aggregated),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let client = match self.registry.client_for(chairman) {
            Ok(client) => client,
            Err(e) => {
                return SynthesisOutcome::Failed {
                    text: String::new(),
                    reason: format!("chairman failed: {}", e),
                };
            }
        };
        let stream_cancel = cancel.child_token();
        let mut handle = match client.stream(request, stream_cancel.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                return SynthesisOutcome::Failed {
                    text: String::new(),
                    reason: format!("chairman failed: {}", e),
                };
            }
        };

        let mut accumulated = String::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return SynthesisOutcome::Cancelled;
                }
                _ = tokio::time::sleep_until(turn_deadline) => {
                    stream_cancel.cancel();
                    return SynthesisOutcome::TurnTimeout { text: accumulated };
                }
                _ = tokio::time::sleep_until(stage_deadline) => {
                    // Hard detach from the provider; a deadline with no
                    // output at all counts as a chairman failure.
                    stream_cancel.cancel();
                    if accumulated.is_empty() {
                        return SynthesisOutcome::Failed {
                            text: String::new(),
                            reason: "chairman timeout".to_string(),
                        };
                    }
                    return SynthesisOutcome::Finished(accumulated);
                }
                event = handle.receiver.recv() => match event {
                    Some(StreamEvent::Delta(chunk)) => {
                        accumulated.push_str(&chunk);
                        if !mux
                            .send(CouncilEvent::FinalResponse { content: chunk })
                            .await
                        {
                            return SynthesisOutcome::Cancelled;
                        }
                    }
                    Some(StreamEvent::Completed(text)) => {
                        if accumulated.is_empty() && !text.is_empty() {
                            if !mux
                                .send(CouncilEvent::FinalResponse { content: text.clone() })
                                .await
                            {
                                return SynthesisOutcome::Cancelled;
                            }
                            return SynthesisOutcome::Finished(text);
                        }
                        let text = if accumulated.is_empty() { text } else { accumulated };
                        return SynthesisOutcome::Finished(text);
                    }
                    Some(StreamEvent::Error(e)) => {
                        return SynthesisOutcome::Failed {
                            text: accumulated,
                            reason: format!("chairman failed: {}", e),
                        };
                    }
                    None => {
                        return SynthesisOutcome::Finished(accumulated);
                    }
                }
            }
        }
    }
}

/// Consume one councilor's stream, forwarding chunks tagged with its
/// model id and returning the accumulated text.
async fn stream_opinion(
    client: &dyn ModelClient,
    request: CompletionRequest,
    model_id: &str,
    mux: &EventMux,
    cancel: &CancellationToken,
) -> Result<String, ModelClientError> {
    let mut handle = client.stream(request, cancel.child_token()).await?;
    let mut accumulated = String::new();

    while let Some(event) = handle.receiver.recv().await {
        match event {
            StreamEvent::Delta(chunk) => {
                accumulated.push_str(&chunk);
                mux.send(CouncilEvent::ModelResponse {
                    model_id: model_id.to_string(),
                    content: chunk,
                })
                .await;
            }
            StreamEvent::Completed(text) => {
                if accumulated.is_empty() && !text.is_empty() {
                    // Non-streaming provider fallback: the whole reply
                    // arrives as one chunk.
                    mux.send(CouncilEvent::ModelResponse {
                        model_id: model_id.to_string(),
                        content: text.clone(),
                    })
                    .await;
                    return Ok(text);
                }
                return Ok(if accumulated.is_empty() { text } else { accumulated });
            }
            StreamEvent::Error(e) => {
                return Err(e);
            }
        }
    }

    if cancel.is_cancelled() {
        Err(ModelClientError::Cancelled)
    } else {
        Ok(accumulated)
    }
}
