//! The query loop: model round trips interleaved with tool dispatch.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::model::{
    GenerateOptions, ModelError, ModelGateway, ModelRequest, ToolInvocation, ToolResult, Usage,
};
use crate::render::render_answer;
use crate::tools::{ToolCatalog, ToolError, ToolHost};
use crate::{Error, Result};

/// Limits and model options for every query an [`Agent`] runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Most model round trips one query may take.
    pub max_rounds: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub options: GenerateOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 16,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            options: GenerateOptions::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(Error::Config("max_rounds must be at least 1".into()));
        }
        if self.model_timeout.is_zero() || self.tool_timeout.is_zero() {
            return Err(Error::Config("timeouts must be positive".into()));
        }
        self.options
            .validate()
            .map_err(|err| Error::Config(err.to_string()))
    }
}

/// Where a query is in its lifecycle.
#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    DispatchingTools,
    Done,
    Failed(Error),
}

impl LoopState {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::DispatchingTools => "dispatching_tools",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// Counters for one driven conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Model round trips taken.
    pub rounds: usize,
    pub usage: Usage,
}

/// A finished query.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub conversation: Conversation,
    pub stats: RunStats,
}

/// Runs queries against one model gateway and one tool host.
///
/// The tool catalog is fetched once on [`connect`](Agent::connect) and only
/// changes on [`refresh_catalog`](Agent::refresh_catalog).
pub struct Agent<G, H> {
    gateway: G,
    host: H,
    catalog: ToolCatalog,
    config: AgentConfig,
}

impl<G: ModelGateway, H: ToolHost> Agent<G, H> {
    /// Validate `config` and load the host's tool catalog.
    pub async fn connect(gateway: G, host: H, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let catalog = load_catalog(&host).await?;
        info!(tools = catalog.len(), "tool catalog loaded");
        Ok(Self {
            gateway,
            host,
            catalog,
            config,
        })
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Re-list the host's tools. The old catalog stays on failure.
    pub async fn refresh_catalog(&mut self) -> Result<()> {
        self.catalog = load_catalog(&self.host).await?;
        info!(tools = self.catalog.len(), "tool catalog refreshed");
        Ok(())
    }

    /// Answer one query in a fresh conversation.
    pub async fn run_query(&self, query: &str) -> Result<Answer> {
        let span = info_span!("query", id = %Uuid::new_v4());
        async move {
            info!(chars = query.len(), "query started");
            let mut conversation = Conversation::new(query);
            let stats = self.drive(&mut conversation).await?;
            let text = render_answer(conversation.turns());
            info!(
                rounds = stats.rounds,
                input_tokens = stats.usage.input_tokens,
                output_tokens = stats.usage.output_tokens,
                "query finished"
            );
            Ok(Answer {
                text,
                conversation,
                stats,
            })
        }
        .instrument(span)
        .await
    }

    /// Like [`run_query`](Agent::run_query), abandoned with
    /// [`Error::Cancelled`] as soon as `cancel` completes.
    ///
    /// In-flight model and tool calls are dropped. The MCP session skips
    /// their late responses, so the agent stays usable afterwards.
    pub async fn run_query_until<F>(&self, query: &str, cancel: F) -> Result<Answer>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            answer = self.run_query(query) => answer,
            () = cancel => {
                warn!("query cancelled");
                Err(Error::Cancelled)
            }
        }
    }

    /// Drive `conversation` until the model answers without tool requests.
    ///
    /// On failure the conversation keeps every turn appended so far; a round
    /// whose tools did not all succeed leaves no result turn behind.
    pub async fn drive(&self, conversation: &mut Conversation) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut state = LoopState::AwaitingModel;
        loop {
            let next = match state {
                LoopState::AwaitingModel => self
                    .await_model(conversation, &mut stats)
                    .await
                    .unwrap_or_else(LoopState::Failed),
                LoopState::DispatchingTools => self
                    .dispatch_tools(conversation, stats.rounds)
                    .await
                    .unwrap_or_else(LoopState::Failed),
                LoopState::Done => return Ok(stats),
                LoopState::Failed(err) => {
                    warn!(round = stats.rounds, error = %err, "query failed");
                    return Err(err);
                }
            };
            debug!(
                round = stats.rounds,
                turns = conversation.len(),
                state = next.name(),
                "loop transition"
            );
            state = next;
        }
    }

    async fn await_model(
        &self,
        conversation: &mut Conversation,
        stats: &mut RunStats,
    ) -> Result<LoopState> {
        stats.rounds += 1;
        let round = stats.rounds;
        let request = ModelRequest {
            turns: conversation.turns(),
            tools: self.catalog.specs(),
            options: &self.config.options,
        };

        let budget = self.config.model_timeout;
        let reply = match timeout(budget, self.gateway.generate(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(ModelError::Timeout(budget)),
        }
        .map_err(|source| Error::ModelService { round, source })?;

        stats.usage += reply.usage;
        conversation.push_assistant(&reply)?;

        if !reply.has_tool_requests() {
            return Ok(LoopState::Done);
        }
        if round >= self.config.max_rounds {
            return Err(Error::IterationLimitExceeded {
                limit: self.config.max_rounds,
            });
        }
        Ok(LoopState::DispatchingTools)
    }

    async fn dispatch_tools(
        &self,
        conversation: &mut Conversation,
        round: usize,
    ) -> Result<LoopState> {
        let calls: Vec<ToolInvocation> = conversation
            .pending_invocations()
            .into_iter()
            .cloned()
            .collect();

        if let Some(unknown) = calls.iter().find(|call| !self.catalog.contains(&call.name)) {
            return Err(Error::UnknownTool {
                name: unknown.name.clone(),
                round,
            });
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(self.invoke(call, round).await?);
        }

        conversation.push_tool_results(results)?;
        Ok(LoopState::AwaitingModel)
    }

    async fn invoke(&self, call: &ToolInvocation, round: usize) -> Result<ToolResult> {
        info!(tool = %call.name, id = %call.id, round, "calling tool");
        let budget = self.config.tool_timeout;
        let outcome = match timeout(budget, self.host.call_tool(call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout(budget.as_millis() as u64)),
        };

        let result = outcome.map_err(|err| tool_failure(err, &call.name, round))?;
        if result.is_error {
            debug!(tool = %call.name, "tool reported an error; forwarding to model");
        }
        if result.invocation_id != call.id {
            return Err(Error::Protocol(format!(
                "tool '{}' answered invocation '{}' instead of '{}'",
                call.name, result.invocation_id, call.id
            )));
        }
        Ok(result)
    }
}

async fn load_catalog<H: ToolHost>(host: &H) -> Result<ToolCatalog> {
    let specs = host.list_tools().await.map_err(discovery_failure)?;
    ToolCatalog::new(specs).map_err(discovery_failure)
}

fn discovery_failure(err: ToolError) -> Error {
    match err {
        ToolError::Protocol(message) => Error::Protocol(message),
        other => Error::Transport {
            tool: None,
            round: 0,
            message: other.to_string(),
        },
    }
}

fn tool_failure(err: ToolError, tool: &str, round: usize) -> Error {
    match err {
        ToolError::NotFound(name) => Error::UnknownTool { name, round },
        ToolError::Protocol(message) => Error::Protocol(format!("tool '{tool}': {message}")),
        other => Error::Transport {
            tool: Some(tool.to_string()),
            round,
            message: other.to_string(),
        },
    }
}
