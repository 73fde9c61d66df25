// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use stepgraph::config::RuntimeConfig;
use stepgraph::memory::{
    CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, InMemoryKnowledgeStore,
};
use stepgraph::patterns::{chain, chat, crew, strategic, tools};
use stepgraph::workflow::loader::GraphLoader;
use stepgraph::workflow::{
    Collaborators, CompiledGraph, Delta, InvokeConfig, RunOutcome, State, StepRegistry,
    ToolRegistry,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override STEPGRAPH_MODEL
    #[arg(long, global = true)]
    model: Option<String>,

    /// Override STEPGRAPH_MAX_STEPS
    #[arg(long, global = true)]
    max_steps: Option<usize>,

    /// Override STEPGRAPH_CHECKPOINT_DIR
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan, evaluate, adapt if needed, then execute
    Strategic {
        #[arg(short, long)]
        topic: String,

        /// Thread id for checkpointing
        #[arg(long)]
        thread: Option<String>,

        /// Score every plan 3/10 so the adapt branch always runs
        #[arg(long)]
        force_adapt: bool,
    },
    /// Extract specs from text, then reshape them as JSON
    Chain {
        #[arg(short, long)]
        text: String,
    },
    /// One chat turn with long-term memory
    Chat {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        message: String,

        #[arg(long)]
        thread: String,
    },
    /// Search tool lookup followed by an answer
    Ask {
        #[arg(short, long)]
        question: String,

        /// Query for the search tool, defaults to the question
        #[arg(long)]
        query: Option<String>,
    },
    /// Researcher and writer agents produce a blog post
    Crew,
    /// Run a graph from a YAML definition
    Graph {
        #[arg(short, long)]
        file: PathBuf,

        /// Initial State fields as key=value; values parse as JSON when they can
        #[arg(short, long = "input", value_parser = parse_field)]
        inputs: Vec<(String, Value)>,

        #[arg(long)]
        thread: Option<String>,
    },
    /// Print the strategic graph as a Mermaid flowchart
    Describe,
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = RuntimeConfig::from_env()?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if args.checkpoint_dir.is_some() {
        config.checkpoint_dir = args.checkpoint_dir;
    }

    let checkpointer = checkpoint_store(&config).await?;

    match args.command {
        Commands::Strategic {
            topic,
            thread,
            force_adapt,
        } => {
            let ctx = model_context(&config)?;
            let assessor: Arc<dyn strategic::PlanAssessor> = if force_adapt {
                Arc::new(strategic::FixedAssessor::new(3))
            } else {
                Arc::new(strategic::ModelAssessor::new())
            };
            let graph = prepare(strategic::strategic_graph(assessor)?, &config, &checkpointer);
            // resume input, so a new topic overrides a checkpointed one
            let mut invoke = InvokeConfig::new()
                .with_resume_input(Delta::new().set(strategic::TOPIC, topic.clone()));
            if let Some(thread) = thread {
                invoke = invoke.with_thread(thread);
            }

            println!("Running strategic executor on: {}", topic);
            let outcome = run(&graph, State::new(), &ctx, invoke).await?;
            if let Some(score) = outcome.state.get(strategic::PLAN_QUALITY_SCORE) {
                println!("Plan quality score: {}", score);
            }
            println!(
                "\n{}",
                outcome
                    .state
                    .get_str(strategic::FINAL_RESULT)
                    .unwrap_or_default()
            );
        }
        Commands::Chain { text } => {
            let ctx = model_context(&config)?;
            let graph = prepare(chain::spec_extraction_graph()?, &config, &checkpointer);
            let state = State::new().with("text_input", text);
            let outcome = run(&graph, state, &ctx, InvokeConfig::new()).await?;
            println!("{}", outcome.state.get_str("result").unwrap_or_default());
        }
        Commands::Chat {
            user,
            message,
            thread,
        } => {
            let ctx = model_context(&config)?
                .with_knowledge(Arc::new(InMemoryKnowledgeStore::new()));
            let graph = prepare(chat::chat_graph()?, &config, &checkpointer);
            let invoke = InvokeConfig::new()
                .with_thread(thread)
                .with_resume_input(Delta::new().set(chat::INPUT, message));
            let state = State::new().with(chat::USER_ID, user);
            let outcome = run(&graph, state, &ctx, invoke).await?;
            println!("{}", outcome.state.get_str(chat::REPLY).unwrap_or_default());
        }
        Commands::Ask { question, query } => {
            let ctx = model_context(&config)?.with_tools(search_tools().await);
            let graph = prepare(tools::tool_answer_graph()?, &config, &checkpointer);
            let query = query.unwrap_or_else(|| question.clone());
            let state = State::new().with("question", question).with("query", query);
            let outcome = run(&graph, state, &ctx, InvokeConfig::new()).await?;
            println!("{}", outcome.state.get_str("answer").unwrap_or_default());
        }
        Commands::Crew => {
            let ctx = model_context(&config)?;
            let graph = prepare(crew::blog_crew()?, &config, &checkpointer);
            let outcome = run(&graph, State::new(), &ctx, InvokeConfig::new()).await?;
            println!("{}", outcome.state.get_str("blog_post").unwrap_or_default());
        }
        Commands::Graph {
            file,
            inputs,
            thread,
        } => {
            let ctx = model_context(&config)?
                .with_tools(search_tools().await)
                .with_knowledge(Arc::new(InMemoryKnowledgeStore::new()));

            // max_steps comes from the definition here
            let graph = GraphLoader::new()
                .build_file(&file, &pattern_steps())?
                .with_checkpointer(checkpointer.clone());
            let state = inputs
                .into_iter()
                .fold(State::new(), |state, (key, value)| state.with(key, value));
            let mut invoke = InvokeConfig::new();
            if let Some(thread) = thread {
                invoke = invoke.with_thread(thread);
            }

            let outcome = run(&graph, state, &ctx, invoke).await?;
            println!("{}", serde_json::to_string_pretty(&outcome.state.to_json())?);
        }
        Commands::Describe => {
            let graph = strategic::strategic_graph(Arc::new(strategic::ModelAssessor::new()))?;
            println!("{}", graph.mermaid());
        }
    }

    Ok(())
}

fn model_context(config: &RuntimeConfig) -> Result<Collaborators> {
    let model = config.model_client().context("Model client unavailable")?;
    Ok(Collaborators::new().with_model(model))
}

async fn search_tools() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry
        .register(Arc::new(tools::search_information_tool()))
        .await;
    registry
}

/// Steps a YAML definition may name
fn pattern_steps() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register_step("plan", Arc::new(strategic::PlanStep));
    registry.register_step(
        "evaluate",
        Arc::new(strategic::EvaluateStep::new(Arc::new(
            strategic::ModelAssessor::new(),
        ))),
    );
    registry.register_step("adapt", Arc::new(strategic::AdaptStep));
    registry.register_step("execute", Arc::new(strategic::ExecuteStep));
    registry.register_step("load_memory", Arc::new(chat::LoadMemoryStep::default()));
    registry.register_step("chat", Arc::new(chat::ChatStep::default()));
    registry.register_step("remember", Arc::new(chat::RememberStep));
    registry.register_step(
        "search",
        Arc::new(tools::ToolStep::new(tools::SEARCH_TOOL, "search_result").arg("query", "query")),
    );
    registry
}

async fn checkpoint_store(config: &RuntimeConfig) -> Result<Arc<dyn CheckpointStore>> {
    Ok(match &config.checkpoint_dir {
        Some(dir) => {
            log::info!("Checkpoints stored in {}", dir.display());
            Arc::new(FileCheckpointStore::open(dir).await?)
        }
        None => Arc::new(InMemoryCheckpointStore::new()),
    })
}

fn prepare(
    graph: CompiledGraph,
    config: &RuntimeConfig,
    checkpointer: &Arc<dyn CheckpointStore>,
) -> CompiledGraph {
    graph
        .with_max_steps(config.max_steps)
        .with_checkpointer(checkpointer.clone())
}

async fn run(
    graph: &CompiledGraph,
    state: State,
    ctx: &Collaborators,
    invoke: InvokeConfig,
) -> Result<RunOutcome> {
    match graph.invoke(state, ctx, invoke).await {
        Ok(outcome) => {
            log::info!(
                "Graph '{}' finished via {}",
                graph.name(),
                outcome.visited.join(" -> ")
            );
            Ok(outcome)
        }
        Err(e) => {
            log::error!("Graph '{}' failed: {}", graph.name(), e);
            Err(anyhow!("{} [{}]", e, e.kind()))
        }
    }
}
