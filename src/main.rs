use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use ragchat::chat::ChatSession;
use ragchat::config::{load_config, Config};
use ragchat::embedding::{EmbeddingProvider, OpenAiEmbeddings};
use ragchat::index::VectorIndex;
use ragchat::llm::OpenAiLlm;
use ragchat::memory::ChatMemory;
use ragchat::retriever::Retriever;
use ragchat::synthesizer::Synthesizer;

/// Question answering over a local document corpus.
#[derive(Parser)]
#[command(name = "ragchat", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from the corpus directory
    Index {
        /// Rebuild even if a persisted index already exists
        #[arg(long)]
        rebuild: bool,
    },
    /// Start an interactive chat session
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show which chunks would be retrieved for a query, with scores
    Inspect {
        /// The query to inspect
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => bail!(
            "OPENAI_API_KEY is not set; export it before running \
             (e.g. `export OPENAI_API_KEY=sk-...`)"
        ),
    };

    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(OpenAiEmbeddings::new(&config.embedding, api_key.clone())?);

    match cli.command {
        Commands::Index { rebuild } => {
            if !rebuild && VectorIndex::store_exists(&config.index.dir) {
                bail!(
                    "an index already exists in {}; pass --rebuild to replace it",
                    config.index.dir.display()
                );
            }
            let index = ragchat::indexer::build_and_persist(&config, embeddings).await?;
            println!(
                "indexed {} chunks into {}",
                index.len(),
                config.index.dir.display()
            );
        }
        Commands::Chat => {
            let mut session = open_session(&config, embeddings, &api_key).await?;
            run_repl(&mut session).await?;
        }
        Commands::Ask { question } => {
            let mut session = open_session(&config, embeddings, &api_key).await?;
            let answer = session.chat(&question).await?;
            println!("{answer}");
        }
        Commands::Inspect { query } => {
            let index =
                VectorIndex::load(&config.index.dir, embeddings.model_name()).await?;
            let retriever =
                Retriever::new(Arc::new(index), embeddings, config.retrieval.top_k);
            print!("{}", retriever.debug_context(&query).await);
        }
    }

    Ok(())
}

async fn open_session(
    config: &Config,
    embeddings: Arc<dyn EmbeddingProvider>,
    api_key: &str,
) -> anyhow::Result<ChatSession> {
    let index = VectorIndex::load(&config.index.dir, embeddings.model_name())
        .await
        .context("loading the index (run `ragchat index` first)")?;

    let retriever = Retriever::new(Arc::new(index), embeddings, config.retrieval.top_k);
    let llm = Arc::new(OpenAiLlm::new(&config.llm, api_key)?);
    let synthesizer = Synthesizer::new(llm, config.llm.context_token_budget);
    let memory = ChatMemory::new(config.chat.history_token_budget);

    Ok(ChatSession::new(retriever, synthesizer, memory))
}

async fn run_repl(session: &mut ChatSession) -> anyhow::Result<()> {
    println!("ragchat — ask a question; `clear` resets history, `exit` quits");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }
        if question == "clear" {
            session.clear_history();
            println!("history cleared\n");
            continue;
        }

        // A failed turn is reported but never ends the session.
        match session.chat(question).await {
            Ok(answer) => println!("{answer}\n"),
            Err(e) => eprintln!("error: {e}\n"),
        }
    }

    Ok(())
}
