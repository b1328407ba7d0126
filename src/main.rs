use clap::Parser;
use contract_ai::adapters::{McpClient, McpIntegratedRag};
use contract_ai::app::daily_agent::DailyAgent;
use contract_ai::app::ingest::{DocumentSource, IngestPipeline};
use contract_ai::app::rag::RagPipeline;
use contract_ai::app::similarity::SimilarityFinder;
use contract_ai::app::{runtime, server, setup};
use contract_ai::config::{AppConfig, Cli, Command};
use contract_ai::core::engine::IngestEngine;
use contract_ai::domain::model::QueryResult;
use contract_ai::utils::error::Result;
use contract_ai::utils::{logger, validation::Validate};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code().max(1));
        }
    };

    // 初始化日誌
    match &cli.command {
        Command::Serve { .. } => logger::init_server_logger(cli.verbose, config.server.json_logs),
        _ => logger::init_cli_logger(cli.verbose),
    }
    tracing::debug!("CLI arguments: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli.command, config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    match command {
        Command::Ingest { dir } => ingest(&config, dir.as_deref()).await,
        Command::Documents => list_documents(&config).await,
        Command::Ask {
            question,
            remote,
            document,
        } => ask(&config, &question, remote, document).await,
        Command::Similar { document, limit } => similar(&config, &document, limit).await,
        Command::Report { send } => report(&config, send).await,
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let state = runtime::server_state(config).await?;
            server::serve(state, &bind).await
        }
        Command::Setup { root } => {
            let report = setup::run_setup(&root)?;
            println!("{}", setup::next_steps(&report));
            println!("\nSetup completed successfully! 🎉");
            Ok(())
        }
    }
}

async fn ingest(config: &AppConfig, dir: Option<&std::path::Path>) -> Result<()> {
    let directory = runtime::documents_directory(config, dir).to_path_buf();
    let client = runtime::openai_client(config);
    let store = Arc::new(runtime::open_vector_store(config, client).await?);

    let pipeline = IngestPipeline::new(
        runtime::document_processor(config)?,
        DocumentSource::Directory(directory.clone()),
        store,
    );
    let engine = IngestEngine::new(pipeline);
    let summary = engine.run().await?;
    let skipped = engine.pipeline().skipped().await;

    println!(
        "✅ Processed {} documents into {} chunks from {}",
        summary.document_count,
        summary.chunk_count,
        directory.display()
    );
    for source in &summary.sources {
        println!("  • {}", source);
    }
    if !skipped.is_empty() {
        println!("⚠️ Skipped: {}", skipped.join(", "));
    }
    Ok(())
}

async fn list_documents(config: &AppConfig) -> Result<()> {
    let store = runtime::load_vector_store(config, runtime::openai_client(config)).await?;
    let sources = store.sources().await;

    println!(
        "📚 {} documents ({} chunks)",
        sources.len(),
        store.len().await
    );
    for source in sources {
        println!("  • {}", source);
    }
    Ok(())
}

async fn ask(
    config: &AppConfig,
    question: &str,
    remote: Option<String>,
    document: Option<String>,
) -> Result<()> {
    let filters: HashMap<String, String> = document
        .map(|d| HashMap::from([("source".to_string(), d)]))
        .unwrap_or_default();

    let result: QueryResult = match remote.or_else(|| config.mcp.base_url.clone()) {
        Some(base_url) => {
            tracing::debug!("Querying remote server at {}", base_url);
            let client = McpClient::new(&base_url, config.mcp.api_key.clone());
            McpIntegratedRag::new(client)
                .query_with_filters(question, filters)
                .await
        }
        None => {
            let client = runtime::openai_client(config);
            let store = runtime::load_vector_store(config, client.clone()).await?;
            let rag = RagPipeline::new(Arc::new(store), client).with_top_k(config.rag.top_k);
            rag.query_with_filters(question, &filters).await
        }
    };

    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!("\nSources:");
        for source in &result.sources {
            println!("  - {}", source);
        }
    }
    Ok(())
}

async fn similar(config: &AppConfig, document: &str, limit: usize) -> Result<()> {
    let store = runtime::load_vector_store(config, runtime::openai_client(config)).await?;
    let similar = SimilarityFinder::new(Arc::new(store))
        .find_similar(document, limit)
        .await?;

    if similar.is_empty() {
        println!("No other documents to compare with {}", document);
        return Ok(());
    }
    println!("Documents similar to {}:", document);
    for entry in similar {
        println!("  {:.3}  {}", entry.score, entry.document);
    }
    Ok(())
}

async fn report(config: &AppConfig, send: bool) -> Result<()> {
    let store = runtime::load_vector_store(config, runtime::openai_client(config)).await?;

    let mut email = config.email.clone();
    email.enabled = send || email.enabled;
    let mut agent = DailyAgent::new(Arc::new(store), runtime::report_storage(config), email.clone())
        .with_window_days(config.monitor.expiration_window_days);
    if email.enabled {
        agent = agent.with_mailer(runtime::mailer(config));
    }

    let outcome = agent
        .run_daily_check(chrono::Local::now().naive_local())
        .await?;

    println!("{}", outcome.rendered);
    for path in &outcome.saved {
        println!("💾 {}", path);
    }
    outcome.ensure_delivered(send)
}
