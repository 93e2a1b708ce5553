use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wikiwhatsthis_core::{
    source_for_base, Activation, BackgroundContext, DirectorySurface, DisplaySurface,
    ExtensionConfig, MenuRegistry, MessageRouter, PageContext, ProcessRuntime,
    ProcessRuntimeConfig, ResultPresenter, SearchResultSet, TabId,
};

const PAGE_TAB: TabId = TabId(1);

#[derive(Parser)]
#[command(name = "wikiwhatsthis", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Extension root: an http(s) URL or a directory that contains `models/`
    #[arg(long, env = "WWT_EXTENSION_BASE", default_value = "./extension")]
    extension_base: String,

    /// Interpreter that runs the ranking module
    #[arg(long, env = "WWT_INTERPRETER", default_value = "python3")]
    interpreter: String,

    /// Ranking module source file
    #[arg(long, env = "WWT_MODULE", default_value = "./extension/python/ranking.py")]
    module: PathBuf,

    /// Do not install the engine packages before loading the module
    #[arg(long, env = "WWT_SKIP_INSTALL", default_value_t = false)]
    skip_install: bool,

    /// Directory results windows are written to
    #[arg(long, env = "WWT_OUT_DIR", default_value = "./results")]
    out_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Load the models, then suggest articles for each selection.
    Suggest {
        /// Selected text, one activation per value.
        #[arg(required = true)]
        selections: Vec<String>,
    },
    /// Render a results window from a JSON result file.
    Render {
        /// File holding the engine's JSON result array.
        #[arg(long)]
        results: PathBuf,
        /// Query shown above the results.
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ExtensionConfig {
        extension_base: cli.extension_base.clone(),
        ..Default::default()
    };

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "wikiwhatsthis boot"
    );

    match cli.command {
        Command::Suggest { selections } => {
            let module_source = tokio::fs::read_to_string(&cli.module)
                .await
                .with_context(|| format!("reading ranking module {}", cli.module.display()))?;
            let runtime = ProcessRuntime::new(ProcessRuntimeConfig {
                interpreter: cli.interpreter,
                install_packages: !cli.skip_install,
                ..Default::default()
            });

            let (router, inbox) = MessageRouter::new();
            let router = Arc::new(router);
            let background = Arc::new(BackgroundContext::new(
                &config,
                source_for_base(&config.extension_base)?,
                runtime,
                MenuRegistry::new(),
                Arc::clone(&router),
                module_source,
            ));

            let page = Arc::new(PageContext::new(
                ResultPresenter::new(config.wiki_base_url.clone(), config.max_results),
                DirectorySurface::new(&cli.out_dir),
                config.results_window.clone(),
                config.asset_base_url(),
            ));
            let port = router.connect_page(PAGE_TAB);
            let page_task = {
                let page = Arc::clone(&page);
                tokio::spawn(async move { page.run(port).await })
            };

            let (activation_tx, activation_rx) = unbounded_channel();
            let readiness = background.readiness();
            let load = background.spawn_model_load();
            let background_task = tokio::spawn(Arc::clone(&background).run(inbox, activation_rx));

            load.await?
                .context("models did not load; suggestions are disabled")?;
            readiness.wait_context_menu_ready().await;

            for selection in selections {
                activation_tx.send(Activation::new(
                    config.menu_item.id.clone(),
                    selection,
                    PAGE_TAB,
                ))?;
            }
            drop(activation_tx);
            background_task.await?;

            router.disconnect_page(PAGE_TAB);
            page_task.await??;

            println!(
                "{} results window(s) written to {}",
                page.display().opened(),
                page.display().out_dir().display()
            );
        }
        Command::Render { results, query } => {
            let raw = tokio::fs::read_to_string(&results)
                .await
                .with_context(|| format!("reading {}", results.display()))?;
            let parsed: SearchResultSet = serde_json::from_str(&raw)
                .with_context(|| format!("parsing results in {}", results.display()))?;

            let presenter = ResultPresenter::new(config.wiki_base_url.clone(), config.max_results);
            let markup = presenter.render(&query, &parsed, &config.asset_base_url());

            let surface = DirectorySurface::new(&cli.out_dir);
            surface.open(&config.results_window, markup).await?;
            println!(
                "rendered {} of {} result(s) into {}",
                parsed.len().min(config.max_results),
                parsed.len(),
                surface.out_dir().display()
            );
        }
    }

    Ok(())
}
