use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kubelite::cli::{
    format_cluster_status, format_node_list, format_pod_detail, format_pod_list,
    format_validation_result, validate_config, ApiClient, Cli, Commands, CreateArgs,
    DeleteResource, GetResource, ServeArgs,
};
use kubelite::cluster::{PodManager, PodSpec};
use kubelite::config::{self, default_config_path, RuntimeKind};
use kubelite::runtime::{DockerCliRuntime, SharedRuntime, SimulatedRuntime};
use kubelite::server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => serve(cli.config.as_deref(), args).await,
        Commands::Create(args) => create(args).await,
        Commands::Get(args) => {
            let client = ApiClient::new(&args.server.server);
            match args.resource {
                GetResource::Pods { id: Some(id) } => {
                    print!("{}", format_pod_detail(&client.get_pod(&id).await?));
                }
                GetResource::Pods { id: None } => {
                    print!("{}", format_pod_list(&client.list_pods().await?));
                }
                GetResource::Nodes => {
                    print!("{}", format_node_list(&client.list_nodes().await?));
                }
            }
            Ok(())
        }
        Commands::Delete(args) => {
            let client = ApiClient::new(&args.server.server);
            match args.resource {
                DeleteResource::Pod { id } => {
                    client.delete_pod(&id).await?;
                    println!("pod \"{}\" deleted", id);
                }
            }
            Ok(())
        }
        Commands::Status(args) => {
            let status = ApiClient::new(&args.server).status().await?;
            print!("{}", format_cluster_status(&status));
            Ok(())
        }
        Commands::Validate(args) => {
            let path = args
                .file
                .or(cli.config)
                .unwrap_or_else(default_config_path);
            let result = validate_config(&path);
            print!("{}", format_validation_result(&result, &path.display().to_string()));
            if !result.valid {
                bail!("{} is invalid", path.display());
            }
            Ok(())
        }
    }
}

async fn create(args: CreateArgs) -> anyhow::Result<()> {
    let client = ApiClient::new(&args.server.server);
    let pod = client
        .create_pod(&PodSpec::new(args.name, args.image))
        .await?;
    println!(
        "pod \"{}\" created on {} ({})",
        pod.name,
        pod.node_name.as_deref().unwrap_or("<none>"),
        pod.id
    );
    Ok(())
}

async fn serve(config_path: Option<&Path>, args: ServeArgs) -> anyhow::Result<()> {
    // Load .env file if specified
    if let Some(ref env_file) = args.env_file {
        dotenvy::from_path(env_file)
            .with_context(|| format!("Failed to load env file {}", env_file.display()))?;
    }

    let mut config = config::load_or_default(config_path).context("Failed to load config")?;
    if let Some(bind_addr) = args.bind_addr {
        config.bind_addr = bind_addr;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(runtime) = args.runtime {
        config.runtime = runtime;
    }

    let runtime: SharedRuntime = match config.runtime {
        RuntimeKind::Docker => Arc::new(DockerCliRuntime::with_binary(&config.docker_binary)),
        RuntimeKind::Simulated => {
            warn!("Using the simulated runtime; no containers will be started");
            Arc::new(SimulatedRuntime::new())
        }
    };

    let nodes = config.node_registry()?;
    let manager = Arc::new(PodManager::new(nodes, runtime, config.lifecycle_config()));
    let app = create_router(AppState::from_shared(Arc::clone(&manager)));

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);
    info!(
        "Runtime: {}, nodes: {}, capacity: {}",
        manager.runtime_name(),
        config.nodes.len(),
        config.total_capacity()
    );
    info!("Endpoints:");
    info!("  POST   /v1/pods        - Create a pod");
    info!("  GET    /v1/pods        - List pods");
    info!("  DELETE /v1/pods/{{id}}   - Delete a pod");
    info!("  GET    /v1/nodes       - List nodes");
    info!("  GET    /health         - Health check");

    let shutdown_manager = Arc::clone(&manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            shutdown_manager.shutdown();
        })
        .await
        .context("Server error")?;

    let stats = manager.stats();
    if stats.pods > 0 {
        warn!(
            "Stopped with {} pod(s) still recorded; their containers keep running",
            stats.pods
        );
    }
    info!("kubelite stopped");
    Ok(())
}

