//! CLI command implementations
//!
//! Every command loads the configuration and boots the router the same way;
//! `serve` then hosts it, `check` stops after boot, `routes` prints the table.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::http_server::HttpServer;
use crate::observability::{init_logging, Event};
use crate::router::Router;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(&config, port),
        Command::Check { config } => check(&config),
        Command::Routes { config } => routes(&config),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Load configuration and build the router inside `rt`
/// Load the configuration, then install logging in the format it names
fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    init_logging(config.log_format);
    info!(
        event = %Event::ConfigLoaded,
        path = %config_path.display(),
        adapters = config.adapters.len(),
        routes = config.routes.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn boot(config: &Config, rt: &tokio::runtime::Runtime) -> CliResult<Router> {
    info!(event = %Event::BootStart, "booting");
    let _guard = rt.enter();
    let router = config.build_router()?;
    info!(
        event = %Event::BootComplete,
        routes = router.routes().len(),
        "boot complete"
    );
    Ok(router)
}

/// Boot and serve HTTP until the process is stopped
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = load_config(config_path)?;

    if let Some(port) = port {
        config.server.port = port;
    }

    let rt = runtime()?;
    let router = boot(&config, &rt)?;
    let server = HttpServer::with_config(Arc::new(router), config.server.clone());

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::serve_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Run every boot check without serving
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;

    let rt = runtime()?;
    let router = boot(&config, &rt)?;
    println!("OK: {} route(s) compiled", router.routes().len());
    Ok(())
}

/// Print the compiled route table
pub fn routes(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;

    let rt = runtime()?;
    let router = boot(&config, &rt)?;
    print!("{}", route_table(&router));
    Ok(())
}

/// One line per route in declaration order:
/// method, path, captures, adapter, whether `auth` is read
pub fn route_table(router: &Router) -> String {
    let mut out = String::new();
    for route in router.routes() {
        let captures = if route.capture_names.is_empty() {
            "-".to_string()
        } else {
            route.capture_names.join(",")
        };
        out.push_str(&format!(
            "{:<7} {:<32} captures={:<16} adapter={:<12} auth={}\n",
            route.method,
            route.original_path,
            captures,
            router.adapter_name(route).unwrap_or("?"),
            if route.uses_auth { "yes" } else { "no" },
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    const CONFIG: &str = r#"{
        "adapters": { "docs": { "kind": "memory" } },
        "routes": [
            { "method": "get", "path": "/notes", "query": { "collection": "notes", "operation": "find" } },
            { "method": "GET", "path": "/notes/{id}",
              "query": { "collection": "notes", "operation": "findOne", "filter": { "_id": "${{ path.id }}" } },
              "returns": "/0" }
        ]
    }"#;

    #[test]
    fn test_check_ok() {
        let file = config_file(CONFIG);
        check(file.path()).unwrap();
    }

    #[test]
    fn test_load_config_installs_logging() {
        let file = config_file(CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.routes.len(), 2);
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_check_fails_on_bad_template() {
        let file = config_file(&CONFIG.replace("\"find\"", "\"explode\""));
        let err = check(file.path()).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_BOOT_FAILED");
        assert!(err.message().contains("VALIDATION_ERROR"));
    }

    #[test]
    fn test_route_table_in_declaration_order() {
        let config = Config::from_json(CONFIG).unwrap();
        let rt = runtime().unwrap();
        let router = boot(&config, &rt).unwrap();
        let table = route_table(&router);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("GET     /notes "));
        assert!(lines[0].contains("captures=-"));
        assert!(lines[1].contains("captures=id"));
        assert!(lines[1].contains("adapter=docs"));
        assert!(lines[1].ends_with("auth=no"));
    }
}
