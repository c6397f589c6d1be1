use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "moxy-cli")]
#[command(about = "Route administration client for a running moxy server", long_about = None)]
struct Cli {
    /// Base url of the moxy server.
    #[arg(short, long, default_value = "http://localhost:8080", env = "MOXY_URL")]
    url: String,

    /// Admin API key, when the server requires one.
    #[arg(short, long, env = "MOXY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the admin API capabilities
    Info,
    /// List registered route patterns
    Routes {
        #[arg(long)]
        once: bool,
    },
    /// Dump the route table
    Router {
        #[arg(long)]
        once: bool,
        /// Hide handler descriptions
        #[arg(long)]
        redact: bool,
    },
    /// Add a route (merges into an existing one)
    Add {
        path: String,
        /// Route config as JSON
        config: String,
        #[arg(long)]
        once: bool,
    },
    /// Create or replace a route
    Put { path: String, config: String },
    /// Update an existing route
    Patch { path: String, config: String },
    /// Delete a route
    Delete { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder().no_proxy().build()?;

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let admin = format!("{}/_moxy", cli.url.trim_end_matches('/'));

    let request = match cli.command {
        Commands::Info => client.get(&admin),
        Commands::Routes { once } => client
            .get(format!("{admin}/routes"))
            .query(&[("once", once.to_string())]),
        Commands::Router { once, redact } => client.get(format!("{admin}/router")).query(&[
            ("once", once.to_string()),
            ("serializeMethods", (!redact).to_string()),
        ]),
        Commands::Add { path, config, once } => {
            let config: Value = serde_json::from_str(&config)?;
            client
                .post(format!("{admin}/routes"))
                .query(&[("once", once.to_string())])
                .json(&json!({ "path": path, "config": config }))
        }
        Commands::Put { path, config } => {
            let config: Value = serde_json::from_str(&config)?;
            client.put(route_url(&admin, &path)?).json(&config)
        }
        Commands::Patch { path, config } => {
            let config: Value = serde_json::from_str(&config)?;
            client.patch(route_url(&admin, &path)?).json(&config)
        }
        Commands::Delete { path } => client.delete(route_url(&admin, &path)?),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

/// `/_moxy/routes/<path>` with each path segment percent-encoded.
fn route_url(admin: &str, path: &str) -> Result<url::Url, Box<dyn std::error::Error>> {
    let mut url = url::Url::parse(&format!("{admin}/routes"))?;
    url.path_segments_mut()
        .map_err(|_| "server url cannot carry a path")?
        .extend(path.trim_start_matches('/').split('/'));
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
