pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod services;
pub mod shell;
pub mod store;

use cli::Args;
use error::BoxError;
use log::info;
use server::Server;
use shell::Shell;

pub async fn run(args: Args) -> Result<(), BoxError> {
    info!("--- Core Configuration ---");
    info!("Model: {}", args.model);
    info!("Gemini Base URL: {}", args.base_url);
    info!("Chat Temperature: {}", args.chat_temperature);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Address: {}", args.http_addr);
    info!("Max Upload Bytes: {}", args.max_upload_bytes);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let shell = Shell::from_args(&args)?;
    let server = Server::new(shell, args);
    server.run().await
}
