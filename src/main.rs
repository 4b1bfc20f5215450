use clap::Parser;
use dotenv::dotenv;
use log::error;
use roomcast::cli::Args;
use roomcast::error::BoxError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.api_key.trim().is_empty() {
        error!("API_KEY environment variable not set");
        return Err("API_KEY environment variable not set".into());
    }

    roomcast::run(args).await
}
