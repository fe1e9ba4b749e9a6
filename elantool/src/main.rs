use anyhow::Result;

mod cli;
mod config;
mod serio_raw_impl;

#[tokio::main]
async fn main() -> Result<()> {
    cli::execute().await
}
