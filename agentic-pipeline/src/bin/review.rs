use agentic_pipeline::phases::{self, PhaseArgs};
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = PhaseArgs::parse();
    phases::finish(phases::review::run(args).await);
}
