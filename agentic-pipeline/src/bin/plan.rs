use agentic_pipeline::phases::{self, PhaseArgs};
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = PhaseArgs::parse();
    phases::finish(phases::plan::run(args).await);
}
