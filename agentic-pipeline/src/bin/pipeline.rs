use agentic_pipeline::phases;
use agentic_pipeline::pipeline::{self, PipelineArgs};
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = PipelineArgs::parse();
    phases::finish(pipeline::run(args).await);
}
