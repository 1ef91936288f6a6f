use agentic_pipeline::phases::{self, PhaseArgs};
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    phase: PhaseArgs,

    /// Cap on repair iterations before the run is declared failed
    #[arg(long, value_name = "N")]
    max_repairs: Option<u32>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    phases::finish(phases::repair::run(args.phase, args.max_repairs).await);
}
