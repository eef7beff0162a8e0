use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Restaurant export, a JSON file path or an http(s) URL
    source: String,

    #[arg(short, long, default_value = bank::CATALOG_PATH)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    process::load_restaurants(&args.source, &args.output).await?;

    Ok(())
}
