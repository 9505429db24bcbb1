use std::fs;

use clap::Parser;

/// Writes the OpenAPI document the server would serve.
#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "/tmp/agency-crm-openapi.json")]
    out: String,
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let doc = agency_crm::docs::build_openapi(args.port)?;
    let s = serde_json::to_string_pretty(&doc)?;
    fs::write(&args.out, s)?;
    println!("wrote {}", args.out);
    Ok(())
}
