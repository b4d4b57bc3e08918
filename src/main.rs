use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "label-audit",
    version,
    about = "Check alcohol label images against their application documents"
)]
struct Cli {
    /// Application document (pdf/docx/doc/txt/image); repeatable
    #[arg(short = 'a', long = "app", required = true)]
    apps: Vec<String>,

    /// Label image to verify; repeatable. Without labels the ingested library is printed
    #[arg(short = 'l', long = "label")]
    labels: Vec<String>,

    /// Mime type for --app (auto, image, pdf, doc, docx, txt)
    #[arg(long = "app-mime")]
    app_mime: Option<String>,

    /// Force the beverage category of every result (spirits, wine, beer)
    #[arg(long = "category")]
    category: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    label_audit::logging::init(cli.verbose)?;

    let output = label_audit::run(label_audit::Config {
        apps: cli.apps,
        labels: cli.labels,
        app_mime: cli.app_mime,
        category: cli.category,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
