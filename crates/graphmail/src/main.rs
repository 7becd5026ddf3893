//! `graphmail` - send mail through Microsoft Graph from the command line.
//!
//! Configuration comes from `GRAPHMAIL_*` environment variables.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "graphmail", version, about = "Send mail through Microsoft Graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the authorization code flow and store the resulting token
    Authorize {
        /// Print the URL without opening a browser
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Send one message
    Send(SendArgs),
    /// Render a `{{key}}` template file and send it as HTML
    SendTemplate(TemplateArgs),
    /// Send the same message to each recipient separately
    Bulk(BulkArgs),
    /// Show the cached token state
    TokenInfo,
    /// Delete the stored token
    ClearTokens,
}

#[derive(Debug, Args)]
struct SendArgs {
    /// Recipient address (repeatable)
    #[arg(long, required = true)]
    to: Vec<String>,
    #[arg(long)]
    subject: String,
    /// Body text
    #[arg(long, conflicts_with = "body_file", required_unless_present = "body_file")]
    body: Option<String>,
    /// Read the body from a file
    #[arg(long)]
    body_file: Option<PathBuf>,
    /// Send the body as HTML
    #[arg(long, default_value_t = false)]
    html: bool,
    #[arg(long)]
    cc: Vec<String>,
    #[arg(long)]
    bcc: Vec<String>,
    /// File to attach (repeatable)
    #[arg(long)]
    attach: Vec<PathBuf>,
    /// Sender address, overriding GRAPHMAIL_FROM_ADDRESS
    #[arg(long)]
    from: Option<String>,
    /// Sender display name
    #[arg(long, requires = "from")]
    from_name: Option<String>,
}

#[derive(Debug, Args)]
struct TemplateArgs {
    #[arg(long, required = true)]
    to: Vec<String>,
    #[arg(long)]
    subject: String,
    /// Template file with `{{key}}` placeholders
    #[arg(long)]
    template: PathBuf,
    /// Placeholder value as key=value (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

#[derive(Debug, Args)]
struct BulkArgs {
    #[arg(long, required = true)]
    to: Vec<String>,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    body: String,
    #[arg(long, default_value_t = false)]
    html: bool,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "graphmail=info,graphmail_core=info,graphmail_oauth=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    commands::dispatch(cli).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("name=Ann Lee").unwrap(),
            ("name".to_string(), "Ann Lee".to_string())
        );
        assert_eq!(parse_var("url=a=b").unwrap().1, "a=b");
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_send_requires_body() {
        let parsed = Cli::try_parse_from(["graphmail", "send", "--to", "a@contoso.com", "--subject", "s"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "graphmail", "send", "--to", "a@contoso.com", "--to", "b@contoso.com",
            "--subject", "s", "--body", "hi", "--html",
        ])
        .unwrap();
        match parsed.command {
            Commands::Send(args) => {
                assert_eq!(args.to.len(), 2);
                assert!(args.html);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
