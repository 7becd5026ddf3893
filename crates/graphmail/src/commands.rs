use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use graphmail_core::{Attachment, EmailService, OutgoingMessage, RedirectParams, Sender};

use crate::{BulkArgs, Cli, Commands, SendArgs, TemplateArgs};

pub async fn dispatch(cli: Cli) -> Result<()> {
    let service = EmailService::from_env()
        .await
        .context("initialise mail service from GRAPHMAIL_* environment")?;

    match cli.command {
        Commands::Authorize { no_browser } => authorize(&service, no_browser).await,
        Commands::Send(args) => send(&service, args).await,
        Commands::SendTemplate(args) => send_template(&service, args).await,
        Commands::Bulk(args) => bulk(&service, args).await,
        Commands::TokenInfo => {
            let info = service.token_info().await;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Commands::ClearTokens => {
            service.clear_tokens().await;
            println!("Stored tokens cleared");
            Ok(())
        }
    }
}

async fn authorize(service: &EmailService, no_browser: bool) -> Result<()> {
    let pending = service
        .authorization_url(None)
        .context("build authorization URL")?;

    println!("Open this URL to grant access:\n\n  {}\n", pending.url);
    if !no_browser {
        if let Err(e) = opener::open(pending.url.as_str()) {
            warn!("Could not open browser: {e}");
        }
    }

    println!("Paste the full redirect URL:");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read redirect URL")?;

    let redirect = RedirectParams::parse(&line).context("parse redirect URL")?;
    let credential = service
        .exchange_code_for_token(&pending, &redirect.code, &redirect.state)
        .await
        .context("exchange authorization code")?;

    println!("Authorized; token valid until {}", credential.expires_at);
    Ok(())
}

async fn send(service: &EmailService, args: SendArgs) -> Result<()> {
    let body = match (args.body, args.body_file) {
        (Some(body), _) => body,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read body from {}", path.display()))?,
        (None, None) => bail!("either --body or --body-file is required"),
    };

    let mut message = OutgoingMessage::new(args.subject, body).html(args.html);
    message.to = args.to;
    message.cc = args.cc;
    message.bcc = args.bcc;
    if let Some(address) = args.from {
        let mut sender = Sender::new(address);
        sender.name = args.from_name;
        message = message.from(sender);
    }
    for path in &args.attach {
        let attachment = Attachment::from_path(path)
            .await
            .with_context(|| format!("read attachment {}", path.display()))?;
        message = message.attach(attachment);
    }

    service.send_email(message).await.context("send message")?;
    println!("Message sent");
    Ok(())
}

async fn send_template(service: &EmailService, args: TemplateArgs) -> Result<()> {
    let template = tokio::fs::read_to_string(&args.template)
        .await
        .with_context(|| format!("read template {}", args.template.display()))?;
    let data: HashMap<String, String> = args.vars.into_iter().collect();

    let mut message = OutgoingMessage::new(args.subject, template);
    message.to = args.to;

    service
        .send_template_email(message, &data)
        .await
        .context("send templated message")?;
    println!("Message sent");
    Ok(())
}

async fn bulk(service: &EmailService, args: BulkArgs) -> Result<()> {
    let report = service
        .send_bulk_email(&args.to, &args.subject, &args.body, args.html)
        .await;

    for (recipient, error) in &report.failures {
        eprintln!("{recipient}: {error}");
    }
    info!(
        "Sent {} of {} messages",
        report.succeeded(),
        report.attempted
    );

    if !report.all_succeeded() {
        bail!(
            "{} of {} sends failed",
            report.failures.len(),
            report.attempted
        );
    }
    Ok(())
}
