use std::sync::Arc;

use futures::StreamExt;

use listing_wizard::channels::{parse_input, Channel, CliChannel, OutgoingResponse};
use listing_wizard::config::WizardConfig;
use listing_wizard::wizard::{
    spawn_expiry_task, BranchPlanner, InboundEvent, SessionId, StepCatalog, TemplateSet,
    WizardReply, WizardService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WizardConfig::from_env()?;

    let catalog = match config.catalog_path.as_deref() {
        Some(path) => StepCatalog::load(path)?,
        None => StepCatalog::listing()?,
    };

    eprintln!("📋 Listing Wizard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Steps: {}", catalog.order().len());
    eprintln!("   Language: {}", config.default_language);
    eprintln!("   Idle timeout: {}s", config.idle_timeout.as_secs());
    eprintln!("   Commands: /start /skip /back /cancel\n");

    let service = WizardService::new(
        Arc::new(catalog),
        Arc::new(BranchPlanner::listing()),
        Arc::new(TemplateSet::builtin()),
        config,
    )?;
    let _expiry_handle = spawn_expiry_task(Arc::clone(&service));

    // Fresh conversation identity per local run
    let channel = CliChannel::new(format!("local-{}", uuid::Uuid::new_v4()));
    let mut messages = channel.start().await?;

    while let Some(msg) = messages.next().await {
        let session = SessionId::new(format!("{}:{}", msg.channel, msg.sender));
        let current = service.current(&session).await;
        let input = parse_input(current.as_ref(), &msg.content);

        let mut event = InboundEvent::new(session, input);
        if let Some(language) = msg.language.clone() {
            event = event.with_language(language);
        }

        let text = match service.handle(event).await {
            WizardReply::Prompt { label, notice, .. } => match notice {
                Some(notice) => format!("⚠️  {notice}\n{label}"),
                None => label,
            },
            WizardReply::Completed { answers } => {
                let summary = serde_json::to_string_pretty(&answers)?;
                format!("✅ Listing registered:\n{summary}")
            }
            WizardReply::Aborted { message } | WizardReply::Finished { message } => message,
        };
        channel.respond(&msg, OutgoingResponse::text(text)).await?;
    }

    channel.shutdown().await?;
    Ok(())
}
