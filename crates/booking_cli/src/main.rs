//! Entry point of `slot-booker`.

use std::process::ExitCode;

use booking_cli::*;
use clap::Parser;
use contact_store::ContactStore;

async fn run(cli: Cli, interrupts: &Interrupts) -> anyhow::Result<()> {
    let settings = cli.settings();
    settings.validate()?;

    let ctx = RunContext::new(
        ContactStore::new(cli.contact_file()),
        engine_config_from_env(&settings, cli.selection()),
    );
    log::info!("📁 Contact data file: {}", ctx.store.path().display());

    let mut prompter = StdinPrompter;
    match cli.command() {
        Some(command) => {
            let mut stop = interrupts.arm();
            execute(command, settings, &ctx, &mut prompter, &mut stop).await?;
        }
        None => {
            let outcomes = Menu::new(settings)?
                .run(&ctx, &mut prompter, interrupts)
                .await?;
            log::info!("👋 {} command(s) completed", outcomes.len());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(cli.log_filter()));

    log::info!("🚀 Starting slot-booker...");

    let interrupts = Interrupts::new();
    let on_ctrl_c = interrupts.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !on_ctrl_c.interrupt() {
                std::process::exit(130);
            }
            log::warn!("🛑 Interrupt received, stopping... (press Ctrl-C again to exit)");
        }
    });

    match run(cli, &interrupts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("❌ {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
