use std::sync::Arc;

use anyhow::Context;
use poise::serenity_prelude::{self as serenity, ActivityData};
use tokio::sync::Mutex;
use tracing::*;

use sotd_common::{cli, cli::Commands, prelude::*};
use sotd_storage::prelude::*;

use crate::catalog::{spotify::SpotifyClient, Catalog};
use crate::discord::commands::sotd;
use crate::healthchecks::perform_healthchecks;
use crate::job::{job_scheduler, Job};

mod catalog;
mod discord;
mod healthchecks;
mod job;

pub struct ServerData {
    pub store: Arc<Mutex<Store>>,
    pub catalog: Arc<dyn Catalog>,
    pub config: SotdConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = cli::Args::parse();
    let config_file_path = args.config;

    event!(Level::DEBUG, %config_file_path, "Reading configuration");
    // Load application config
    let config = SotdConfig::from_env_and_file(&config_file_path)
        .with_context(|| format!("Error reading configuration from {}", config_file_path))?;

    if let Some(Commands::Healthcheck) = args.command {
        let checks_output = perform_healthchecks(&config).await?;
        println!("{}", checks_output);
        return Ok(());
    }

    // Store setup
    event!(Level::DEBUG, data_file = %config.data_file, "Loading song store");
    let store = Arc::new(Mutex::new(
        Store::load(&config.data_file).with_context(|| "Error loading the song store")?,
    ));

    let catalog: Arc<dyn Catalog> = Arc::new(SpotifyClient::new(&config));

    // Discord setup
    event!(Level::DEBUG, "Discord client setup");

    let server_data = ServerData { store: store.clone(), catalog, config: config.clone() };
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![sotd()],
            on_error: |error| Box::pin(discord::on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            ctx.set_activity(Some(ActivityData::listening("the song of the day")));
            info!("Logged in as {}", ready.user.name);

            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands)
                    .await
                    .with_context(|| "Error registering commands")?;

                Ok(server_data)
            })
        })
        .build();

    // Set up background scheduling
    event!(Level::INFO, "Setting up background jobs");
    let jobs: Vec<Box<dyn Job>> = vec![discord::jobs::daily_song()];

    let token = config.discord_token.as_str();
    let intents = serenity::GatewayIntents::non_privileged();
    let mut discord_client = serenity::ClientBuilder::new(token, intents).framework(framework).await?;
    let http_client = Arc::new(serenity::HttpBuilder::new(token).build());

    let (discord_result, scheduler_result) = tokio::join!(
        discord_client.start_autosharded(),
        job_scheduler(&config, &jobs, store, http_client)
    );

    if let Err(scheduler_err) = scheduler_result {
        event!(Level::ERROR, "{:?}", &scheduler_err);
    }

    if let Err(discord_error) = discord_result {
        event!(Level::ERROR, "{:?}", &discord_error);
    }

    Ok(())
}
