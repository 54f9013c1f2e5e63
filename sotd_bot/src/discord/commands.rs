use anyhow::{anyhow, Result};
use poise::serenity_prelude as serenity;
use poise::CreateReply;
use tracing::{event, field, trace_span, Level};

use sotd_storage::prelude::*;

use crate::catalog::{find_songs, SearchKind};
use crate::discord::announcement::{Delivery, PendingPost, TEST_TITLE};
use crate::discord::pagination::{PaginationSession, SongPages, PAGE_SIZE};
use crate::discord::permissions::may_configure;
use crate::discord::Context;

const GREEN: u32 = 0x2ECC71;
const RED: u32 = 0xE74C3C;
const ORANGE: u32 = 0xE67E22;
const BLUE: u32 = 0x3498DB;

/// Embed descriptions are capped by Discord at 4096 characters.
const DESCRIPTION_LIMIT: usize = 4096;

/// Timezone offsets accepted by `setup`, in hours.
const TIMEZONE_RANGE: std::ops::RangeInclusive<i32> = -12..=14;

fn embed(title: &str, colour: u32) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new().title(title).colour(serenity::Colour::new(colour))
}

fn guild_id(ctx: &Context<'_>) -> Result<u64> {
    ctx.guild_id()
        .map(|guild_id| guild_id.get())
        .ok_or_else(|| anyhow!("Could not determine the guild id"))
}

/// Song of the day: curate a list of songs and get one posted every day.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("help", "showlist", "add", "configroles", "uninstall", "clearlist", "setup", "testpost", "debugtest"),
    subcommand_required
)]
pub async fn sotd(_ctx: Context<'_>) -> Result<()> {
    Ok(())
}

/// Shows the list of available commands
#[poise::command(slash_command, guild_only)]
pub async fn help(ctx: Context<'_>) -> Result<()> {
    ctx.send(CreateReply::default().embed(help_embed())).await?;

    Ok(())
}

pub(crate) fn help_embed() -> serenity::CreateEmbed {
    embed("📖 Song of the Day - Commands", BLUE)
        .field(
            "🎵 **Adding Songs**",
            "`/sotd add track <name>`\n`/sotd add album <name>`\n`/sotd add artist <name>`\n`/sotd add playlist <name>`",
            false,
        )
        .field(
            "📜 **Viewing Songs**",
            "`/sotd showlist` - Shows all added songs\n`/sotd clearlist` - Clears all added songs",
            false,
        )
        .field(
            "⚙️ **Setup & Settings**",
            "`/sotd setup <time> <timezone> <#channel> <@role>` - Sets daily post time and ping role\n\
             `/sotd configroles @role1 @role2` - Chooses roles that can configure settings\n\
             `/sotd testpost` - Sends a test Song of the Day post\n\
             `/sotd debugtest` - Sends a message for testing purposes",
            false,
        )
        .field("🛑 **Uninstall**", "`/sotd uninstall` - Deletes all settings and songs", false)
        .footer(serenity::CreateEmbedFooter::new("Use /sotd before each command!"))
}

/// Shows the list of added songs
#[poise::command(slash_command, guild_only)]
pub async fn showlist(ctx: Context<'_>) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.showlist", guild_id);

    let songs = ctx.data().store.lock().await.server_mut(guild_id).songs.clone();

    if songs.is_empty() {
        ctx.say(":x: The song list is empty! Use `/sotd add` to add songs. 🎵").await?;
        return Ok(());
    }

    let pages = SongPages::new(songs, PAGE_SIZE);
    event!(parent: &span, Level::TRACE, pages = pages.page_count(), "Showing song list");

    let reply = ctx.send(CreateReply::default().embed(pages.embed())).await?;
    let message = reply.into_message().await?;

    PaginationSession::new(message, ctx.author().id, pages)
        .run(ctx.serenity_context())
        .await
}

/// Autocomplete renderer for the search types.
async fn autocomplete_search_type(
    _ctx: Context<'_>,
    partial: &str,
) -> impl Iterator<Item = String> {
    filter_search_types(partial).into_iter()
}

pub(crate) fn filter_search_types(partial: &str) -> Vec<String> {
    let lower = partial.trim().to_lowercase();

    SearchKind::ALL
        .into_iter()
        .filter(|kind| kind.as_str().starts_with(&lower))
        .map(|kind| kind.to_string())
        .collect()
}

/// Lists added song names for an embed, cut off before the description gets too long.
pub(crate) fn added_description(names: &[String]) -> String {
    let mut description = String::new();

    for (shown, name) in names.iter().enumerate() {
        let line = format!("🎵 **{}**\n", name);
        let rest = format!("…and {} more", names.len() - shown);

        if description.chars().count() + line.chars().count() + rest.chars().count() > DESCRIPTION_LIMIT {
            description.push_str(&rest);
            return description;
        }

        description.push_str(&line);
    }

    description.trim_end().to_string()
}

/// Adds a track, album, artist, or playlist
#[poise::command(slash_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[autocomplete = "autocomplete_search_type"]
    #[description = "Type of search (track, album, artist, playlist)"]
    search_type: String,
    #[description = "Search query"] search_query: String,
) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.add", guild_id, search_type = &search_type, added = field::Empty);

    let Ok(kind) = search_type.parse::<SearchKind>() else {
        event!(parent: &span, Level::DEBUG, "Invalid search type");
        ctx.say(":x: Invalid type! Use `track`, `album`, `playlist`, or `artist`. :thinking:").await?;
        return Ok(());
    };

    ctx.defer().await?;

    let catalog = ctx.data().catalog.clone();
    let Some(songs) = find_songs(catalog.as_ref(), kind, &search_query).await? else {
        ctx.say(":x: Couldn't find anything! :broken_heart:").await?;
        return Ok(());
    };

    let names: Vec<String> = songs.iter().map(|song| song.name.clone()).collect();
    span.record("added", names.len());

    ctx.data().store.lock().await.add_songs(guild_id, songs)?;
    event!(parent: &span, Level::DEBUG, "Added songs to the list");

    let reply = embed("✅ Songs Added!", GREEN).description(added_description(&names));
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}

/// Sets roles that can configure the bot
#[poise::command(slash_command, guild_only, check = "may_configure")]
pub async fn configroles(
    ctx: Context<'_>,
    #[description = "Role that can configure the bot"] role: serenity::Role,
    #[description = "Another role that can configure the bot"] role2: Option<serenity::Role>,
    #[description = "Another role that can configure the bot"] role3: Option<serenity::Role>,
    #[description = "Another role that can configure the bot"] role4: Option<serenity::Role>,
    #[description = "Another role that can configure the bot"] role5: Option<serenity::Role>,
) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.configroles", guild_id);

    let roles: Vec<u64> = [Some(role), role2, role3, role4, role5]
        .into_iter()
        .flatten()
        .map(|role| role.id.get())
        .collect();

    ctx.data().store.lock().await.set_config_roles(guild_id, roles.clone())?;
    event!(parent: &span, Level::DEBUG, ?roles, "Set configuration roles");

    let mentions = roles.iter().map(|id| format!("<@&{}>", id)).collect::<Vec<_>>().join("\n");
    let reply = embed("✅ Config Roles Set!", GREEN)
        .description(format!("These roles can now configure the bot:\n{}", mentions));
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}

/// Uninstalls the bot and deletes all data
#[poise::command(slash_command, guild_only)]
pub async fn uninstall(ctx: Context<'_>) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.uninstall", guild_id);

    let outcome = ctx.data().store.lock().await.uninstall(guild_id)?;
    event!(parent: &span, Level::DEBUG, ?outcome, "Uninstall requested");

    let reply = match outcome {
        UninstallOutcome::Uninstalled => {
            embed("🗑️ Bot uninstalled.", RED).description("All data for this server has been deleted.")
        }
        UninstallOutcome::NotInstalled => {
            embed("⚠️ Bot not installed.", ORANGE).description("There is no data to delete.")
        }
    };
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}

/// Clears all songs from the list
#[poise::command(slash_command, guild_only, check = "may_configure")]
pub async fn clearlist(ctx: Context<'_>) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.clearlist", guild_id);

    let outcome = ctx.data().store.lock().await.clear_songs(guild_id)?;
    event!(parent: &span, Level::DEBUG, ?outcome, "Clear requested");

    let reply = match outcome {
        ClearOutcome::AlreadyEmpty => {
            embed("⚠️ Song List is Already Empty!", ORANGE).description("There's nothing to clear...")
        }
        ClearOutcome::Cleared { .. } => {
            embed("🗑️ Song List Cleared!", RED).description("All songs have been removed. ✨")
        }
    };
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}

pub(crate) fn setup_summary(time: PostTime, offset: i32, channel_id: u64, role_id: u64, offset_applied: bool) -> String {
    let mut summary = format!(
        "**Time:** {} UTC{:+}\n**Channel:** <#{}>\n**Ping Role:** <@&{}>",
        time, offset, channel_id, role_id
    );

    if !offset_applied && offset != 0 {
        summary.push_str(&format!("\n*Posts go out at {} UTC, the offset is not applied.*", time));
    }

    summary
}

/// Sets up the daily song posting
#[poise::command(slash_command, guild_only, check = "may_configure")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Daily post time (HH:MM)"] daily_time: String,
    #[description = "Timezone offset"] timezone_offset: i32,
    #[description = "Channel to post in"]
    #[channel_types("Text")]
    channel: serenity::GuildChannel,
    #[description = "Role to ping"] ping_role: serenity::Role,
) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.setup", guild_id, daily_time = &daily_time, timezone_offset);

    let post_time = match daily_time.parse::<PostTime>() {
        Ok(post_time) => post_time,
        Err(error) => {
            event!(parent: &span, Level::DEBUG, %error, "Invalid post time");
            ctx.say(format!(":x: {}", error)).await?;
            return Ok(());
        }
    };

    if !TIMEZONE_RANGE.contains(&timezone_offset) {
        ctx.say(format!(
            ":x: The timezone offset must be between {} and {}.",
            TIMEZONE_RANGE.start(),
            TIMEZONE_RANGE.end()
        ))
        .await?;
        return Ok(());
    }

    ctx.data().store.lock().await.configure_schedule(
        guild_id,
        post_time,
        timezone_offset,
        channel.id.get(),
        ping_role.id.get(),
    )?;
    event!(parent: &span, Level::DEBUG, %post_time, "Configured daily post");

    let offset_applied = ctx.data().config.apply_timezone_offset;
    let reply = embed("✅ Setup Complete!", GREEN).description(setup_summary(
        post_time,
        timezone_offset,
        channel.id.get(),
        ping_role.id.get(),
        offset_applied,
    ));
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}

/// A random song of this server for a test post, and whether a post channel is configured.
pub(crate) fn pick_test_post(store: &Store, guild_id: u64) -> (Option<PendingPost>, bool) {
    match store.server(guild_id) {
        Some(settings) => (
            PendingPost::pick(guild_id, settings, &mut rand::rng()),
            settings.post_channel.is_some(),
        ),
        None => (None, false),
    }
}

/// Sends a test Song of the Day post
#[poise::command(slash_command, guild_only)]
pub async fn testpost(ctx: Context<'_>) -> Result<()> {
    let guild_id = guild_id(&ctx)?;
    let span = trace_span!("sotd.discord.testpost", guild_id);

    let (post, channel_set) = {
        let store = ctx.data().store.lock().await;
        pick_test_post(&store, guild_id)
    };

    let Some(post) = post else {
        let message = if channel_set {
            ":x: The song list is empty! Use `/sotd add` to add songs. 🎵"
        } else {
            ":x: No post channel is set up yet, use `/sotd setup` first."
        };
        ctx.send(CreateReply::default().content(message).ephemeral(true)).await?;
        return Ok(());
    };

    ctx.defer_ephemeral().await?;

    let delivery = post.deliver(ctx.http(), &ctx.data().store, TEST_TITLE).await?;
    event!(parent: &span, Level::DEBUG, ?delivery, song = %post.song.name, "Test post");

    let message = match delivery {
        Delivery::Sent => format!("Test post sent to <#{}>.", post.channel_id),
        Delivery::ChannelUnavailable => format!(":x: I can't reach <#{}>.", post.channel_id),
    };
    ctx.send(CreateReply::default().content(message).ephemeral(true)).await?;

    Ok(())
}

/// Sends a test message to check permissions and message sending
#[poise::command(slash_command, guild_only)]
pub async fn debugtest(ctx: Context<'_>) -> Result<()> {
    let reply = embed("🔧 Debug Test", ORANGE).description(
        "This is a test message to check permissions and message sending. I can text here! :tada:",
    );
    ctx.send(CreateReply::default().embed(reply)).await?;

    Ok(())
}
