//! Song list pages and the reaction driven session that flips through them.

use std::time::Duration;

use anyhow::Result;
use poise::serenity_prelude as serenity;
use tracing::{event, Level};

use sotd_storage::prelude::Song;

pub const PAGE_SIZE: usize = 15;
/// Navigation stops after this long without a reaction.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

const LIST_COLOUR: u32 = 0x1DB954;
const PREVIOUS: &str = "⬅️";
const NEXT: &str = "➡️";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTurn {
    Previous,
    Next,
}

impl PageTurn {
    pub fn from_emoji(emoji: &serenity::ReactionType) -> Option<Self> {
        let serenity::ReactionType::Unicode(emoji) = emoji else {
            return None;
        };

        // clients don't always send the variation selector
        match emoji.trim_end_matches('\u{fe0f}') {
            e if e == PREVIOUS.trim_end_matches('\u{fe0f}') => Some(Self::Previous),
            e if e == NEXT.trim_end_matches('\u{fe0f}') => Some(Self::Next),
            _ => None,
        }
    }

    fn reaction(&self) -> serenity::ReactionType {
        let emoji = match self {
            Self::Previous => PREVIOUS,
            Self::Next => NEXT,
        };

        serenity::ReactionType::Unicode(emoji.to_string())
    }
}

/// A song list split into fixed size pages, with a current page.
#[derive(Debug, Clone)]
pub struct SongPages {
    songs: Vec<Song>,
    page_size: usize,
    current: usize,
}

impl SongPages {
    pub fn new(songs: Vec<Song>, page_size: usize) -> Self {
        Self { songs, page_size: page_size.max(1), current: 0 }
    }

    pub fn page_count(&self) -> usize {
        self.songs.len().div_ceil(self.page_size)
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_songs(&self) -> &[Song] {
        self.songs.chunks(self.page_size).nth(self.current).unwrap_or(&[])
    }

    /// Move one page. Returns `false` when already at the first or last page.
    pub fn turn(&mut self, turn: PageTurn) -> bool {
        match turn {
            PageTurn::Previous if self.current > 0 => self.current -= 1,
            PageTurn::Next if self.current + 1 < self.page_count() => self.current += 1,
            _ => return false,
        }

        true
    }

    pub fn page_text(&self) -> String {
        self.current_songs()
            .iter()
            .enumerate()
            .map(|(i, song)| format!("{}. [{}]({})", i + 1, song.name, song.url))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn footer(&self) -> String {
        format!("Page {} of {}", self.current + 1, self.page_count())
    }

    pub fn embed(&self) -> serenity::CreateEmbed {
        serenity::CreateEmbed::new()
            .title("🎶 Song List")
            .description(self.page_text())
            .colour(serenity::Colour::new(LIST_COLOUR))
            .footer(serenity::CreateEmbedFooter::new(self.footer()))
    }
}

/// Lets the user who asked for the list flip its pages with reactions.
///
/// The session is bound to one message and ends once nobody reacted for [PAGE_TIMEOUT].
pub struct PaginationSession {
    message: serenity::Message,
    invoker: serenity::UserId,
    pages: SongPages,
    timeout: Duration,
}

impl PaginationSession {
    pub fn new(message: serenity::Message, invoker: serenity::UserId, pages: SongPages) -> Self {
        Self { message, invoker, pages, timeout: PAGE_TIMEOUT }
    }

    pub async fn run(mut self, ctx: &serenity::Context) -> Result<()> {
        if self.pages.page_count() < 2 {
            return Ok(());
        }

        for turn in [PageTurn::Previous, PageTurn::Next] {
            self.message.react(ctx, turn.reaction()).await?;
        }

        while let Some(reaction) = self
            .message
            .await_reaction(ctx)
            .author_id(self.invoker)
            .filter(|reaction| PageTurn::from_emoji(&reaction.emoji).is_some())
            .timeout(self.timeout)
            .await
        {
            let Some(turn) = PageTurn::from_emoji(&reaction.emoji) else {
                continue;
            };

            if self.pages.turn(turn) {
                self.message
                    .edit(ctx, serenity::EditMessage::new().embed(self.pages.embed()))
                    .await?;
            }

            if let Err(error) = reaction.delete(ctx).await {
                event!(Level::DEBUG, %error, "Could not remove the navigation reaction");
            }
        }

        event!(Level::TRACE, message_id = %self.message.id, "Pagination session ended");

        Ok(())
    }
}
