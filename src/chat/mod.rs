//! Serving commands over Discord.

use crate::{
    constants::MESSAGE_LENGTH_MAX,
    core::{Caller, Dispatcher, Reply},
    input::InputInjector,
    proc::ProcessController,
};
use serenity::{
    all::{
        ChannelId, Context, CurrentApplicationInfo, EventHandler, GatewayError, GatewayIntents,
        Message, Ready,
    },
    async_trait,
    http::Http,
};
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    /// The platform did not accept the token.
    InvalidToken,
    /// The bot lacks permission to read message content.
    IntentsNotEnabled,
    Serenity(serenity::Error),
}
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serenity(err) => Some(err),
            Error::InvalidToken | Error::IntentsNotEnabled => None,
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidToken => write!(
                f,
                "Discord rejected the bot token: check the {} environment variable",
                crate::constants::ENV_VARS_TOKEN[0]
            ),
            Error::IntentsNotEnabled => write!(
                f,
                "privileged intents are not enabled: enable 'Message Content Intent' in the Discord Developer Portal"
            ),
            Error::Serenity(_) => write!(f, "Discord client failed"),
        }
    }
}
impl From<serenity::Error> for Error {
    fn from(err: serenity::Error) -> Self {
        match err {
            serenity::Error::Gateway(GatewayError::InvalidAuthentication) => Self::InvalidToken,
            serenity::Error::Gateway(
                GatewayError::DisallowedGatewayIntents | GatewayError::InvalidGatewayIntents,
            ) => Self::IntentsNotEnabled,
            err => Self::Serenity(err),
        }
    }
}

/// Responses to a command go to the channel the command came from. Responses
/// longer than the platform allows are sent as several messages.
pub struct ChannelReply {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl Reply for ChannelReply {
    async fn send(&self, message: String) {
        for chunk in crate::util::split_message(&message, MESSAGE_LENGTH_MAX) {
            if let Err(err) = self.channel_id.say(&self.http, chunk).await {
                log::warn!("Cannot respond in channel {}: {err}", self.channel_id);
                return;
            }
        }
    }
}

struct Handler<P: ProcessController, K: InputInjector> {
    dispatcher: Arc<Dispatcher<P, K>>,
}

#[async_trait]
impl<P: ProcessController, K: InputInjector> EventHandler for Handler<P, K> {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        log::info!(
            "Bot is online as {}, listening for '{}' commands",
            ready.user.name,
            self.dispatcher.settings().command_prefix
        );
    }

    /// Serenity runs each event on a task of its own, so a long pipeline of
    /// one command does not hold up the others.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let caller: Caller = Caller {
            id: msg.author.id.get(),
            name: msg.author.name.clone(),
        };
        let reply: ChannelReply = ChannelReply {
            http: Arc::clone(&ctx.http),
            channel_id: msg.channel_id,
        };
        self.dispatcher
            .handle_message(&caller, &msg.content, &reply)
            .await;
    }
}

/// Connect to Discord and serve commands until the connection is closed for
/// good.
///
/// Without configured owners, the owners of the bot's Discord application
/// are looked up and used instead.
pub async fn run<P: ProcessController, K: InputInjector>(
    token: &str,
    mut dispatcher: Dispatcher<P, K>,
) -> Result<(), Error> {
    if dispatcher.settings().owners.is_empty() {
        let http: Http = Http::new(token);
        match http.get_current_application_info().await {
            Ok(info) => dispatcher.set_owners(application_owners(&info)),
            Err(err) => log::warn!(
                "Cannot look up the owners of the Discord application, \
                 owner-only commands are rejected for everyone: {err}"
            ),
        }
    }

    let intents: GatewayIntents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client: serenity::Client = serenity::Client::builder(token, intents)
        .event_handler(Handler {
            dispatcher: Arc::new(dispatcher),
        })
        .await?;

    log::info!("Connecting to Discord...");
    client.start().await?;
    return Ok(());
}

/// Members of the team owning the application, or else its sole owner.
fn application_owners(info: &CurrentApplicationInfo) -> Vec<u64> {
    let team: Option<Vec<u64>> = info.team.as_ref().map(|team| {
        team.members
            .iter()
            .map(|member| member.user.id.get())
            .collect()
    });
    let owner: Option<u64> = info.owner.as_ref().map(|user| user.id.get());
    return owner_ids(owner, team);
}

fn owner_ids(owner: Option<u64>, team: Option<Vec<u64>>) -> Vec<u64> {
    return match team {
        Some(members) if !members.is_empty() => members,
        _ => owner.into_iter().collect(),
    };
}
