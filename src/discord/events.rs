// Event handlers for non-command Discord events: guild lifecycle and ready.

use crate::discord::commands::presence;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

/// Dispatch for gateway events the bot cares about.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!(name = %data_about_bot.user.name, "logged in");
            presence::on_ready(ctx);
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            // GuildCreate also fires for every guild at startup; only treat
            // genuinely new guilds as joins.
            if *is_new == Some(true) {
                tracing::info!(guild_id = guild.id.get(), name = %guild.name, "joined server");
                data.verification.register_server(guild.id.get()).await?;
                send_welcome(ctx, guild).await;
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // `unavailable` means an outage, not a removal
            if !incomplete.unavailable {
                tracing::info!(guild_id = incomplete.id.get(), "left server");
                data.verification.forget_server(incomplete.id.get()).await?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Getting-started embed posted on join: DM the admins, then drop the same
/// message in the first channel that will take it. All best-effort.
async fn send_welcome(ctx: &serenity::Context, guild: &serenity::Guild) {
    let embed = serenity::CreateEmbed::new()
        .title("Campus Auth Bot - Hello!")
        .description(
            "I am here to help you with your server's verification. To get \
             started, use the `/mod setup` command to pick an existing role as \
             the verification role. Once that is done, members can use the \
             `/auth` command to verify themselves and receive the role.",
        )
        .color(0x00FF00);

    for member in guild.members.values() {
        if member.user.bot {
            continue;
        }
        if guild.member_permissions(member).administrator() {
            let _ = member
                .user
                .direct_message(
                    &ctx.http,
                    serenity::CreateMessage::new().embed(embed.clone()),
                )
                .await;
        }
    }

    for channel in guild.channels.values() {
        if channel.kind != serenity::ChannelType::Text {
            continue;
        }
        if channel
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed.clone()))
            .await
            .is_ok()
        {
            break;
        }
    }
}
