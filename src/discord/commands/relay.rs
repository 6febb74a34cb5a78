// Anonymous relay commands.

use crate::discord::{Data, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Mentionable;
use rand::Rng;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Submit an anonymous message to the relay channel.
#[poise::command(slash_command)]
pub async fn anon(
    ctx: Context<'_>,
    #[description = "Your anonymous message"] message: String,
    #[description = "Id of a relay message to reply to"] reply_to: Option<String>,
) -> Result<(), Error> {
    let user_id = ctx.author().id.get();

    if !ctx.data().relay.submit_allowed(user_id).await? {
        ctx.send(
            poise::CreateReply::default()
                .content(":x: You are banned from submitting anonymous messages.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let color: u32 = rand::thread_rng().gen_range(0x000000..=0xFFFFFF);
    let embed = serenity::CreateEmbed::new()
        .title("Anonymous Message")
        .description(&message)
        .color(color)
        .timestamp(serenity::Timestamp::now());

    let relay_channel = serenity::ChannelId::new(ctx.data().relay_channel_id);

    // Reply threading is best-effort: a bad or deleted id falls back to a
    // fresh message, matching how users expect the relay to behave.
    let mut builder = serenity::CreateMessage::new().embed(embed);
    if let Some(raw_id) = reply_to {
        if let Ok(message_id) = raw_id.trim().parse::<u64>() {
            if let Ok(target) = relay_channel
                .message(ctx.http(), serenity::MessageId::new(message_id))
                .await
            {
                builder = builder.reference_message(&target);
            }
        }
    }

    let sent = relay_channel.send_message(ctx.http(), builder).await?;

    ctx.send(
        poise::CreateReply::default()
            .content(":white_check_mark: Your anonymous message has been submitted.")
            .ephemeral(true),
    )
    .await?;

    ctx.data()
        .relay
        .record_post(user_id, sent.id.get(), Utc::now().timestamp())
        .await?;

    Ok(())
}

/// Ban a user from submitting anonymous messages.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn anonban(
    ctx: Context<'_>,
    #[description = "User to ban from the relay"] user: serenity::User,
) -> Result<(), Error> {
    ctx.data().relay.ban_user(user.id.get()).await?;
    tracing::info!(user_id = user.id.get(), "relay ban");

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "{} has been banned from submitting anonymous messages.",
                user.mention()
            ))
            .ephemeral(true),
    )
    .await?;

    // DMs can be closed; the ban stands either way
    let _ = user
        .direct_message(
            ctx.http(),
            serenity::CreateMessage::new()
                .content("You have been banned from submitting anonymous messages."),
        )
        .await;

    Ok(())
}

/// Unban a user from submitting anonymous messages.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn anonunban(
    ctx: Context<'_>,
    #[description = "User to unban from the relay"] user: serenity::User,
) -> Result<(), Error> {
    ctx.data().relay.unban_user(user.id.get()).await?;
    tracing::info!(user_id = user.id.get(), "relay unban");

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "{} has been unbanned from submitting anonymous messages.",
                user.mention()
            ))
            .ephemeral(true),
    )
    .await?;

    let _ = user
        .direct_message(
            ctx.http(),
            serenity::CreateMessage::new()
                .content("You have been unbanned from submitting anonymous messages."),
        )
        .await;

    Ok(())
}
