// Mute and unmute commands.
//
// The core service owns durations and expiries; this layer does the Discord
// legwork: hierarchy checks, the `Muted` role, and channel overwrites. The
// background sweeper in main.rs reverses expired mutes.

use crate::core::mutes::{parse_duration, MuteError, MAX_MUTE_SECS};
use crate::discord::{Data, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Mentionable;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Name of the role the bot creates and assigns to muted members.
pub const MUTED_ROLE_NAME: &str = "Muted";

/// Mute a member for a duration like `1h30m` (max 14 days).
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member to mute"] member: serenity::Member,
    #[description = "Duration, e.g. 1h30m (max 14d)"] duration: String,
    #[description = "Reason for the mute"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason.unwrap_or_else(|| "No reason provided".to_string());
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;
    let bot_id = ctx.framework().bot_id;

    if member.user.id == bot_id {
        ctx.say("I cannot mute myself.").await?;
        return Ok(());
    }

    // Validate the duration before touching any roles
    let seconds = parse_duration(&duration).filter(|&s| s > 0);
    match seconds {
        None => {
            ctx.say("Please specify a valid duration for the mute (e.g., 1h30m).")
                .await?;
            return Ok(());
        }
        Some(s) if s > MAX_MUTE_SECS => {
            ctx.say("Please enter a valid duration (up to 14 days).")
                .await?;
            return Ok(());
        }
        Some(_) => {}
    }

    let author_member = ctx
        .author_member()
        .await
        .ok_or("Could not resolve you as a member of this server")?;
    let bot_member = guild_id.member(ctx, bot_id).await?;

    // Hierarchy checks need the cached guild; keep the borrow inside a block
    // so it is dropped before the awaits below.
    let (author_top, target_top, bot_top, is_owner, existing_role_id) = {
        let guild = ctx.guild().ok_or("Guild not in cache")?;
        (
            guild
                .member_highest_role(&author_member)
                .map(|r| r.position)
                .unwrap_or(0),
            guild
                .member_highest_role(&member)
                .map(|r| r.position)
                .unwrap_or(0),
            guild
                .member_highest_role(&bot_member)
                .map(|r| r.position)
                .unwrap_or(0),
            guild.owner_id == ctx.author().id,
            guild.role_by_name(MUTED_ROLE_NAME).map(|r| r.id),
        )
    };

    let self_mute = member.user.id == ctx.author().id;
    if !self_mute && target_top >= author_top && !is_owner {
        ctx.say("You cannot mute a member with an equal or higher role.")
            .await?;
        return Ok(());
    }
    if bot_top <= target_top {
        ctx.say("I do not have permission to mute this user due to role hierarchy.")
            .await?;
        return Ok(());
    }

    // Get or create the muted role
    let muted_role_id = match existing_role_id {
        Some(id) => id,
        None => {
            let role = match guild_id
                .create_role(
                    ctx.http(),
                    serenity::EditRole::new().name(MUTED_ROLE_NAME),
                )
                .await
            {
                Ok(role) => role,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to create muted role");
                    ctx.say("I do not have permission to create the Muted role.")
                        .await?;
                    return Ok(());
                }
            };

            // Deny messaging on every channel for the new role. Best-effort:
            // a single uneditable channel should not abort the mute.
            let channels = guild_id.channels(ctx.http()).await?;
            for channel in channels.values() {
                let overwrite = serenity::PermissionOverwrite {
                    allow: serenity::Permissions::empty(),
                    deny: serenity::Permissions::SEND_MESSAGES
                        | serenity::Permissions::SPEAK
                        | serenity::Permissions::ADD_REACTIONS,
                    kind: serenity::PermissionOverwriteType::Role(role.id),
                };
                if let Err(e) = channel.create_permission(ctx.http(), overwrite).await {
                    tracing::warn!(channel = %channel.name, error = %e, "could not set muted overwrite");
                }
            }

            role.id
        }
    };

    if member.add_role(ctx.http(), muted_role_id).await.is_err() {
        ctx.say("I do not have permission to mute this user.").await?;
        return Ok(());
    }

    // Record the expiry only after the role stuck
    match ctx
        .data()
        .mutes
        .mute(
            member.user.id.get(),
            guild_id.get(),
            &duration,
            Utc::now().timestamp(),
        )
        .await
    {
        Ok(expires_at) => {
            tracing::info!(
                user_id = member.user.id.get(),
                guild_id = guild_id.get(),
                expires_at,
                "muted member"
            );
            ctx.say(format!(
                "{} has been muted for {}. Reason: {}",
                member.user.mention(),
                duration,
                reason
            ))
            .await?;
        }
        Err(MuteError::InvalidDuration(_)) | Err(MuteError::DurationTooLong(_)) => {
            // Already validated above; only reachable if the two drift apart
            ctx.say("Please enter a valid duration (up to 14 days).")
                .await?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Unmute a member.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES"
)]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "Member to unmute"] member: serenity::Member,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;

    let muted_role_id = {
        let guild = ctx.guild().ok_or("Guild not in cache")?;
        guild.role_by_name(MUTED_ROLE_NAME).map(|r| r.id)
    };

    let held_role = muted_role_id.filter(|id| member.roles.contains(id));

    if let Some(role_id) = held_role {
        if member.remove_role(ctx.http(), role_id).await.is_err() {
            ctx.say("I do not have permission to unmute this user.")
                .await?;
            return Ok(());
        }
        ctx.data()
            .mutes
            .unmute(member.user.id.get(), guild_id.get())
            .await?;
        ctx.say(format!("{} has been unmuted.", member.user.mention()))
            .await?;
    } else {
        ctx.say("This user is not muted.").await?;
        // Clear any stale record so the sweeper stops caring about them
        ctx.data()
            .mutes
            .unmute(member.user.id.get(), guild_id.get())
            .await?;
    }

    Ok(())
}
