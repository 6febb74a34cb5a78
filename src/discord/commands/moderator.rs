// Admin commands for managing the verification role.

use crate::core::verification::VerificationError;
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;

type Context<'a> = poise::Context<'a, Data, Error>;

/// Moderator commands.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("ping", "setup", "update", "remove"),
    rename = "mod"
)]
pub async fn mod_root(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Perform a ping test.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let latency = ctx.ping().await;
    let embed = serenity::CreateEmbed::new()
        .title("Ping Test")
        .description(format!("{} ms", latency.as_millis()))
        .color(0x3498DB);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// A role the bot can actually hand out: unmanaged and below its own top role.
fn role_is_assignable(ctx: Context<'_>, role: &serenity::Role) -> Result<bool, Error> {
    let bot_id = ctx.framework().bot_id;
    let guild = ctx.guild().ok_or("Guild not in cache")?;
    let bot_top = guild
        .members
        .get(&bot_id)
        .and_then(|m| guild.member_highest_role(m))
        .map(|r| r.position)
        .unwrap_or(0);
    Ok(!role.managed && role.position < bot_top)
}

/// Set up a verification role for your server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "The role to be used for verification"] role: serenity::Role,
) -> Result<(), Error> {
    tracing::info!(guild_id = role.guild_id.get(), "setting up verification role");
    ctx.defer().await?;
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;

    if !role_is_assignable(ctx, &role)? {
        let embed = serenity::CreateEmbed::new()
            .title("Verification Role Setup Failed")
            .description(format!(
                "{} is not assignable by me. Please change this and try again.\n\n\
                 *Tip: Ensure that the role is below my role in the role hierarchy*",
                role_mention(role.id)
            ))
            .color(0xFF0000);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        return Ok(());
    }

    let embed = match ctx
        .data()
        .verification
        .setup_role(guild_id.get(), role.id.get())
        .await
    {
        Ok(()) => serenity::CreateEmbed::new()
            .title("Verification Role Setup Successful")
            .description(format!(
                "Verification role set to {}. Members can now use the `/auth` \
                 command to verify themselves",
                role_mention(role.id)
            ))
            .color(0x00FF00),
        Err(VerificationError::AlreadyConfigured(existing)) => serenity::CreateEmbed::new()
            .title("Verification Role Setup Failed")
            .description(format!(
                "Verification role already set to {}. Use the `/mod update` \
                 command to update the verification role",
                role_mention(serenity::RoleId::new(existing))
            ))
            .color(0xFF0000),
        Err(e) => return Err(e.into()),
    };
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Update the verification role for your server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn update(
    ctx: Context<'_>,
    #[description = "The role to be used for verification"] role: serenity::Role,
    #[description = "Swap the role on existing members (removes the old role)"] reverify: Option<
        bool,
    >,
) -> Result<(), Error> {
    tracing::info!(guild_id = role.guild_id.get(), "updating verification role");
    ctx.defer().await?;
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;

    if !role_is_assignable(ctx, &role)? {
        let embed = serenity::CreateEmbed::new()
            .title("Verification Role Update Failed")
            .description(format!(
                "{} is not assignable by me. Please change this and try again.\n\n\
                 *Tip: Ensure that the role is below my role in the role hierarchy*",
                role_mention(role.id)
            ))
            .color(0xFF0000);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        return Ok(());
    }

    match ctx
        .data()
        .verification
        .update_role(guild_id.get(), role.id.get())
        .await
    {
        Ok(previous) => {
            let previous = serenity::RoleId::new(previous);
            let mut description = format!(
                "Verification role updated from {} to {}",
                role_mention(previous),
                role_mention(role.id)
            );
            if reverify.unwrap_or(false) {
                swap_role_on_members(ctx, guild_id, previous, Some(role.id)).await?;
                description.push_str(
                    "\nThe verification role has been updated for all existing members.",
                );
            }
            let embed = serenity::CreateEmbed::new()
                .title("Verification Role Update Successful")
                .description(description)
                .color(0x00FF00);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(VerificationError::NotConfigured) => {
            let embed = serenity::CreateEmbed::new()
                .title("Verification Role Update Failed")
                .description("No verification role set for this server")
                .color(0xFF0000);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Remove the verification role for your server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Also remove the role from existing members"] deverify: Option<bool>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;
    tracing::info!(guild_id = guild_id.get(), "removing verification role");

    match ctx.data().verification.remove_role(guild_id.get()).await {
        Ok(removed) => {
            let removed = serenity::RoleId::new(removed);
            let mut description =
                format!("Verification role {} removed", role_mention(removed));
            if deverify.unwrap_or(false) {
                swap_role_on_members(ctx, guild_id, removed, None).await?;
                description.push_str(
                    "\nThe verification role has been removed from all existing members.",
                );
            }
            let embed = serenity::CreateEmbed::new()
                .title("Verification Role Removal Successful")
                .description(description)
                .color(0x00FF00);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(VerificationError::NotConfigured) => {
            let embed = serenity::CreateEmbed::new()
                .title("Verification Role Removal Failed")
                .description("No verification role set for this server")
                .color(0xFF0000);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn role_mention(role_id: serenity::RoleId) -> String {
    format!("<@&{}>", role_id.get())
}

// Discord serves the member list 1000 at a time.
const MEMBER_PAGE: usize = 1000;

/// Where to resume the member listing: the last member's id when the page
/// was full, `None` when a short page means we have seen everyone.
fn next_page_after(page_len: usize, last_id: Option<u64>) -> Option<u64> {
    if page_len == MEMBER_PAGE {
        last_id
    } else {
        None
    }
}

/// Remove `old_role` from every member holding it, optionally granting
/// `new_role` in its place. Pages through the full member list; individual
/// failures are logged, not fatal.
async fn swap_role_on_members(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    old_role: serenity::RoleId,
    new_role: Option<serenity::RoleId>,
) -> Result<(), Error> {
    let mut after: Option<u64> = None;

    loop {
        let page = ctx
            .http()
            .get_guild_members(guild_id, Some(MEMBER_PAGE as u64), after)
            .await?;

        for member in &page {
            if !member.roles.contains(&old_role) {
                continue;
            }
            if let Err(e) = ctx
                .http()
                .remove_member_role(guild_id, member.user.id, old_role, None)
                .await
            {
                tracing::warn!(user_id = member.user.id.get(), error = %e, "could not remove role");
                continue;
            }
            if let Some(new_role) = new_role {
                if member.roles.contains(&new_role) {
                    continue;
                }
                if let Err(e) = ctx
                    .http()
                    .add_member_role(guild_id, member.user.id, new_role, None)
                    .await
                {
                    tracing::warn!(user_id = member.user.id.get(), error = %e, "could not add role");
                }
            }
        }

        after = next_page_after(page.len(), page.last().map(|m| m.user.id.get()));
        if after.is_none() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{next_page_after, MEMBER_PAGE};

    #[test]
    fn full_page_resumes_after_the_last_member() {
        assert_eq!(next_page_after(MEMBER_PAGE, Some(42)), Some(42));
    }

    #[test]
    fn short_page_ends_the_sweep() {
        assert_eq!(next_page_after(MEMBER_PAGE - 1, Some(42)), None);
        assert_eq!(next_page_after(0, None), None);
    }
}
