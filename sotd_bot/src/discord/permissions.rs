use anyhow::{anyhow, Result};
use tracing::{event, Level};

use crate::discord::Context;

/// Whether the invoking member may change this server's settings.
///
/// Evaluated against the member's current roles on every call. Servers without configuration
/// roles let everyone through.
pub(crate) async fn may_configure(ctx: Context<'_>) -> Result<bool> {
    let guild_id = ctx.guild_id().ok_or_else(|| anyhow!("Could not determine the guild id"))?;

    let config_roles_set = {
        let store = ctx.data().store.lock().await;
        store.server(guild_id.get()).is_some_and(|server| !server.config_roles.is_empty())
    };

    if !config_roles_set {
        return Ok(true);
    }

    let member_roles: Vec<u64> = match ctx.author_member().await {
        Some(member) => member.roles.iter().map(|role| role.get()).collect(),
        None => {
            event!(Level::WARN, %guild_id, "Could not fetch the invoking member");
            Vec::new()
        }
    };

    let store = ctx.data().store.lock().await;
    let allowed = store
        .server(guild_id.get())
        .map_or(true, |server| server.allows_configuration_by(&member_roles));

    event!(Level::TRACE, %guild_id, allowed, "Checked configuration roles");

    Ok(allowed)
}
