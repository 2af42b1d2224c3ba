//! Sign-in commands.

use secrecy::SecretString;
use storecart_client::SyncEvent;
use tracing::{info, warn};

use super::cart::{DRAIN_TIMEOUT, print_report};
use super::{CommandError, Context};

/// Store a credential and wait for the offline cart to drain.
pub async fn login(ctx: &Context, token: String) -> Result<(), CommandError> {
    let auth = ctx.session.auth();
    let was_signed_in = auth.is_authenticated();
    let mut events = ctx.session.manager().subscribe_sync();

    auth.sign_in(SecretString::from(token)).await?;
    if was_signed_in {
        info!("Credential replaced");
        return Ok(());
    }

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Ok(event) = events.recv().await {
            if let SyncEvent::Completed(report) = event {
                return Some(report);
            }
        }
        None
    })
    .await;

    match drained {
        Ok(Some(report)) => print_report(&report),
        Ok(None) => warn!("Session closed before the offline cart was synced"),
        Err(_) => warn!("Timed out waiting for the offline cart to sync"),
    }
    Ok(())
}

/// Forget the stored credential.
pub async fn logout(ctx: &Context) -> Result<(), CommandError> {
    ctx.session.auth().sign_out().await?;
    info!("Signed out");
    Ok(())
}
