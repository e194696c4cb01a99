use crate::config::AppContext;
use crate::error::CliError;

/// Run deep data recovery: back up, reset watermarks, rebuild from remote.
pub async fn run_repair(ctx: &AppContext, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::ConfirmationRequired);
    }

    let outcome = ctx.checker.perform_deep_data_recovery(&ctx.owner_id).await?;
    println!("{}", outcome.message);

    if outcome.success {
        Ok(())
    } else {
        Err(CliError::RecoveryIncomplete(outcome.message))
    }
}
