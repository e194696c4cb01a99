use std::time::Duration;

use fitlog_core::models::SyncResult;
use fitlog_core::Domain;

use crate::config::AppContext;
use crate::error::CliError;

/// Synchronize one domain, or every domain when none is given.
pub async fn run_sync(
    ctx: &AppContext,
    domain: Option<Domain>,
    timeout_secs: Option<u64>,
) -> Result<(), CliError> {
    let results: Vec<(Domain, SyncResult)> = match domain {
        Some(domain) => {
            let result = match timeout_secs {
                Some(secs) => {
                    ctx.engine
                        .synchronize_with_timeout(
                            &ctx.owner_id,
                            domain,
                            Duration::from_secs(secs),
                        )
                        .await?
                }
                None => ctx.engine.synchronize(&ctx.owner_id, domain).await?,
            };
            vec![(domain, result)]
        }
        None => ctx
            .engine
            .synchronize_all(&ctx.owner_id)
            .await
            .into_iter()
            .collect(),
    };

    let mut incomplete = 0usize;
    for (domain, result) in &results {
        let status = if result.success { "ok" } else { "aborted" };
        println!(
            "{:<17} {status:<8} synced={} conflicts={}",
            domain.as_str(),
            result.synced_items,
            result.conflicts
        );
        if !result.success {
            incomplete += 1;
        }
    }

    if incomplete > 0 {
        return Err(CliError::SyncIncomplete(incomplete));
    }
    Ok(())
}
