use fitlog_core::models::ConflictPolicy;

use crate::config::AppContext;
use crate::error::CliError;

/// Show the configured conflict policy, or change it when a value is given.
pub async fn run_policy(ctx: &AppContext, value: Option<&str>) -> Result<(), CliError> {
    let metadata = ctx.engine.metadata();

    if let Some(raw) = value {
        let policy = parse_policy(raw)?;
        metadata.set_conflict_policy(policy).await?;
        println!("{}", policy.as_str());
    } else {
        println!("{}", metadata.conflict_policy().await?.as_str());
    }
    Ok(())
}

fn parse_policy(raw: &str) -> Result<ConflictPolicy, CliError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "server_wins" | "server-wins" => Ok(ConflictPolicy::ServerWins),
        "client_wins" | "client-wins" => Ok(ConflictPolicy::ClientWins),
        "newest_wins" | "newest-wins" => Ok(ConflictPolicy::NewestWins),
        "manual" => Ok(ConflictPolicy::Manual),
        other => Err(CliError::InvalidArgument(format!(
            "unknown conflict policy '{other}' (expected server-wins, client-wins, newest-wins, or manual)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn policy_parse_accepts_both_separators() {
        assert_eq!(
            parse_policy("server-wins").unwrap(),
            ConflictPolicy::ServerWins
        );
        assert_eq!(
            parse_policy("newest_wins").unwrap(),
            ConflictPolicy::NewestWins
        );
    }

    #[test]
    fn policy_parse_rejects_unknown() {
        assert!(parse_policy("coin-flip").is_err());
    }
}
