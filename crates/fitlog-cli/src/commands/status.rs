use chrono::{TimeZone, Utc};
use fitlog_core::Domain;

use crate::config::AppContext;
use crate::error::CliError;

/// Show device identity, conflict policy, watermarks, and pending counts.
pub async fn run_status(ctx: &AppContext) -> Result<(), CliError> {
    let metadata = ctx.engine.metadata();
    println!("Device:  {}", metadata.device_id().await?);
    println!("Policy:  {}", metadata.conflict_policy().await?.as_str());
    println!();
    println!("{:<17} {:<25} {}", "domain", "last sync", "pending");

    for domain in Domain::ALL {
        let watermark = metadata.watermark(domain).await?;
        let pending = ctx.engine.change_log().unsynced_entries(domain).await?;
        println!(
            "{:<17} {:<25} {}",
            domain.as_str(),
            format_watermark(watermark),
            pending.len()
        );
    }

    Ok(())
}

fn format_watermark(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "never".to_string();
    }
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(
            || timestamp_ms.to_string(),
            |moment| moment.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn watermark_zero_reads_never() {
        assert_eq!(format_watermark(0), "never");
        assert_eq!(format_watermark(-1), "never");
    }

    #[test]
    fn watermark_renders_utc_time() {
        assert_eq!(format_watermark(1_700_000_000_000), "2023-11-14 22:13:20 UTC");
    }
}
