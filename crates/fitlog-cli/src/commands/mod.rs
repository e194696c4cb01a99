//! Subcommand implementations.

pub mod pending;
pub mod policy;
pub mod repair;
pub mod status;
pub mod sync;
pub mod verify;

use std::str::FromStr;

use fitlog_core::Domain;

use crate::error::CliError;

/// Parse an optional `--domain` flag into a concrete domain.
pub fn parse_domain(raw: Option<&str>) -> Result<Option<Domain>, CliError> {
    raw.map(|value| Domain::from_str(value).map_err(CliError::Core))
        .transpose()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_domain_accepts_known_names() {
        assert_eq!(parse_domain(None).unwrap(), None);
        assert_eq!(
            parse_domain(Some("workout")).unwrap(),
            Some(Domain::Workout)
        );
        assert_eq!(
            parse_domain(Some("body-measurement")).unwrap(),
            Some(Domain::BodyMeasurement)
        );
    }

    #[test]
    fn parse_domain_rejects_unknown_names() {
        assert!(parse_domain(Some("steps")).is_err());
    }
}
