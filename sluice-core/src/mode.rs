//! Which origin the relay talks to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Runtime mode of a Sluice process.
///
/// Production relays from the configured HTTP metadata service. Development
/// relays the deterministic simulated catalog and needs no network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Production,
    #[default]
    Development,
}

impl RuntimeMode {
    /// Whether this mode needs `SLUICE_PROVIDER_URL` or `--provider-url`.
    pub fn requires_provider_url(self) -> bool {
        self == Self::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("production") || s.eq_ignore_ascii_case("prod") {
            Ok(Self::Production)
        } else if s.eq_ignore_ascii_case("development") || s.eq_ignore_ascii_case("dev") {
            Ok(Self::Development)
        } else {
            Err(format!("unknown mode '{s}', expected production or development"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("prod".parse::<RuntimeMode>(), Ok(RuntimeMode::Production));
        assert_eq!("Development".parse::<RuntimeMode>(), Ok(RuntimeMode::Development));
        assert!("staging".parse::<RuntimeMode>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for mode in [RuntimeMode::Production, RuntimeMode::Development] {
            assert_eq!(mode.to_string().parse::<RuntimeMode>(), Ok(mode));
        }
        assert!(RuntimeMode::Production.requires_provider_url());
        assert!(!RuntimeMode::default().requires_provider_url());
    }
}
