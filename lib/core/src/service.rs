//! The service catalog.
//!
//! Downstream services form a closed set. Anything outside it is invalid
//! input for grants and authorization checks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A recognized downstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    /// Member profile pages.
    MyPage,
    /// Mileage / points service.
    MyMile,
}

impl ServiceName {
    /// Every service in the catalog.
    pub const ALL: [ServiceName; 2] = [ServiceName::MyPage, ServiceName::MyMile];

    /// Returns the wire name of the service.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MyPage => "mypage",
            Self::MyMile => "mymile",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned for a service name outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownServiceError {
    /// The rejected name.
    pub name: String,
}

impl fmt::Display for UnknownServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown service: {}", self.name)
    }
}

impl std::error::Error for UnknownServiceError {}

impl FromStr for ServiceName {
    type Err = UnknownServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| UnknownServiceError {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_names() {
        assert_eq!("mypage".parse::<ServiceName>(), Ok(ServiceName::MyPage));
        assert_eq!("mymile".parse::<ServiceName>(), Ok(ServiceName::MyMile));
    }

    #[test]
    fn rejects_unknown_and_differently_cased_names() {
        assert!("admin".parse::<ServiceName>().is_err());
        assert!("MyPage".parse::<ServiceName>().is_err());
        assert!("".parse::<ServiceName>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        for service in ServiceName::ALL {
            assert_eq!(service.to_string(), service.as_str());
            let json = serde_json::to_string(&service).expect("serialize");
            assert_eq!(json, format!("\"{}\"", service.as_str()));
        }
    }
}
