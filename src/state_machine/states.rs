use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single route request, keyed by idempotency key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Request seen for the first time
    #[default]
    Init,
    /// Input shape accepted
    Validated,
    /// Graph loaded, algorithm selected, computation running
    Computing,
    /// Validated result produced
    Success,
    /// Computation or compensation failed
    Failure,
    /// Undoing a downstream side effect
    Compensating,
    /// Side effect undone
    Compensated,
}

impl RequestState {
    /// States that close a unit of work and produce an audit record
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Compensated)
    }

    /// No transition leaves this state
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Compensated)
    }

    /// Check if this is an active state (work is in flight)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Validated | Self::Computing | Self::Compensating)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Validated => write!(f, "validated"),
            Self::Computing => write!(f, "computing"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Compensating => write!(f, "compensating"),
            Self::Compensated => write!(f, "compensated"),
        }
    }
}

impl std::str::FromStr for RequestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "validated" => Ok(Self::Validated),
            "computing" => Ok(Self::Computing),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "compensating" => Ok(Self::Compensating),
            "compensated" => Ok(Self::Compensated),
            _ => Err(format!("Invalid request state: {s}")),
        }
    }
}
