/// [Result] alias for return types of the crate API
pub type Result<T> = std::result::Result<T, Error>;

/// Error enum type
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Another mission operation is already in flight. The engine has a
    /// single activity slot and does not queue requests.
    Busy,
    /// The vehicle did not answer within the allowed time (including
    /// retries where the protocol allows them).
    Timeout,
    /// The vehicle reported that it cannot store this many mission items.
    TooManyMissionItems,
    /// The mission contains a command, frame or parameter combination that
    /// this library does not handle.
    Unsupported,
    /// The vehicle holds no mission.
    NoMissionAvailable,
    /// Invalid argument from the caller. The String contains the reason.
    InvalidArgument(String),
    /// The QGroundControl plan file could not be opened.
    FailedToOpenQgcPlan,
    /// The QGroundControl plan file is not valid JSON or not a plan.
    FailedToParseQgcPlan,
    /// Unexpected protocol error. The String contains the reason.
    ProtocolError(String),
    /// The operation was cancelled by [stop()](crate::subsystems::mission::Mission::stop).
    Cancelled,
    /// The Drone object is currently disconnected.
    Disconnected,
    /// MAVLink link error. The String contains the reason.
    LinkError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Busy => write!(f, "Another mission operation is in progress"),
            Error::Timeout => write!(f, "Timeout waiting for the vehicle"),
            Error::TooManyMissionItems => write!(f, "Too many mission items for the vehicle"),
            Error::Unsupported => write!(f, "Unsupported mission item"),
            Error::NoMissionAvailable => write!(f, "No mission available on the vehicle"),
            Error::InvalidArgument(reason) => write!(f, "Invalid argument: {}", reason),
            Error::FailedToOpenQgcPlan => write!(f, "Failed to open QGroundControl plan file"),
            Error::FailedToParseQgcPlan => write!(f, "Failed to parse QGroundControl plan file"),
            Error::ProtocolError(reason) => write!(f, "Protocol error: {}", reason),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Disconnected => write!(f, "Disconnected from the vehicle"),
            Error::LinkError(reason) => write!(f, "Link error: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::LinkError(format!("{}", e))
    }
}

impl From<mavlink::error::MessageWriteError> for Error {
    fn from(e: mavlink::error::MessageWriteError) -> Self {
        Self::LinkError(format!("{:?}", e))
    }
}
