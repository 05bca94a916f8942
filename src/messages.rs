//! User-facing message text shared by the operation handlers.

pub const WAIT_FOR_A_MOMENT: &str = "This may take a while, please wait...";
pub const CONNECTING_FAILED: &str = "Connecting to the org failed, please check your network.";
pub const AUTHORIZATION_FAILED: &str =
    "Authorization failed, please check your username and access token.";
pub const CREATE_SUCCEEDED: &str = "Component created successfully.";
pub const GET_SUCCEEDED: &str = "Component refreshed successfully.";
pub const DELETE_SUCCEEDED: &str = "Component deleted successfully.";
pub const DOWNLOAD_ALL_SUCCEEDED: &str = "All component metadata downloaded successfully.";
