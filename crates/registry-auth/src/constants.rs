//! Registry backend endpoints and credential storage keys

/// API root used when neither config nor environment provides one.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// Refresh endpoint, relative to the API root.
pub const REFRESH_PATH: &str = "/accounts/token/refresh/";

/// Login endpoint, relative to the API root.
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Current user profile, relative to the API root.
pub const ME_PATH: &str = "/accounts/me/";

/// Storage key for the access token.
pub const ACCESS_KEY: &str = "accessToken";

/// Storage key for the refresh token.
pub const REFRESH_KEY: &str = "refreshToken";
