/// Protocol version announced in the `hello` handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Value of the `v` query parameter in the connection URL.
pub const URL_PROTOCOL_VERSION: &str = "1";

/// Command tag of the handshake frame.
pub const COMMAND_HELLO: &str = "hello";

/// Command tag of the navigator snapshot frame.
pub const COMMAND_NAV_SNAPSHOT: &str = "nav:snapshot";

/// App label sent in the handshake when none is configured.
pub const DEFAULT_APP_NAME: &str = "rn-app";

/// App version sent in the handshake when none is configured.
pub const DEFAULT_APP_VERSION: &str = "0";

/// Environment key holding the Host name or address.
pub const ENV_HOST: &str = "VAC_HOST";
/// Environment key holding the Host port.
pub const ENV_PORT: &str = "VAC_PORT";
/// Environment key holding the bearer token.
pub const ENV_TOKEN: &str = "VAC_TOKEN";

/// Conventional file name of the static client config.
pub const CONFIG_FILE_NAME: &str = ".vacrc.json";
