use cfg_if::cfg_if;

cfg_if!(
    if #[cfg(target_os = "linux")] {
        pub const OS_NAME: &str = "linux";
    } else if #[cfg(target_os = "macos")] {
        pub const OS_NAME: &str = "osx";
    } else if #[cfg(target_os = "windows")] {
        pub const OS_NAME: &str = "windows";
    } else if #[cfg(target_os = "freebsd")] {
        pub const OS_NAME: &str = "freebsd";
    } else {
        pub const OS_NAME: &str = "unknown";
    }
);

/// The one game version this launcher installs.
pub const GAME_VERSION: &str = "1.21.8";
pub const FABRIC_LOADER_VERSION: &str = "0.16.14";

pub const DEFAULT_MAX_MEMORY: &str = "4G";
pub const DEFAULT_MIN_MEMORY: &str = "2G";

pub const SERVER_HOST: &str = "shampuneum.net";
pub const SERVER_PORT: u16 = 25565;

pub const RESOURCE_PACK_FILE: &str = "Shampuneum.zip";

const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
const FABRIC_META_URL: &str = "https://meta.fabricmc.net/v2";
const RESOURCE_PACK_URL: &str = "https://drive.google.com/uc?export=download&id=17gwAudZ9rErh4v6jiGcHA-2xyJXeJL5I&confirm=t";
const LOGIN_URL: &str = "http://95.79.192.194:3000/login";

/// Remote services the installer talks to.
///
/// [`Endpoints::default`] gives the real ones,
/// tests point these at a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Index of all game versions.
    pub version_manifest: String,
    /// Base URL of the Fabric meta API (without trailing slash).
    pub fabric_meta: String,
    pub resource_pack: String,
    pub login: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: VERSION_MANIFEST_URL.to_owned(),
            fabric_meta: FABRIC_META_URL.to_owned(),
            resource_pack: RESOURCE_PACK_URL.to_owned(),
            login: LOGIN_URL.to_owned(),
        }
    }
}
