//! asusd platform interface over the system bus

use super::ProfileBackend;
use crate::errors::{PerfSwitchError, Result};
use crate::profile::{ProfileCatalog, ProfileId};
use crate::{DBUS_INTERFACE_NAME, DBUS_OBJECT_PATH, DBUS_SERVICE_NAME};
use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::OnceCell;
use zbus::{dbus_proxy, CacheProperties, ConnectionBuilder};

#[dbus_proxy(
    interface = "xyz.ljones.Platform",
    default_service = "xyz.ljones.Asusd",
    default_path = "/xyz/ljones",
    gen_blocking = false
)]
trait Platform {
    #[dbus_proxy(property)]
    fn platform_profile(&self) -> zbus::Result<u32>;

    #[dbus_proxy(property)]
    fn set_platform_profile(&self, profile: u32) -> zbus::Result<()>;

    #[dbus_proxy(property)]
    fn platform_profile_choices(&self) -> zbus::Result<Vec<u32>>;
}

/// Property-based backend: reads and writes `PlatformProfile` on asusd.
///
/// The bus connection is opened by the first operation and reused afterwards.
/// A failed connection attempt is an ordinary operation failure, so the next
/// attempt tries to connect again.
pub struct DbusBackend {
    address: Option<String>,
    proxy: OnceCell<PlatformProxy<'static>>,
}

impl Default for DbusBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DbusBackend {
    /// Backend on the system bus
    pub fn new() -> Self {
        Self {
            address: None,
            proxy: OnceCell::new(),
        }
    }

    /// Backend on an explicit bus address such as `unix:path=/run/dbus/system_bus_socket`
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            proxy: OnceCell::new(),
        }
    }

    async fn proxy(&self) -> Result<&PlatformProxy<'static>> {
        self.proxy
            .get_or_try_init(|| async {
                let builder = match &self.address {
                    Some(address) => ConnectionBuilder::address(address.as_str())?,
                    None => ConnectionBuilder::system()?,
                };
                let connection = builder.build().await?;
                // Every read must hit the daemon; cached values would mask out-of-band changes.
                let proxy = PlatformProxy::builder(&connection)
                    .cache_properties(CacheProperties::No)
                    .build()
                    .await?;
                info!(
                    "Connected to {} at {} ({})",
                    DBUS_SERVICE_NAME, DBUS_OBJECT_PATH, DBUS_INTERFACE_NAME
                );
                Ok::<_, PerfSwitchError>(proxy)
            })
            .await
    }
}

#[async_trait]
impl ProfileBackend for DbusBackend {
    fn name(&self) -> &'static str {
        "dbus"
    }

    async fn list_supported(&self) -> Result<ProfileCatalog> {
        let codes = self.proxy().await?.platform_profile_choices().await?;
        debug!("PlatformProfileChoices = {:?}", codes);
        Ok(ProfileCatalog::from_codes(&codes))
    }

    async fn get_current(&self) -> Result<ProfileId> {
        let code = self.proxy().await?.platform_profile().await?;
        debug!("PlatformProfile = {}", code);
        decode_current(code)
    }

    async fn set_current(&self, profile: ProfileId) -> Result<()> {
        debug!("Setting PlatformProfile = {} ({})", profile.code(), profile);
        self.proxy().await?.set_platform_profile(profile.code()).await?;
        Ok(())
    }
}

fn decode_current(code: u32) -> Result<ProfileId> {
    ProfileId::from_code(code)
        .ok_or_else(|| PerfSwitchError::Parse(format!("unknown PlatformProfile code {}", code)))
}
