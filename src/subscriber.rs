//! Push notifications for out-of-band profile changes

use crate::errors::{PerfSwitchError, Result};
use crate::profile::ProfileId;
use crate::{DBUS_INTERFACE_NAME, DBUS_OBJECT_PATH, DBUS_PROFILE_PROPERTY, DBUS_SERVICE_NAME};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use zbus::fdo::PropertiesProxy;
use zbus::Connection;
use zvariant::Value;

/// Where decoded profile changes are delivered
pub type ProfileSink = Box<dyn Fn(ProfileId) + Send + Sync>;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to a live change subscription.
///
/// Dropping the handle unsubscribes; `unsubscribe` may be called any number of times.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap the task that forwards notifications into a sink
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            task: Some(task),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Subscription {} released", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Source of push notifications about the daemon's active profile
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, sink: ProfileSink) -> Result<Subscription>;
}

/// `PropertiesChanged` listener on the asusd platform object
#[derive(Debug, Default)]
pub struct DbusChangeFeed;

impl DbusChangeFeed {
    /// Feed that opens its own system bus connection when subscribing
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChangeFeed for DbusChangeFeed {
    async fn subscribe(&self, sink: ProfileSink) -> Result<Subscription> {
        let connection = Connection::system().await.map_err(PerfSwitchError::DBus)?;

        let proxy = PropertiesProxy::builder(&connection)
            .destination(DBUS_SERVICE_NAME)?
            .path(DBUS_OBJECT_PATH)?
            .build()
            .await?;
        let mut changes = proxy.receive_properties_changed().await?;

        let task = tokio::spawn(async move {
            while let Some(signal) = changes.next().await {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(e) => {
                        warn!("Malformed PropertiesChanged signal: {}", e);
                        continue;
                    }
                };
                if let Some(profile) =
                    decode_change(args.interface_name().as_str(), args.changed_properties())
                {
                    sink(profile);
                }
            }
            debug!("PropertiesChanged stream ended");
        });

        let subscription = Subscription::new(task);
        info!(
            "Subscribed to {} changes on {} (subscription {})",
            DBUS_INTERFACE_NAME,
            DBUS_OBJECT_PATH,
            subscription.id()
        );
        Ok(subscription)
    }
}

/// Decode a `PropertiesChanged` payload into a profile, if it carries one we know
pub fn decode_change(interface: &str, changed: &HashMap<&str, Value<'_>>) -> Option<ProfileId> {
    if interface != DBUS_INTERFACE_NAME {
        trace!("Ignoring property change on {}", interface);
        return None;
    }

    let value = changed.get(DBUS_PROFILE_PROPERTY)?;
    let Some(code) = value_as_code(value) else {
        warn!("Unexpected {} value type: {:?}", DBUS_PROFILE_PROPERTY, value);
        return None;
    };

    let profile = ProfileId::from_code(code);
    if profile.is_none() {
        warn!("Dropping unknown {} code {}", DBUS_PROFILE_PROPERTY, code);
    }
    profile
}

fn value_as_code(value: &Value<'_>) -> Option<u32> {
    match value {
        Value::U32(v) => Some(*v),
        Value::U8(v) => Some(u32::from(*v)),
        Value::U16(v) => Some(u32::from(*v)),
        Value::U64(v) => u32::try_from(*v).ok(),
        Value::I16(v) => u32::try_from(*v).ok(),
        Value::I32(v) => u32::try_from(*v).ok(),
        Value::I64(v) => u32::try_from(*v).ok(),
        Value::Value(inner) => value_as_code(inner),
        _ => None,
    }
}
