//! Status menu view-model derived from the synchronized state

use crate::profile::ProfileId;
use crate::store::SyncState;
use std::fmt;

pub const TOGGLE_TITLE: &str = "Perf Mode";

/// One selectable entry in the profile menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub profile: ProfileId,
    pub icon_name: &'static str,
    pub checked: bool,
}

/// Everything a status-menu toggle needs to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub title: &'static str,
    pub subtitle: Option<&'static str>,
    pub icon_name: &'static str,
    /// The toggle is highlighted whenever a non-default profile is active
    pub checked: bool,
    pub items: Vec<MenuItem>,
}

impl IndicatorView {
    pub fn from_state(state: &SyncState) -> Self {
        let active = state.active_profile;
        Self {
            title: TOGGLE_TITLE,
            subtitle: active.map(ProfileId::name),
            icon_name: active.unwrap_or(ProfileId::DEFAULT).icon_name(),
            checked: active.is_some_and(|profile| profile != ProfileId::DEFAULT),
            items: state
                .catalog
                .profiles()
                .iter()
                .map(|&profile| MenuItem {
                    profile,
                    icon_name: profile.icon_name(),
                    checked: active == Some(profile),
                })
                .collect(),
        }
    }
}

impl fmt::Display for IndicatorView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.subtitle.unwrap_or("unknown"))?;
        for item in &self.items {
            write!(f, " [{}{}]", if item.checked { "*" } else { " " }, item.profile)?;
        }
        Ok(())
    }
}
