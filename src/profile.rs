//! Profile identifiers, the supported-profile catalog and the daemon code table

use crate::errors::{PerfSwitchError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A performance profile the platform daemon can run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileId {
    Quiet,
    Balanced,
    Performance,
}

impl ProfileId {
    /// Every profile known to the switcher, in menu order
    pub const ALL: [ProfileId; 3] = [ProfileId::Quiet, ProfileId::Balanced, ProfileId::Performance];

    /// Profile assumed when the daemon cannot tell us the active one
    pub const DEFAULT: ProfileId = ProfileId::Balanced;

    pub fn name(self) -> &'static str {
        match self {
            ProfileId::Quiet => "Quiet",
            ProfileId::Balanced => "Balanced",
            ProfileId::Performance => "Performance",
        }
    }

    /// Symbolic icon shown in the status menu for this profile
    pub fn icon_name(self) -> &'static str {
        match self {
            ProfileId::Quiet => "power-profile-power-saver-symbolic",
            ProfileId::Balanced => "power-profile-balanced-symbolic",
            ProfileId::Performance => "power-profile-performance-symbolic",
        }
    }

    /// Integer code used by the daemon's `PlatformProfile` property
    pub fn code(self) -> u32 {
        // The forward table is total over ALL, checked by `verify_code_table`.
        PROFILE_CODES
            .iter()
            .find(|(_, profile)| *profile == self)
            .map(|(code, _)| *code)
            .unwrap_or(DEFAULT_CODE)
    }

    /// Decode a daemon integer code, `None` for codes outside the table
    pub fn from_code(code: u32) -> Option<Self> {
        PROFILE_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, profile)| *profile)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProfileId {
    type Err = PerfSwitchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ProfileId::ALL
            .into_iter()
            .find(|profile| profile.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PerfSwitchError::UnknownProfile(s.to_string()))
    }
}

/// Daemon code table: 0 ↔ Balanced, 1 ↔ Performance, 2 ↔ Quiet
pub const PROFILE_CODES: [(u32, ProfileId); 3] = [
    (0, ProfileId::Balanced),
    (1, ProfileId::Performance),
    (2, ProfileId::Quiet),
];

const DEFAULT_CODE: u32 = 0;

/// Check that the code table is a bijection over `ProfileId::ALL`.
///
/// Every forward entry must map back to itself and every profile must have
/// exactly one code, otherwise list/get/set would silently disagree.
pub fn verify_code_table() -> Result<()> {
    verify_table(&PROFILE_CODES)
}

fn verify_table(table: &[(u32, ProfileId)]) -> Result<()> {
    for (code, profile) in table {
        let codes_for_profile = table.iter().filter(|(_, p)| p == profile).count();
        if codes_for_profile != 1 {
            return Err(PerfSwitchError::Config(format!(
                "profile {} has {} codes in the code table",
                profile, codes_for_profile
            )));
        }
        let profiles_for_code = table.iter().filter(|(c, _)| c == code).count();
        if profiles_for_code != 1 {
            return Err(PerfSwitchError::Config(format!(
                "code {} maps to {} profiles in the code table",
                code, profiles_for_code
            )));
        }
    }

    if let Some(missing) = ProfileId::ALL
        .into_iter()
        .find(|profile| !table.iter().any(|(_, p)| p == profile))
    {
        return Err(PerfSwitchError::Config(format!(
            "profile {} has no code in the code table",
            missing
        )));
    }

    Ok(())
}

/// Ordered set of profiles the daemon reports as switchable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileCatalog {
    profiles: Vec<ProfileId>,
}

impl ProfileCatalog {
    pub fn new(profiles: impl IntoIterator<Item = ProfileId>) -> Self {
        let mut catalog = Self::default();
        for profile in profiles {
            if !catalog.profiles.contains(&profile) {
                catalog.profiles.push(profile);
            }
        }
        catalog
    }

    /// The full built-in set, used when discovery fails or reports nothing
    pub fn builtin() -> Self {
        Self::new(ProfileId::ALL)
    }

    /// Decode daemon codes, dropping (and logging) any outside the code table
    pub fn from_codes(codes: &[u32]) -> Self {
        Self::new(codes.iter().filter_map(|code| {
            let profile = ProfileId::from_code(*code);
            if profile.is_none() {
                warn!("Dropping unknown profile code from daemon: {}", code);
            }
            profile
        }))
    }

    /// Substitute the built-in set for an empty catalog
    pub fn or_builtin(self) -> Self {
        if self.is_empty() {
            Self::builtin()
        } else {
            self
        }
    }

    pub fn profiles(&self) -> &[ProfileId] {
        &self.profiles
    }

    pub fn contains(&self, profile: ProfileId) -> bool {
        self.profiles.contains(&profile)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
