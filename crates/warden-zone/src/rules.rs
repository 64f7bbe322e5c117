//! Per-type zone rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AuthId, InteractionSet, TeamId};

/// Defaults applied to newly created PvP zones and to missing values in saves.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoneDefaults {
    pub damage_multiplier: f32,
    pub combat_lock_secs: u32,
}

impl Default for ZoneDefaults {
    fn default() -> Self {
        Self {
            damage_multiplier: 0.05,
            combat_lock_secs: 3,
        }
    }
}

/// Rules of a protected zone.
///
/// The owner, the creator, the world owner and (when enabled) the owner's team have
/// elevated access and bypass every flag. Teams in `allowed_teams` get the coarse
/// break/place flags and the granted interaction categories. Everyone else is denied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedRules {
    pub owner: Option<AuthId>,
    pub owner_name: String,
    pub allow_owner_team: bool,
    pub allowed_teams: BTreeSet<TeamId>,
    pub can_break: bool,
    pub can_place: bool,
    pub interactions: InteractionSet,
}

impl ProtectedRules {
    /// Rules for a fresh zone: owned by the creator, owner's team allowed, nothing else.
    #[must_use]
    pub fn owned_by(owner: Option<AuthId>) -> Self {
        Self {
            owner,
            allow_owner_team: true,
            ..Self::default()
        }
    }

    /// Returns `true` if the team was newly added.
    pub fn allow_team(&mut self, team: TeamId) -> bool {
        self.allowed_teams.insert(team)
    }

    /// Returns `true` if the team was present.
    pub fn disallow_team(&mut self, team: TeamId) -> bool {
        self.allowed_teams.remove(&team)
    }
}

/// Rules of a PvP zone.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvpRules {
    /// Fraction of normal player damage dealt inside the zone.
    pub damage_multiplier: f32,
    /// Seconds after the last hit during which a player may not leave.
    pub combat_lock_secs: u32,
    pub dot_damage_multiplier: f32,
    pub dot_interval_multiplier: f32,
}

impl Default for PvpRules {
    fn default() -> Self {
        Self::from_defaults(ZoneDefaults::default())
    }
}

impl PvpRules {
    #[must_use]
    pub const fn from_defaults(defaults: ZoneDefaults) -> Self {
        Self {
            damage_multiplier: defaults.damage_multiplier,
            combat_lock_secs: defaults.combat_lock_secs,
            dot_damage_multiplier: 1.0,
            dot_interval_multiplier: 1.0,
        }
    }

    #[must_use]
    pub const fn combat_lock_ms(&self) -> u64 {
        self.combat_lock_secs as u64 * 1000
    }

    /// Whether damage-over-time effects need rescaling inside the zone.
    #[must_use]
    pub fn has_dot_override(&self) -> bool {
        self.dot_damage_multiplier != 1.0 || self.dot_interval_multiplier != 1.0
    }

    /// Factor applied to pending damage-over-time, or `None` when unmodified.
    ///
    /// Both multipliers are clamped at zero before multiplying.
    #[must_use]
    pub fn dot_scale(&self) -> Option<f32> {
        if !self.has_dot_override() {
            return None;
        }
        Some(self.dot_damage_multiplier.max(0.0) * self.dot_interval_multiplier.max(0.0))
    }

    /// Replace values a hand-edited save could have broken.
    #[must_use]
    pub fn sanitized(self, defaults: ZoneDefaults) -> Self {
        let finite_or = |value: f32, fallback: f32| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            damage_multiplier: finite_or(self.damage_multiplier, defaults.damage_multiplier),
            combat_lock_secs: self.combat_lock_secs,
            dot_damage_multiplier: finite_or(self.dot_damage_multiplier, 1.0),
            dot_interval_multiplier: finite_or(self.dot_interval_multiplier, 1.0),
        }
    }
}

/// Damage multiplier as a percentage for display.
///
/// Whole percentages print without decimals, fractional ones with one.
///
/// ```
/// # use warden_zone::format_damage_percent;
/// assert_eq!(format_damage_percent(0.05), "5%");
/// assert_eq!(format_damage_percent(0.005), "0.5%");
/// ```
#[must_use]
pub fn format_damage_percent(multiplier: f32) -> String {
    let percent = f64::from(multiplier) * 100.0;
    let rounded = (percent * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}%", rounded as i64)
    } else {
        format!("{rounded:.1}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_scale() {
        let mut rules = PvpRules::default();
        assert_eq!(rules.dot_scale(), None);

        rules.dot_damage_multiplier = 0.5;
        assert_eq!(rules.dot_scale(), Some(0.5));

        rules.dot_interval_multiplier = 2.0;
        assert_eq!(rules.dot_scale(), Some(1.0));

        rules.dot_damage_multiplier = -3.0;
        assert_eq!(rules.dot_scale(), Some(0.0));
    }

    #[test]
    fn test_format_damage_percent() {
        assert_eq!(format_damage_percent(0.05), "5%");
        assert_eq!(format_damage_percent(0.005), "0.5%");
        assert_eq!(format_damage_percent(0.0), "0%");
        assert_eq!(format_damage_percent(1.0), "100%");
        assert_eq!(format_damage_percent(0.125), "12.5%");
    }

    #[test]
    fn test_sanitize_broken_values() {
        let defaults = ZoneDefaults::default();
        let rules = PvpRules {
            damage_multiplier: f32::NAN,
            combat_lock_secs: 4,
            dot_damage_multiplier: -1.0,
            dot_interval_multiplier: f32::INFINITY,
        }
        .sanitized(defaults);
        assert_eq!(rules.damage_multiplier, 0.05);
        assert_eq!(rules.combat_lock_secs, 4);
        assert!(!rules.has_dot_override());
    }

    #[test]
    fn test_fresh_protected_rules() {
        let rules = ProtectedRules::owned_by(Some(AuthId(7)));
        assert_eq!(rules.owner, Some(AuthId(7)));
        assert!(rules.allow_owner_team);
        assert!(!rules.can_break);
        assert!(!rules.can_place);
        assert!(rules.interactions.is_empty());
    }
}
