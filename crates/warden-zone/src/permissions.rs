//! Access evaluation for protected zones.

use crate::{
    AuthId, Denial, InteractionKind, InteractionSet, ObjectTraits, ProtectedRules, TeamId, Zone,
    ZoneKind,
};

/// Host lookups needed to evaluate access.
pub trait TeamDirectory {
    /// Current team of a player, `None` when unaffiliated or unknown.
    fn team_of(&self, auth: AuthId) -> Option<TeamId>;

    /// Whether the player owns the world and bypasses all zone rules.
    fn is_world_owner(&self, auth: AuthId) -> bool;
}

/// Access level of a player in one protected zone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Owner, creator, world owner or owner's team.
    Elevated,
    /// Member of an allowed team.
    AllowedTeam,
    None,
}

/// The flags an allowed team gets, for status display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PermissionSummary {
    pub can_break: bool,
    pub can_place: bool,
    pub interactions: InteractionSet,
}

/// What a player sees about the protected zone they stand in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedStatus {
    pub zone_name: String,
    pub access: Access,
    pub permissions: PermissionSummary,
}

impl ProtectedRules {
    #[must_use]
    pub fn access(
        &self,
        creator: Option<AuthId>,
        auth: AuthId,
        teams: &dyn TeamDirectory,
    ) -> Access {
        if teams.is_world_owner(auth) || self.owner == Some(auth) || creator == Some(auth) {
            return Access::Elevated;
        }

        let team = teams.team_of(auth);
        if self.allow_owner_team {
            let owner_team = self.owner.and_then(|owner| teams.team_of(owner));
            if team.is_some() && team == owner_team {
                return Access::Elevated;
            }
        }

        match team {
            Some(team) if self.allowed_teams.contains(&team) => Access::AllowedTeam,
            _ => Access::None,
        }
    }

    #[must_use]
    pub const fn summary(&self) -> PermissionSummary {
        PermissionSummary {
            can_break: self.can_break,
            can_place: self.can_place,
            interactions: self.interactions,
        }
    }
}

impl Zone {
    /// Access of `auth` in this zone. PvP zones never restrict and report `Elevated`.
    #[must_use]
    pub fn access(&self, auth: AuthId, teams: &dyn TeamDirectory) -> Access {
        match &self.kind {
            ZoneKind::Protected(rules) => rules.access(self.creator, auth, teams),
            ZoneKind::Pvp(_) => Access::Elevated,
        }
    }

    pub fn check_break(&self, auth: AuthId, teams: &dyn TeamDirectory) -> Result<(), Denial> {
        let ZoneKind::Protected(rules) = &self.kind else {
            return Ok(());
        };
        match rules.access(self.creator, auth, teams) {
            Access::Elevated => Ok(()),
            Access::AllowedTeam if rules.can_break => Ok(()),
            _ => Err(Denial::Break {
                zone: self.name.clone(),
            }),
        }
    }

    pub fn check_place(&self, auth: AuthId, teams: &dyn TeamDirectory) -> Result<(), Denial> {
        let ZoneKind::Protected(rules) = &self.kind else {
            return Ok(());
        };
        match rules.access(self.creator, auth, teams) {
            Access::Elevated => Ok(()),
            Access::AllowedTeam if rules.can_place => Ok(()),
            _ => Err(Denial::Place {
                zone: self.name.clone(),
            }),
        }
    }

    /// Unknown objects are denied to everyone below elevated access.
    pub fn check_interact(
        &self,
        auth: AuthId,
        object: ObjectTraits,
        teams: &dyn TeamDirectory,
    ) -> Result<(), Denial> {
        let ZoneKind::Protected(rules) = &self.kind else {
            return Ok(());
        };
        let kind = object.classify();
        match (rules.access(self.creator, auth, teams), kind) {
            (Access::Elevated, _) => Ok(()),
            (Access::AllowedTeam, Some(kind)) if rules.interactions.allows(kind) => Ok(()),
            _ => Err(Denial::Interact {
                zone: self.name.clone(),
                kind,
            }),
        }
    }

    /// Whether `auth` may use `kind` here. Convenience for UI listings.
    #[must_use]
    pub fn can_use(&self, auth: AuthId, kind: InteractionKind, teams: &dyn TeamDirectory) -> bool {
        match &self.kind {
            ZoneKind::Protected(rules) => match rules.access(self.creator, auth, teams) {
                Access::Elevated => true,
                Access::AllowedTeam => rules.interactions.allows(kind),
                Access::None => false,
            },
            ZoneKind::Pvp(_) => true,
        }
    }

    #[must_use]
    pub fn protected_status(
        &self,
        auth: AuthId,
        teams: &dyn TeamDirectory,
    ) -> Option<ProtectedStatus> {
        let rules = self.protected_rules()?;
        Some(ProtectedStatus {
            zone_name: self.name.clone(),
            access: rules.access(self.creator, auth, teams),
            permissions: rules.summary(),
        })
    }
}
