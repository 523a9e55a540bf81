//! Named events emitted by the realm.

use serde::{Deserialize, Serialize};

use factions_types::{CellKey, EntityKind, FactionId, Rank, UserId};

/// A committed change to faction, claim, or user state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactionEvent {
    /// A paid claim was added.
    ClaimAdded {
        /// Claimed cell.
        cell: CellKey,
        /// Owning faction.
        faction_id: FactionId,
    },
    /// A paid claim was removed.
    ClaimRemoved {
        /// Released cell.
        cell: CellKey,
        /// Former owner.
        faction_id: FactionId,
    },
    /// A paid claim's access level or grants changed.
    ClaimModified {
        /// Modified cell.
        cell: CellKey,
        /// Owning faction.
        faction_id: FactionId,
    },
    /// Every paid claim of a faction was removed at once.
    AllClaimsRemoved {
        /// The faction that lost its land.
        faction_id: FactionId,
        /// How many claims were removed.
        count: usize,
    },
    /// A faction was founded.
    FactionCreated {
        /// The new faction.
        faction_id: FactionId,
        /// Its founding owner.
        founder: UserId,
    },
    /// Faction metadata, relationships, invites, or guest policy changed.
    FactionModified {
        /// The modified faction.
        faction_id: FactionId,
    },
    /// A faction's base power changed.
    PowerChanged {
        /// The faction.
        faction_id: FactionId,
        /// Base power before the change.
        old_base: i64,
        /// Base power after clamping.
        new_base: i64,
    },
    /// Derived power dropped to the low-power warning threshold.
    PowerLow {
        /// The faction.
        faction_id: FactionId,
        /// Derived power after the drop.
        power: i64,
    },
    /// A faction was removed.
    FactionDisbanded {
        /// The removed faction.
        faction_id: FactionId,
    },
    /// A user joined a faction.
    MemberJoined {
        /// The user.
        user_id: UserId,
        /// The faction joined.
        faction_id: FactionId,
    },
    /// A user left, was kicked from, or lost a faction.
    MemberLeft {
        /// The user.
        user_id: UserId,
        /// The faction left.
        faction_id: FactionId,
    },
    /// A member's rank changed.
    RankChanged {
        /// The user.
        user_id: UserId,
        /// Their faction.
        faction_id: FactionId,
        /// The new rank.
        rank: Rank,
    },
    /// A faction's home was set.
    HomeSet {
        /// The faction.
        faction_id: FactionId,
    },
}

impl FactionEvent {
    /// Short event name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ClaimAdded { .. } => "claim_added",
            Self::ClaimRemoved { .. } => "claim_removed",
            Self::ClaimModified { .. } => "claim_modified",
            Self::AllClaimsRemoved { .. } => "all_claims_removed",
            Self::FactionCreated { .. } => "faction_created",
            Self::FactionModified { .. } => "faction_modified",
            Self::PowerChanged { .. } => "power_changed",
            Self::PowerLow { .. } => "power_low",
            Self::FactionDisbanded { .. } => "faction_disbanded",
            Self::MemberJoined { .. } => "member_joined",
            Self::MemberLeft { .. } => "member_left",
            Self::RankChanged { .. } => "rank_changed",
            Self::HomeSet { .. } => "home_set",
        }
    }

    /// The faction this event concerns.
    pub const fn faction_id(&self) -> FactionId {
        match self {
            Self::ClaimAdded { faction_id, .. }
            | Self::ClaimRemoved { faction_id, .. }
            | Self::ClaimModified { faction_id, .. }
            | Self::AllClaimsRemoved { faction_id, .. }
            | Self::FactionCreated { faction_id, .. }
            | Self::FactionModified { faction_id }
            | Self::PowerChanged { faction_id, .. }
            | Self::PowerLow { faction_id, .. }
            | Self::FactionDisbanded { faction_id }
            | Self::MemberJoined { faction_id, .. }
            | Self::MemberLeft { faction_id, .. }
            | Self::RankChanged { faction_id, .. }
            | Self::HomeSet { faction_id } => *faction_id,
        }
    }

    /// Persisted collections that must be saved after this event.
    pub const fn dirties(&self) -> &'static [EntityKind] {
        match self {
            Self::ClaimAdded { .. }
            | Self::ClaimRemoved { .. }
            | Self::ClaimModified { .. }
            | Self::AllClaimsRemoved { .. } => &[EntityKind::Claims],
            Self::FactionCreated { .. } => &[EntityKind::Factions, EntityKind::Users],
            Self::FactionModified { .. }
            | Self::PowerChanged { .. }
            | Self::HomeSet { .. } => &[EntityKind::Factions],
            Self::PowerLow { .. } => &[],
            Self::FactionDisbanded { .. } => &EntityKind::ALL,
            Self::MemberJoined { .. } | Self::MemberLeft { .. } => {
                &[EntityKind::Users, EntityKind::Claims]
            }
            Self::RankChanged { .. } => &[EntityKind::Users],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_events_dirty_only_claims() {
        let event = FactionEvent::ClaimAdded {
            cell: CellKey::new("overworld", 1, 2),
            faction_id: FactionId::new(),
        };
        assert_eq!(event.dirties(), &[EntityKind::Claims]);
    }

    #[test]
    fn disband_dirties_everything() {
        let event = FactionEvent::FactionDisbanded {
            faction_id: FactionId::new(),
        };
        assert_eq!(event.dirties(), &EntityKind::ALL);
    }

    #[test]
    fn warnings_are_not_durable() {
        let event = FactionEvent::PowerLow {
            faction_id: FactionId::new(),
            power: 3,
        };
        assert!(event.dirties().is_empty());
    }

    #[test]
    fn faction_id_is_extracted_from_every_shape() {
        let fid = FactionId::new();
        let events = [
            FactionEvent::HomeSet { faction_id: fid },
            FactionEvent::AllClaimsRemoved {
                faction_id: fid,
                count: 4,
            },
            FactionEvent::MemberLeft {
                user_id: UserId::new(),
                faction_id: fid,
            },
        ];
        assert!(events.iter().all(|e| e.faction_id() == fid));
    }

    #[test]
    fn events_serialize_with_variant_tag() {
        let event = FactionEvent::PowerChanged {
            faction_id: FactionId::new(),
            old_base: 20,
            new_base: 15,
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("PowerChanged"));
        assert!(json.contains("\"new_base\":15"));
    }
}
