// ABOUTME: The controller's view of every instance of the service during a rollout.
// ABOUTME: Tracks role (old or new), probe health, and list confirmation per instance.

use serde::Serialize;

use crate::probe::InstanceHealth;
use crate::types::{Instance, InstanceId};

/// Which side of the transition an instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Old,
    New,
}

#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub instance: Instance,
    pub role: Role,
    pub health: InstanceHealth,
    /// Seen in a backend `list` at least once.
    pub confirmed: bool,
}

impl InstanceRecord {
    pub fn id(&self) -> &InstanceId {
        &self.instance.id
    }

    pub fn is_available(&self) -> bool {
        self.health.is_available()
    }
}

/// Instance counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub old: u32,
    pub new: u32,
    pub old_available: u32,
    pub new_available: u32,
}

impl FleetCounts {
    pub fn total(&self) -> u32 {
        self.old + self.new
    }

    pub fn available(&self) -> u32 {
        self.old_available + self.new_available
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fleet {
    records: Vec<InstanceRecord>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an instance. Re-inserting a known id is ignored.
    pub fn insert(&mut self, instance: Instance, role: Role, health: InstanceHealth) -> bool {
        if self.contains(&instance.id) {
            return false;
        }
        self.records.push(InstanceRecord {
            instance,
            role,
            health,
            confirmed: false,
        });
        true
    }

    pub fn remove(&mut self, id: &InstanceId) -> Option<InstanceRecord> {
        let pos = self.records.iter().position(|r| r.id() == id)?;
        Some(self.records.remove(pos))
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &InstanceId) -> Option<&InstanceRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn get_mut(&mut self, id: &InstanceId) -> Option<&mut InstanceRecord> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut InstanceRecord> {
        self.records.iter_mut()
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &InstanceRecord> {
        self.records.iter().filter(move |r| r.role == role)
    }

    pub fn count(&self, role: Role) -> u32 {
        self.with_role(role).count() as u32
    }

    pub fn available(&self) -> u32 {
        self.records.iter().filter(|r| r.is_available()).count() as u32
    }

    pub fn counts(&self) -> FleetCounts {
        self.records
            .iter()
            .fold(FleetCounts::default(), |mut counts, r| {
                let available = u32::from(r.is_available());
                match r.role {
                    Role::Old => {
                        counts.old += 1;
                        counts.old_available += available;
                    }
                    Role::New => {
                        counts.new += 1;
                        counts.new_available += available;
                    }
                }
                counts
            })
    }

    /// Oldest instance of `role` by creation time, skipping `excluded`.
    pub fn oldest<'a>(
        &'a self,
        role: Role,
        excluded: impl Fn(&InstanceId) -> bool + 'a,
    ) -> Option<&'a InstanceRecord> {
        self.with_role(role)
            .filter(|r| !excluded(r.id()))
            .min_by_key(|r| r.instance.created_at)
    }

    /// New instances that have reported Healthy at least once.
    pub fn proven_new(&self) -> u32 {
        self.with_role(Role::New)
            .filter(|r| r.health.ever_healthy)
            .count() as u32
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RevisionId;
    use chrono::{Duration, Utc};

    fn instance(id: &str, revision: &str, age_secs: i64) -> Instance {
        Instance {
            id: InstanceId::new(id),
            revision: RevisionId::new(revision),
            image: format!("api:{revision}"),
            created_at: Utc::now() - Duration::seconds(age_secs),
            endpoint: None,
        }
    }

    #[test]
    fn counts_split_by_role_and_availability() {
        let mut fleet = Fleet::new();
        fleet.insert(instance("a", "v1", 30), Role::Old, InstanceHealth::serving());
        fleet.insert(instance("b", "v1", 20), Role::Old, InstanceHealth::serving());
        fleet.insert(instance("c", "v2", 1), Role::New, InstanceHealth::unknown());

        let counts = fleet.counts();
        assert_eq!(counts.old, 2);
        assert_eq!(counts.new, 1);
        assert_eq!(counts.available(), 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn oldest_picks_earliest_creation() {
        let mut fleet = Fleet::new();
        fleet.insert(instance("young", "v1", 5), Role::Old, InstanceHealth::serving());
        fleet.insert(instance("old", "v1", 500), Role::Old, InstanceHealth::serving());
        fleet.insert(instance("mid", "v1", 50), Role::Old, InstanceHealth::serving());

        let oldest = fleet.oldest(Role::Old, |_| false).unwrap();
        assert_eq!(oldest.id().as_str(), "old");

        let next = fleet.oldest(Role::Old, |id| id.as_str() == "old").unwrap();
        assert_eq!(next.id().as_str(), "mid");
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut fleet = Fleet::new();
        assert!(fleet.insert(instance("a", "v1", 1), Role::Old, InstanceHealth::serving()));
        assert!(!fleet.insert(instance("a", "v1", 1), Role::New, InstanceHealth::unknown()));
        assert_eq!(fleet.len(), 1);
        assert_eq!(fleet.get(&InstanceId::new("a")).unwrap().role, Role::Old);
    }
}
