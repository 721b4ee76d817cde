//! In-memory fact indices.
//!
//! The entity index is the primary store; the concept index mirrors the same
//! timelines keyed by concept for cross-entity queries. Both are replaced per
//! entity in one step by [`FactIndices::publish`].

use chrono::{DateTime, Utc};
use facts_core::{Cik, Fact, Mapping, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::timeline::Timeline;

/// When a source refresh published an entity.
///
/// The monotonic instant drives the cooldown; the wall-clock time is reported.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RefreshStamp {
    at: Instant,
    wall: DateTime<Utc>,
}

impl RefreshStamp {
    pub(crate) fn now() -> Self {
        Self {
            at: Instant::now(),
            wall: Utc::now(),
        }
    }
}

/// All facts for one entity, grouped by concept.
#[derive(Debug, Clone)]
pub struct EntityFacts {
    canonical_id: Cik,
    concepts: HashMap<String, Arc<Timeline>>,
    generation: u64,
    refreshed: Option<RefreshStamp>,
}

impl EntityFacts {
    /// Groups facts by concept into timelines.
    ///
    /// Facts carrying a different canonical identifier are dropped.
    pub(crate) fn build(
        canonical_id: Cik,
        facts: Vec<Fact>,
        generation: u64,
        refreshed: Option<RefreshStamp>,
    ) -> Self {
        let mut grouped: HashMap<String, Vec<Fact>> = HashMap::new();
        let mut foreign = 0usize;

        for fact in facts {
            if fact.canonical_id != canonical_id {
                foreign += 1;
                continue;
            }
            grouped.entry(fact.concept.clone()).or_default().push(fact);
        }

        if foreign > 0 {
            warn!(
                canonical_id = %canonical_id,
                dropped = foreign,
                "Dropped facts belonging to another entity"
            );
        }

        let concepts = grouped
            .into_iter()
            .map(|(concept, facts)| (concept, Arc::new(Timeline::from_facts(facts))))
            .collect();

        Self {
            canonical_id,
            concepts,
            generation,
            refreshed,
        }
    }

    /// Canonical identifier of the entity.
    #[must_use]
    pub const fn canonical_id(&self) -> &Cik {
        &self.canonical_id
    }

    /// Timeline for a concept, if any facts were stored for it.
    #[must_use]
    pub fn timeline(&self, concept: &str) -> Option<&Arc<Timeline>> {
        self.concepts.get(concept)
    }

    /// Concepts with stored facts.
    pub fn concepts(&self) -> impl Iterator<Item = &str> {
        self.concepts.keys().map(String::as_str)
    }

    /// Number of concepts with stored facts.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    /// Total number of stored facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.concepts.values().map(|t| t.len()).sum()
    }

    /// Number of successful source refreshes so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall-clock time of the last successful refresh; `None` for data that
    /// was only seeded.
    #[must_use]
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.refreshed.map(|stamp| stamp.wall)
    }

    /// Returns true if the last successful refresh happened less than
    /// `cooldown` before `now`.
    #[must_use]
    pub fn refreshed_within(&self, cooldown: Duration, now: Instant) -> bool {
        self.refreshed
            .is_some_and(|stamp| now.saturating_duration_since(stamp.at) < cooldown)
    }
}

/// Counts describing the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Entities with stored facts.
    pub companies: usize,
    /// Distinct concepts across all entities.
    pub concepts: usize,
    /// Total stored facts.
    pub total_facts: usize,
}

/// Resolution and refresh state of one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMetadata {
    /// Mapping for the requested ticker.
    pub mapping: Mapping,
    /// Every ticker listed for the company's identifier.
    pub tickers: Vec<Ticker>,
    /// Last successful source refresh; `None` if the facts were only seeded
    /// or nothing is stored.
    pub last_refreshed: Option<DateTime<Utc>>,
    /// Concepts with stored facts.
    pub concepts: usize,
    /// Stored facts.
    pub facts: usize,
}

/// Entity and concept indices, guarded together by the store.
#[derive(Debug, Default)]
pub(crate) struct FactIndices {
    by_entity: HashMap<Cik, Arc<EntityFacts>>,
    by_concept: HashMap<String, BTreeMap<Cik, Arc<Timeline>>>,
}

impl FactIndices {
    pub(crate) fn entity(&self, canonical_id: &Cik) -> Option<Arc<EntityFacts>> {
        self.by_entity.get(canonical_id).cloned()
    }

    /// Replaces an entity in both indices.
    pub(crate) fn publish(&mut self, entity: EntityFacts) -> Arc<EntityFacts> {
        let entity = Arc::new(entity);
        let cik = entity.canonical_id.clone();

        if let Some(previous) = self.by_entity.insert(cik.clone(), Arc::clone(&entity)) {
            for concept in previous.concepts.keys() {
                let emptied = match self.by_concept.get_mut(concept) {
                    Some(per_entity) => {
                        per_entity.remove(&cik);
                        per_entity.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    self.by_concept.remove(concept);
                }
            }
        }

        for (concept, timeline) in &entity.concepts {
            self.by_concept
                .entry(concept.clone())
                .or_default()
                .insert(cik.clone(), Arc::clone(timeline));
        }

        entity
    }

    /// Every fact for a concept, grouped by entity in identifier order.
    pub(crate) fn concept_facts(&self, concept: &str) -> Vec<Fact> {
        self.by_concept
            .get(concept)
            .map(|per_entity| {
                per_entity
                    .values()
                    .flat_map(|timeline| timeline.facts().iter().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        StoreStats {
            companies: self.by_entity.len(),
            concepts: self.by_concept.len(),
            total_facts: self.by_entity.values().map(|e| e.fact_count()).sum(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.by_entity.clear();
        self.by_concept.clear();
    }
}
