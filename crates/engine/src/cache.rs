use crate::NodeId;

/// One remembered message identity: the originator's stamp plus the two
/// endpoints. Two messages with equal tuples are the same message as far
/// as duplicate suppression is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub stamp: u64,
    pub source: NodeId,
    pub destination: NodeId,
}

/// The seen-message cache for a single kind: an ordered list of
/// identities, append-only between eviction sweeps.
///
/// # Test
///
/// ```
/// use mesh_node_engine::cache::SeenCache;
///
/// let mut cache = SeenCache::default();
///
/// cache.record(100, "A", "C");
/// assert!(cache.contains(100, "A", "C"));
/// assert!(!cache.contains(100, "A", "B"));
///
/// // A retransmission refreshes its identity in place.
/// assert!(cache.restamp(100, "A", "C", 130));
/// assert!(cache.contains(130, "A", "C"));
/// assert!(!cache.contains(100, "A", "C"));
///
/// // Entries age out once the TTL has fully elapsed.
/// cache.evict(309, 180);
/// assert!(cache.contains(130, "A", "C"));
/// cache.evict(310, 180);
/// assert!(cache.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct SeenCache(Vec<Seen>);

impl SeenCache {
    pub fn contains(&self, stamp: u64, source: &str, destination: &str) -> bool {
        self.0.iter().any(|seen| {
            seen.stamp == stamp
                && seen.source.as_str() == source
                && seen.destination.as_str() == destination
        })
    }

    pub fn record(&mut self, stamp: u64, source: &str, destination: &str) {
        self.0.push(Seen {
            stamp,
            source: NodeId::from(source),
            destination: NodeId::from(destination),
        });
    }

    /// Rewrites the stamp of a recorded identity, keeping its position.
    /// Used when a transaction retransmits with a fresh stamp, so the
    /// local record keeps matching the frame actually on the air.
    pub fn restamp(&mut self, stamp: u64, source: &str, destination: &str, to: u64) -> bool {
        for seen in self.0.iter_mut() {
            if seen.stamp == stamp
                && seen.source.as_str() == source
                && seen.destination.as_str() == destination
            {
                seen.stamp = to;
                return true;
            }
        }

        false
    }

    /// Drops every entry whose stamp is a full TTL behind `now`.
    pub fn evict(&mut self, now: u64, ttl: u64) {
        self.0.retain(|seen| now.saturating_sub(seen.stamp) < ttl);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One cache per kind. The kinds share eviction policy and nothing else;
/// no entry is ever visible across kinds.
#[derive(Debug, Default)]
pub struct SeenCaches {
    pub rreq: SeenCache,
    pub rrep: SeenCache,
    pub data: SeenCache,
    pub resp: SeenCache,
}

impl SeenCaches {
    pub fn evict(&mut self, now: u64, ttl: u64) {
        self.rreq.evict(now, ttl);
        self.rrep.evict(now, ttl);
        self.data.evict(now, ttl);
        self.resp.evict(now, ttl);
    }
}
