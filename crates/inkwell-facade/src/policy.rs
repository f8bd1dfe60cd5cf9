//! # Read/Write Policy
//!
//! Consolidates the operation × online-state × syncing-state decision table
//! into one function per operation family, so the memo path and the shelf
//! path share a single source of truth instead of diverging.

/// How a write should be dispatched, given current network and sync-cycle
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Offline: persist locally and enqueue; the background engine carries
    /// it the rest of the way.
    StoreFirst,
    /// Online, but a sync cycle is already in flight: persist locally and
    /// enqueue, then schedule the immediate remote attempt behind the
    /// current cycle via the request gate instead of racing it.
    GateThenServer,
    /// Online and idle: persist locally and enqueue, then attempt the
    /// remote call immediately so the caller sees a synced result without
    /// waiting for the next engine pass. Falls back to the store-first
    /// outcome on a network-class failure.
    ServerFirstWithFallback,
}

pub fn decide_write_policy(is_online: bool, is_syncing: bool) -> WritePolicy {
    if !is_online {
        WritePolicy::StoreFirst
    } else if is_syncing {
        WritePolicy::GateThenServer
    } else {
        WritePolicy::ServerFirstWithFallback
    }
}

/// How a list read should be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadListPolicy {
    /// Online: ask the server, write the result through to the local
    /// cache on success, and fall back to the cache if the server call
    /// fails.
    ServerFirstWithCacheFallback,
    /// Offline: read straight from the local cache.
    StoreOnly,
}

pub fn decide_read_list_policy(is_online: bool) -> ReadListPolicy {
    if is_online {
        ReadListPolicy::ServerFirstWithCacheFallback
    } else {
        ReadListPolicy::StoreOnly
    }
}

/// How a single-entity detail read should be served. Identical shape to
/// the list policy today, but kept distinct since spec.md's read-detail
/// and read-list rules are named separately and may diverge later (detail
/// reads never fall back to a stale cache entry the way a list read's
/// write-through cache does).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadDetailPolicy {
    Server,
    Store,
}

pub fn decide_read_detail_policy(is_online: bool) -> ReadDetailPolicy {
    if is_online {
        ReadDetailPolicy::Server
    } else {
        ReadDetailPolicy::Store
    }
}
