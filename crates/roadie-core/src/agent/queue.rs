//! Target-queue construction for one farming cycle.
//!
//! Eligible forts (cooldown elapsed, inside the leash) are ordered into a
//! nearest-neighbour tour from the agent's position, filtered by the visit
//! toggles, and optionally front-loaded with lured stops. With both visit
//! toggles off the queue comes out empty on purpose; the farming loop treats
//! that as a quiet cycle rather than an error.

use std::cmp::Ordering;

use crate::geo::LatLng;
use crate::world::map::{Fort, FortKind, MapSnapshot};

/// How many times each lured stop is re-queued at the front.
const LURE_BOOST_PASSES: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct QueueFilters {
    pub visit_pokestops: bool,
    pub visit_gyms: bool,
    /// Leash radius in meters; 0 disables the distance filter.
    pub max_distance_m: f64,
    pub prioritize_lured: bool,
}

/// Greedy tour: repeatedly take the fort closest to the cursor. Not optimal,
/// but cheap and good enough to avoid zig-zagging across the map.
pub fn nearest_neighbour_tour(origin: LatLng, mut pool: Vec<Fort>) -> Vec<Fort> {
    let mut tour = Vec::with_capacity(pool.len());
    let mut cursor = origin;
    while !pool.is_empty() {
        let nearest = pool
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance_m(&cursor)
                    .partial_cmp(&b.position.distance_m(&cursor))
                    .unwrap_or(Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        let fort = pool.swap_remove(nearest);
        cursor = fort.position;
        tour.push(fort);
    }
    tour
}

/// Re-inserts each lured stop near the front, once per boost pass, at
/// stepping positions so boosted visits interleave with the tour.
pub fn boost_lured(queue: &mut Vec<Fort>) {
    let lured: Vec<Fort> = queue
        .iter()
        .filter(|f| f.lure.is_some() && f.kind == FortKind::Pokestop)
        .cloned()
        .collect();
    if lured.is_empty() {
        return;
    }
    let mut at = 0;
    for _ in 0..LURE_BOOST_PASSES {
        for fort in &lured {
            queue.insert(at, fort.clone());
            at += 1;
        }
    }
}

pub fn build_queue(
    snapshot: &MapSnapshot,
    origin: LatLng,
    now_ms: u64,
    filters: &QueueFilters,
) -> Vec<Fort> {
    let eligible: Vec<Fort> = snapshot
        .forts
        .iter()
        .filter(|f| {
            f.cooldown_complete_ms < now_ms
                && (filters.max_distance_m == 0.0
                    || f.position.distance_m(&origin) < filters.max_distance_m)
        })
        .cloned()
        .collect();
    let mut queue = nearest_neighbour_tour(origin, eligible);
    if !filters.visit_gyms {
        queue.retain(|f| f.kind != FortKind::Gym);
    }
    if !filters.visit_pokestops {
        queue.retain(|f| f.kind == FortKind::Gym);
    }
    if filters.prioritize_lured {
        boost_lured(&mut queue);
    }
    queue
}
