//! Five-room demo map used when no persisted nodes are configured.

use std::f64::consts::{FRAC_PI_2, PI};

use seeker_memory::{MemoryError, MemoryStore};
use seeker_types::{NodeId, Pose};

const DEMO_NODES: [(f64, f64, f64, &[&str], &str); 5] = [
    (1.0, 2.0, 0.0, &["kitchen", "appliances", "counter"], "Kitchen area with counter and appliances"),
    (5.0, 2.0, FRAC_PI_2, &["living room", "couch", "table"], "Living room with couch and coffee table"),
    (3.0, 0.0, 0.0, &["hallway", "corridor", "doorway"], "Hallway connecting rooms with doorways"),
    (8.0, 5.0, -FRAC_PI_2, &["bedroom", "bed", "closet"], "Bedroom with bed and closet"),
    (2.0, 5.0, PI, &["bathroom", "sink", "shower"], "Bathroom with sink and shower"),
];

/// Append the demo rooms to `store` and return their ids.
pub fn seed_demo_store(store: &mut dyn MemoryStore) -> Result<Vec<NodeId>, MemoryError> {
    DEMO_NODES
        .iter()
        .map(|(x, y, yaw, tags, summary)| {
            store.add_node(
                Pose::new(*x, *y, *yaw),
                None,
                tags.iter().map(|t| t.to_string()).collect(),
                summary.to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_memory::InMemoryNodeStore;

    #[test]
    fn seeds_five_rooms_in_order() {
        let mut store = InMemoryNodeStore::new();
        let ids = seed_demo_store(&mut store).unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        let kitchen = store.get_node(0).unwrap().unwrap();
        assert_eq!(kitchen.tags[0], "kitchen");
    }
}
