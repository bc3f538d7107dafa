// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Cached product rows, sync runs and account credentials all get app-side
// UUIDv7 ids so that insertion order survives in the primary key. The
// in-memory store relies on this for its stable tie-break ordering.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_sorts_by_creation() {
        let ids: Vec<Uuid> = (0..16).map(|_| uuidv7()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
