// Raw wire-level types
//
// Rows come back from the SQL socket as ordered string maps; nothing is
// typed until `byme-core` merges them into device records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One decoded result row: column name → raw string value, in column order.
pub type Row = IndexMap<String, String>;

/// A room (top-level group) as configured on the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
}

/// All rooms known for the current session, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomIndex {
    rooms: IndexMap<String, Room>,
}

impl RoomIndex {
    pub fn from_rooms(rooms: impl IntoIterator<Item = Room>) -> Self {
        Self {
            rooms: rooms.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    /// Comma-joined room ids, ready to drop into an `IN (...)` clause.
    pub fn joined_ids(&self) -> String {
        self.rooms.keys().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_ids_preserve_server_order() {
        let index = RoomIndex::from_rooms([
            Room {
                id: "30".into(),
                name: "Cucina".into(),
            },
            Room {
                id: "12".into(),
                name: "Bagno".into(),
            },
        ]);
        assert_eq!(index.joined_ids(), "30,12");
        assert_eq!(index.get("12").map(|r| r.name.as_str()), Some("Bagno"));
        assert_eq!(index.len(), 2);
    }
}
