// SQL query endpoints
//
// Every read goes through the controller's DML-SQL socket. The statements
// are fixed; only paging bounds and ids are interpolated, and ids are
// checked to be numeric before they reach the statement text.

use tracing::debug;

use crate::client::WebClient;
use crate::codec::{self, SetValueOptionals};
use crate::error::Error;
use crate::models::{Room, RoomIndex, Row};

const ROOMS_SQL: &str = "SELECT o1.ID AS id, o1.NAME AS name \
FROM DPADD_OBJECT_RELATION r1 \
INNER JOIN DPADD_OBJECT o1 ON r1.CHILDID = o1.ID AND o1.TYPE = 'GROUP' \
WHERE r1.PARENTID = (SELECT ID FROM DPADD_OBJECT WHERE NAME = '_DPAD_DBCONSTANT_GROUP_MAIN') \
AND r1.RELATION_WEB_TIPOLOGY = 'GENERIC_RELATION' \
ORDER BY r1.ORDER_NUM, o1.ID;";

impl WebClient {
    /// Load the room list for this session.
    ///
    /// The first call queries the controller; later calls within the same
    /// session return the cached index without a request.
    pub async fn discover_rooms(&self) -> Result<RoomIndex, Error> {
        if let Some(cached) = self.rooms.read().expect("rooms lock poisoned").clone() {
            return Ok(cached);
        }

        debug!("discovering rooms");
        let rows = self.run_sql(ROOMS_SQL).await?;
        let index = RoomIndex::from_rooms(rows.into_iter().filter_map(|row| {
            let id = row.get("id").filter(|id| !id.is_empty())?.clone();
            let name = row.get("name").cloned().unwrap_or_default();
            Some(Room { id, name })
        }));
        debug!(rooms = index.len(), "rooms discovered");

        *self.rooms.write().expect("rooms lock poisoned") = Some(index.clone());
        Ok(index)
    }

    /// Comma-joined room ids for the current session (cached like
    /// [`discover_rooms`](Self::discover_rooms)).
    pub async fn discover_room_ids(&self) -> Result<String, Error> {
        Ok(self.discover_rooms().await?.joined_ids())
    }

    /// One page of controllable objects with their first-level attributes.
    ///
    /// Columns: `room_ids`, `object_id`, `object_name`, `object_type`,
    /// `status_id`, `status_name`, `status_range`, `status_value`.
    pub async fn select_remote_devices(&self, start: usize, limit: usize) -> Result<Vec<Row>, Error> {
        debug!(start, limit, "selecting remote devices");
        let sql = format!(
            "SELECT '' AS room_ids, o2.ID AS object_id, o2.NAME AS object_name, \
             o2.VALUES_TYPE AS object_type, o3.ID AS status_id, o3.NAME AS status_name, \
             o3.OPTIONALP AS status_range, o3.CURRENT_VALUE AS status_value \
             FROM DPADD_OBJECT AS o2 \
             INNER JOIN (SELECT CLASSNAME, IS_EVENT, IS_EXECUTABLE FROM DPAD_WEB_PHPCLASS) AS D_WP \
             ON o2.PHPCLASS = D_WP.CLASSNAME \
             INNER JOIN DPADD_OBJECT_RELATION r3 ON o2.ID = r3.PARENTID \
             AND r3.RELATION_WEB_TIPOLOGY = 'BYME_IDXOBJ_RELATION' \
             INNER JOIN DPADD_OBJECT o3 ON r3.CHILDID = o3.ID AND o3.TYPE = 'BYMEOBJ' AND o3.NAME != '' \
             WHERE o2.OPTIONALP NOT LIKE '%restricted%' AND o2.IS_VISIBLE = 1 \
             AND o2.OWNED_BY != 'SYSTEM' AND o2.OPTIONALP LIKE '%category=%' \
             LIMIT {start}, {limit};"
        );
        self.run_sql(&sql).await
    }

    /// One page of room membership for objects under the given rooms.
    ///
    /// Columns: `room_ids` (comma-joined), `object_id`.
    pub async fn select_room_membership(
        &self,
        room_ids: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Row>, Error> {
        if room_ids.is_empty() {
            return Ok(Vec::new());
        }
        ensure_id_list(room_ids)?;

        debug!(start, limit, "selecting room membership");
        let sql = format!(
            "SELECT GROUP_CONCAT(r2.PARENTID) AS room_ids, o2.ID AS object_id \
             FROM DPADD_OBJECT_RELATION r2 \
             INNER JOIN DPADD_OBJECT o2 ON r2.CHILDID = o2.ID AND o2.TYPE = 'BYMEIDX' \
             WHERE r2.PARENTID IN ({room_ids}) AND r2.RELATION_WEB_TIPOLOGY = 'GENERIC_RELATION' \
             GROUP BY o2.ID \
             LIMIT {start}, {limit};"
        );
        self.run_sql(&sql).await
    }

    /// Current attribute values of one object.
    ///
    /// Columns: `status_id`, `status_name`, `status_value`.
    pub async fn select_device_status(&self, object_id: &str) -> Result<Vec<Row>, Error> {
        ensure_id_list(object_id)?;

        debug!(object_id, "selecting device status");
        let sql = format!(
            "SELECT o3.ID AS status_id, o3.NAME AS status_name, o3.CURRENT_VALUE AS status_value \
             FROM DPADD_OBJECT_RELATION r3 \
             INNER JOIN DPADD_OBJECT o3 ON r3.CHILDID = o3.ID AND o3.TYPE = 'BYMEOBJ' \
             WHERE r3.PARENTID = {object_id} AND r3.RELATION_WEB_TIPOLOGY = 'BYME_IDXOBJ_RELATION' \
             AND o3.NAME != '';"
        );
        self.run_sql(&sql).await
    }

    /// Write one attribute value.
    ///
    /// The controller acknowledges with an envelope whose payload carries
    /// no rows; only an undecodable reply counts as failure.
    pub async fn set_device_status(
        &self,
        status_id: &str,
        value: &str,
        optionals: SetValueOptionals,
    ) -> Result<(), Error> {
        ensure_id_list(status_id)?;

        debug!(status_id, value, optionals = optionals.as_str(), "setting device status");
        let envelope = codec::encode_set_value(&self.session_token(), status_id, value, optionals);
        self.post_envelope(envelope).await?;
        Ok(())
    }
}

/// Ids are spliced into SQL text, so anything other than digits and
/// commas is refused up front.
fn ensure_id_list(ids: &str) -> Result<(), Error> {
    let valid = !ids.is_empty()
        && ids
            .split(',')
            .all(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(Error::Api {
            message: format!("invalid object id list: {ids:?}"),
        })
    }
}
