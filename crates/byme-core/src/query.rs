// ── Query layer ──
//
// Paging over the controller's SQL socket and merging raw rows into
// device records. The merge functions are pure so they can be tested
// without a server; the async wrappers only fetch a page and merge it.

use std::future::Future;

use byme_api::{RoomIndex, Row, WebClient};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Device, StatusEntry};

/// Rows requested per page.
pub const PAGE_SIZE: usize = 300;

/// Working copy of the device table while an update runs.
pub type DeviceTable = IndexMap<String, Device>;

/// Run `query_fn` page by page until a page comes back short.
///
/// `query_fn(acc, start, limit)` returns the updated accumulator and the
/// number of rows that page produced. A page of exactly [`PAGE_SIZE`]
/// rows always triggers one more request, even if it turns out empty.
/// Returns the accumulator and the total number of rows consumed.
pub async fn paginate<A, F, Fut>(
    mut query_fn: F,
    mut acc: A,
    start: usize,
) -> Result<(A, usize), CoreError>
where
    F: FnMut(A, usize, usize) -> Fut,
    Fut: Future<Output = Result<(A, usize), CoreError>>,
{
    let mut offset = start;
    let mut total = 0;
    loop {
        let (next, returned) = query_fn(acc, offset, PAGE_SIZE).await?;
        acc = next;
        total += returned;
        offset += returned;
        if returned != PAGE_SIZE {
            break;
        }
        debug!(offset, "full page received, fetching next");
    }
    Ok((acc, total))
}

// ── Pure merges ──────────────────────────────────────────────────────

/// Merge remote-device rows into the table.
///
/// Unknown ids create new records; known ids gain or update status
/// entries. A status name repeated within the rows resolves to the last
/// row. Rows without an object id or status name are skipped.
pub fn merge_remote_rows(table: &mut DeviceTable, rows: &[Row]) {
    for row in rows {
        let Some(object_id) = field(row, "object_id") else {
            continue;
        };
        let device = table.entry(object_id.to_owned()).or_insert_with(|| {
            Device::new(
                object_id,
                row.get("object_name").cloned().unwrap_or_default(),
                row.get("object_type").cloned().unwrap_or_default(),
            )
        });

        let Some(status_name) = field(row, "status_name") else {
            continue;
        };
        device.merge_status(status_name.to_owned(), status_entry(row));
    }
}

/// Apply room-membership rows to devices already in the table.
///
/// Never creates records; rows for unknown ids are ignored. Room names
/// are resolved through `rooms`, skipping ids it does not know.
pub fn merge_room_rows(table: &mut DeviceTable, rows: &[Row], rooms: &RoomIndex) {
    for row in rows {
        let Some(device) = field(row, "object_id").and_then(|id| table.get_mut(id)) else {
            continue;
        };
        let ids: Vec<String> = row
            .get("room_ids")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let names = ids
            .iter()
            .filter_map(|id| rooms.get(id))
            .map(|room| room.name.clone())
            .collect();
        device.set_rooms(ids, names);
    }
}

/// Turn single-device status rows into a name → entry map.
pub fn status_rows_to_map(rows: &[Row]) -> IndexMap<String, StatusEntry> {
    rows.iter()
        .filter_map(|row| Some((field(row, "status_name")?.to_owned(), status_entry(row))))
        .collect()
}

fn field<'a>(row: &'a Row, name: &str) -> Option<&'a str> {
    row.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

fn status_entry(row: &Row) -> StatusEntry {
    StatusEntry {
        status_id: row.get("status_id").cloned().unwrap_or_default(),
        status_value: row.get("status_value").cloned().unwrap_or_default(),
        status_range: field(row, "status_range").map(str::to_owned),
    }
}

// ── Page fetchers ────────────────────────────────────────────────────

/// Fetch one page of controllable objects and merge it into `table`.
pub async fn discover_remote_devices(
    client: &WebClient,
    mut table: DeviceTable,
    start: usize,
    limit: usize,
) -> Result<(DeviceTable, usize), CoreError> {
    let rows = client.select_remote_devices(start, limit).await?;
    merge_remote_rows(&mut table, &rows);
    Ok((table, rows.len()))
}

/// Fetch one page of room membership and apply it to known devices.
pub async fn enrich_room_membership(
    client: &WebClient,
    rooms: &RoomIndex,
    mut table: DeviceTable,
    start: usize,
    limit: usize,
) -> Result<(DeviceTable, usize), CoreError> {
    let rows = client
        .select_room_membership(&rooms.joined_ids(), start, limit)
        .await?;
    merge_room_rows(&mut table, &rows, rooms);
    Ok((table, rows.len()))
}

/// Current attribute values of one device.
pub async fn refresh_single_device_status(
    client: &WebClient,
    object_id: &str,
) -> Result<IndexMap<String, StatusEntry>, CoreError> {
    let rows = client.select_device_status(object_id).await?;
    Ok(status_rows_to_map(&rows))
}
