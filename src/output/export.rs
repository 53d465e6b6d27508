//! JSON export of stored course records

use crate::storage::{Storage, StoredRecord};
use crate::ScoutError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes an institution's stored records to `output_path` as a JSON array
///
/// # Arguments
///
/// * `storage` - The storage backend holding the records
/// * `institution_id` - Institution whose records are exported
/// * `output_path` - Path where the JSON file should be written
///
/// # Returns
///
/// * `Ok(usize)` - Number of records written
/// * `Err(ScoutError)` - Failed to read records or write the file
pub fn export_records(
    storage: &dyn Storage,
    institution_id: &str,
    output_path: &Path,
) -> Result<usize, ScoutError> {
    let records = storage.list_records(institution_id)?;

    let mut writer = BufWriter::new(File::create(output_path)?);
    write_records(&records, &mut writer)?;
    writer.flush()?;

    tracing::info!(
        "Exported {} records for {} to {}",
        records.len(),
        institution_id,
        output_path.display()
    );
    Ok(records.len())
}

/// Serializes records as a pretty-printed JSON array
pub fn write_records<W: Write>(records: &[StoredRecord], writer: W) -> Result<(), ScoutError> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(())
}
