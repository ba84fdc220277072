/// Complete rowdex API Demo
///
/// Walks through the main collection operations:
/// - Schema definition from a column layout
/// - Upserts, lookups and removal by key
/// - Sorting, duplicate extraction and merge
/// - Ordered iteration resumed from a checkpoint key
/// - Export / import of the serialized form

use rowdex::{Base64Order, CollectionEnv, RowCollection, RowSchema, RowSet};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n╔═══════════════════════════════════════════════╗");
    println!("║        rowdex - Complete API Demo             ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    // Step 1: Define the record layout
    println!("Step 1: SCHEMA - url hash keyed records...");
    let schema = Arc::new(RowSchema::parse(
        "byte[] urlhash-12, Cardinal hits-4, Cardinal day-2",
        Arc::new(Base64Order),
    )?);
    println!("  record width: {} bytes\n", schema.record_width());

    // Step 2: PUT - insert and update by key
    println!("Step 2: PUT - Adding records...");
    let mut set = RowSet::new(schema.clone());
    set.put(&make_record(&schema, b"q9Xh3kLm0aBc", 3, 120)?)?;
    set.put(&make_record(&schema, b"Ab12Cd34Ef56", 1, 121)?)?;
    set.put(&make_record(&schema, b"zzTop_-99xyz", 7, 119)?)?;
    let replaced = set.put(&make_record(&schema, b"Ab12Cd34Ef56", 2, 122)?)?;
    println!("  {} records, update replaced hits={:?}\n", set.len(), replaced.and_then(|e| e.cardinal(1)));

    // Step 3: GET / REMOVE
    println!("Step 3: GET / REMOVE...");
    if let Some(entry) = set.get(b"q9Xh3kLm0aBc")? {
        println!("  q9Xh3kLm0aBc -> hits={:?}", entry.cardinal(1));
    }
    set.remove(b"zzTop_-99xyz")?;
    println!("  after remove: {} records\n", set.len());

    // Step 4: DUPLICATES - bulk load without key checks, then clean up
    println!("Step 4: DUPLICATES - bulk loading...");
    let mut bulk = RowCollection::new(schema.clone());
    for key in [b"AAAAAAAAAAAA", b"BBBBBBBBBBBB", b"BBBBBBBBBBBB", b"CCCCCCCCCCCC", b"BBBBBBBBBBBB"] {
        bulk.append(&make_record(&schema, key, 1, 100)?)?;
    }
    let report = bulk.extract_duplicate_groups()?;
    println!("  kept {} records, {} duplicate group(s)\n", bulk.len(), report.groups.len());

    // Step 5: MERGE
    println!("Step 5: MERGE...");
    let mut other = RowSet::from_collection(bulk);
    let mut merged = RowSet::merge(&mut set, &mut other)?;
    println!("  merged set holds {} records\n", merged.len());

    // Step 6: ITERATE from a checkpoint
    println!("Step 6: ITERATE - resuming at 'B'...");
    for entry in merged.rows(true, Some(&b"BBBBBBBBBBBB"[..])) {
        println!("  {}", String::from_utf8_lossy(entry.key()));
    }
    println!();

    // Step 7: EXPORT / IMPORT
    println!("Step 7: EXPORT / IMPORT...");
    let blob = merged.export()?;
    let restored = RowSet::import_from(schema, &blob, CollectionEnv::default())?;
    println!("  blob: {} bytes, restored {} records", blob.len(), restored.len());

    // Step 8: Statistics
    let stats = restored.stats();
    println!("\nStatistics:");
    println!("  Records: {}", stats.record_count);
    println!("  Sorted prefix: {}", stats.sort_bound);
    println!("  Ordering: {}", stats.order_signature);
    println!("  Utilization: {:.1}%", stats.utilization_percent);

    println!("\n✓ Demo complete!");
    Ok(())
}

fn make_record(schema: &Arc<RowSchema>, key: &[u8; 12], hits: u64, day: u64) -> rowdex::Result<Vec<u8>> {
    let mut entry = rowdex::Entry::empty(schema.clone());
    entry.set_column(0, key)?;
    entry.set_cardinal(1, hits)?;
    entry.set_cardinal(2, day)?;
    Ok(entry.into_bytes())
}
