/// Example: running collections under a memory budget
///
/// A shared MemoryTracker caps how much record storage every collection in
/// one environment may hold. Growth past the cap fails with
/// CapacityExhausted instead of allocating, and trim() gives back growth
/// slack once the tracker reports pressure.

use rowdex::{CollectionConfig, CollectionEnv, ErrorKind, MemoryTracker, NaturalOrder, RowCollection, RowSchema};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Budget of 64KB, pressure reported at 80%
    let tracker = Arc::new(MemoryTracker::with_threshold(64 * 1024, 0.8));
    let config = CollectionConfig {
        grow_factor: 2.0,        // Coarse growth to make slack visible
        ..Default::default()
    };
    let env = CollectionEnv::new(config, tracker.clone(), None)?;
    println!("✓ Memory budget: {} bytes", 64 * 1024);

    // 2. Fill until the budget refuses more
    let schema = Arc::new(RowSchema::key_only(16, Arc::new(NaturalOrder))?);
    let mut coll = RowCollection::with_env(schema, 0, env)?;
    let mut record = [0u8; 16];
    for i in 0u64.. {
        record[..8].copy_from_slice(&i.to_be_bytes());
        match coll.append(&record) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::CapacityExhausted => {
                println!("✓ Growth refused after {} records", coll.len());
                break;
            }
            Err(e) => return Err(e.into()),
        }

        if i % 1000 == 0 {
            println!("Record {}: memory pressure = {:.1}%", i, tracker.memory_pressure() * 100.0);
        }
    }

    // 3. Free half and hand slack back
    while coll.len() > 2000 {
        coll.remove_one();
    }
    println!("Usage before trim: {} bytes", tracker.current_usage());
    if coll.trim()? {
        println!("✓ Trimmed, usage now {} bytes", tracker.current_usage());
    } else {
        println!("No pressure, nothing trimmed");
    }

    let stats = coll.stats();
    println!("\nFinal stats:");
    println!("  Records: {}", stats.record_count);
    println!("  Capacity: {}", stats.capacity);
    println!("  Utilization: {:.1}%", stats.utilization_percent);
    Ok(())
}
