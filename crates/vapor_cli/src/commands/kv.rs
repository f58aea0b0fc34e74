//! Raw key-value commands.

use vapor_core::{KvIterator, KvReader, KvWriter, Store};

/// Sets `key` to `value` in one batch.
pub fn write(store: &Store, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let writer = store.writer()?;
    let mut batch = writer.new_batch();
    batch.set(key, value);
    writer.execute_batch(&batch)?;
    Ok(())
}

/// Prints the value stored under `key`.
pub fn read(store: &Store, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value = store
        .reader()?
        .get(key.as_bytes())?
        .ok_or_else(|| format!("Key not found: {key}"))?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

/// Prints every key starting with `prefix`, one `key<TAB>value` per line.
pub fn scan(store: &Store, prefix: &str) -> Result<(), Box<dyn std::error::Error>> {
    let reader = store.reader()?;
    let mut iter = reader.prefix_iterator(prefix.as_bytes());
    let mut count = 0usize;
    while let Some((key, value)) = iter.current() {
        println!(
            "{}\t{}",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        );
        count += 1;
        iter.next();
    }
    tracing::debug!(count, "scan finished");
    Ok(())
}
