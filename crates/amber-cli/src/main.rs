//! Amber demo driver.
//!
//! On first run it formats the pool, builds the initial structures,
//! and prints them. On subsequent runs it reopens the pool and
//! exercises pop/push/insert/remove sequences, printing before/after
//! snapshots — restart it to watch the collections survive.

use std::fmt::Display;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use amber_collections::Root;
use amber_heap::{Pool, PoolConfig};

/// Demo driver for the Amber persistent collections.
#[derive(Parser)]
#[command(name = "amber", version, about, long_about = None)]
struct Cli {
    /// Path of the pool file (created on first run).
    #[arg(short, long, default_value = "pool")]
    pool: PathBuf,

    /// Total pool size in bytes, used only when formatting.
    #[arg(long, default_value_t = PoolConfig::DEFAULT_POOL_SIZE)]
    size: u64,

    /// Layout tag validated on every open.
    #[arg(long, default_value = "LISTPOOL")]
    layout: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PoolConfig::new(cli.pool.clone(), cli.layout.clone()).with_size(cli.size);

    let (mut pool, created) = Pool::open_or_create(&config)
        .with_context(|| format!("opening pool at {}", cli.pool.display()))?;

    let report = pool.recovery_report();
    if report.rolled_back {
        println!(
            "(recovered: rolled back an interrupted transaction, {} undo entries)",
            report.entries_replayed
        );
    }

    if created {
        first_run(&mut pool)
    } else {
        later_run(&mut pool)
    }
}

/// Format-time population, all in one transaction.
fn first_run(pool: &mut Pool) -> Result<()> {
    let root = pool.run(|tx| {
        let root = Root::init(tx)?;
        root.list.push_back_in(tx, 0)?;
        root.list.push_back_in(tx, 1)?;
        root.list.push_back_in(tx, 2)?;
        for v in [2.0, 4.0, 6.0, 8.0, 10.0, 12.0] {
            root.vector.push_back_in(tx, v)?;
        }
        root.text.append_str_in(tx, "amber")?;
        for k in 1..=3 {
            root.table.put_in(tx, k, k * k)?;
        }
        Ok::<_, amber_core::CollectionError>(root)
    })?;

    println!("Created a fresh pool");
    print_all(pool, &root);
    println!("\nRun again to exercise the existing structures.");
    Ok(())
}

/// The pop/push/insert/remove dance over the reopened structures.
fn later_run(pool: &mut Pool) -> Result<()> {
    let Some(root) = Root::load(pool) else {
        bail!("pool exists but its root was never initialized");
    };

    println!("Before popping");
    print_all(pool, &root);

    let val = root.list.pop_back(pool)?;
    println!("\nAfter popping {val}");
    print_list(pool, &root);

    root.list.push_back(pool, val)?;
    println!("\nAfter pushing {val} back");
    print_list(pool, &root);

    root.list.push_front(pool, -1)?;
    println!("\nAfter pushing front -1");
    print_list(pool, &root);

    let val = root.list.pop_front(pool)?;
    println!("\nAfter popping front {val}");
    print_list(pool, &root);

    root.list.insert(pool, 7, 2)?;
    println!("\nAfter inserting 7 at index 2");
    print_list(pool, &root);

    let val = root.list.remove(pool, 2)?;
    println!("\nAfter removing {val} from index 2");
    print_list(pool, &root);

    let val = root.vector.pop_back(pool)?;
    root.vector.push_back(pool, val)?;
    root.vector.insert(pool, -37.0, 3)?;
    println!("\nAfter vector pop/push and inserting -37 at index 3");
    print_vector(pool, &root);

    let val = root.vector.remove(pool, 3)?;
    println!("\nAfter removing {val} from vector index 3");
    print_vector(pool, &root);

    root.text.append_str(pool, "!")?;
    println!("\nAfter appending to the string");
    println!("  text:   \"{}\"", root.text.as_string(pool));

    let next_key = root.table.len(pool) as i64 + 1;
    root.table.put(pool, next_key, next_key * next_key)?;
    println!("\nAfter inserting key {next_key} into the table");
    print_table(pool, &root);

    Ok(())
}

fn print_all(pool: &Pool, root: &Root) {
    print_list(pool, root);
    print_vector(pool, root);
    println!("  text:   \"{}\"", root.text.as_string(pool));
    print_table(pool, root);
}

fn print_list(pool: &Pool, root: &Root) {
    println!("  list:   {}", fmt_values(root.list.iter(pool)));
}

fn print_vector(pool: &Pool, root: &Root) {
    println!("  vector: {}", fmt_values(root.vector.iter(pool)));
}

fn print_table(pool: &Pool, root: &Root) {
    let mut pairs: Vec<(i64, i64)> = root.table.iter(pool).collect();
    pairs.sort_unstable();
    let rendered: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    println!(
        "  table:  {{{}}} ({} buckets)",
        rendered.join(", "),
        root.table.bucket_count(pool)
    );
}

fn fmt_values<T: Display>(values: impl Iterator<Item = T>) -> String {
    let rendered: Vec<String> = values.map(|v| v.to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
