//! Inspect a blockdb datafile.
//!
//! ```bash
//! blockdb data.blk info
//! blockdb data.blk chain
//! blockdb --log-level debug data.blk index
//! ```

use std::error::Error;
use std::path::PathBuf;

use blockdb::{config::DEFAULT_POOL_SIZE, BlockStore, StoreConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blockdb", version, about = "Inspect a blockdb datafile")]
struct Args {
    /// Path of an existing datafile
    datafile: PathBuf,

    /// Number of buffer pool frames
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", env = "BLOCKDB_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Control block fields and pool statistics
    Info,
    /// Record pages from first to last
    Chain,
    /// Shape of the record-id index, after a full invariant check
    Index,
    /// Page usage according to the free-space bitmap
    Bitmap,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if !args.datafile.is_file() {
        return Err(format!("no datafile at {}", args.datafile.display()).into());
    }
    let config = StoreConfig::new().with_pool_size(args.pool_size);
    let mut store = BlockStore::open(&args.datafile, config)?;

    match args.command {
        Command::Info => print_info(&mut store)?,
        Command::Chain => print_chain(&mut store)?,
        Command::Index => print_index(&mut store)?,
        Command::Bitmap => print_bitmap(&mut store)?,
    }

    store.close()?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise `--log-level` applies to this crate only.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("blockdb={level}")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn print_info(store: &mut BlockStore) -> blockdb::Result<()> {
    let control = store.control()?;
    let capacity = store.index_capacity();
    println!("datafile pages:        {}", control.datafile_pages);
    println!("next record id:        {}", control.next_id);
    println!("first record page:     {}", control.first_record_page);
    println!("next available page:   {}", control.next_available_record_page);
    println!("index root:            {}", control.index_root);
    println!("index first leaf:      {}", control.index_first_leaf);
    println!("index capacity:        leaf {} / branch {}", capacity.leaf, capacity.branch);
    println!("records:               {}", store.len()?);

    let stats = store.stats();
    println!(
        "pool:                  {} hits, {} misses, {} evictions ({:.1}% hit rate)",
        stats.hits,
        stats.misses,
        stats.evictions,
        stats.hit_rate()
    );
    Ok(())
}

fn print_chain(store: &mut BlockStore) -> blockdb::Result<()> {
    println!(
        "{:>6} {:>6} {:>6} {:>11} {:>10} {:>6}",
        "page", "prev", "next", "utilization", "free", "live"
    );
    for page in store.pages()? {
        println!(
            "{:>6} {:>6} {:>6} {:>11} {:>10} {:>3}/{:<3}",
            page.page_id,
            page.prev,
            page.next,
            page.utilization,
            page.free_space,
            page.live_slots,
            page.slots
        );
    }
    Ok(())
}

fn print_index(store: &mut BlockStore) -> blockdb::Result<()> {
    let shape = store.check_index()?;
    let capacity = store.index_capacity();
    println!("entries:  {}", shape.entries);
    println!("nodes:    {}", shape.nodes);
    println!("height:   {}", shape.height);
    println!("capacity: leaf {} / branch {}", capacity.leaf, capacity.branch);
    Ok(())
}

fn print_bitmap(store: &mut BlockStore) -> blockdb::Result<()> {
    let total = store.page_count();
    let used = store.pages_in_use()?;
    println!("pages:  {total}");
    println!("in use: {used}");
    println!("free:   {}", total - used);
    Ok(())
}
