//! oovtable demo
//!
//! Builds one object of each concrete class, displays them through their base handles,
//! mutates public data and counters, displays them again and deletes everything through
//! base handles.
//!
//! Usage:
//!   oovtable-demo [--capacity N] [--fail-after N]

use anyhow::{Context, Result};
use clap::Parser;

use oovtable::{Base1, Base2, Derived1, Derived2, Handle, Heap, HeapConfig};

#[derive(Parser, Debug)]
#[command(name = "oovtable-demo")]
#[command(about = "Exercise the oovtable class hierarchy")]
struct Args {
    /// Maximum number of live allocations (objects and private blocks)
    #[arg(long)]
    capacity: Option<usize>,

    /// Fail the N-th allocation (0 is the next one)
    #[arg(long)]
    fail_after: Option<usize>,
}

fn display_base1(heap: &Heap, this: Handle<Base1>) -> Result<()> {
    let size = Base1::string_size(heap, this)?;
    let mut buffer = vec![0u8; size];
    Base1::string(heap, this, &mut buffer)?;
    println!(
        "type({}): {}",
        Base1::type_string(heap, this),
        oovtable::text::as_str(&buffer)
    );
    Ok(())
}

fn display_base2(heap: &Heap, this: Handle<Base2>) -> Result<()> {
    let size = Base2::string_size(heap, this)?;
    let mut buffer = vec![0u8; size];
    Base2::string(heap, this, &mut buffer)?;
    println!(
        "type({}): {}",
        Base2::type_string(heap, this),
        oovtable::text::as_str(&buffer)
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = HeapConfig::new();
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    let mut heap = Heap::with_config(config);
    if let Some(index) = args.fail_after {
        log::info!("Injecting an allocation failure at allocation {}", index);
        heap.fail_after(index);
    }

    println!();

    let base1 = Base1::new(&mut heap).context("Failed to create base1")?;

    let derived1 = Derived1::new(&mut heap).context("Failed to create derived1")?;
    let base1_2 = Derived1::cast_to_base1(derived1);
    let base2 = Derived1::cast_to_base2(derived1);

    let derived2 = Derived2::new(&mut heap).context("Failed to create derived2")?;
    let derived1_2 = Derived2::cast_to_derived1(derived2);
    let base1_3 = Derived1::cast_to_base1(derived1_2);

    println!("***");
    display_base1(&heap, base1)?;
    display_base1(&heap, base1_2)?;
    display_base1(&heap, base1_3)?;
    println!("***");

    let mut base1_data = Base1::get_public_data(&heap, base1)?;
    let mut derived1_data = Base1::get_public_data(&heap, base1_2)?;

    base1_data.val1 = 53;
    derived1_data.val1 = 253;

    Base1::set_public_data(&mut heap, base1, &base1_data)?;
    Base1::set_public_data(&mut heap, base1_2, &derived1_data)?;

    Base2::increase_val1(&mut heap, base2)?;
    Base1::increase_val3(&mut heap, base1)?;
    Base1::increase_val3(&mut heap, base1_2)?;
    Derived1::increase_val4(&mut heap, derived1)?;
    Derived1::increase_val4(&mut heap, derived1_2)?;

    println!();
    println!("***");
    display_base1(&heap, base1)?;
    display_base1(&heap, base1_2)?;
    display_base2(&heap, base2)?;
    display_base1(&heap, base1_3)?;
    println!("***");

    Base1::delete(&mut heap, base1);
    Base1::delete(&mut heap, base1_2);
    Base1::delete(&mut heap, base1_3);

    log::debug!(
        "{} objects and {} private blocks left",
        heap.live_objects(),
        heap.live_blocks()
    );

    println!();

    Ok(())
}
