//! Replays what the interactive visualizer lets you do, printing the free list after
//! every step instead of drawing it.
//!
//! Run with `cargo run --example walkthrough`.

use freelist::{Freelist, Reservation};

/// Size of the "cheaper entity" the visualizer reserves on `J`.
const CHEAP: u32 = 64;
/// Size of the "expensive entity" the visualizer reserves on `H`.
const EXPENSIVE: u32 = 160;

fn print_state(step: &str, freelist: &Freelist, reservations: &[Reservation]) {
    println!("{step}");

    for (i, node) in freelist.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        println!("  {marker}free [{:>4}, {:>4})", node.offset(), node.end());
    }

    for reservation in reservations {
        println!(
            "   rsvd [{:>4}, {:>4})",
            reservation.offset(),
            reservation.offset() + reservation.size()
        );
    }

    println!(
        "  {} NODES, {} of {} bytes free\n",
        freelist.node_count(),
        freelist.free_size(),
        freelist.data_size()
    );
}

fn reserve(freelist: &mut Freelist, reservations: &mut Vec<Reservation>, size: u32) {
    match freelist.reserve_record(size) {
        Ok(reservation) => reservations.push(reservation),
        Err(err) => println!("Failed to reserve {size} bytes: {err}"),
    }
}

fn unreserve(freelist: &mut Freelist, reservations: &mut Vec<Reservation>, id: usize) {
    let reservation = reservations.remove(id);

    if let Err((reservation, err)) = freelist.unreserve_record(reservation) {
        println!("Failed to unreserve: {err}");
        reservations.insert(id, reservation);
    }
}

fn main() -> freelist::Result<()> {
    let mut freelist = Freelist::new(2048)?;
    let mut reservations = Vec::new();

    println!(
        "total {} bytes = internal {} + data {}\n",
        freelist.total_size(),
        freelist.internal_size(),
        freelist.data_size()
    );
    print_state("initial", &freelist, &reservations);

    for size in [CHEAP, EXPENSIVE, CHEAP, EXPENSIVE, CHEAP] {
        reserve(&mut freelist, &mut reservations, size);
    }
    print_state("reserved five entities", &freelist, &reservations);

    unreserve(&mut freelist, &mut reservations, 3);
    unreserve(&mut freelist, &mut reservations, 1);
    print_state("freed both expensive entities", &freelist, &reservations);

    reserve(&mut freelist, &mut reservations, CHEAP);
    print_state("reserved a cheap entity in the first fit", &freelist, &reservations);

    unreserve(&mut freelist, &mut reservations, 1);
    print_state("freed its neighbour", &freelist, &reservations);

    for _ in 0..32 {
        reserve(&mut freelist, &mut reservations, EXPENSIVE);
    }
    print_state("reserved expensive entities until full", &freelist, &reservations);

    freelist.clear();
    reservations.clear();
    print_state("cleared", &freelist, &reservations);

    Ok(())
}
