#![forbid(unsafe_code)]
#![deny(clippy::missing_const_for_fn)]
#![deny(clippy::nursery)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

use std::io::Write;

use markethub::world::GameData;
use tracing::info;

// Tool to pack a raw game-data dump (world, data-center, and item sheets as
// JSON) into the compact asset the server loads at startup.
fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| String::from("info")),
    );

    // initialize tracing
    tracing_subscriber::fmt::init();

    let input = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "assets/game.json".to_string());
    let raw = std::fs::read_to_string(&input)?;
    let data: GameData = serde_json::from_str(&raw)?;

    info!(
        "packing {} worlds, {} data centers, {} items",
        data.worlds.len(),
        data.data_centers.len(),
        data.items.len()
    );

    std::fs::create_dir_all("assets")?;
    let output = std::path::Path::new("assets/game.bin.zstd");
    let file = std::fs::File::create(output)?;
    let mut enc = zstd::stream::Encoder::new(file, 10)?;

    bincode::serialize_into(&mut enc, &data)?;
    enc.flush()?;
    enc.finish()?;

    info!("saved to {}", output.display());

    Ok(())
}
