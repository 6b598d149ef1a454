use terrasculpt::terrain::{
    default_biomes, resolve_biome, synthesize_heights, ColorParameters, NoiseConfig, Resolution,
    SynthesisParameters,
};

fn main() {
    let seed: u32 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0);
    let resolution = Resolution::new(256, 256);
    let params = SynthesisParameters {
        noise: NoiseConfig {
            seed,
            ..Default::default()
        },
        ..Default::default()
    };

    let heights = match synthesize_heights(resolution, &params) {
        Ok(heights) => heights,
        Err(err) => {
            eprintln!("Synthesis failed: {}", err);
            std::process::exit(1);
        }
    };

    let cells = heights.cells().as_slice();
    let min = cells.iter().copied().fold(f32::INFINITY, f32::min);
    let max = cells.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let avg = cells.iter().map(|&h| h as f64).sum::<f64>() / cells.len() as f64;

    println!("Height stats (seed {}, {}x{}):", seed, resolution.x, resolution.y);
    println!("  Min: {:.3}", min);
    println!("  Max: {:.3}", max);
    println!("  Avg: {:.3}", avg);

    let biomes = default_biomes();
    let overlap = ColorParameters::default().overlap;
    let mut counts = vec![0usize; biomes.len()];
    for (x, y, _) in heights.cells().iter() {
        if let Some(idx) = resolve_biome(&biomes, heights.normalized(x, y), overlap) {
            counts[idx] += 1;
        }
    }
    println!("Biome coverage:");
    for (idx, (biome, count)) in biomes.iter().zip(&counts).enumerate() {
        println!(
            "  #{} [{:.2}, {:.2}]: {} ({:.1}%)",
            idx,
            biome.start_height,
            biome.end_height,
            count,
            *count as f32 * 100.0 / cells.len() as f32
        );
    }
}
