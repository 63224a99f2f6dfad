//! Writes `sample_sales.csv` and `sample_sales.parquet`, a small monthly
//! sales table with text, date and numeric columns to try the explorer on.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Rows {
    month: Vec<String>,
    region: Vec<String>,
    product: Vec<String>,
    channel: Vec<String>,
    units: Vec<i64>,
    unit_price: Vec<f64>,
    revenue: Vec<f64>,
}

fn generate(rng: &mut SimpleRng) -> Rows {
    let regions = ["North", "South", "East", "West"];
    let products = [("Widget", 12.5), ("Gadget", 30.0), ("Gizmo", 7.25)];
    let channels = ["Online", "Retail"];

    let mut rows = Rows {
        month: Vec::new(),
        region: Vec::new(),
        product: Vec::new(),
        channel: Vec::new(),
        units: Vec::new(),
        unit_price: Vec::new(),
        revenue: Vec::new(),
    };

    for m in 1..=12u32 {
        for (r, region) in regions.iter().enumerate() {
            for &(product, base_price) in &products {
                // Slow upward trend so the forecast has something to follow.
                let demand = 40.0 + 3.0 * m as f64 + 5.0 * r as f64;
                let units = rng.gauss(demand, 6.0).round().max(0.0) as i64;
                let price = (base_price * rng.gauss(1.0, 0.05) * 100.0).round() / 100.0;
                let channel = channels[(rng.next_u64() % channels.len() as u64) as usize];

                rows.month.push(format!("2024-{m:02}-01"));
                rows.region.push(region.to_string());
                rows.product.push(product.to_string());
                rows.channel.push(channel.to_string());
                rows.units.push(units);
                rows.unit_price.push(price);
                rows.revenue.push((units as f64 * price * 100.0).round() / 100.0);
            }
        }
    }
    rows
}

fn write_csv(rows: &Rows, path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record(["month", "region", "product", "channel", "units", "unit_price", "revenue"])?;
    for i in 0..rows.month.len() {
        writer.write_record([
            rows.month[i].clone(),
            rows.region[i].clone(),
            rows.product[i].clone(),
            rows.channel[i].clone(),
            rows.units[i].to_string(),
            rows.unit_price[i].to_string(),
            rows.revenue[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(rows: &Rows, path: &str) -> Result<()> {
    let text = |v: &[String]| StringArray::from(v.iter().map(String::as_str).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("month", DataType::Utf8, false),
        Field::new("region", DataType::Utf8, false),
        Field::new("product", DataType::Utf8, false),
        Field::new("channel", DataType::Utf8, false),
        Field::new("units", DataType::Int64, false),
        Field::new("unit_price", DataType::Float64, false),
        Field::new("revenue", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(text(&rows.month)),
            Arc::new(text(&rows.region)),
            Arc::new(text(&rows.product)),
            Arc::new(text(&rows.channel)),
            Arc::new(Int64Array::from(rows.units.clone())),
            Arc::new(Float64Array::from(rows.unit_price.clone())),
            Arc::new(Float64Array::from(rows.revenue.clone())),
        ],
    )?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    write_csv(&rows, "sample_sales.csv")?;
    write_parquet(&rows, "sample_sales.parquet")?;

    println!(
        "Wrote {} rows to sample_sales.csv and sample_sales.parquet",
        rows.month.len()
    );
    Ok(())
}
