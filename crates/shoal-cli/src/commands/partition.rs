//! Print the partition table for a population.

use anyhow::{Context, Result};
use colored::Colorize;
use shoal_distributed::{partition, PartitionTable};

pub fn run(population: usize, workers: usize) -> Result<()> {
    let table = partition(workers, population).context("Cannot partition population")?;

    println!(
        "{} {} agents over {} workers",
        "partition".green().bold(),
        population.to_string().cyan(),
        workers.to_string().cyan()
    );
    println!();
    for line in rows(&table) {
        println!("  {}", line);
    }
    println!();
    println!(
        "  Largest slice: {} agents",
        table.max_size().to_string().yellow()
    );
    Ok(())
}

fn rows(table: &PartitionTable) -> Vec<String> {
    let mut lines = vec![format!("{:>8} {:>10} {:>10}  range", "rank", "offset", "size")];
    lines.extend(table.slices().map(|slice| {
        format!(
            "{:>8} {:>10} {:>10}  {}..{}",
            slice.rank.as_u32(),
            slice.offset,
            slice.size,
            slice.range().start,
            slice.range().end
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows() {
        let table = partition(3, 10).unwrap();
        let lines = rows(&table);
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("0..4"));
        assert!(lines[2].ends_with("4..7"));
        assert!(lines[3].ends_with("7..10"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(run(10, 0).is_err());
    }
}
