//! Parallel header scanning using rayon

use rayon::prelude::*;
use tracing::info;

use crate::scanner::HeaderScanner;
use crate::{HeaderSource, ScannedHeader};

/// Scan headers in parallel. The output order matches the input order.
pub fn scan_headers(headers: &[HeaderSource]) -> Vec<ScannedHeader> {
    let scanned: Vec<ScannedHeader> = headers
        .par_iter()
        .map_init(HeaderScanner::new, |scanner, header| scanner.scan(header))
        .collect();

    let macros: usize = scanned.iter().map(|s| s.macros.len()).sum();
    info!("Scanned {} headers, {} macro definitions", scanned.len(), macros);
    scanned
}
