use std::fs;
use std::path::Path;

use topd_core::{Result, SolverError, TargetSite};

/// Parsed instance file: target count, vehicle count, budget, and one
/// site per target (source first, destination last).
#[derive(Debug)]
pub struct InstanceFile {
    pub num_targets: usize,
    pub num_vehicles: usize,
    pub budget: f64,
    pub sites: Vec<TargetSite>,
}

fn header_tail<'a>(line: Option<&'a str>, what: &str) -> Result<&'a str> {
    line.and_then(|l| l.split_whitespace().last())
        .ok_or_else(|| SolverError::InstanceMalformed(format!("missing {what} header")))
}

/// Reads the whitespace-delimited instance format: three header lines
/// ending in the target count, the vehicle count, and the budget, then one
/// `x y score` line per target.
pub fn read_instance(path: &Path) -> Result<InstanceFile> {
    let text = fs::read_to_string(path).map_err(|e| {
        SolverError::InstanceMalformed(format!("cannot read {}: {e}", path.display()))
    })?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let num_targets: usize = header_tail(lines.next(), "target-count")?
        .parse()
        .map_err(|e| SolverError::InstanceMalformed(format!("bad target count: {e}")))?;
    let num_vehicles: usize = header_tail(lines.next(), "vehicle-count")?
        .parse()
        .map_err(|e| SolverError::InstanceMalformed(format!("bad vehicle count: {e}")))?;
    let budget: f64 = header_tail(lines.next(), "budget")?
        .parse()
        .map_err(|e| SolverError::InstanceMalformed(format!("bad budget: {e}")))?;

    let mut sites = Vec::with_capacity(num_targets);
    for (k, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(SolverError::InstanceMalformed(format!(
                "target line {} has {} fields, expected x y score",
                k + 4,
                fields.len()
            )));
        }
        let parse = |s: &str| -> Result<f64> {
            s.parse()
                .map_err(|e| SolverError::InstanceMalformed(format!("bad number {s:?}: {e}")))
        };
        sites.push(TargetSite {
            x: parse(fields[0])?,
            y: parse(fields[1])?,
            score: parse(fields[2])?,
        });
    }
    if sites.len() != num_targets {
        return Err(SolverError::InstanceMalformed(format!(
            "header promises {} targets but the file lists {}",
            num_targets,
            sites.len()
        )));
    }
    Ok(InstanceFile {
        num_targets,
        num_vehicles,
        budget,
        sites,
    })
}
