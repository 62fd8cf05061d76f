//! Scalar logs produced by each update round

use std::collections::BTreeMap;

use tch::{Kind, Tensor};

/// Log variables of one round or one tick, keyed by name
pub type LogVars = BTreeMap<String, f64>;

/// Key of the summed loss in parsed logs
pub const TOTAL_LOSS_KEY: &str = "loss";

/// Sum every term whose name contains `loss` and log each term plus the total
pub fn parse_losses(losses: Vec<(&str, Tensor)>) -> (Tensor, LogVars) {
    let mut log_vars = LogVars::new();
    let mut total: Option<Tensor> = None;

    for (name, value) in losses {
        let value = value.mean(Kind::Float);
        log_vars.insert(name.to_string(), value.double_value(&[]));
        if name.contains(TOTAL_LOSS_KEY) {
            total = Some(match total {
                Some(sum) => sum + value,
                None => value,
            });
        }
    }

    let total = total.unwrap_or_else(|| Tensor::from(0.0f32));
    log_vars.insert(TOTAL_LOSS_KEY.to_string(), total.double_value(&[]));
    (total, log_vars)
}

/// Average logs over several rounds, key by key
pub fn gather_log_vars(rounds: &[LogVars]) -> LogVars {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for round in rounds {
        for (name, value) in round {
            let entry = sums.entry(name.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}
