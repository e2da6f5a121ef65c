//! Seed lookup: `pagewright seed <task>`.

use pagewright::service::content::derive_seed;

pub fn cmd_seed(task: &str) {
    println!("{}", derive_seed(task));
}
