//! Fixed spoken phrasing for deterministic actions.

use crate::timefmt::format_duration;

pub const START_TIMEOUT: &str =
    "Time-out initiated. Please state your name and role, starting with the attending surgeon.";

pub const ATTENDING_FIRST: &str =
    "Before we continue, the attending surgeon should state their name and role first.";

pub fn attending_acknowledged(attending: Option<&str>) -> String {
    match attending {
        Some(name) => format!("Thank you, Dr. {name}. Resident, please state your name and role."),
        None => "Thank you. Resident, please state your name and role.".to_string(),
    }
}

pub fn timeout_complete(first_step: &str) -> String {
    format!("Time-out complete. Starting {first_step}.")
}

pub fn step_changed(old: Option<&str>, new: &str) -> String {
    match old {
        Some(old) => format!("{old} complete, starting {new}."),
        None => format!("Starting {new}."),
    }
}

pub fn final_step_complete(last: &str) -> String {
    format!("{last} complete. That was the final step.")
}

pub fn propose_step(observation: Option<&str>, step: &str) -> String {
    match observation {
        Some(observation) => format!(
            "Observing {observation}. It looks like we are moving to '{step}'. Please confirm."
        ),
        None => format!("It looks like we are moving to '{step}'. Please confirm."),
    }
}

pub fn revert_step(prior: &str) -> String {
    format!("Understood. Staying on {prior}.")
}

pub fn backfilled(step: &str, ago: &str) -> String {
    format!("Understood. {step} started {ago} ago. Timeline updated.")
}

pub fn time_in_step(step: &str, seconds: u64) -> String {
    format!("We've been on {step} for {}.", format_duration(seconds))
}

pub fn time_in_session(seconds: u64) -> String {
    format!("The session has been running for {}.", format_duration(seconds))
}

pub fn check_in(attending: Option<&str>, step: &str, seconds: u64) -> String {
    let elapsed = format_duration(seconds);
    match attending {
        Some(name) => format!("Dr. {name}, we're {elapsed} into {step}. How is it going?"),
        None => format!("We're {elapsed} into {step}. How is it going?"),
    }
}

pub fn instrument_requested(instrument: &str) -> String {
    format!("User requested {instrument}.")
}
