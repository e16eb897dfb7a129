pub mod runner;
mod watchdog;

#[cfg(test)]
pub(crate) mod fake;
