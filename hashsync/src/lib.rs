pub mod channel;
pub mod command;
pub mod context;
pub mod enumerator;
pub mod location;
pub mod operation;

#[cfg(test)]
mod tests;
