#[cfg(test)]
pub mod fixture;
pub mod parser_utils;
pub mod tags;
