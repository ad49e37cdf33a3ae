pub mod benchmark;
pub mod http;

#[cfg(test)]
pub(crate) mod test_support;
