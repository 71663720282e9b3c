pub mod conflict;
pub mod import_service;
pub mod maintenance;
pub mod query;
pub mod schedule_service;
pub mod vote_service;

#[cfg(test)]
pub(crate) mod test_support;
