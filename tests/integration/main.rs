//! Postgres integration tests. Skipped unless `TASKHUB_TEST_DATABASE_URL`
//! points at a disposable database.

mod connection_test;
mod helpers;
mod queue_test;
