//! Bootstrap shared by the `taskhub-server` binary and `taskhub-cli serve`.

pub mod app;
